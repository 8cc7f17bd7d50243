//! Item-item cosine similarity over trained embeddings.
//!
//! The derived matrix is square and symmetric up to floating point, with a
//! diagonal of 1.0 for any nonzero embedding. Both axes are labeled with
//! the persisted item-id ordering: index *i* of the embeddings MUST be the
//! *i*-th entry of that list, a pairing established by the interaction
//! matrix's column order and carried here unchanged.

use std::path::Path;

use tracing::{info, warn};

use crate::catalog::ItemId;
use crate::error::{Error, Result};
use crate::matrix::DenseMatrix;

/// Square item-item similarity matrix labeled by item id.
///
/// Recomputed wholesale on each pipeline run, never updated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    item_ids: Vec<ItemId>,
    values: DenseMatrix,
}

/// Computes pairwise cosine similarity over the item embedding vectors.
///
/// A vector with an exactly zero norm gets similarity 0 against everything
/// (including itself), by convention rather than error. A zero-row result
/// logs a warning but is returned as-is.
///
/// # Errors
///
/// [`Error::TypeConstraint`] when the embedding row count does not match
/// `item_ids` — the positional contract the caller must guarantee.
pub fn derive(embeddings: &DenseMatrix, item_ids: &[ItemId]) -> Result<SimilarityMatrix> {
    if embeddings.rows() != item_ids.len() {
        return Err(Error::TypeConstraint(format!(
            "{} embedding rows cannot be labeled with {} item ids",
            embeddings.rows(),
            item_ids.len()
        )));
    }

    let n = embeddings.rows();
    let norms: Vec<f32> = (0..n)
        .map(|i| embeddings.row(i).iter().map(|v| v * v).sum::<f32>().sqrt())
        .collect();

    let mut values = DenseMatrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let sim = if norms[i] == 0.0 || norms[j] == 0.0 {
                0.0
            } else {
                dot(embeddings.row(i), embeddings.row(j)) / (norms[i] * norms[j])
            };
            values.set(i, j, sim);
            values.set(j, i, sim);
        }
    }

    if n == 0 {
        warn!("similarity matrix does not contain any rows");
    }
    Ok(SimilarityMatrix {
        item_ids: item_ids.to_vec(),
        values,
    })
}

impl SimilarityMatrix {
    /// Number of items on each axis.
    #[must_use]
    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    /// True when the matrix has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Ordered item ids labeling both axes.
    #[must_use]
    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }

    /// Similarity between two items, `None` when either id is unknown.
    #[must_use]
    pub fn get(&self, a: ItemId, b: ItemId) -> Option<f32> {
        let i = self.position(a)?;
        let j = self.position(b)?;
        Some(self.values.get(i, j))
    }

    /// The `k` items most similar to `item`, best first, self-match
    /// excluded.
    ///
    /// # Errors
    ///
    /// [`Error::TypeConstraint`] when `item` is not on the axis.
    pub fn top_k(&self, item: ItemId, k: usize) -> Result<Vec<(ItemId, f32)>> {
        let col = self.position(item).ok_or_else(|| {
            Error::TypeConstraint(format!("item {item} is not in the similarity matrix"))
        })?;

        let mut scored: Vec<(ItemId, f32)> = self
            .item_ids
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != col)
            .map(|(i, &id)| (id, self.values.get(i, col)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored)
    }

    /// Writes the matrix as delimited text: header row and first column
    /// are item ids, cell `[i, j]` is the similarity score.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;

        let mut header = Vec::with_capacity(self.len() + 1);
        header.push("item_id".to_string());
        header.extend(self.item_ids.iter().map(ToString::to_string));
        writer.write_record(&header)?;

        for (i, id) in self.item_ids.iter().enumerate() {
            let mut record = Vec::with_capacity(self.len() + 1);
            record.push(id.to_string());
            record.extend(self.values.row(i).iter().map(ToString::to_string));
            writer.write_record(&record)?;
        }
        writer.flush().map_err(|e| Error::io(path.as_ref(), e))?;
        info!(
            "saved {}x{} similarity matrix to {}",
            self.len(),
            self.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Reads back a matrix persisted by [`SimilarityMatrix::write_csv`].
    ///
    /// # Errors
    ///
    /// [`Error::Schema`] when the file is not square or a cell does not
    /// parse.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;

        let header = reader.headers()?.clone();
        let item_ids: Vec<ItemId> = header
            .iter()
            .skip(1)
            .map(|cell| {
                cell.trim()
                    .parse()
                    .map_err(|_| Error::schema(format!("header cell `{cell}` is not an item id")))
            })
            .collect::<Result<_>>()?;

        let n = item_ids.len();
        let mut values = DenseMatrix::zeros(n, n);
        let mut row_count = 0;
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            if i >= n {
                return Err(Error::schema(format!(
                    "similarity matrix has more than {n} rows but only {n} columns"
                )));
            }
            if record.len() != n + 1 {
                return Err(Error::schema(format!(
                    "similarity row {i} has {} cells, expected {}",
                    record.len(),
                    n + 1
                )));
            }
            for (j, cell) in record.iter().skip(1).enumerate() {
                let value = cell.trim().parse().map_err(|_| {
                    Error::schema(format!("cell [{i}, {j}] `{cell}` is not a number"))
                })?;
                values.set(i, j, value);
            }
            row_count += 1;
        }
        if row_count != n {
            return Err(Error::schema(format!(
                "similarity matrix has {row_count} rows but {n} columns"
            )));
        }

        Ok(Self { item_ids, values })
    }

    fn position(&self, id: ItemId) -> Option<usize> {
        // The axis ordering is whatever the caller supplied; do not assume
        // it is sorted.
        self.item_ids.iter().position(|&x| x == id)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
