//! Sparse and dense matrix primitives for the interaction pipeline.
//!
//! [`CsrMatrix`] is a compressed-sparse-row binary matrix sized
//! users x items; [`DenseMatrix`] is the row-major dense form used for
//! embeddings and for the evaluation partitions. Every densification goes
//! through an explicit byte budget so an oversized dense intermediate
//! surfaces as [`Error::ResourceExhausted`] instead of an allocator abort.

use std::ops::Range;

use crate::error::{Error, Result};

/// Default ceiling for any single dense intermediate: 1 GiB.
pub const MEMORY_BUDGET_DEFAULT: u64 = 1 << 30;

/// Compressed-sparse-row matrix of f32 indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f32>,
}

impl CsrMatrix {
    /// A matrix with zero rows and a fixed column count, the identity
    /// element for [`CsrMatrix::vstack`].
    #[must_use]
    pub fn with_columns(cols: usize) -> Self {
        Self {
            rows: 0,
            cols,
            indptr: vec![0],
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Builds a matrix from per-row `(column, value)` pairs.
    ///
    /// # Errors
    ///
    /// [`Error::TypeConstraint`] when a column index is out of range or a
    /// row's columns are not strictly ascending.
    pub fn from_rows(cols: usize, rows: &[Vec<(usize, f32)>]) -> Result<Self> {
        let mut matrix = Self::with_columns(cols);
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    /// Appends one row given its `(column, value)` pairs, which must be
    /// strictly ascending by column.
    pub fn push_row(&mut self, entries: &[(usize, f32)]) -> Result<()> {
        let mut last: Option<usize> = None;
        for &(col, _) in entries {
            if col >= self.cols {
                return Err(Error::TypeConstraint(format!(
                    "column index {col} out of range for a {}-column matrix",
                    self.cols
                )));
            }
            if last.is_some_and(|prev| prev >= col) {
                return Err(Error::TypeConstraint(
                    "row entries must be strictly ascending by column".into(),
                ));
            }
            last = Some(col);
        }
        for &(col, value) in entries {
            self.indices.push(col);
            self.values.push(value);
        }
        self.rows += 1;
        self.indptr.push(self.indices.len());
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored (nonzero) entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Column indices and values of row `i`.
    ///
    /// # Panics
    ///
    /// Panics when `i` is out of range.
    #[must_use]
    pub fn row(&self, i: usize) -> (&[usize], &[f32]) {
        let span = self.indptr[i]..self.indptr[i + 1];
        (&self.indices[span.clone()], &self.values[span])
    }

    /// True when row `i` stores a nonzero at `col`.
    #[must_use]
    pub fn has_entry(&self, i: usize, col: usize) -> bool {
        self.row(i).0.binary_search(&col).is_ok()
    }

    /// Vertically concatenates `other` below `self`.
    ///
    /// # Errors
    ///
    /// [`Error::TypeConstraint`] when the column counts differ; chunks are
    /// only stackable because every one of them is built against the same
    /// fixed column labeling.
    pub fn vstack(&mut self, other: &Self) -> Result<()> {
        if self.cols != other.cols {
            return Err(Error::TypeConstraint(format!(
                "cannot stack a {}-column matrix onto a {}-column matrix",
                other.cols, self.cols
            )));
        }
        let offset = self.indices.len();
        self.indices.extend_from_slice(&other.indices);
        self.values.extend_from_slice(&other.values);
        self.indptr
            .extend(other.indptr.iter().skip(1).map(|p| p + offset));
        self.rows += other.rows;
        Ok(())
    }

    /// Copies out the row range `range` as a new matrix with the same
    /// column count.
    ///
    /// # Panics
    ///
    /// Panics when the range is out of bounds.
    #[must_use]
    pub fn slice_rows(&self, range: Range<usize>) -> Self {
        let start = self.indptr[range.start];
        let end = self.indptr[range.end];
        Self {
            rows: range.len(),
            cols: self.cols,
            indptr: self.indptr[range.start..=range.end]
                .iter()
                .map(|p| p - start)
                .collect(),
            indices: self.indices[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        }
    }

    /// Densifies the matrix under `budget` bytes.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceExhausted`] when the dense form would exceed the
    /// budget; the caller should rerun with a larger splits divisor (or a
    /// smaller chunk), not retry unchanged.
    pub fn to_dense(&self, budget: u64) -> Result<DenseMatrix> {
        check_dense_budget(self.rows, self.cols, budget, "increase the splits divisor")?;
        let mut dense = DenseMatrix::zeros(self.rows, self.cols);
        for i in 0..self.rows {
            let (cols, values) = self.row(i);
            for (&col, &value) in cols.iter().zip(values) {
                dense.set(i, col, value);
            }
        }
        Ok(dense)
    }
}

/// Row-major dense f32 matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl DenseMatrix {
    /// An all-zero matrix.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Builds a matrix from row vectors.
    ///
    /// # Errors
    ///
    /// [`Error::TypeConstraint`] when the rows are ragged: the input is
    /// then not a two-dimensional numeric array.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::TypeConstraint(format!(
                    "row {i} has {} entries, expected {cols}; input is not a \
                     two-dimensional array",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Value at `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics when out of range.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.cols + j]
    }

    /// Sets the value at `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics when out of range.
    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        self.data[i * self.cols + j] = value;
    }

    /// Row `i` as a slice.
    ///
    /// # Panics
    ///
    /// Panics when out of range.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Mutable row `i`.
    ///
    /// # Panics
    ///
    /// Panics when out of range.
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Compresses to CSR, dropping exact zeros.
    #[must_use]
    pub fn to_csr(&self) -> CsrMatrix {
        let mut csr = CsrMatrix::with_columns(self.cols);
        for i in 0..self.rows {
            for (j, &value) in self.row(i).iter().enumerate() {
                if value != 0.0 {
                    csr.indices.push(j);
                    csr.values.push(value);
                }
            }
            csr.rows += 1;
            csr.indptr.push(csr.indices.len());
        }
        csr
    }
}

/// Rejects a dense allocation of `rows * cols` f32 cells that would exceed
/// `budget` bytes.
pub(crate) fn check_dense_budget(
    rows: usize,
    cols: usize,
    budget: u64,
    guidance: &str,
) -> Result<()> {
    let needed = rows as u64 * cols as u64 * std::mem::size_of::<f32>() as u64;
    if needed > budget {
        return Err(Error::ResourceExhausted {
            needed_bytes: needed,
            budget_bytes: budget,
            guidance: guidance.into(),
        });
    }
    Ok(())
}
