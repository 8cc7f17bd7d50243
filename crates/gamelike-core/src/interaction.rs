//! Chunked construction of the user-item interaction matrix.
//!
//! The full dense pivot (all users x all items) never exists in memory:
//! users are processed in fixed-size batches, each pivoted into one dense
//! chunk under the byte budget, compressed to CSR, and stacked onto a
//! running sparse matrix whose column count is fixed up front. Chunk size
//! is the single knob trading memory for wall-clock time.

use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::catalog::{ItemId, OwnershipEvent};
use crate::error::{Error, Result};
use crate::matrix::{check_dense_budget, CsrMatrix, DenseMatrix};

/// Fixed column labeling of the interaction matrix: the sorted-ascending
/// distinct item ids, plus the reverse id -> column lookup.
#[derive(Debug, Clone)]
pub struct ItemIndex {
    ids: Vec<ItemId>,
    columns: FxHashMap<ItemId, usize>,
}

impl ItemIndex {
    /// Builds the index from the distinct item ids of `rows`.
    #[must_use]
    pub fn from_rows(rows: &[OwnershipEvent]) -> Self {
        let mut ids: Vec<ItemId> = rows.iter().map(|r| r.item).collect();
        ids.sort_unstable();
        ids.dedup();
        let columns = ids.iter().enumerate().map(|(col, &id)| (id, col)).collect();
        Self { ids, columns }
    }

    /// Ordered item ids, one per matrix column.
    #[must_use]
    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    /// Column index of `id`, if known.
    #[must_use]
    pub fn column(&self, id: ItemId) -> Option<usize> {
        self.columns.get(&id).copied()
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when no item has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Pivots the rows belonging to `user_subset` into one sparse chunk.
///
/// Columns are fixed to the full item index (missing combinations are 0),
/// rows follow the order of `user_subset`. The chunk is computed purely
/// from its inputs, so a failed run can restart from any batch.
///
/// # Errors
///
/// [`Error::ResourceExhausted`] when the dense intermediate for this chunk
/// would exceed `budget` bytes; react by reducing the chunk size, not by
/// retrying unchanged.
pub fn build_chunk(
    rows: &[OwnershipEvent],
    user_subset: &[u32],
    items: &ItemIndex,
    budget: u64,
) -> Result<CsrMatrix> {
    check_dense_budget(
        user_subset.len(),
        items.len(),
        budget,
        "try making the chunk size smaller",
    )?;

    let positions: FxHashMap<u32, usize> = user_subset
        .iter()
        .enumerate()
        .map(|(pos, &user)| (user, pos))
        .collect();

    let mut dense = DenseMatrix::zeros(user_subset.len(), items.len());
    for row in rows {
        let Some(&pos) = positions.get(&row.user) else {
            continue;
        };
        // Unknown items cannot occur here: the index was built from the
        // same rows. Guard anyway so a partial index is a no-op, not a
        // panic.
        if let Some(col) = items.column(row.item) {
            dense.set(pos, col, row.owned);
        }
    }
    Ok(dense.to_csr())
}

/// Lazy iterator over the interaction chunks, one per `chunk_size` users.
pub struct Chunks<'a> {
    rows: &'a [OwnershipEvent],
    items: &'a ItemIndex,
    users: Vec<u32>,
    cursor: usize,
    chunk_size: usize,
    budget: u64,
}

impl Iterator for Chunks<'_> {
    type Item = Result<CsrMatrix>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.users.len() {
            return None;
        }
        let end = usize::min(self.cursor + self.chunk_size, self.users.len());
        let subset = &self.users[self.cursor..end];
        self.cursor = end;
        Some(build_chunk(self.rows, subset, self.items, self.budget))
    }
}

/// Drives the chunked builder over all user batches and concatenates the
/// chunks into one interaction matrix.
#[derive(Debug, Clone)]
pub struct Assembler {
    /// Users per chunk.
    pub chunk_size: usize,
    /// Byte budget for any one dense chunk.
    pub budget: u64,
}

impl Assembler {
    /// Creates an assembler with the given chunk size and the default
    /// memory budget.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            budget: crate::matrix::MEMORY_BUDGET_DEFAULT,
        }
    }

    /// Lazily yields the chunks for `rows` without concatenating them.
    pub fn chunks<'a>(
        &self,
        rows: &'a [OwnershipEvent],
        items: &'a ItemIndex,
    ) -> Result<Chunks<'a>> {
        if self.chunk_size == 0 {
            return Err(Error::TypeConstraint("chunk size must be at least 1".into()));
        }
        let mut users: Vec<u32> = rows.iter().map(|r| r.user).collect();
        users.sort_unstable();
        users.dedup();
        Ok(Chunks {
            rows,
            items,
            users,
            cursor: 0,
            chunk_size: self.chunk_size,
            budget: self.budget,
        })
    }

    /// Builds the full interaction matrix and its column labeling.
    ///
    /// The sorted distinct item-id list is determined once; every chunk is
    /// built against it and stacked onto a zero-row matrix with the fixed
    /// column count. An empty input yields a zero-row matrix, not an
    /// error.
    pub fn assemble(&self, rows: &[OwnershipEvent]) -> Result<Interactions> {
        let items = ItemIndex::from_rows(rows);
        let mut matrix = CsrMatrix::with_columns(items.len());

        let chunks = self.chunks(rows, &items)?;
        debug!(
            "building interaction matrix in chunks of {} users across {} columns",
            self.chunk_size,
            items.len()
        );
        for chunk in chunks {
            matrix.vstack(&chunk?)?;
        }

        info!(
            "assembled interaction matrix: {} users x {} items, {} interactions",
            matrix.rows(),
            matrix.cols(),
            matrix.nnz()
        );
        Ok(Interactions {
            matrix,
            item_ids: items.ids().to_vec(),
        })
    }
}

/// The interaction matrix bundled with its column labeling.
///
/// Column `i` of [`Interactions::matrix`] corresponds to
/// `item_ids[i]`; keeping the two in one handoff object is what makes the
/// positional contract structurally enforced for every later stage.
#[derive(Debug, Clone)]
pub struct Interactions {
    /// Sparse binary user x item matrix, rows in dense user-id order.
    pub matrix: CsrMatrix,
    /// Ordered item ids, one per matrix column.
    pub item_ids: Vec<ItemId>,
}

impl Interactions {
    /// Persists the ordered item-id list, the single source of truth for
    /// mapping matrix columns back to item identities.
    pub fn save_item_ids(&self, path: impl AsRef<Path>) -> Result<()> {
        save_item_ids(path, &self.item_ids)
    }
}

/// Writes an ordered item-id list to `path`.
pub fn save_item_ids(path: impl AsRef<Path>, ids: &[ItemId]) -> Result<()> {
    let bytes = postcard::to_allocvec(ids)?;
    std::fs::write(path.as_ref(), bytes).map_err(|e| Error::io(path.as_ref(), e))?;
    info!("saved {} item ids to {}", ids.len(), path.as_ref().display());
    Ok(())
}

/// Reads back an ordered item-id list persisted by [`save_item_ids`].
pub fn load_item_ids(path: impl AsRef<Path>) -> Result<Vec<ItemId>> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| Error::io(path.as_ref(), e))?;
    Ok(postcard::from_bytes(&bytes)?)
}
