use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use docqa_core::error::{Error, Result};
use docqa_core::types::{IndexEntry, RetrievalResult};

use crate::similarity::cosine_similarity;

#[derive(Debug, Default)]
struct Entries {
    /// Established by the first insert after a clear.
    dim: Option<usize>,
    items: Vec<IndexEntry>,
}

impl Entries {
    /// All-or-nothing: nothing is appended unless every entry has the right dimension.
    fn append(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut dim = self.dim;
        for e in &entries {
            if e.vector.is_empty() {
                return Err(Error::InvalidConfig(format!("entry {} has an empty vector", e.unit_id)));
            }
            match dim {
                Some(d) if d != e.vector.len() => {
                    return Err(Error::DimensionMismatch { expected: d, actual: e.vector.len() });
                }
                Some(_) => {}
                None => dim = Some(e.vector.len()),
            }
        }
        self.dim = dim;
        self.items.extend(entries);
        Ok(())
    }
}

/// Exact nearest-neighbour index over cosine similarity.
///
/// Searches share a read lock; `insert`, `clear` and rebuilds take the write
/// lock, so readers wait while the index is being replaced.
#[derive(Debug, Default)]
pub struct VectorIndex {
    inner: RwLock<Entries>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut guard = self.write();
        let n = entries.len();
        guard.append(entries)?;
        tracing::debug!(inserted = n, total = guard.items.len(), "vector index insert");
        Ok(())
    }

    /// The `k` entries most similar to `query`, best first; ties go to the earlier unit.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1".into()));
        }
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let Some(dim) = guard.dim else {
            return Ok(Vec::new());
        };
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: query.len() });
        }
        let mut scored: Vec<(f32, &IndexEntry)> =
            guard.items.iter().map(|e| (cosine_similarity(query, &e.vector), e)).collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.sequence_index.cmp(&b.1.sequence_index)));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(score, e)| RetrievalResult { unit: e.to_unit(), score })
            .collect())
    }

    /// Drop every entry and forget the established dimension.
    pub fn clear(&self) {
        *self.write() = Entries::default();
    }

    /// Start replacing the index contents. The index reads as empty to the
    /// rebuild, and the previous contents come back unless `commit` is called.
    pub fn begin_rebuild(&self) -> Rebuild<'_> {
        let mut guard = self.write();
        let previous = std::mem::take(&mut *guard);
        Rebuild { guard, previous: Some(previous) }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> Option<usize> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).dim
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive, scoped replacement of a [`VectorIndex`]'s contents.
///
/// Holds the write lock for its whole life. Dropping it without `commit`
/// (including on an early `?` return) restores the previous contents.
pub struct Rebuild<'a> {
    guard: RwLockWriteGuard<'a, Entries>,
    previous: Option<Entries>,
}

impl Rebuild<'_> {
    pub fn insert(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        self.guard.append(entries)
    }

    pub fn len(&self) -> usize {
        self.guard.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.items.is_empty()
    }

    pub fn commit(mut self) {
        self.previous = None;
        tracing::debug!(total = self.guard.items.len(), dim = ?self.guard.dim, "vector index rebuilt");
    }
}

impl Drop for Rebuild<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            tracing::warn!(restored = previous.items.len(), "index rebuild abandoned, previous contents restored");
            *self.guard = previous;
        }
    }
}
