//! Content-addressed stage output cache
//!
//! Entries are keyed by stage identity, the fingerprint of the configuration
//! bound upstream of (and including) the stage, the identity of the data fed
//! into the pipeline, and a fold scope. Scopes are torn down explicitly when
//! their fold ends.
//!
//! Per-item entries for single-subject caching live outside of any fold
//! scope and survive scope teardown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::data::{Batch, Row};

use super::node::PipelineNode;

/// Whether an entry was produced while fitting or while transforming unseen data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePhase {
    Fit,
    Transform,
}

/// Batch-level cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: String,
    pub position: usize,
    pub stage: String,
    /// Fingerprint of the configuration of this stage and every stage before it
    pub config: String,
    /// Identity of the pipeline input (and, when transforming, of the fit data)
    pub data: String,
    pub phase: CachePhase,
}

/// Item-level cache key used in single-subject mode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub position: usize,
    pub stage: String,
    /// Fingerprint of the stage's own configuration
    pub config: String,
    /// Content fingerprint of the item at the stage input
    pub item: String,
}

/// Stage output plus, for fit-phase entries, the fitted stage
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub output: Arc<Batch>,
    pub fitted: Option<Arc<PipelineNode>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub row_hits: usize,
    pub row_misses: usize,
    pub entries: usize,
    pub rows: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    rows: HashMap<RowKey, Row>,
    stats: CacheStats,
}

/// Shared, thread-safe stage cache; clones refer to the same store
#[derive(Debug, Clone, Default)]
pub struct StageCache {
    state: Arc<Mutex<CacheState>>,
}

impl StageCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut CacheState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Look up an entry, counting the hit or miss
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.with_state(|s| {
            let entry = s.entries.get(key).cloned();
            if entry.is_some() {
                s.stats.hits += 1;
            } else {
                s.stats.misses += 1;
            }
            entry
        })
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.with_state(|s| s.entries.contains_key(key))
    }

    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        self.with_state(|s| {
            s.entries.insert(key, entry);
        });
    }

    pub fn get_row(&self, key: &RowKey) -> Option<Row> {
        self.with_state(|s| {
            let row = s.rows.get(key).cloned();
            if row.is_some() {
                s.stats.row_hits += 1;
            } else {
                s.stats.row_misses += 1;
            }
            row
        })
    }

    pub fn insert_row(&self, key: RowKey, row: Row) {
        self.with_state(|s| {
            s.rows.insert(key, row);
        });
    }

    /// Drop every batch entry of one scope; returns the number removed
    pub fn clear_scope(&self, scope: &str) -> usize {
        self.with_state(|s| {
            let before = s.entries.len();
            s.entries.retain(|k, _| k.scope != scope);
            before - s.entries.len()
        })
    }

    /// Drop every batch entry whose scope starts with `prefix`
    pub fn clear_scope_prefix(&self, prefix: &str) -> usize {
        self.with_state(|s| {
            let before = s.entries.len();
            s.entries.retain(|k, _| !k.scope.starts_with(prefix));
            before - s.entries.len()
        })
    }

    /// Drop the retained single-subject entries
    pub fn clear_rows(&self) {
        self.with_state(|s| s.rows.clear());
    }

    pub fn clear(&self) {
        self.with_state(|s| {
            s.entries.clear();
            s.rows.clear();
        });
    }

    pub fn len(&self) -> usize {
        self.with_state(|s| s.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.with_state(|s| CacheStats { entries: s.entries.len(), rows: s.rows.len(), ..s.stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn key(scope: &str, position: usize) -> CacheKey {
        CacheKey {
            scope: scope.to_string(),
            position,
            stage: format!("s{position}"),
            config: "c".to_string(),
            data: "d".to_string(),
            phase: CachePhase::Fit,
        }
    }

    fn entry() -> CacheEntry {
        CacheEntry { output: Arc::new(Batch::new(array![[1.0]])), fitted: None }
    }

    #[test]
    fn test_get_counts_hits_and_misses() {
        let cache = StageCache::new();
        assert!(cache.get(&key("a", 0)).is_none());
        cache.insert(key("a", 0), entry());
        assert!(cache.get(&key("a", 0)).is_some());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_scope_teardown() {
        let cache = StageCache::new();
        cache.insert(key("outer0_inner0", 0), entry());
        cache.insert(key("outer0_inner1", 0), entry());
        cache.insert(key("outer1_inner0", 0), entry());
        assert_eq!(cache.clear_scope("outer0_inner0"), 1);
        assert_eq!(cache.clear_scope_prefix("outer0_"), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key("outer1_inner0", 0)));
    }

    #[test]
    fn test_rows_survive_scope_teardown() {
        let cache = StageCache::new();
        let row_key =
            RowKey { position: 0, stage: "s".into(), config: "c".into(), item: "i".into() };
        let row = Batch::new(array![[2.0, 3.0]]).rows().remove(0);
        cache.insert_row(row_key.clone(), row.clone());
        cache.clear_scope_prefix("");
        assert_eq!(cache.get_row(&row_key), Some(row));
        cache.clear_rows();
        assert_eq!(cache.get_row(&row_key), None);
    }

    #[test]
    fn test_clones_share_store() {
        let cache = StageCache::new();
        let other = cache.clone();
        other.insert(key("s", 1), entry());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(other.is_empty());
    }
}
