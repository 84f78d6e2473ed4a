//! Memoized derived views
//!
//! A page re-renders far more often than its catalog or filter state
//! changes. [`FilterCache`] keeps the last result keyed on the catalog
//! revision and the full filter query and recomputes only when either moves.

use crate::filter::{
    filter_indices, malformed_sort_keys, FieldConfig, FilterIndices, FilterOutcome, FilterQuery,
};
use crate::record::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    revision: u64,
    config: FieldConfig,
    query: FilterQuery,
}

#[derive(Debug, Default)]
pub struct FilterCache {
    key: Option<CacheKey>,
    indices: FilterIndices,
    hits: u64,
    misses: u64,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the filtered view of `records`, reusing the previous result when
    /// `revision`, `config` and `query` are unchanged
    ///
    /// `revision` must change whenever `records` does.
    pub fn view<'a, R: Record>(
        &mut self,
        records: &'a [R],
        revision: u64,
        config: &FieldConfig,
        query: &FilterQuery,
    ) -> FilterOutcome<'a, R> {
        let fresh = self.key.as_ref().is_some_and(|k| {
            k.revision == revision && k.config == *config && k.query == *query
        });

        if fresh {
            self.hits += 1;
            tracing::debug!(revision, hits = self.hits, "filter cache hit");
        } else {
            self.misses += 1;
            tracing::debug!(revision, misses = self.misses, "filter cache miss");
            self.indices = filter_indices(records, config, query);
            self.key = Some(CacheKey {
                revision,
                config: config.clone(),
                query: query.clone(),
            });
        }

        FilterOutcome {
            records: self
                .indices
                .matched
                .iter()
                .filter_map(|&i| records.get(i))
                .collect(),
            malformed: malformed_sort_keys(records, &self.indices.malformed, query),
        }
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correspondence::{Correspondence, CorrespondenceStore};
    use crate::filter::SortSpec;

    fn store() -> CorrespondenceStore {
        let mut a = Correspondence::new("A1", "Budget Report");
        a.received_date = "2024-01-01".into();
        let mut b = Correspondence::new("A2", "Safety Audit");
        b.received_date = "2024-02-01".into();
        CorrespondenceStore::new(vec![a, b], vec![])
    }

    fn config() -> FieldConfig {
        FieldConfig::new(["subject"], ["status"])
    }

    #[test]
    fn test_same_key_hits() {
        let store = store();
        let mut cache = FilterCache::new();
        let query = FilterQuery::new().sort_by(SortSpec::newest_first("receivedDate"));

        let first: Vec<String> = cache
            .view(store.records(), store.revision(), &config(), &query)
            .records
            .iter()
            .map(|r| r.id.clone())
            .collect();
        let second: Vec<String> = cache
            .view(store.records(), store.revision(), &config(), &query)
            .records
            .iter()
            .map(|r| r.id.clone())
            .collect();

        assert_eq!(first, vec!["A2", "A1"]);
        assert_eq!(first, second);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_query_change_misses() {
        let store = store();
        let mut cache = FilterCache::new();
        cache.view(store.records(), store.revision(), &config(), &FilterQuery::new());
        let outcome = cache.view(store.records(), store.revision(), &config(), &FilterQuery::new().text("audit"));
        assert_eq!(outcome.len(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_revision_change_misses() {
        let mut store = store();
        let mut cache = FilterCache::new();
        let query = FilterQuery::new().text("report");
        assert_eq!(cache.view(store.records(), store.revision(), &config(), &query).len(), 1);

        store.add(Correspondence::new("A3", "Quarterly Report"));
        let outcome = cache.view(store.records(), store.revision(), &config(), &query);
        assert_eq!(outcome.len(), 2);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_invalidate() {
        let store = store();
        let mut cache = FilterCache::new();
        let query = FilterQuery::new();
        cache.view(store.records(), store.revision(), &config(), &query);
        cache.invalidate();
        cache.view(store.records(), store.revision(), &config(), &query);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.hits(), 0);
    }
}
