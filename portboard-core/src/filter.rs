//! Catalog filter and search
//!
//! One pure pass over a catalog: a free-text query matched as a
//! case-insensitive substring across the page's searchable fields, any number
//! of categorical selections (each either the `"all"` sentinel or an exact
//! category), all combined with AND, then an optional stable sort.
//!
//! The functions here never fail and never panic. A record missing a searched
//! field simply does not match the text query; a record whose sort key is
//! missing or unparseable is kept but ordered after every well-formed record
//! and reported in [`FilterOutcome::malformed`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::PortboardError;
use crate::helpers::parse_date;
use crate::record::{normalize_category, Record};

/// Sentinel selection meaning "no constraint"
pub const ALL: &str = "all";

/// Which fields of a record a page searches and filters on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Fields matched by the free-text query
    #[serde(default)]
    pub searchable: Vec<String>,
    /// Fields offered as categorical selectors
    #[serde(default)]
    pub categorical: Vec<String>,
}

impl FieldConfig {
    pub fn new<S: Into<String>>(
        searchable: impl IntoIterator<Item = S>,
        categorical: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            searchable: searchable.into_iter().map(Into::into).collect(),
            categorical: categorical.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// How a sort key is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKind {
    Date,
    Number,
    #[default]
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: String,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub kind: SortKind,
}

impl SortSpec {
    pub fn new(key: impl Into<String>, kind: SortKind, direction: SortDirection) -> Self {
        Self {
            key: key.into(),
            direction,
            kind,
        }
    }

    /// Newest first by a date field
    pub fn newest_first(key: impl Into<String>) -> Self {
        Self::new(key, SortKind::Date, SortDirection::Descending)
    }
}

/// The current filter state of a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterQuery {
    /// Free-text query, trimmed and lower-cased at match time
    pub text: String,
    /// Categorical selections; an absent entry is the same as `"all"`
    pub selections: BTreeMap<String, String>,
    pub sort: Option<SortSpec>,
}

impl FilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn select(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.selections.insert(field.into(), value.into());
        self
    }

    pub fn sort_by(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Number of constraints that actually narrow the result
    pub fn active_constraints(&self) -> usize {
        let text = usize::from(!self.text.trim().is_empty());
        text + self
            .selections
            .values()
            .filter(|v| !is_all(v))
            .count()
    }
}

/// Result of a filter pass
#[derive(Debug)]
pub struct FilterOutcome<'a, R> {
    /// Matching records, in catalog order or sort order
    pub records: Vec<&'a R>,
    /// Matching records whose sort key was missing or unparseable, as
    /// `MalformedRecord` errors naming the record and the sort key
    pub malformed: Vec<PortboardError>,
}

impl<R> FilterOutcome<'_, R> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Index form of a filter pass, used by the memoized view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterIndices {
    pub matched: Vec<usize>,
    pub malformed: Vec<usize>,
}

fn is_all(selection: &str) -> bool {
    normalize_category(selection) == ALL
}

/// Returns true if `record` satisfies the text query and every selection
pub fn matches<R: Record>(record: &R, config: &FieldConfig, query: &FilterQuery) -> bool {
    let needle = query.text.trim().to_lowercase();
    matches_prepared(record, config, &needle, &prepared_selections(query))
}

fn prepared_selections(query: &FilterQuery) -> Vec<(&str, String)> {
    query
        .selections
        .iter()
        .filter(|(_, value)| !is_all(value))
        .map(|(field, value)| (field.as_str(), normalize_category(value)))
        .collect()
}

fn matches_prepared<R: Record>(
    record: &R,
    config: &FieldConfig,
    needle: &str,
    selections: &[(&str, String)],
) -> bool {
    let categories_match = selections.iter().all(|(field, wanted)| {
        record
            .field(field)
            .is_some_and(|value| normalize_category(&value) == *wanted)
    });
    if !categories_match {
        return false;
    }

    if needle.is_empty() {
        return true;
    }

    config.searchable.iter().any(|field| {
        record
            .field(field)
            .is_some_and(|value| value.to_lowercase().contains(needle))
    })
}

enum SortValue {
    Date(NaiveDateTime),
    Number(f64),
    Text(String),
}

impl SortValue {
    fn of<R: Record>(record: &R, spec: &SortSpec) -> Option<Self> {
        match spec.kind {
            SortKind::Date => record
                .field(&spec.key)
                .and_then(|v| parse_date(&v))
                .map(SortValue::Date),
            SortKind::Number => record.number(&spec.key).map(SortValue::Number),
            SortKind::Text => record
                .field(&spec.key)
                .map(|v| SortValue::Text(v.to_lowercase())),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Date(a), SortValue::Date(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            // Keys of one pass always share a kind
            _ => Ordering::Equal,
        }
    }
}

/// Filters a catalog, returning positions into `records`
pub fn filter_indices<R: Record>(
    records: &[R],
    config: &FieldConfig,
    query: &FilterQuery,
) -> FilterIndices {
    let needle = query.text.trim().to_lowercase();
    let selections = prepared_selections(query);

    let matched: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| matches_prepared(*r, config, &needle, &selections))
        .map(|(i, _)| i)
        .collect();

    let Some(spec) = &query.sort else {
        return FilterIndices {
            matched,
            malformed: Vec::new(),
        };
    };

    let mut keyed = Vec::with_capacity(matched.len());
    let mut malformed = Vec::new();
    for i in matched {
        match SortValue::of(&records[i], spec) {
            Some(value) => keyed.push((i, value)),
            None => malformed.push(i),
        }
    }

    // Vec::sort_by is stable, so ties keep catalog order
    keyed.sort_by(|(_, a), (_, b)| match spec.direction {
        SortDirection::Ascending => a.compare(b),
        SortDirection::Descending => b.compare(a),
    });

    if !malformed.is_empty() {
        tracing::debug!(
            key = %spec.key,
            count = malformed.len(),
            "records with malformed sort key ordered last"
        );
    }

    let mut ordered: Vec<usize> = keyed.into_iter().map(|(i, _)| i).collect();
    ordered.extend(malformed.iter().copied());

    FilterIndices {
        matched: ordered,
        malformed,
    }
}

/// Filters a catalog and returns the matching records
pub fn filter_records<'a, R: Record>(
    records: &'a [R],
    config: &FieldConfig,
    query: &FilterQuery,
) -> FilterOutcome<'a, R> {
    let indices = filter_indices(records, config, query);
    FilterOutcome {
        records: indices.matched.iter().map(|&i| &records[i]).collect(),
        malformed: malformed_sort_keys(records, &indices.malformed, query),
    }
}

/// Names the records at `positions` whose sort key could not be read
pub(crate) fn malformed_sort_keys<R: Record>(
    records: &[R],
    positions: &[usize],
    query: &FilterQuery,
) -> Vec<PortboardError> {
    let Some(spec) = &query.sort else {
        return Vec::new();
    };
    positions
        .iter()
        .filter_map(|&i| records.get(i))
        .map(|r| PortboardError::MalformedRecord {
            id: r.id(),
            field: spec.key.clone(),
        })
        .collect()
}
