//! Summary tiles over a full catalog
//!
//! Every function is a pure reduction. An empty catalog (or an empty subset
//! for the conditional averages) yields zero, never NaN.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::record::{normalize_category, Record};

/// One dashboard summary tile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

fn ratio_percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * 100.0) / whole as f64
}

/// Number of records whose `field` is the category `value`
pub fn count_where<R: Record>(records: &[R], field: &str, value: &str) -> usize {
    let wanted = normalize_category(value);
    records
        .iter()
        .filter(|r| {
            r.field(field)
                .is_some_and(|v| normalize_category(&v) == wanted)
        })
        .count()
}

/// Occurrences of every category of `field`, keyed by the first spelling seen
///
/// Records without the field are counted under the empty key.
pub fn count_by<R: Record>(records: &[R], field: &str) -> BTreeMap<String, usize> {
    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        let raw = record.field(field).map(|v| v.into_owned()).unwrap_or_default();
        let key = normalize_category(&raw);
        let label = labels.entry(key).or_insert(raw).clone();
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Share of records in category `value`, as a percentage in `0.0..=100.0`
pub fn percentage<R: Record>(records: &[R], field: &str, value: &str) -> f64 {
    ratio_percent(count_where(records, field, value), records.len())
}

/// Share of records satisfying `predicate`, as a percentage
pub fn percentage_matching<R, F>(records: &[R], predicate: F) -> f64
where
    R: Record,
    F: Fn(&R) -> bool,
{
    let part = records.iter().filter(|r| predicate(r)).count();
    ratio_percent(part, records.len())
}

/// Rounds a percentage for display, half away from zero
pub fn round_percentage(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.round() as u32
}

pub fn rounded_percentage<R: Record>(records: &[R], field: &str, value: &str) -> u32 {
    round_percentage(percentage(records, field, value))
}

/// Sum of the numeric values of `field`; records without one contribute nothing
pub fn sum<R: Record>(records: &[R], field: &str) -> f64 {
    records.iter().filter_map(|r| r.number(field)).sum()
}

/// Mean of the numeric values of `field` over the records that have one
pub fn average<R: Record>(records: &[R], field: &str) -> f64 {
    average_where(records, |_| true, field)
}

/// Mean of `field` over the records satisfying `predicate`
pub fn average_where<R, F>(records: &[R], predicate: F, field: &str) -> f64
where
    R: Record,
    F: Fn(&R) -> bool,
{
    let values: Vec<f64> = records
        .iter()
        .filter(|r| predicate(r))
        .filter_map(|r| r.number(field))
        .collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// One tile per category of `field`, largest first
pub fn summarize<R: Record>(records: &[R], field: &str) -> Vec<Summary> {
    let total = records.len();
    let mut tiles: Vec<Summary> = count_by(records, field)
        .into_iter()
        .map(|(label, count)| Summary {
            label,
            count,
            percentage: ratio_percent(count, total),
        })
        .collect();
    tiles.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    tiles
}
