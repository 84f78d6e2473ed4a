//! Field access over catalog records
//!
//! Every page of the dashboard filters a different record shape. The
//! [`Record`] trait is the one seam the filter and summary code needs: look a
//! field up by name and get its text (or numeric) value back, or `None` when
//! the record does not carry it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// A record that exposes named fields to the filter and summary utilities
pub trait Record {
    /// Returns the textual value of a field, `None` if the record lacks it
    fn field(&self, name: &str) -> Option<Cow<'_, str>>;

    /// Returns the numeric value of a field
    ///
    /// The default parses the textual value, accepting `%` suffixes and
    /// comma-grouped digits ("1,250", "87.5%").
    fn number(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(|v| parse_number(&v))
    }

    /// Display identity of the record, empty if it has none
    fn id(&self) -> String {
        self.field("id").map(Cow::into_owned).unwrap_or_default()
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        (**self).field(name)
    }

    fn number(&self, name: &str) -> Option<f64> {
        (**self).number(name)
    }

    fn id(&self) -> String {
        (**self).id()
    }
}

/// A record backed by an arbitrary JSON object
///
/// Used for the catalogs that have no dedicated Rust type (KPIs, incidents,
/// vessels, training programs...). Dotted paths such as `keyMetrics.roi`
/// reach into nested objects. Arrays and objects are detail data and are
/// never exposed as field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DynRecord(pub Map<String, Value>);

impl DynRecord {
    /// Wraps a JSON value, returning `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

impl From<Map<String, Value>> for DynRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl Record for DynRecord {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match self.lookup(name)? {
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn number(&self, name: &str) -> Option<f64> {
        match self.lookup(name)? {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            Value::String(s) => parse_number(s),
            _ => None,
        }
    }
}

/// Parses a display-formatted number
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalizes a categorical value for comparison
///
/// Trims, lower-cases and folds every run of whitespace, `_` or `-` into a
/// single `-`, so "In Progress", "in_progress" and "in-progress" compare equal.
pub fn normalize_category(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('-');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}
