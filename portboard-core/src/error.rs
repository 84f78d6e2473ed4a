use thiserror::Error;

use crate::session::Capability;

/// Error type for dashboard operations
///
/// Only `DataUnavailable` and `PermissionDenied` are ever surfaced to a page.
/// `LookupMiss` and `MalformedRecord` describe conditions the filter and join
/// code resolves locally (placeholder text, record set aside or ordered last);
/// they are reported alongside the result so callers can name them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortboardError {
    /// A refresh from the upstream source failed; stale data remains visible
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// A reference to another entity could not be resolved
    #[error("No {kind} with id '{id}'")]
    LookupMiss { kind: &'static str, id: String },

    /// A record is missing a field needed for filtering or sorting, or holds
    /// a value of the wrong shape
    #[error("Record '{id}' has a missing or malformed '{field}' field")]
    MalformedRecord { id: String, field: String },

    /// The session lacks the capability a page requires
    #[error("Permission denied: {0} is required")]
    PermissionDenied(Capability),
}

pub type PortboardResult<T> = std::result::Result<T, PortboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_record() {
        let err = PortboardError::MalformedRecord {
            id: "CORR-7".into(),
            field: "receivedDate".into(),
        };
        assert_eq!(
            err.to_string(),
            "Record 'CORR-7' has a missing or malformed 'receivedDate' field"
        );
        assert_eq!(
            PortboardError::LookupMiss { kind: "division", id: "div-x".into() }.to_string(),
            "No division with id 'div-x'"
        );
    }
}
