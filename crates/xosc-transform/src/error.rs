//! Error types for document transformations
//!
//! - Reduction and injection (re-indexing the edited tree)
//! - Validation gate outcomes
//! - Injection configuration

use xosc_model::{ParseError, SerializeError};

/// Failure while reducing a document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReductionError {
    /// The pruned tree no longer satisfies the document model
    #[error("reduced document failed to re-index: {0}")]
    Reindex(#[from] ParseError),
}

/// Failure while injecting mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectionError {
    /// The mutated tree no longer satisfies the document model
    #[error("mutated document failed to re-index: {0}")]
    Reindex(#[from] ParseError),
}

/// Rejected injection configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A probability is outside [0, 1] or not a number
    #[error("{field} must be within [0, 1], got {value}")]
    RateOutOfRange { field: &'static str, value: f64 },
}

/// Outcome of a failed pass through the validation gate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The schema rejected the document
    #[error("schema rejected document: {0}")]
    Rejected(String),

    /// The schema resource could not be used; fatal for a batch
    #[error("schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// The document could not be serialized for validation
    #[error("serialization failed: {0}")]
    Serialize(#[from] SerializeError),
}

impl GateError {
    /// Whether the whole batch must stop
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SchemaUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_schema_unavailability_is_fatal() {
        assert!(GateError::SchemaUnavailable("missing".into()).is_fatal());
        assert!(!GateError::Rejected("bad element".into()).is_fatal());
        assert!(!GateError::Serialize(SerializeError::Write("x".into())).is_fatal());
    }

    #[test]
    fn injection_error_is_a_reindex_failure() {
        let err = InjectionError::from(ParseError::Empty);
        let InjectionError::Reindex(inner) = &err;
        assert_eq!(inner, &ParseError::Empty);
        assert_eq!(
            err.to_string(),
            "mutated document failed to re-index: document has no root element"
        );
    }

    #[test]
    fn config_error_names_the_field() {
        let err = ConfigError::RateOutOfRange {
            field: "sun_rate",
            value: 1.5,
        };
        assert_eq!(err.to_string(), "sun_rate must be within [0, 1], got 1.5");
    }
}
