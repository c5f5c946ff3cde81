//! Error types for CommitGuru core.

use std::{error::Error, fmt};

/// Error type for CommitGuru core operations.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// A recognized metric field held a value that is not a finite number.
    NotNumeric {
        /// Name of the metric field.
        metric: String,
        /// The offending value, rendered as JSON.
        value: String,
    },
    /// A `<name>nonbuggy` bound was configured without its `<name>buggy` pair.
    MissingBound {
        /// Metric base name.
        metric: String,
        /// The configuration key that was expected.
        key: String,
    },
    /// A bound key was configured with a non-numeric value.
    InvalidBound {
        /// The configuration key.
        key: String,
    },
    /// A catch-all error with a message.
    Other(String),
}

impl fmt::Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotNumeric { metric, value } => {
                write!(f, "metric `{metric}` is not numeric: {value}")
            }
            Self::MissingBound { metric, key } => {
                write!(f, "metric `{metric}` is missing bound `{key}`")
            }
            Self::InvalidBound { key } => write!(f, "bound `{key}` is not a finite number"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl Error for MetricsError {}

/// Convenience result type for CommitGuru core.
pub type Result<T> = std::result::Result<T, MetricsError>;
