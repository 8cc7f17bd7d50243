//! Error types for the pipeline.
//!
//! Three kinds matter to callers and map to distinct exit statuses:
//! schema violations (bad input shape), resource exhaustion (a dense
//! intermediate would not fit the configured memory budget), and type
//! constraint violations (an argument failed a structural precondition).
//! Row-level data-quality issues are never errors; they are counted and
//! logged at the call site.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field or column is missing, or an input record is
    /// malformed. The run aborts; the message names the offending field.
    #[error("schema violation: {message}")]
    Schema {
        /// Human-readable description naming the missing field.
        message: String,
    },

    /// A dense intermediate exceeded the configured memory budget.
    /// Not retried; the guidance names the knob to turn down.
    #[error("memory budget exceeded: {needed_bytes} bytes needed, {budget_bytes} allowed; {guidance}")]
    ResourceExhausted {
        /// Bytes the operation would have allocated.
        needed_bytes: u64,
        /// Configured ceiling in bytes.
        budget_bytes: u64,
        /// Which size parameter to reduce before rerunning.
        guidance: String,
    },

    /// An argument failed a structural precondition (wrong shape or type),
    /// independent of memory.
    #[error("type constraint violated: {0}")]
    TypeConstraint(String),

    /// Underlying I/O failure.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// File the operation was touching.
        path: PathBuf,
        /// OS-level error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON in an input file.
    #[error("could not parse json: {0}")]
    Json(#[from] serde_json::Error),

    /// The persisted item-id artifact could not be encoded or decoded.
    #[error("item-id artifact codec error: {0}")]
    Artifact(#[from] postcard::Error),

    /// A tabular output or input could not be written or read.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates a schema error naming the missing or malformed field.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a catch-all error from any displayable value.
    pub fn other(message: impl std::fmt::Display) -> Self {
        Self::Other(message.to_string())
    }

    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit status for this error kind.
    ///
    /// The core never exits; the orchestrating binary decides what to do
    /// with this mapping.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Schema { .. } => 3,
            Self::ResourceExhausted { .. } => 4,
            Self::TypeConstraint(_) => 5,
            _ => 1,
        }
    }
}
