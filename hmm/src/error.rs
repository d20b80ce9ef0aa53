//! Error types

use thiserror::Error;

/// Errors raised by models, learners and their collaborators.
#[derive(Debug, Error)]
pub enum HmmError {
    /// Malformed or too short sequences, bad dimensions, zero states, ...
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A reader could not parse its input.
    #[error("format error at line {line}: {message}")]
    Format {
        /// 1-based line number where the problem was found.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// I/O failure in a reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A model could not be (de)serialized.
    #[cfg(feature = "serde1")]
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl HmmError {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn format<S: Into<String>>(line: usize, msg: S) -> Self {
        Self::Format {
            line,
            message: msg.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HmmError>;
