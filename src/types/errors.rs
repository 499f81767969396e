//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the dining table.
#[derive(Error, Debug)]
pub enum Error {
    /// Philosopher or fork index outside `0..len`. Always a caller bug.
    #[error("invalid index: {index} (must be in 0..{len})")]
    InvalidIndex { index: usize, len: usize },

    /// Bad ring size, seat cap or delay range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Cooperative cancellation observed while blocked.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// A philosopher task could not be joined.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the cancellation outcome, which callers treat as a clean exit.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

// Convenience constructors
impl Error {
    pub fn invalid_index(index: usize, len: usize) -> Self {
        Self::InvalidIndex { index, len }
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_index_message_names_bounds() {
        let err = Error::invalid_index(7, 5);
        assert_eq!(err.to_string(), "invalid index: 7 (must be in 0..5)");
    }

    #[test]
    fn test_is_cancelled() {
        assert!(Error::cancelled("philosopher 2").is_cancelled());
        assert!(!Error::invalid_configuration("seats").is_cancelled());
    }
}
