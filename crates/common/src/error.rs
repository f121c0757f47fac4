//! Common error types for StratX

use thiserror::Error;

/// Common error type used across StratX crates
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A raw instrument record could not be turned into instrument details
    #[error("Invalid instrument record '{token}': {message}")]
    InvalidRecord { token: String, message: String },
}

/// Result type alias using the common Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid record error
    pub fn invalid_record(token: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidRecord {
            token: token.into(),
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_record_message() {
        let err = Error::invalid_record("NIFTY30MAY23000CE", "strike is missing");
        assert_eq!(
            err.to_string(),
            "Invalid instrument record 'NIFTY30MAY23000CE': strike is missing"
        );
    }
}
