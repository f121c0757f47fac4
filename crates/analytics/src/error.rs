//! Analytics error types

use thiserror::Error;

/// Errors raised by the analytics crate.
///
/// Data problems never surface here; they degrade to fallbacks. Only caller
/// configuration and template expansion can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// A required collaborator was not supplied to the engine builder
    #[error("Missing required collaborator: {name}")]
    MissingCollaborator { name: &'static str },

    /// No template with this id exists
    #[error("Unknown strategy template: {0}")]
    UnknownTemplate(String),

    /// The chain has no strikes for the requested expiry
    #[error("No strikes available for {underlying} expiring {expiry}")]
    EmptyChain { underlying: String, expiry: String },

    /// A calendar template needs an expiry later than the selected one
    #[error("No expiry available after {0}")]
    NoNextExpiry(String),

    /// The chain has no instrument matching a template leg
    #[error("No instrument for {0}")]
    MissingInstrument(String),

    /// A futures template could not pick its contract
    #[error("Futures contract unavailable: {0}")]
    MissingContract(String),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
