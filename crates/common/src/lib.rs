//! Common types and utilities for StratX
//!
//! This crate provides the domain vocabulary shared by the pricing and
//! analytics crates.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Strategy legs, instruments and their raw records
//! - [`market`] - Collaborator traits (instrument lookup, scenario IV) and
//!   their in-memory implementations

pub mod error;
pub mod market;
pub mod types;

pub use error::{Error, Result};
pub use market::{
    InstrumentIndex, InstrumentLookup, IvAdjustments, ScenarioIv, ScenarioVolatility, StrikewiseIv,
    MIN_SCENARIO_IV,
};
pub use types::*;

#[cfg(any(test, feature = "mocks"))]
pub use market::{MockInstrumentLookup, MockScenarioIv};
