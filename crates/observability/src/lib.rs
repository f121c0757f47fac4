//! Observability infrastructure for StratX
//!
//! This crate provides:
//! - Structured logging via tracing, written to stderr
//! - Prometheus metrics for strategy evaluations
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("stratx", LogFormat::Compact)?;
//!
//! let handle = observability::init_metrics()?;
//! let metrics = observability::AnalyticsMetrics::new("evaluate");
//! // ... run analyses ...
//! println!("{}", handle.render());
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, AnalyticsMetrics, EvaluationTimer};
