//! Pricing primitives for StratX
//!
//! Black-76 valuation of options on a forward, its Greeks, and time to
//! expiry in years.
//!
//! # Core Components
//!
//! - [`black76`] - Black-76 price and Greeks, normal distribution helpers
//! - [`time`] - Time to expiry on a 365.25-day year
//! - [`types`] - Pricing inputs and the [`Greeks`] bundle
//!
//! # Key Invariants
//!
//! - Every function is pure; no state, no I/O
//! - `black76_price` / `black76_greeks` assume `T > 0` and `sigma > 0`;
//!   callers at the boundary pass the floors in [`black76`]

pub mod black76;
pub mod time;
pub mod types;

pub use black76::{
    black76_greeks, black76_price, d1_d2, intrinsic_value, norm_cdf, norm_pdf, TIME_EPSILON,
    TIME_FLOOR, VOL_EPSILON, VOL_FLOOR,
};
pub use time::{time_to_expiry, DAYS_PER_YEAR, MILLIS_PER_YEAR};
pub use types::{Black76Inputs, Greeks};
