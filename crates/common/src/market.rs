//! Market data collaborators
//!
//! The analytics core consumes two capabilities from the surrounding system:
//! instrument lookup by token and a scenario implied volatility per token.
//! Both are expressed as traits so callers can plug in live feeds, while
//! [`InstrumentIndex`] and [`ScenarioVolatility`] provide the in-memory
//! implementations used by the CLI and tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::types::{InstrumentDetails, InstrumentRecord, Leg, OptionInstrument};

/// Floor applied to every scenario volatility (decimal).
pub const MIN_SCENARIO_IV: f64 = 0.001;

/// Resolves a token to its instrument snapshot.
///
/// Implementations must be side-effect free; the payoff path calls this once
/// per leg per grid point.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
pub trait InstrumentLookup {
    fn instrument(&self, token: &str) -> Option<InstrumentDetails>;
}

/// Scenario implied volatility for a token, as a decimal (0.15 = 15%).
///
/// Any user adjustments are already applied by the implementation.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
pub trait ScenarioIv {
    fn scenario_iv(&self, token: &str) -> f64;
}

/// Token-keyed instrument chain built once per evaluation.
#[derive(Debug, Clone, Default)]
pub struct InstrumentIndex {
    order: Vec<String>,
    by_token: HashMap<String, InstrumentDetails>,
}

impl InstrumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from raw records, skipping the ones that cannot be converted.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a InstrumentRecord>) -> Self {
        let mut index = Self::new();
        let mut skipped = 0usize;

        for record in records {
            match InstrumentDetails::try_from(record) {
                Ok(details) => index.insert(record.token.clone(), details),
                Err(e) => {
                    skipped += 1;
                    warn!(token = %record.token, error = %e, "Skipping instrument record");
                }
            }
        }

        debug!(instruments = index.len(), skipped, "Built instrument index");
        index
    }

    /// Insert or replace an instrument. Replacement keeps the original position.
    pub fn insert(&mut self, token: impl Into<String>, details: InstrumentDetails) {
        let token = token.into();
        if !self.by_token.contains_key(&token) {
            self.order.push(token.clone());
        }
        self.by_token.insert(token, details);
    }

    pub fn get(&self, token: &str) -> Option<&InstrumentDetails> {
        self.by_token.get(token)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All instruments in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InstrumentDetails)> {
        self.order
            .iter()
            .filter_map(|token| self.by_token.get(token).map(|d| (token.as_str(), d)))
    }

    /// Option instruments in insertion order
    pub fn options(&self) -> impl Iterator<Item = (&str, &OptionInstrument)> {
        self.iter()
            .filter_map(|(token, details)| details.as_option().map(|o| (token, o)))
    }
}

impl InstrumentLookup for InstrumentIndex {
    fn instrument(&self, token: &str) -> Option<InstrumentDetails> {
        self.by_token.get(token).cloned()
    }
}

/// User IV adjustments in percentage points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IvAdjustments {
    /// Offset applied to every token
    #[serde(default)]
    pub global_offset: f64,
    /// Per-token offsets
    #[serde(default)]
    pub individual: HashMap<String, f64>,
}

impl IvAdjustments {
    pub fn individual(&self, token: &str) -> f64 {
        self.individual.get(token).copied().unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        self.global_offset = 0.0;
        self.individual.clear();
    }
}

/// Scenario IV source: base market IV plus user adjustments.
///
/// `effective = base + individual + global` in percent, returned as a
/// decimal floored at [`MIN_SCENARIO_IV`]. Tokens without a base IV get the
/// default volatility untouched by adjustments.
#[derive(Debug, Clone)]
pub struct ScenarioVolatility {
    base_iv: HashMap<String, f64>,
    adjustments: IvAdjustments,
    default_volatility: f64,
}

impl ScenarioVolatility {
    pub fn new(default_volatility: f64) -> Self {
        Self {
            base_iv: HashMap::new(),
            adjustments: IvAdjustments::default(),
            default_volatility,
        }
    }

    /// Seed base IVs from the option instruments of an index
    pub fn from_index(index: &InstrumentIndex, default_volatility: f64) -> Self {
        let base_iv = index
            .options()
            .filter_map(|(token, option)| {
                option
                    .iv
                    .filter(|iv| iv.is_finite())
                    .map(|iv| (token.to_string(), iv))
            })
            .collect();

        Self {
            base_iv,
            adjustments: IvAdjustments::default(),
            default_volatility,
        }
    }

    pub fn with_base_iv(mut self, token: impl Into<String>, iv_percent: f64) -> Self {
        self.base_iv.insert(token.into(), iv_percent);
        self
    }

    pub fn with_adjustments(mut self, adjustments: IvAdjustments) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn set_individual_adjustment(&mut self, token: impl Into<String>, points: f64) {
        self.adjustments.individual.insert(token.into(), points);
    }

    pub fn set_global_offset(&mut self, points: f64) {
        self.adjustments.global_offset = points;
    }

    pub fn reset_adjustments(&mut self) {
        self.adjustments.reset();
    }

    pub fn adjustments(&self) -> &IvAdjustments {
        &self.adjustments
    }

    pub fn default_volatility(&self) -> f64 {
        self.default_volatility
    }

    /// Base IV in percent, if known
    pub fn base_iv(&self, token: &str) -> Option<f64> {
        self.base_iv.get(token).copied()
    }

    /// Adjusted IV in percent, if a base IV is known
    pub fn effective_iv_percent(&self, token: &str) -> Option<f64> {
        self.base_iv(token)
            .map(|base| base + self.adjustments.individual(token) + self.adjustments.global_offset)
    }

    /// Strike-wise IV rows for the selected option legs.
    pub fn strikewise(&self, legs: &[Leg], lookup: &dyn InstrumentLookup) -> Vec<StrikewiseIv> {
        legs.iter()
            .filter(|leg| leg.is_active() && leg.kind.is_option())
            .map(|leg| {
                let instrument = lookup.instrument(&leg.token);
                let option = instrument.as_ref().and_then(|i| i.as_option());
                let label = match option {
                    Some(o) => o
                        .symbol
                        .clone()
                        .unwrap_or_else(|| format!("{}{}", o.strike, o.option_type.code())),
                    None => leg.symbol.clone().unwrap_or_else(|| "N/A".to_string()),
                };
                let original = option.and_then(|o| o.iv).filter(|iv| iv.is_finite());
                let adjustment = self.adjustments.individual(&leg.token);
                let effective =
                    original.map(|iv| iv + adjustment + self.adjustments.global_offset);

                StrikewiseIv {
                    token: leg.token.clone(),
                    label,
                    original,
                    effective,
                    change: original.zip(effective).map(|(o, e)| e - o),
                    individual_adjustment: if original.is_some() { adjustment } else { 0.0 },
                }
            })
            .collect()
    }
}

impl ScenarioIv for ScenarioVolatility {
    fn scenario_iv(&self, token: &str) -> f64 {
        match self.effective_iv_percent(token) {
            Some(effective) => (effective / 100.0).max(MIN_SCENARIO_IV),
            None => self.default_volatility,
        }
    }
}

/// One strike-wise IV display row (percent values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikewiseIv {
    pub token: String,
    pub label: String,
    pub original: Option<f64>,
    pub effective: Option<f64>,
    pub change: Option<f64>,
    pub individual_adjustment: f64,
}
