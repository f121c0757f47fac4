use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Root configuration for the strategy analytics engine.
///
/// Every section is optional in YAML and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub payoff: PayoffConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub lot_sizes: LotSizeTable,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PricingConfig {
    /// Annualised rate used for discounting and cost of carry
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Decimal volatility used when no scenario IV is known
    #[serde(default = "default_volatility")]
    pub default_volatility: f64,
    /// Remaining life floor for Greeks on the intrinsic fallback path
    #[serde(default = "default_time_floor")]
    pub time_floor: f64,
    /// Volatility floor for Greeks on the intrinsic fallback path
    #[serde(default = "default_vol_floor")]
    pub vol_floor: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
            default_volatility: default_volatility(),
            time_floor: default_time_floor(),
            vol_floor: default_vol_floor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PayoffConfig {
    /// Evenly spaced samples across the curve range
    #[serde(default = "default_points")]
    pub points: usize,
    /// Strike interval; also the open-interest aggregation window
    #[serde(default = "default_interval_step")]
    pub interval_step: f64,
    /// Fractional padding applied on each side of the strike range
    #[serde(default = "default_padding_factor")]
    pub padding_factor: f64,
    /// Half-width of the range (fraction of center) when no strikes are known
    #[serde(default = "default_max_range_from_center")]
    pub max_range_from_center: f64,
    /// Horizon in days for the SD band; 0 disables it
    #[serde(default = "default_sd_days")]
    pub sd_days: u32,
    /// Center used when a degenerate range needs a last resort window
    #[serde(default = "default_fallback_center")]
    pub fallback_center: f64,
    /// Upper bound of the last resort window when the center is unusable
    #[serde(default = "default_fallback_upper_bound")]
    pub fallback_upper_bound: f64,
    /// Emit percentage P&L relative to the live spot
    #[serde(default)]
    pub show_percentage: bool,
}

impl Default for PayoffConfig {
    fn default() -> Self {
        Self {
            points: default_points(),
            interval_step: default_interval_step(),
            padding_factor: default_padding_factor(),
            max_range_from_center: default_max_range_from_center(),
            sd_days: default_sd_days(),
            fallback_center: default_fallback_center(),
            fallback_upper_bound: default_fallback_upper_bound(),
            show_percentage: false,
        }
    }
}

/// How gamma enters the portfolio total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GammaConvention {
    /// Gamma carries the leg direction like delta, theta and vega
    #[default]
    Directional,
    /// Gamma is summed as the pricer returns it, ignoring direction
    Unsigned,
}

impl fmt::Display for GammaConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GammaConvention::Directional => write!(f, "directional"),
            GammaConvention::Unsigned => write!(f, "unsigned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AggregationConfig {
    #[serde(default = "default_enabled")]
    pub multiply_by_lot_size: bool,
    #[serde(default = "default_enabled")]
    pub multiply_by_num_lots: bool,
    #[serde(default)]
    pub gamma_convention: GammaConvention,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            multiply_by_lot_size: true,
            multiply_by_num_lots: true,
            gamma_convention: GammaConvention::default(),
        }
    }
}

/// Orientation of the risk/reward ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioMode {
    /// risk / reward
    #[default]
    RiskReward,
    /// reward / risk
    RewardRisk,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SummaryConfig {
    #[serde(default)]
    pub ratio_mode: RatioMode,
    /// Decimal places breakevens are rounded to before deduplication
    #[serde(default)]
    pub breakeven_decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TableConfig {
    /// Price step between rows; the underlying's strike step when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
    #[serde(default = "default_rows_each_side")]
    pub rows_each_side: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            interval: None,
            rows_each_side: default_rows_each_side(),
        }
    }
}

/// Contract sizes and strike steps per underlying.
///
/// Lookups match the underlying name exactly, ignoring case.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LotSizeTable {
    #[serde(default = "default_lot_sizes")]
    pub sizes: BTreeMap<String, u32>,
    #[serde(default = "default_lot_size")]
    pub default_lot_size: u32,
    #[serde(default = "default_strike_steps")]
    pub strike_steps: BTreeMap<String, f64>,
    #[serde(default = "default_strike_step")]
    pub default_strike_step: f64,
}

impl Default for LotSizeTable {
    fn default() -> Self {
        Self {
            sizes: default_lot_sizes(),
            default_lot_size: default_lot_size(),
            strike_steps: default_strike_steps(),
            default_strike_step: default_strike_step(),
        }
    }
}

impl LotSizeTable {
    /// Contract size for an underlying, or the default when unknown
    pub fn lot_size_for(&self, underlying: &str) -> u32 {
        self.sizes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(underlying.trim()))
            .map(|(_, size)| *size)
            .unwrap_or(self.default_lot_size)
    }

    /// Strike interval for an underlying, or the default when unknown
    pub fn strike_step_for(&self, underlying: &str) -> f64 {
        self.strike_steps
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(underlying.trim()))
            .map(|(_, step)| *step)
            .unwrap_or(self.default_strike_step)
    }

    pub fn with_lot_size(mut self, underlying: impl Into<String>, size: u32) -> Self {
        self.sizes.insert(underlying.into(), size);
        self
    }
}
