//! Scenario types shared by every analysis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use config::AnalyticsConfig;

/// Evaluation context for a strategy.
///
/// `as_of` stands in for "now" so every analysis is a pure function of its
/// inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Hypothetical underlying price; absent means use the live spot
    #[serde(default)]
    pub target_spot: Option<f64>,
    /// Date the scenario is evaluated for
    #[serde(default)]
    pub target_date: Option<DateTime<Utc>>,
    /// Valuation time of the live scenario
    pub as_of: DateTime<Utc>,
    /// Current underlying price
    #[serde(default)]
    pub live_spot: Option<f64>,
    /// Annualised rate for discounting and carry
    pub risk_free_rate: f64,
    /// Horizon of the SD band in days
    pub sd_days: u32,
}

/// Whether a single-point evaluation uses the user's target or live data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioMode {
    Projected,
    Live,
}

/// Spot and date a single-point evaluation runs at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPoint {
    pub mode: ScenarioMode,
    pub spot: f64,
    pub date: DateTime<Utc>,
}

impl Scenario {
    /// Live scenario at `as_of` with rate and SD horizon from the configuration
    pub fn new(as_of: DateTime<Utc>, config: &AnalyticsConfig) -> Self {
        Self {
            target_spot: None,
            target_date: None,
            as_of,
            live_spot: None,
            risk_free_rate: config.pricing.risk_free_rate,
            sd_days: config.payoff.sd_days,
        }
    }

    pub fn with_live_spot(mut self, spot: f64) -> Self {
        self.live_spot = Some(spot);
        self
    }

    pub fn with_target(mut self, spot: f64, date: DateTime<Utc>) -> Self {
        self.target_spot = Some(spot);
        self.target_date = Some(date);
        self
    }

    pub fn with_target_spot(mut self, spot: f64) -> Self {
        self.target_spot = Some(spot);
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_sd_days(mut self, days: u32) -> Self {
        self.sd_days = days;
        self
    }

    /// Live spot when it is a usable positive price
    pub fn live(&self) -> Option<f64> {
        self.live_spot.filter(|s| s.is_finite() && *s > 0.0)
    }

    /// Center of the payoff curve: positive target, else positive live spot, else 0
    pub fn curve_center(&self) -> f64 {
        self.target_spot
            .filter(|s| s.is_finite() && *s > 0.0)
            .or_else(|| self.live())
            .unwrap_or(0.0)
    }

    /// Date the payoff curve's target-date P&L is computed for
    pub fn curve_date(&self) -> DateTime<Utc> {
        self.target_date.unwrap_or(self.as_of)
    }

    /// Point for single-scenario analytics.
    ///
    /// Projected when a target date is set and the target spot is positive;
    /// live at `as_of` otherwise, including when the target spot is unusable.
    pub fn evaluation_point(&self) -> EvaluationPoint {
        match (self.target_date, self.target_spot) {
            (Some(date), Some(spot)) if spot.is_finite() && spot > 0.0 => EvaluationPoint {
                mode: ScenarioMode::Projected,
                spot,
                date,
            },
            _ => EvaluationPoint {
                mode: ScenarioMode::Live,
                spot: self.live().unwrap_or(0.0),
                date: self.as_of,
            },
        }
    }
}
