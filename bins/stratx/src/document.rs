//! Strategy file
//!
//! A YAML or JSON document carrying the underlying, the live spot, the
//! scenario, the legs and the instrument snapshot they refer to.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use analytics::Scenario;
use common::{
    parse_expiry, InstrumentIndex, InstrumentRecord, IvAdjustments, Leg, ScenarioVolatility,
};
use config::AnalyticsConfig;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ScenarioSection {
    #[serde(default)]
    pub target_spot: Option<f64>,
    /// RFC 3339 timestamp or a date (settles at 10:00 UTC)
    #[serde(default)]
    pub target_date: Option<String>,
    #[serde(default)]
    pub risk_free_rate: Option<f64>,
    #[serde(default)]
    pub sd_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StrategyDocument {
    pub underlying: String,
    #[serde(default)]
    pub live_spot: Option<f64>,
    /// Valuation time; the current time when absent
    #[serde(default)]
    pub as_of: Option<String>,
    #[serde(default)]
    pub scenario: ScenarioSection,
    #[serde(default)]
    pub legs: Vec<Leg>,
    #[serde(default)]
    pub instruments: Vec<InstrumentRecord>,
    #[serde(default)]
    pub iv_adjustments: IvAdjustments,
}

/// Command-line values taking precedence over the document.
#[derive(Debug, Clone, Default)]
pub struct ScenarioOverrides {
    pub target_spot: Option<f64>,
    pub target_date: Option<String>,
    pub live_spot: Option<f64>,
}

fn parse_date(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    parse_expiry(raw).with_context(|| format!("Invalid {}: '{}'", field, raw))
}

impl StrategyDocument {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(?path, "Loading strategy file");

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read strategy file: {:?}", path))?;
        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        Self::parse(&content, is_json)
    }

    pub fn parse(content: &str, is_json: bool) -> Result<Self> {
        let document: Self = if is_json {
            serde_json::from_str(content).context("Failed to parse JSON strategy file")?
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML strategy file")?
        };

        debug!(
            underlying = %document.underlying,
            legs = document.legs.len(),
            instruments = document.instruments.len(),
            "Strategy file parsed"
        );
        Ok(document)
    }

    pub fn as_of(&self) -> Result<DateTime<Utc>> {
        match &self.as_of {
            Some(raw) => parse_date("as_of", raw),
            None => Ok(Utc::now()),
        }
    }

    pub fn index(&self) -> InstrumentIndex {
        InstrumentIndex::from_records(&self.instruments)
    }

    /// Market IVs from the snapshot with the document's adjustments applied
    pub fn volatility(
        &self,
        index: &InstrumentIndex,
        config: &AnalyticsConfig,
    ) -> ScenarioVolatility {
        ScenarioVolatility::from_index(index, config.pricing.default_volatility)
            .with_adjustments(self.iv_adjustments.clone())
    }

    pub fn scenario(
        &self,
        config: &AnalyticsConfig,
        overrides: &ScenarioOverrides,
    ) -> Result<Scenario> {
        let mut scenario = Scenario::new(self.as_of()?, config);

        if let Some(spot) = overrides.live_spot.or(self.live_spot) {
            scenario = scenario.with_live_spot(spot);
        }
        if let Some(rate) = self.scenario.risk_free_rate {
            scenario = scenario.with_rate(rate);
        }
        if let Some(days) = self.scenario.sd_days {
            scenario = scenario.with_sd_days(days);
        }

        scenario.target_spot = overrides.target_spot.or(self.scenario.target_spot);
        let target_date = overrides
            .target_date
            .as_ref()
            .or(self.scenario.target_date.as_ref());
        scenario.target_date = match target_date {
            Some(raw) => Some(parse_date("target_date", raw)?),
            None => None,
        };

        Ok(scenario)
    }
}
