//! Facade over the individual analyses.
//!
//! The engine owns the configuration and borrows the two collaborators.
//! Missing collaborators are rejected when the engine is built, never during
//! a calculation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use common::{InstrumentIndex, InstrumentLookup, Leg, ScenarioIv};
use config::AnalyticsConfig;

use crate::aggregator::{ScenarioAggregator, ScenarioReport};
use crate::error::{AnalyticsError, Result};
use crate::payoff::{PayoffCurve, PayoffCurveGenerator, SdSummary};
use crate::summary::{RiskSummary, RiskSummaryAnalyzer};
use crate::table::{PayoffTableGenerator, PayoffTableRow};
use crate::types::Scenario;

/// Everything computed for one strategy and scenario.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyAnalysis {
    pub report: ScenarioReport,
    pub curve: PayoffCurve,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd_summary: Option<SdSummary>,
    pub summary: RiskSummary,
    pub table: Vec<PayoffTableRow>,
}

#[derive(Default)]
pub struct StrategyEngineBuilder<'a> {
    lookup: Option<&'a dyn InstrumentLookup>,
    iv: Option<&'a dyn ScenarioIv>,
    config: Option<AnalyticsConfig>,
}

impl<'a> StrategyEngineBuilder<'a> {
    pub fn instrument_lookup(mut self, lookup: &'a dyn InstrumentLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn scenario_iv(mut self, iv: &'a dyn ScenarioIv) -> Self {
        self.iv = Some(iv);
        self
    }

    /// Defaults apply when no configuration is given
    pub fn config(mut self, config: AnalyticsConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<StrategyEngine<'a>> {
        let lookup = self.lookup.ok_or(AnalyticsError::MissingCollaborator {
            name: "instrument_lookup",
        })?;
        let iv = self
            .iv
            .ok_or(AnalyticsError::MissingCollaborator { name: "scenario_iv" })?;

        Ok(StrategyEngine {
            lookup,
            iv,
            config: self.config.unwrap_or_default(),
        })
    }
}

pub struct StrategyEngine<'a> {
    lookup: &'a dyn InstrumentLookup,
    iv: &'a dyn ScenarioIv,
    config: AnalyticsConfig,
}

impl<'a> StrategyEngine<'a> {
    pub fn builder() -> StrategyEngineBuilder<'a> {
        StrategyEngineBuilder::default()
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Live scenario at `as_of` with the configured rate and SD horizon
    pub fn scenario(&self, as_of: DateTime<Utc>) -> Scenario {
        Scenario::new(as_of, &self.config)
    }

    pub fn aggregate(&self, legs: &[Leg], scenario: &Scenario) -> ScenarioReport {
        ScenarioAggregator::new(
            self.lookup,
            self.iv,
            self.config.aggregation.clone(),
            self.config.pricing.clone(),
        )
        .evaluate(legs, scenario)
    }

    pub fn payoff_curve(
        &self,
        legs: &[Leg],
        scenario: &Scenario,
        chain: &InstrumentIndex,
    ) -> PayoffCurve {
        PayoffCurveGenerator::new(
            self.lookup,
            self.iv,
            self.config.payoff.clone(),
            self.config.pricing.clone(),
        )
        .generate(legs, scenario, chain)
    }

    pub fn summary(
        &self,
        legs: &[Leg],
        live_spot: Option<f64>,
        curve: &PayoffCurve,
    ) -> RiskSummary {
        RiskSummaryAnalyzer::new(self.lookup, self.config.summary.clone())
            .analyze(legs, live_spot, curve)
    }

    pub fn payoff_table(&self, legs: &[Leg], scenario: &Scenario) -> Vec<PayoffTableRow> {
        PayoffTableGenerator::new(
            self.lookup,
            self.iv,
            self.config.table.clone(),
            self.config.lot_sizes.clone(),
            self.config.pricing.clone(),
        )
        .generate(legs, scenario)
    }

    /// Run every analysis for one scenario
    #[instrument(skip_all, fields(legs = legs.len()))]
    pub fn evaluate(
        &self,
        legs: &[Leg],
        scenario: &Scenario,
        chain: &InstrumentIndex,
    ) -> StrategyAnalysis {
        let report = self.aggregate(legs, scenario);
        let curve = self.payoff_curve(legs, scenario, chain);
        let summary = self.summary(legs, scenario.live(), &curve);
        let table = self.payoff_table(legs, scenario);
        let sd_summary = curve.sd_bands.as_ref().map(|bands| bands.summary());

        info!(
            rows = report.rows.len(),
            excluded = report.excluded.len(),
            points = curve.points.len(),
            "Strategy evaluated"
        );

        StrategyAnalysis {
            report,
            curve,
            sd_summary,
            summary,
            table,
        }
    }
}
