//! Portfolio aggregation at a single scenario point
//!
//! Produces one row per usable leg plus totals. Totals are always re-derived
//! from the rows; nothing is carried between calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::{InstrumentDetails, InstrumentLookup, Leg, LegId, ScenarioIv, Side};
use config::{AggregationConfig, GammaConvention, PricingConfig};
use pricing::Greeks;

use crate::types::{Scenario, ScenarioMode};
use crate::valuation::{mark_leg, PriceModel, PricingParams};

/// Why a selected leg was left out of the aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    EmptyToken,
    MissingInstrument,
    InstrumentMismatch,
    InvalidEntryPrice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedLeg {
    pub id: LegId,
    pub token: String,
    pub reason: ExclusionReason,
}

/// One row of the P&L / Greeks table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegRow {
    pub id: LegId,
    pub token: String,
    /// Concise label, e.g. `B 2x 23000CE 30MAY`
    pub label: String,
    pub side: Side,
    pub entry_price: f64,
    /// Last traded price from the instrument snapshot
    pub ltp: Option<f64>,
    /// Scenario price of one unit
    pub projected_price: f64,
    pub model: PriceModel,
    /// Scale applied to P&L and position Greeks
    pub scale: f64,
    /// Scaled, directional P&L
    pub pnl: f64,
    /// Per-unit Greeks carrying the leg direction
    pub greeks: Greeks,
    /// `greeks` multiplied by `scale`
    pub position_greeks: Greeks,
}

/// Portfolio totals, the sum of every row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyTotals {
    pub projected_pnl: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
}

impl StrategyTotals {
    fn add_row(&mut self, row: &LegRow) {
        self.projected_pnl += row.pnl;
        self.delta += row.position_greeks.delta;
        self.gamma += row.position_greeks.gamma;
        self.theta += row.position_greeks.theta;
        self.vega += row.position_greeks.vega;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub mode: ScenarioMode,
    pub spot: f64,
    pub date: DateTime<Utc>,
    pub rows: Vec<LegRow>,
    pub totals: StrategyTotals,
    pub excluded: Vec<ExcludedLeg>,
}

/// Sums leg P&L and Greeks at one scenario point.
pub struct ScenarioAggregator<'a> {
    lookup: &'a dyn InstrumentLookup,
    iv: &'a dyn ScenarioIv,
    aggregation: AggregationConfig,
    pricing: PricingConfig,
}

impl<'a> ScenarioAggregator<'a> {
    pub fn new(
        lookup: &'a dyn InstrumentLookup,
        iv: &'a dyn ScenarioIv,
        aggregation: AggregationConfig,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            lookup,
            iv,
            aggregation,
            pricing,
        }
    }

    /// Scale factor for a leg under the current toggles
    pub fn scale_for(&self, leg: &Leg) -> f64 {
        let mut scale = 1.0;
        if self.aggregation.multiply_by_lot_size {
            scale *= leg.lot_size_or_one() as f64;
        }
        if self.aggregation.multiply_by_num_lots {
            scale *= leg.lots_or_one() as f64;
        }
        scale
    }

    pub fn evaluate(&self, legs: &[Leg], scenario: &Scenario) -> ScenarioReport {
        let point = scenario.evaluation_point();
        if scenario.target_date.is_some() && point.mode == ScenarioMode::Live {
            warn!(
                target_spot = ?scenario.target_spot,
                "Target spot is unusable, evaluating at the live spot"
            );
        }

        let params = PricingParams::new(scenario.risk_free_rate, &self.pricing);
        let mut rows = Vec::new();
        let mut excluded = Vec::new();
        let mut totals = StrategyTotals::default();

        for leg in legs.iter().filter(|l| l.selected) {
            let instrument = match self.resolve(leg) {
                Ok(instrument) => instrument,
                Err(reason) => {
                    warn!(
                        leg = %leg.id,
                        token = %leg.token,
                        ?reason,
                        "Excluding leg from aggregation"
                    );
                    excluded.push(ExcludedLeg {
                        id: leg.id,
                        token: leg.token.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let mark = mark_leg(leg, Some(&instrument), point.spot, point.date, self.iv, params);
            if mark.model == PriceModel::MissingExpiry {
                warn!(token = %leg.token, "Future has no expiry, pricing at spot");
            }

            let row = self.build_row(leg, &instrument, mark.price, mark.greeks, mark.model);
            debug!(token = %leg.token, price = row.projected_price, pnl = row.pnl, "Leg evaluated");
            totals.add_row(&row);
            rows.push(row);
        }

        ScenarioReport {
            mode: point.mode,
            spot: point.spot,
            date: point.date,
            rows,
            totals,
            excluded,
        }
    }

    fn resolve(&self, leg: &Leg) -> Result<InstrumentDetails, ExclusionReason> {
        if leg.token.is_empty() {
            return Err(ExclusionReason::EmptyToken);
        }
        if leg.entry_price().is_none() {
            return Err(ExclusionReason::InvalidEntryPrice);
        }
        let instrument = self
            .lookup
            .instrument(&leg.token)
            .ok_or(ExclusionReason::MissingInstrument)?;
        if !instrument.matches(&leg.kind) {
            return Err(ExclusionReason::InstrumentMismatch);
        }
        Ok(instrument)
    }

    fn build_row(
        &self,
        leg: &Leg,
        instrument: &InstrumentDetails,
        price: f64,
        raw: Greeks,
        model: PriceModel,
    ) -> LegRow {
        let direction = leg.direction();
        let gamma_sign = match self.aggregation.gamma_convention {
            GammaConvention::Directional => direction,
            GammaConvention::Unsigned => 1.0,
        };
        let greeks = Greeks {
            delta: raw.delta * direction,
            gamma: raw.gamma * gamma_sign,
            theta: raw.theta * direction,
            vega: raw.vega * direction,
        };
        let scale = self.scale_for(leg);
        let pnl = if price.is_finite() {
            (price - leg.price) * direction * scale
        } else {
            0.0
        };

        LegRow {
            id: leg.id,
            token: leg.token.clone(),
            label: format!(
                "{} {}x {}",
                leg.side.code(),
                leg.lots_or_one(),
                instrument.display_name()
            ),
            side: leg.side,
            entry_price: leg.price,
            ltp: instrument.last_price(),
            projected_price: price,
            model,
            scale,
            pnl,
            greeks,
            position_greeks: greeks.scale(scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};
    use common::{
        FutureInstrument, InstrumentIndex, MockScenarioIv, OptionInstrument, OptionType,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap()
    }

    fn expiry() -> DateTime<Utc> {
        now() + Duration::days(29)
    }

    fn index() -> InstrumentIndex {
        let mut index = InstrumentIndex::new();
        for (token, strike, option_type) in [
            ("C23000", 23000.0, OptionType::Call),
            ("P23000", 23000.0, OptionType::Put),
        ] {
            index.insert(
                token,
                InstrumentDetails::Option(OptionInstrument {
                    strike,
                    expiry: expiry(),
                    option_type,
                    last_price: Some(150.0),
                    symbol: None,
                    underlying: Some("NIFTY".to_string()),
                    iv: Some(15.0),
                    oi: None,
                    lot_size: Some(50),
                }),
            );
        }
        index.insert(
            "FUT",
            InstrumentDetails::Future(FutureInstrument {
                expiry: Some(expiry()),
                last_price: Some(23100.0),
                symbol: Some("NIFTY MAY FUT".to_string()),
                underlying: Some("NIFTY".to_string()),
                lot_size: Some(50),
            }),
        );
        index
    }

    fn flat_iv() -> MockScenarioIv {
        let mut iv = MockScenarioIv::new();
        iv.expect_scenario_iv().return_const(0.15);
        iv
    }

    fn default_aggregator<'a>(
        index: &'a InstrumentIndex,
        iv: &'a MockScenarioIv,
    ) -> ScenarioAggregator<'a> {
        ScenarioAggregator::new(index, iv, AggregationConfig::default(), PricingConfig::default())
    }

    fn scenario() -> Scenario {
        Scenario::new(now(), &config::AnalyticsConfig::default())
            .with_live_spot(23000.0)
            .with_target(23200.0, now() + Duration::days(7))
    }

    #[test]
    fn test_offsetting_legs_net_to_zero() {
        let index = index();
        let iv = flat_iv();
        let aggregator = default_aggregator(&index, &iv);
        let legs = vec![
            Leg::option(Side::Buy, "C23000", 23000.0, OptionType::Call, 150.0).with_lot_size(50),
            Leg::option(Side::Sell, "C23000", 23000.0, OptionType::Call, 150.0).with_lot_size(50),
        ];

        let report = aggregator.evaluate(&legs, &scenario());

        assert_eq!(report.rows.len(), 2);
        assert!(report.totals.projected_pnl.abs() < 1e-9);
        assert!(report.totals.delta.abs() < 1e-9);
        assert!(report.totals.gamma.abs() < 1e-12);
        assert!(report.totals.theta.abs() < 1e-9);
        assert!(report.totals.vega.abs() < 1e-9);
    }

    #[test]
    fn test_unsigned_gamma_convention() {
        let index = index();
        let iv = flat_iv();
        let aggregation = AggregationConfig {
            gamma_convention: GammaConvention::Unsigned,
            ..Default::default()
        };
        let aggregator =
            ScenarioAggregator::new(&index, &iv, aggregation, PricingConfig::default());
        let legs = vec![Leg::option(Side::Sell, "C23000", 23000.0, OptionType::Call, 150.0)];

        let report = aggregator.evaluate(&legs, &scenario());

        assert!(report.rows[0].greeks.gamma > 0.0);
        assert!(report.rows[0].greeks.delta < 0.0);
    }

    #[test]
    fn test_scaling_toggles() {
        let index = index();
        let iv = flat_iv();
        let leg = Leg::future(Side::Buy, "FUT", 23000.0).with_lots(2).with_lot_size(50);

        let full = default_aggregator(&index, &iv);
        let per_unit = ScenarioAggregator::new(
            &index,
            &iv,
            AggregationConfig {
                multiply_by_lot_size: false,
                multiply_by_num_lots: false,
                ..Default::default()
            },
            PricingConfig::default(),
        );

        let full_report = full.evaluate(std::slice::from_ref(&leg), &scenario());
        let unit_report = per_unit.evaluate(std::slice::from_ref(&leg), &scenario());

        assert_eq!(full_report.rows[0].scale, 100.0);
        assert_eq!(unit_report.rows[0].scale, 1.0);
        let unit_pnl = unit_report.totals.projected_pnl;
        assert!((full_report.totals.projected_pnl - 100.0 * unit_pnl).abs() < 1e-6);
        assert_eq!(full_report.totals.delta, 100.0);
        assert_eq!(unit_report.totals.delta, 1.0);
        assert_eq!(full_report.rows[0].label, "B 2x NIFTY MAY FUT");
        assert_eq!(full_report.rows[0].ltp, Some(23100.0));
    }

    #[test]
    fn test_unselected_legs_are_a_pure_filter() {
        let index = index();
        let iv = flat_iv();
        let aggregator = default_aggregator(&index, &iv);
        let base = vec![Leg::option(Side::Buy, "P23000", 23000.0, OptionType::Put, 140.0)];
        let mut with_unselected = base.clone();
        with_unselected.push(Leg::future(Side::Sell, "FUT", 23000.0).with_selected(false));
        with_unselected.push(Leg::future(Side::Sell, "MISSING", 1.0).with_selected(false));

        let a = aggregator.evaluate(&base, &scenario());
        let b = aggregator.evaluate(&with_unselected, &scenario());

        assert_eq!(a.totals, b.totals);
        assert_eq!(a.rows.len(), b.rows.len());
        assert!(b.excluded.is_empty());
    }

    #[test]
    fn test_malformed_legs_are_excluded() {
        let index = index();
        let iv = flat_iv();
        let aggregator = default_aggregator(&index, &iv);
        let legs = vec![
            Leg::future(Side::Buy, "UNKNOWN", 23000.0),
            Leg::future(Side::Buy, "C23000", 23000.0),
            Leg::option(Side::Buy, "", 23000.0, OptionType::Call, 1.0),
            Leg::option(Side::Buy, "C23000", 23000.0, OptionType::Call, f64::NAN),
        ];

        let report = aggregator.evaluate(&legs, &scenario());

        assert!(report.rows.is_empty());
        assert_eq!(report.totals, StrategyTotals::default());
        let reasons: Vec<_> = report.excluded.iter().map(|e| e.reason).collect();
        assert_eq!(
            reasons,
            vec![
                ExclusionReason::MissingInstrument,
                ExclusionReason::InstrumentMismatch,
                ExclusionReason::EmptyToken,
                ExclusionReason::InvalidEntryPrice,
            ]
        );
    }

    #[test]
    fn test_unusable_target_spot_falls_back_to_live() {
        let index = index();
        let iv = flat_iv();
        let aggregator = default_aggregator(&index, &iv);
        let legs = vec![Leg::future(Side::Buy, "FUT", 23000.0).with_lot_size(50)];
        let scenario = Scenario::new(now(), &config::AnalyticsConfig::default())
            .with_live_spot(23100.0)
            .with_target(0.0, now() + Duration::days(7));

        let report = aggregator.evaluate(&legs, &scenario);

        assert_matches!(report.mode, ScenarioMode::Live);
        assert_eq!(report.spot, 23100.0);
        assert_eq!(report.date, now());
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].model, PriceModel::CostOfCarry);

        let t = pricing::time_to_expiry(expiry(), now());
        let expected = (23100.0 * (scenario.risk_free_rate * t).exp() - 23000.0) * 50.0;
        assert!((report.totals.projected_pnl - expected).abs() < 1e-6);
    }

    #[test]
    fn test_live_scenario_uses_as_of() {
        let index = index();
        let iv = flat_iv();
        let aggregator = default_aggregator(&index, &iv);
        let legs = vec![Leg::option(Side::Buy, "C23000", 23000.0, OptionType::Call, 150.0)];
        let live =
            Scenario::new(now(), &config::AnalyticsConfig::default()).with_live_spot(23000.0);

        let report = aggregator.evaluate(&legs, &live);

        assert_matches!(report.mode, ScenarioMode::Live);
        assert_eq!(report.date, now());
        assert_eq!(report.rows[0].model, PriceModel::Black76);
        assert!(report.rows[0].label.starts_with("B 1x 23000CE"));
    }
}
