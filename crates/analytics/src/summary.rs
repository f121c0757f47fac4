//! Strategy-wide risk metrics
//!
//! Max profit, max loss, breakevens and the risk/reward ratio. Unbounded
//! exposure is classified analytically from the net position per instrument
//! class and always overrides the sampled curve.

use std::collections::BTreeSet;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Serialize, Serializer};
use tracing::debug;

use common::{InstrumentLookup, Leg, LegKind, OptionType, Side};
use config::{RatioMode, SummaryConfig};

use crate::payoff::PayoffCurve;
use crate::valuation::pnl_at_expiry;

const ZERO_TOLERANCE: f64 = 1e-9;

/// Extremum of the expiry P&L.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PnlBound {
    Unlimited,
    /// Signed P&L; a loss is negative
    Finite(f64),
    NotAvailable,
}

impl PnlBound {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, PnlBound::Unlimited)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PnlBound::Finite(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskReward {
    BothUnlimited,
    UnlimitedReward,
    UnlimitedRisk,
    /// No risk with positive reward
    Infinite,
    /// Reward is not positive
    Zero,
    Ratio(f64),
    NotAvailable,
}

impl fmt::Display for RiskReward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskReward::BothUnlimited => write!(f, "Unlimited/Unlimited"),
            RiskReward::UnlimitedReward => write!(f, "Unlimited Reward"),
            RiskReward::UnlimitedRisk => write!(f, "Unlimited Risk"),
            RiskReward::Infinite => write!(f, "∞"),
            RiskReward::Zero => write!(f, "0.00X"),
            RiskReward::Ratio(r) => write!(f, "{:.2}X", r),
            RiskReward::NotAvailable => write!(f, "N/A"),
        }
    }
}

impl Serialize for RiskReward {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Net quantity (lots × lot size) per side and instrument class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExposureProfile {
    pub long_calls: f64,
    pub short_calls: f64,
    pub long_puts: f64,
    pub short_puts: f64,
    pub long_futures: f64,
    pub short_futures: f64,
}

impl ExposureProfile {
    pub fn from_legs<'l>(legs: impl IntoIterator<Item = &'l Leg>) -> Self {
        legs.into_iter().fold(Self::default(), |mut acc, leg| {
            let quantity = leg.quantity();
            let slot = match (&leg.kind, leg.side) {
                (LegKind::Option { option_type, .. }, side) => match (option_type, side) {
                    (OptionType::Call, Side::Buy) => &mut acc.long_calls,
                    (OptionType::Call, Side::Sell) => &mut acc.short_calls,
                    (OptionType::Put, Side::Buy) => &mut acc.long_puts,
                    (OptionType::Put, Side::Sell) => &mut acc.short_puts,
                },
                (LegKind::Future, Side::Buy) => &mut acc.long_futures,
                (LegKind::Future, Side::Sell) => &mut acc.short_futures,
            };
            *slot += quantity;
            acc
        })
    }

    /// Net long futures or net long calls
    pub fn unlimited_profit(&self) -> bool {
        self.long_futures > self.short_futures || self.long_calls > self.short_calls
    }

    /// Net short futures, puts or calls
    pub fn unlimited_loss(&self) -> bool {
        self.short_futures > self.long_futures
            || self.short_puts > self.long_puts
            || self.short_calls > self.long_calls
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSummary {
    /// Summed intrinsic value of option legs at the live spot
    pub intrinsic_value: Option<f64>,
    /// Market price minus intrinsic, summed over option legs
    pub time_value: Option<f64>,
    pub max_profit: PnlBound,
    pub max_loss: PnlBound,
    /// Ascending, rounded and unique
    pub breakevens: Vec<f64>,
    pub risk_reward: RiskReward,
    pub exposure: ExposureProfile,
}

pub struct RiskSummaryAnalyzer<'a> {
    lookup: &'a dyn InstrumentLookup,
    config: SummaryConfig,
}

impl<'a> RiskSummaryAnalyzer<'a> {
    pub fn new(lookup: &'a dyn InstrumentLookup, config: SummaryConfig) -> Self {
        Self { lookup, config }
    }

    pub fn analyze(
        &self,
        legs: &[Leg],
        live_spot: Option<f64>,
        curve: &PayoffCurve,
    ) -> RiskSummary {
        let selected: Vec<&Leg> = legs.iter().filter(|l| l.is_active()).collect();

        let (intrinsic_value, time_value) = match live_spot.filter(|s| s.is_finite() && *s > 0.0) {
            Some(spot) => {
                let (intrinsic, time) = self.option_values(&selected, spot);
                (Some(intrinsic), Some(time))
            }
            None => (None, None),
        };

        let exposure = ExposureProfile::from_legs(selected.iter().copied());
        let (max_profit, max_loss) = extrema(&selected, curve, &exposure);
        let breakevens = breakevens(curve, self.config.breakeven_decimals);
        let risk_reward = risk_reward(max_profit, max_loss, self.config.ratio_mode);

        debug!(
            legs = selected.len(),
            breakevens = breakevens.len(),
            %risk_reward,
            "Risk summary computed"
        );

        RiskSummary {
            intrinsic_value,
            time_value,
            max_profit,
            max_loss,
            breakevens,
            risk_reward,
            exposure,
        }
    }

    fn option_values(&self, legs: &[&Leg], spot: f64) -> (f64, f64) {
        legs.iter()
            .filter_map(|leg| match leg.kind {
                LegKind::Option { strike, option_type } if strike.is_finite() => {
                    Some((*leg, strike, option_type))
                }
                _ => None,
            })
            .fold((0.0, 0.0), |(intrinsic_total, time_total), (leg, strike, option_type)| {
                let intrinsic = option_type.intrinsic(spot, strike);
                let market_price = self
                    .lookup
                    .instrument(&leg.token)
                    .filter(|i| i.as_option().is_some())
                    .and_then(|i| i.last_price())
                    .unwrap_or(leg.price);
                let scale = leg.quantity() * leg.direction();

                let time_value = market_price - intrinsic;
                let time_total = if time_value.is_finite() {
                    time_total + time_value * scale
                } else {
                    time_total
                };
                (intrinsic_total + intrinsic * scale, time_total)
            })
    }
}

/// Combine the curve extrema with the settlement P&L at spot zero, then let
/// the analytical classification override.
fn extrema(
    legs: &[&Leg],
    curve: &PayoffCurve,
    exposure: &ExposureProfile,
) -> (PnlBound, PnlBound) {
    let sampled = curve
        .points
        .iter()
        .map(|p| p.pnl_at_expiry)
        .filter(|pnl| pnl.is_finite());
    let curve_max = sampled.clone().reduce(f64::max);
    let curve_min = sampled.reduce(f64::min);

    let at_zero = (!legs.is_empty())
        .then(|| legs.iter().map(|leg| pnl_at_expiry(leg, 0.0, None)).sum::<f64>());

    let combine = |curve_value: Option<f64>, pick: fn(f64, f64) -> f64| {
        match (curve_value, at_zero) {
            (Some(c), Some(z)) => PnlBound::Finite(pick(c, z)),
            (Some(c), None) => PnlBound::Finite(c),
            (None, Some(z)) => PnlBound::Finite(z),
            (None, None) => PnlBound::NotAvailable,
        }
    };

    let max_profit = if exposure.unlimited_profit() {
        PnlBound::Unlimited
    } else {
        combine(curve_max, f64::max)
    };
    let max_loss = if exposure.unlimited_loss() {
        PnlBound::Unlimited
    } else {
        combine(curve_min, f64::min)
    };

    (max_profit, max_loss)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Zero crossings of the expiry P&L, linearly interpolated between samples.
pub fn breakevens(curve: &PayoffCurve, decimals: u32) -> Vec<f64> {
    let mut found: BTreeSet<OrderedFloat<f64>> = BTreeSet::new();

    for pair in curve.points.windows(2) {
        let (prev, point) = (&pair[0], &pair[1]);
        let (p0, p1) = (prev.pnl_at_expiry, point.pnl_at_expiry);
        if !(p0.is_finite() && p1.is_finite()) {
            continue;
        }

        let prev_zero = p0.abs() < ZERO_TOLERANCE;
        let point_zero = p1.abs() < ZERO_TOLERANCE;
        let crosses = p0 * p1 < 0.0 || (prev_zero && !point_zero) || (point_zero && !prev_zero);
        if !crosses {
            continue;
        }

        let spot = if (p1 - p0).abs() > ZERO_TOLERANCE {
            prev.spot - p0 * (point.spot - prev.spot) / (p1 - p0)
        } else if prev_zero {
            prev.spot
        } else {
            point.spot
        };

        if spot.is_finite() {
            found.insert(OrderedFloat(round_to(spot, decimals)));
        }
    }

    found.into_iter().map(|s| s.0).collect()
}

pub fn risk_reward(max_profit: PnlBound, max_loss: PnlBound, mode: RatioMode) -> RiskReward {
    let reward = match max_profit {
        PnlBound::Unlimited => f64::INFINITY,
        PnlBound::Finite(v) => v,
        PnlBound::NotAvailable => return RiskReward::NotAvailable,
    };
    // A strategy that never loses carries no risk
    let risk = match max_loss {
        PnlBound::Unlimited => f64::INFINITY,
        PnlBound::Finite(v) => (-v).max(0.0),
        PnlBound::NotAvailable => return RiskReward::NotAvailable,
    };

    match (reward.is_infinite(), risk.is_infinite()) {
        (true, true) => RiskReward::BothUnlimited,
        (true, false) => RiskReward::UnlimitedReward,
        (false, true) => RiskReward::UnlimitedRisk,
        (false, false) => {
            if risk < ZERO_TOLERANCE && reward < ZERO_TOLERANCE {
                RiskReward::Zero
            } else if risk < ZERO_TOLERANCE {
                RiskReward::Infinite
            } else if reward <= 0.0 {
                RiskReward::Zero
            } else {
                match mode {
                    RatioMode::RiskReward => RiskReward::Ratio(risk / reward),
                    RatioMode::RewardRisk => RiskReward::Ratio(reward / risk),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use common::{
        FutureInstrument, InstrumentDetails, InstrumentIndex, MockInstrumentLookup, MockScenarioIv,
        OptionInstrument,
    };
    use config::{AnalyticsConfig, PayoffConfig, PricingConfig};

    use crate::payoff::{PayoffCurveGenerator, PayoffPoint};
    use crate::types::Scenario;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap()
    }

    fn index() -> InstrumentIndex {
        let mut index = InstrumentIndex::new();
        index.insert(
            "C100",
            InstrumentDetails::Option(OptionInstrument {
                strike: 100.0,
                expiry: now() + Duration::days(29),
                option_type: OptionType::Call,
                last_price: Some(7.5),
                symbol: None,
                underlying: None,
                iv: Some(20.0),
                oi: None,
                lot_size: None,
            }),
        );
        index.insert(
            "FUT",
            InstrumentDetails::Future(FutureInstrument {
                expiry: Some(now() + Duration::days(29)),
                last_price: Some(101.0),
                symbol: None,
                underlying: None,
                lot_size: None,
            }),
        );
        index
    }

    fn curve_for(legs: &[Leg], index: &InstrumentIndex) -> PayoffCurve {
        let mut iv = MockScenarioIv::new();
        iv.expect_scenario_iv().return_const(0.2);
        let payoff = PayoffConfig {
            interval_step: 1.0,
            ..Default::default()
        };
        let generator = PayoffCurveGenerator::new(index, &iv, payoff, PricingConfig::default());
        let scenario = Scenario::new(now(), &AnalyticsConfig::default()).with_live_spot(100.0);
        generator.generate(legs, &scenario, index)
    }

    fn point(spot: f64, pnl: f64) -> PayoffPoint {
        PayoffPoint {
            spot,
            pnl_at_expiry: pnl,
            pnl_at_target_date: pnl,
            pnl_at_expiry_pct: None,
            pnl_at_target_date_pct: None,
            call_oi: 0.0,
            put_oi: 0.0,
            is_current_spot: false,
        }
    }

    #[test]
    fn test_long_future_has_unlimited_profit() {
        let index = index();
        let legs = vec![Leg::future(Side::Buy, "FUT", 100.0).with_lot_size(50)];
        let curve = curve_for(&legs, &index);
        let analyzer = RiskSummaryAnalyzer::new(&index, SummaryConfig::default());

        let summary = analyzer.analyze(&legs, Some(100.0), &curve);

        assert_eq!(summary.max_profit, PnlBound::Unlimited);
        assert_eq!(summary.max_loss, PnlBound::Finite(-100.0 * 50.0));
        assert_eq!(summary.risk_reward, RiskReward::UnlimitedReward);
        assert_eq!(summary.breakevens, vec![100.0]);
        // Futures carry no intrinsic or time value
        assert_eq!(summary.intrinsic_value, Some(0.0));
        assert_eq!(summary.time_value, Some(0.0));
    }

    #[test]
    fn test_short_future_has_unlimited_loss() {
        let index = index();
        let legs = vec![Leg::future(Side::Sell, "FUT", 100.0).with_lot_size(50)];
        let curve = curve_for(&legs, &index);
        let analyzer = RiskSummaryAnalyzer::new(&index, SummaryConfig::default());

        let summary = analyzer.analyze(&legs, Some(100.0), &curve);

        assert_eq!(summary.max_profit, PnlBound::Finite(100.0 * 50.0));
        assert_eq!(summary.max_loss, PnlBound::Unlimited);
        assert_eq!(summary.risk_reward, RiskReward::UnlimitedRisk);
        assert_eq!(summary.risk_reward.to_string(), "Unlimited Risk");
    }

    #[test]
    fn test_long_call_breakeven_and_values() {
        let index = index();
        let legs = vec![Leg::option(Side::Buy, "C100", 100.0, OptionType::Call, 5.0)];
        let curve = curve_for(&legs, &index);
        let analyzer = RiskSummaryAnalyzer::new(&index, SummaryConfig::default());

        let summary = analyzer.analyze(&legs, Some(102.0), &curve);

        assert_eq!(summary.breakevens, vec![105.0]);
        assert_eq!(summary.max_profit, PnlBound::Unlimited);
        assert_eq!(summary.max_loss, PnlBound::Finite(-5.0));
        assert_eq!(summary.intrinsic_value, Some(2.0));
        // Market price comes from the instrument's last price
        assert_eq!(summary.time_value, Some(5.5));
    }

    #[test]
    fn test_values_need_live_spot() {
        let index = index();
        let legs = vec![Leg::option(Side::Buy, "C100", 100.0, OptionType::Call, 5.0)];
        let analyzer = RiskSummaryAnalyzer::new(&index, SummaryConfig::default());

        let summary = analyzer.analyze(&legs, None, &PayoffCurve::default());

        assert!(summary.intrinsic_value.is_none());
        assert!(summary.time_value.is_none());
        assert_eq!(summary.max_loss, PnlBound::Finite(-5.0));
    }

    #[test]
    fn test_bull_call_spread_is_bounded() {
        let mut lookup = MockInstrumentLookup::new();
        lookup.expect_instrument().returning(|_| None);
        let legs = vec![
            Leg::option(Side::Buy, "A", 100.0, OptionType::Call, 6.0),
            Leg::option(Side::Sell, "B", 110.0, OptionType::Call, 2.0),
        ];
        let curve = PayoffCurve {
            points: vec![
                point(90.0, -4.0),
                point(100.0, -4.0),
                point(110.0, 6.0),
                point(120.0, 6.0),
            ],
            sd_bands: None,
        };
        let config = SummaryConfig {
            ratio_mode: RatioMode::RewardRisk,
            ..Default::default()
        };
        let analyzer = RiskSummaryAnalyzer::new(&lookup, config);

        let summary = analyzer.analyze(&legs, None, &curve);

        assert_eq!(summary.max_profit, PnlBound::Finite(6.0));
        assert_eq!(summary.max_loss, PnlBound::Finite(-4.0));
        assert_eq!(summary.breakevens, vec![104.0]);
        assert_eq!(summary.risk_reward, RiskReward::Ratio(1.5));
        assert_eq!(summary.risk_reward.to_string(), "1.50X");
    }

    #[test]
    fn test_unselected_legs_are_ignored() {
        let index = index();
        let base = vec![Leg::option(Side::Buy, "C100", 100.0, OptionType::Call, 5.0)];
        let mut extended = base.clone();
        extended.push(Leg::future(Side::Sell, "FUT", 100.0).with_selected(false));
        let curve = curve_for(&base, &index);
        let analyzer = RiskSummaryAnalyzer::new(&index, SummaryConfig::default());

        let a = analyzer.analyze(&base, Some(100.0), &curve);
        let b = analyzer.analyze(&extended, Some(100.0), &curve);

        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_plateau_reports_both_edges() {
        let curve = PayoffCurve {
            points: vec![point(90.0, -1.0), point(95.0, 0.0), point(100.0, 0.0), point(105.0, 2.0)],
            sd_bands: None,
        };

        assert_eq!(breakevens(&curve, 0), vec![95.0, 100.0]);
    }

    #[test]
    fn test_ratio_special_cases() {
        let ratio = |profit, loss| risk_reward(profit, loss, RatioMode::RiskReward);
        let finite = PnlBound::Finite;

        assert_matches!(
            ratio(PnlBound::Unlimited, PnlBound::Unlimited),
            RiskReward::BothUnlimited
        );
        assert_matches!(ratio(finite(10.0), finite(0.0)), RiskReward::Infinite);
        assert_matches!(ratio(finite(0.0), finite(0.0)), RiskReward::Zero);
        assert_matches!(ratio(finite(-3.0), finite(-5.0)), RiskReward::Zero);
        assert_matches!(ratio(finite(4.0), finite(-2.0)), RiskReward::Ratio(r) if r == 0.5);
        assert_matches!(
            ratio(PnlBound::NotAvailable, finite(-2.0)),
            RiskReward::NotAvailable
        );
        assert_eq!(RiskReward::Infinite.to_string(), "∞");
    }
}
