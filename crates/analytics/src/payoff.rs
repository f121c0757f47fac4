//! Payoff curve generation
//!
//! Builds the chart data for a strategy across a range of hypothetical
//! underlying prices: P&L at expiry, P&L at the scenario date, open interest
//! overlays and the volatility cone around the scenario center.
//!
//! Every degenerate input has a numeric fallback; the generator never fails.

use std::collections::BTreeSet;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::{InstrumentDetails, InstrumentIndex, InstrumentLookup, Leg, OptionType, ScenarioIv};
use config::{PayoffConfig, PricingConfig};
use pricing::DAYS_PER_YEAR;

use crate::types::Scenario;
use crate::valuation::{mark_leg, pnl_at_expiry, scaled_pnl, PriceModel, PricingParams};

/// Smallest lower bound of the spot range.
const MIN_SPOT: f64 = 0.01;
/// Fallback window when the grid ends up empty: center ± 5 steps of 2%.
const FALLBACK_STEPS: i32 = 5;
const FALLBACK_STEP_FRACTION: f64 = 0.02;
/// Below this center the range is rebuilt around the live spot.
const MIN_MEANINGFUL_CENTER: f64 = 100.0;

/// One x-axis sample of the payoff chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffPoint {
    pub spot: f64,
    pub pnl_at_expiry: f64,
    pub pnl_at_target_date: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_at_expiry_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_at_target_date_pct: Option<f64>,
    pub call_oi: f64,
    pub put_oi: f64,
    pub is_current_spot: bool,
}

/// Volatility cone around the scenario center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SdBands {
    pub center: f64,
    pub minus_2sd: f64,
    pub minus_1sd: f64,
    pub plus_1sd: f64,
    pub plus_2sd: f64,
    /// One standard deviation in price points
    pub sd_move: f64,
    /// Decimal volatility the band was built from
    pub volatility: f64,
    pub days: u32,
}

/// One row of the SD summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SdLevel {
    pub level: u8,
    pub points: f64,
    pub percent: f64,
    pub low: f64,
    pub high: f64,
}

/// 1-SD and 2-SD moves expressed in points, percent and price range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdSummary {
    pub center: f64,
    pub days: u32,
    pub volatility: f64,
    pub levels: Vec<SdLevel>,
}

impl SdBands {
    pub fn summary(&self) -> SdSummary {
        let levels = if self.center > 0.0 && self.sd_move > 0.0 {
            [1u8, 2]
                .into_iter()
                .map(|level| {
                    let points = self.sd_move * level as f64;
                    SdLevel {
                        level,
                        points,
                        percent: points / self.center * 100.0,
                        low: self.center - points,
                        high: self.center + points,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        SdSummary {
            center: self.center,
            days: self.days,
            volatility: self.volatility,
            levels,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayoffCurve {
    /// Unique spots, ascending
    pub points: Vec<PayoffPoint>,
    pub sd_bands: Option<SdBands>,
}

impl PayoffCurve {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Round half away from zero to 2 decimals.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy)]
struct Range {
    low: f64,
    high: f64,
}

pub struct PayoffCurveGenerator<'a> {
    lookup: &'a dyn InstrumentLookup,
    iv: &'a dyn ScenarioIv,
    payoff: PayoffConfig,
    pricing: PricingConfig,
}

impl<'a> PayoffCurveGenerator<'a> {
    pub fn new(
        lookup: &'a dyn InstrumentLookup,
        iv: &'a dyn ScenarioIv,
        payoff: PayoffConfig,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            lookup,
            iv,
            payoff,
            pricing,
        }
    }

    /// Generate the curve; `chain` supplies open interest and extra grid strikes.
    pub fn generate(
        &self,
        legs: &[Leg],
        scenario: &Scenario,
        chain: &InstrumentIndex,
    ) -> PayoffCurve {
        let selected: Vec<&Leg> = legs.iter().filter(|l| l.is_active()).collect();
        let center = scenario.curve_center();
        let live = scenario.live_spot.filter(|s| s.is_finite()).unwrap_or(0.0);

        if center == 0.0 && selected.is_empty() && chain.is_empty() {
            return PayoffCurve::default();
        }

        let sd_bands = self.sd_bands(center, scenario.sd_days, &selected, chain);
        let strikes: Vec<f64> = selected
            .iter()
            .filter_map(|l| l.strike())
            .filter(|s| s.is_finite())
            .collect();
        let range = self.range(center, live, &strikes, sd_bands.as_ref());
        let grid = self.grid(center, live, &strikes, range, chain);

        // Instruments resolved once per curve; lookup is pure
        let resolved: Vec<(&Leg, Option<InstrumentDetails>)> = selected
            .iter()
            .map(|leg| (*leg, self.lookup.instrument(&leg.token)))
            .collect();
        for (leg, instrument) in &resolved {
            match instrument {
                None => warn!(
                    token = %leg.token,
                    "No instrument for leg, target-date P&L held at entry"
                ),
                Some(i) if !i.matches(&leg.kind) => warn!(
                    token = %leg.token,
                    kind = i.kind_str(),
                    "Instrument kind does not match leg"
                ),
                _ => {}
            }
        }

        let params = PricingParams::new(scenario.risk_free_rate, &self.pricing);
        let date = scenario.curve_date();
        let percent_base = (self.payoff.show_percentage && live != 0.0).then_some(live);

        let points: Vec<PayoffPoint> = grid
            .into_iter()
            .map(|spot| {
                let mut pnl_at_expiry_total = 0.0;
                let mut pnl_at_target_total = 0.0;
                for (leg, instrument) in &resolved {
                    pnl_at_expiry_total += pnl_at_expiry(leg, spot, instrument.as_ref());
                    let mark = mark_leg(leg, instrument.as_ref(), spot, date, self.iv, params);
                    if mark.model == PriceModel::MissingExpiry {
                        debug!(token = %leg.token, spot, "Future without expiry priced at spot");
                    }
                    pnl_at_target_total += scaled_pnl(leg, mark.price);
                }

                let (call_oi, put_oi) = self.open_interest_at(spot, chain);

                PayoffPoint {
                    spot,
                    pnl_at_expiry: pnl_at_expiry_total,
                    pnl_at_target_date: pnl_at_target_total,
                    pnl_at_expiry_pct: percent_base.map(|base| 100.0 * pnl_at_expiry_total / base),
                    pnl_at_target_date_pct: percent_base
                        .map(|base| 100.0 * pnl_at_target_total / base),
                    call_oi,
                    put_oi,
                    is_current_spot: center > 0.0 && (spot - center).abs() < 0.01,
                }
            })
            .collect();

        debug!(
            points = points.len(),
            low = range.low,
            high = range.high,
            "Payoff curve generated"
        );

        PayoffCurve { points, sd_bands }
    }

    /// Representative volatility: first selected option leg, else the chain
    /// option nearest the center, else the default.
    fn representative_iv(&self, center: f64, selected: &[&Leg], chain: &InstrumentIndex) -> f64 {
        if let Some(leg) = selected.iter().find(|l| l.kind.is_option()) {
            let iv = self.iv.scenario_iv(&leg.token);
            return if iv > 0.0 {
                iv
            } else {
                self.pricing.default_volatility
            };
        }

        chain
            .options()
            .filter_map(|(_, o)| {
                o.iv
                    .filter(|iv| iv.is_finite() && *iv > 0.0)
                    .map(|iv| (o.strike, iv))
            })
            .fold(None::<(f64, f64)>, |best, (strike, iv)| match best {
                Some((best_strike, _))
                    if (strike - center).abs() >= (best_strike - center).abs() =>
                {
                    best
                }
                _ => Some((strike, iv)),
            })
            .map(|(_, iv)| iv / 100.0)
            .unwrap_or(self.pricing.default_volatility)
    }

    fn sd_bands(
        &self,
        center: f64,
        sd_days: u32,
        selected: &[&Leg],
        chain: &InstrumentIndex,
    ) -> Option<SdBands> {
        if center <= 0.0 || sd_days == 0 {
            return None;
        }

        let volatility = self.representative_iv(center, selected, chain);
        if volatility <= 0.0 {
            return None;
        }

        let horizon = sd_days as f64 / DAYS_PER_YEAR;
        let sd_move = center * volatility * horizon.sqrt();

        Some(SdBands {
            center: round2(center),
            minus_2sd: round2(center - 2.0 * sd_move).max(0.0),
            minus_1sd: round2(center - sd_move).max(0.0),
            plus_1sd: round2(center + sd_move),
            plus_2sd: round2(center + 2.0 * sd_move),
            sd_move,
            volatility,
            days: sd_days,
        })
    }

    fn range(&self, center: f64, live: f64, strikes: &[f64], bands: Option<&SdBands>) -> Range {
        let pad = self.payoff.padding_factor;
        let step = self.payoff.interval_step;

        let (min_spot, max_spot) = strikes
            .iter()
            .fold((center, center), |(lo, hi), s| (lo.min(*s), hi.max(*s)));

        let mut low = if min_spot > 0.0 { min_spot * (1.0 - pad) } else { 0.0 };
        let mut high = if max_spot > 0.0 {
            max_spot * (1.0 + pad)
        } else {
            self.payoff.fallback_upper_bound
        };

        if center < MIN_MEANINGFUL_CENTER && strikes.is_empty() {
            if live > 0.0 {
                low = live * (1.0 - pad);
                high = live * (1.0 + pad);
            } else {
                low = 0.0;
                high = self.payoff.fallback_upper_bound;
            }
        }

        if let Some(b) = bands {
            low = low.min(b.minus_2sd);
            high = high.max(b.plus_2sd);
        }

        let mut low = low.max(MIN_SPOT);
        let mut high = high.max(low + step);

        if strikes.is_empty() && center > 0.0 {
            let max_distance = center * self.payoff.max_range_from_center;
            low = low.max(center - max_distance).max(MIN_SPOT);
            high = high.min(center + max_distance).max(low + step);
        }

        Range { low, high }
    }

    fn grid(
        &self,
        center: f64,
        live: f64,
        strikes: &[f64],
        range: Range,
        chain: &InstrumentIndex,
    ) -> Vec<f64> {
        let points = self.payoff.points;
        let step = self.payoff.interval_step;
        let fallback_center = if center > 0.0 {
            center
        } else if live != 0.0 {
            live
        } else {
            self.payoff.fallback_center
        };

        let mut grid: BTreeSet<OrderedFloat<f64>> = BTreeSet::new();

        if range.high > range.low && points > 0 {
            let width = range.high - range.low;
            for i in 0..=points {
                grid.insert(OrderedFloat(round2(range.low + i as f64 * width / points as f64)));
            }
        } else {
            let half = (points / 2) as i64;
            for i in -half..=half {
                grid.insert(OrderedFloat(round2(fallback_center + i as f64 * step)));
            }
        }

        // Open interest strikes inside the range
        for (_, option) in chain.options() {
            let strike = option.strike;
            if strike.is_finite() && strike >= range.low && strike <= range.high {
                grid.insert(OrderedFloat(round2(strike)));
            }
        }

        // Anchors so the center and every leg strike are sampled exactly
        if center > 0.0 && center >= range.low && center <= range.high {
            grid.insert(OrderedFloat(round2(center)));
        }
        for strike in strikes.iter().filter(|s| **s > 0.0) {
            grid.insert(OrderedFloat(round2(*strike)));
        }

        grid.retain(|s| s.0 >= 0.0 && s.0.is_finite());

        if grid.is_empty() {
            for i in -FALLBACK_STEPS..=FALLBACK_STEPS {
                let offset = i as f64 * fallback_center * FALLBACK_STEP_FRACTION;
                let spot = round2(fallback_center + offset);
                grid.insert(OrderedFloat(spot));
            }
        }

        grid.into_iter().map(|s| s.0).collect()
    }

    fn open_interest_at(&self, spot: f64, chain: &InstrumentIndex) -> (f64, f64) {
        let half_step = self.payoff.interval_step / 2.0;
        chain
            .options()
            .filter(|(_, o)| (o.strike - spot).abs() < half_step)
            .filter_map(|(_, o)| o.oi.filter(|oi| oi.is_finite()).map(|oi| (o.option_type, oi)))
            .fold((0.0, 0.0), |(calls, puts), (option_type, oi)| match option_type {
                OptionType::Call => (calls + oi, puts),
                OptionType::Put => (calls, puts + oi),
            })
    }
}
