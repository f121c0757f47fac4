//! Payoff table around the scenario target

use serde::Serialize;
use tracing::debug;

use common::{InstrumentDetails, InstrumentLookup, Leg, ScenarioIv};
use config::{LotSizeTable, PricingConfig, TableConfig};

use crate::types::{Scenario, ScenarioMode};
use crate::valuation::{mark_leg, pnl_at_expiry, scaled_pnl, PricingParams};

/// Round `spot` to the nearest multiple of `interval`.
pub fn snap_to_interval(spot: f64, interval: f64) -> f64 {
    if !(interval.is_finite() && interval > 0.0) || !spot.is_finite() {
        return spot;
    }
    (spot / interval).round() * interval
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoffTableRow {
    pub target_price: f64,
    pub pnl_at_target_date: f64,
    pub pnl_at_expiry: f64,
    pub is_current_target: bool,
}

pub struct PayoffTableGenerator<'a> {
    lookup: &'a dyn InstrumentLookup,
    iv: &'a dyn ScenarioIv,
    table: TableConfig,
    lot_sizes: LotSizeTable,
    pricing: PricingConfig,
}

impl<'a> PayoffTableGenerator<'a> {
    pub fn new(
        lookup: &'a dyn InstrumentLookup,
        iv: &'a dyn ScenarioIv,
        table: TableConfig,
        lot_sizes: LotSizeTable,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            lookup,
            iv,
            table,
            lot_sizes,
            pricing,
        }
    }

    /// Configured interval, else the strike step of the first resolved underlying
    fn interval(&self, resolved: &[(&Leg, Option<InstrumentDetails>)]) -> f64 {
        if let Some(interval) = self.table.interval {
            return interval;
        }
        resolved
            .iter()
            .find_map(|(_, instrument)| instrument.as_ref().and_then(|i| i.underlying()))
            .map_or(self.lot_sizes.default_strike_step, |underlying| {
                self.lot_sizes.strike_step_for(underlying)
            })
    }

    /// Rows in ascending price order; empty without a projected target.
    pub fn generate(&self, legs: &[Leg], scenario: &Scenario) -> Vec<PayoffTableRow> {
        let point = scenario.evaluation_point();
        if point.mode != ScenarioMode::Projected {
            return Vec::new();
        }

        let resolved: Vec<(&Leg, Option<InstrumentDetails>)> = legs
            .iter()
            .filter(|l| l.is_active())
            .map(|leg| (leg, self.lookup.instrument(&leg.token)))
            .collect();

        let interval = self.interval(&resolved);
        if !(interval.is_finite() && interval > 0.0) {
            return Vec::new();
        }

        let center = snap_to_interval(point.spot, interval);
        let rows_each_side = self.table.rows_each_side as i64;
        let params = PricingParams::new(scenario.risk_free_rate, &self.pricing);

        let rows: Vec<PayoffTableRow> = (-rows_each_side..=rows_each_side)
            .map(|i| center + i as f64 * interval)
            .filter(|price| *price >= 0.0)
            .map(|price| {
                let (at_date, at_expiry) = resolved.iter().fold(
                    (0.0, 0.0),
                    |(date_total, expiry_total), (leg, instrument)| {
                        let instrument = instrument.as_ref();
                        let mark = mark_leg(leg, instrument, price, point.date, self.iv, params);
                        (
                            date_total + scaled_pnl(leg, mark.price),
                            expiry_total + pnl_at_expiry(leg, price, instrument),
                        )
                    },
                );
                PayoffTableRow {
                    target_price: price,
                    pnl_at_target_date: at_date,
                    pnl_at_expiry: at_expiry,
                    is_current_target: price == center,
                }
            })
            .collect();

        debug!(rows = rows.len(), center, interval, "Payoff table generated");
        rows
    }
}
