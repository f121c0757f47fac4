//! Single-leg valuation
//!
//! Values one leg at its own expiry for a hypothetical settlement spot, and
//! marks it to model at a scenario date. Missing or mismatched instrument
//! data never fails; the leg falls back to its entry price or to intrinsic
//! value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{InstrumentDetails, InstrumentLookup, Leg, LegKind, ScenarioIv};
use config::PricingConfig;
use pricing::{
    black76_greeks, black76_price, time_to_expiry, Black76Inputs, Greeks, TIME_EPSILON,
    VOL_EPSILON,
};

/// Rate and numeric floors used when marking legs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingParams {
    pub rate: f64,
    pub time_floor: f64,
    pub vol_floor: f64,
}

impl PricingParams {
    pub fn new(rate: f64, pricing: &PricingConfig) -> Self {
        Self {
            rate,
            time_floor: pricing.time_floor,
            vol_floor: pricing.vol_floor,
        }
    }

    /// Rate with the default floors
    pub fn with_rate(rate: f64) -> Self {
        Self::new(rate, &PricingConfig::default())
    }
}

/// How a leg's scenario price was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceModel {
    /// Black-76 on the forward for the option's remaining life
    Black76,
    /// Option at or past expiry, or without volatility
    Intrinsic,
    /// Future before expiry: spot with cost of carry
    CostOfCarry,
    /// Future at or past expiry: settles to spot
    Settled,
    /// Future without expiry data: priced at spot
    MissingExpiry,
    /// No usable instrument: held at entry price
    EntryPrice,
}

/// Scenario price of one unit of a leg with its raw (undirected) Greeks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegMark {
    pub price: f64,
    pub greeks: Greeks,
    pub model: PriceModel,
}

/// Value of one unit at the leg's own expiry.
///
/// Options use the instrument's strike when it is an option, else the leg's.
pub fn value_at_expiry(leg: &Leg, spot: f64, instrument: Option<&InstrumentDetails>) -> f64 {
    match leg.kind {
        LegKind::Option {
            strike,
            option_type,
        } => {
            let strike = instrument
                .and_then(|i| i.as_option())
                .map(|o| o.strike)
                .unwrap_or(strike);
            if !strike.is_finite() {
                return 0.0;
            }
            option_type.intrinsic(spot, strike)
        }
        LegKind::Future => spot,
    }
}

/// P&L of a per-unit price against the entry, scaled by quantity and direction.
///
/// Non-finite entry or price yields 0.
pub fn scaled_pnl(leg: &Leg, price: f64) -> f64 {
    match leg.entry_price() {
        Some(entry) if price.is_finite() => (price - entry) * leg.quantity() * leg.direction(),
        _ => 0.0,
    }
}

pub fn pnl_at_expiry(leg: &Leg, spot: f64, instrument: Option<&InstrumentDetails>) -> f64 {
    scaled_pnl(leg, value_at_expiry(leg, spot, instrument))
}

/// Mark one unit of `leg` at `spot` on `date`.
pub fn mark_leg(
    leg: &Leg,
    instrument: Option<&InstrumentDetails>,
    spot: f64,
    date: DateTime<Utc>,
    iv: &dyn ScenarioIv,
    params: PricingParams,
) -> LegMark {
    match (&leg.kind, instrument) {
        (LegKind::Option { .. }, Some(InstrumentDetails::Option(option))) => {
            let sigma = iv.scenario_iv(&leg.token);
            let t = time_to_expiry(option.expiry, date);

            if t > TIME_EPSILON && sigma > VOL_EPSILON {
                let forward = spot * (params.rate * t).exp();
                let inputs = Black76Inputs::new(
                    forward,
                    option.strike,
                    t,
                    params.rate,
                    sigma,
                    option.option_type,
                );
                LegMark {
                    price: black76_price(inputs),
                    greeks: black76_greeks(inputs),
                    model: PriceModel::Black76,
                }
            } else {
                let inputs = Black76Inputs::new(
                    spot,
                    option.strike,
                    t,
                    params.rate,
                    sigma,
                    option.option_type,
                )
                .floored(params.time_floor, params.vol_floor);
                LegMark {
                    price: option.option_type.intrinsic(spot, option.strike),
                    greeks: black76_greeks(inputs),
                    model: PriceModel::Intrinsic,
                }
            }
        }
        (LegKind::Future, Some(InstrumentDetails::Future(future))) => {
            let (price, model) = match future.expiry {
                None => (spot, PriceModel::MissingExpiry),
                Some(expiry) if date >= expiry => (spot, PriceModel::Settled),
                Some(expiry) => {
                    let t = time_to_expiry(expiry, date);
                    if t <= TIME_EPSILON {
                        (spot, PriceModel::Settled)
                    } else {
                        (spot * (params.rate * t).exp(), PriceModel::CostOfCarry)
                    }
                }
            };
            LegMark {
                price,
                greeks: Greeks::future(),
                model,
            }
        }
        _ => LegMark {
            price: leg.price,
            greeks: Greeks::zero(),
            model: PriceModel::EntryPrice,
        },
    }
}

/// Theoretical price of one unit at the scenario spot and date.
pub fn theoretical_price_at_scenario(
    leg: &Leg,
    spot: f64,
    date: DateTime<Utc>,
    rate: f64,
    iv: &dyn ScenarioIv,
    lookup: &dyn InstrumentLookup,
) -> f64 {
    let instrument = lookup.instrument(&leg.token);
    mark_leg(leg, instrument.as_ref(), spot, date, iv, PricingParams::with_rate(rate)).price
}

pub fn pnl_at_scenario(
    leg: &Leg,
    spot: f64,
    date: DateTime<Utc>,
    rate: f64,
    iv: &dyn ScenarioIv,
    lookup: &dyn InstrumentLookup,
) -> f64 {
    scaled_pnl(leg, theoretical_price_at_scenario(leg, spot, date, rate, iv, lookup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use common::{
        FutureInstrument, MockInstrumentLookup, MockScenarioIv, OptionInstrument, OptionType, Side,
    };

    const RATE: f64 = 0.065;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap()
    }

    fn option(strike: f64, option_type: OptionType, expiry: DateTime<Utc>) -> InstrumentDetails {
        InstrumentDetails::Option(OptionInstrument {
            strike,
            expiry,
            option_type,
            last_price: None,
            symbol: None,
            underlying: None,
            iv: None,
            oi: None,
            lot_size: None,
        })
    }

    fn future(expiry: Option<DateTime<Utc>>) -> InstrumentDetails {
        InstrumentDetails::Future(FutureInstrument {
            expiry,
            last_price: None,
            symbol: None,
            underlying: None,
            lot_size: None,
        })
    }

    fn flat_iv(sigma: f64) -> MockScenarioIv {
        let mut iv = MockScenarioIv::new();
        iv.expect_scenario_iv().return_const(sigma);
        iv
    }

    #[test]
    fn test_short_call_pnl_falls_with_spot() {
        let leg = Leg::option(Side::Sell, "C", 100.0, OptionType::Call, 5.0)
            .with_lots(2)
            .with_lot_size(50);

        assert_eq!(pnl_at_expiry(&leg, 90.0, None), 500.0);
        assert_eq!(pnl_at_expiry(&leg, 120.0, None), -1500.0);
    }

    #[test]
    fn test_expiry_value_prefers_instrument_strike() {
        let leg = Leg::option(Side::Buy, "C", 100.0, OptionType::Call, 0.0);
        let inst = option(110.0, OptionType::Call, now());
        assert_eq!(value_at_expiry(&leg, 120.0, Some(&inst)), 10.0);
        assert_eq!(value_at_expiry(&leg, 120.0, None), 20.0);

        let fut = Leg::future(Side::Buy, "F", 100.0);
        assert_eq!(value_at_expiry(&fut, 123.0, None), 123.0);
    }

    #[test]
    fn test_nan_entry_price_contributes_nothing() {
        let leg = Leg::future(Side::Buy, "F", f64::NAN);
        assert_eq!(pnl_at_expiry(&leg, 123.0, None), 0.0);
    }

    #[test]
    fn test_option_marked_with_black76() {
        let leg = Leg::option(Side::Buy, "C", 23000.0, OptionType::Call, 100.0);
        let inst = option(23000.0, OptionType::Call, now() + Duration::days(30));
        let params = PricingParams::with_rate(RATE);
        let mark = mark_leg(&leg, Some(&inst), 23000.0, now(), &flat_iv(0.15), params);

        assert_eq!(mark.model, PriceModel::Black76);
        assert!(mark.price > 300.0 && mark.price < 500.0);
        assert!(mark.greeks.delta > 0.5);
    }

    #[test]
    fn test_option_at_expiry_uses_intrinsic_with_finite_greeks() {
        let expiry = now() + Duration::days(10);
        let leg = Leg::option(Side::Buy, "P", 23000.0, OptionType::Put, 100.0);
        let inst = option(23000.0, OptionType::Put, expiry);
        let iv = flat_iv(0.15);
        let params = PricingParams::with_rate(RATE);

        let at_expiry = mark_leg(&leg, Some(&inst), 22800.0, expiry, &iv, params);
        assert_eq!(at_expiry.model, PriceModel::Intrinsic);
        assert_eq!(at_expiry.price, 200.0);
        assert!(at_expiry.greeks.is_finite());

        // One second before expiry the model price is continuous with intrinsic
        let second_before = expiry - Duration::seconds(1);
        let just_before = mark_leg(&leg, Some(&inst), 22800.0, second_before, &iv, params);
        assert_eq!(just_before.model, PriceModel::Black76);
        assert!((just_before.price - at_expiry.price).abs() < 0.01);
        assert!((just_before.greeks.delta - at_expiry.greeks.delta).abs() < 1e-3);
    }

    #[test]
    fn test_zero_iv_falls_back_to_intrinsic() {
        let leg = Leg::option(Side::Buy, "C", 100.0, OptionType::Call, 1.0);
        let inst = option(100.0, OptionType::Call, now() + Duration::days(30));
        let params = PricingParams::with_rate(RATE);
        let mark = mark_leg(&leg, Some(&inst), 104.0, now(), &flat_iv(0.0), params);
        assert_eq!(mark.model, PriceModel::Intrinsic);
        assert_eq!(mark.price, 4.0);
    }

    #[test]
    fn test_future_carry_and_settlement() {
        let expiry = now() + Duration::days(30);
        let leg = Leg::future(Side::Buy, "F", 23000.0);
        let inst = future(Some(expiry));
        let iv = flat_iv(0.15);
        let params = PricingParams::with_rate(RATE);

        let before = mark_leg(&leg, Some(&inst), 23000.0, now(), &iv, params);
        assert_eq!(before.model, PriceModel::CostOfCarry);
        let t = time_to_expiry(expiry, now());
        assert!((before.price - 23000.0 * (RATE * t).exp()).abs() < 1e-9);
        assert_eq!(before.greeks, Greeks::future());

        let after = mark_leg(&leg, Some(&inst), 23000.0, expiry + Duration::days(1), &iv, params);
        assert_eq!(after.model, PriceModel::Settled);
        assert_eq!(after.price, 23000.0);

        let no_expiry = mark_leg(&leg, Some(&future(None)), 23100.0, now(), &iv, params);
        assert_eq!(no_expiry.model, PriceModel::MissingExpiry);
        assert_eq!(no_expiry.price, 23100.0);
    }

    #[test]
    fn test_mismatched_instrument_holds_entry_price() {
        let leg = Leg::future(Side::Buy, "F", 23000.0);
        let inst = option(23000.0, OptionType::Call, now());
        let params = PricingParams::with_rate(RATE);
        let mark = mark_leg(&leg, Some(&inst), 25000.0, now(), &flat_iv(0.15), params);
        assert_eq!(mark.model, PriceModel::EntryPrice);
        assert_eq!(scaled_pnl(&leg, mark.price), 0.0);
    }

    #[test]
    fn test_pnl_at_scenario_uses_lookup() {
        let expiry = now() + Duration::days(30);
        let mut lookup = MockInstrumentLookup::new();
        lookup
            .expect_instrument()
            .withf(|token| token == "F")
            .returning(move |_| Some(future(Some(expiry))));

        let leg = Leg::future(Side::Sell, "F", 23000.0).with_lot_size(50);
        let pnl = pnl_at_scenario(&leg, 23000.0, expiry, RATE, &flat_iv(0.15), &lookup);
        assert_eq!(pnl, 0.0);

        let pnl = pnl_at_scenario(&leg, 22900.0, expiry, RATE, &flat_iv(0.15), &lookup);
        assert_eq!(pnl, 5000.0);
    }
}
