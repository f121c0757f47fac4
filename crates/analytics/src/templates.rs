//! Ready-made strategies
//!
//! A fixed catalogue of option and futures templates and the strike
//! selection used to expand a template into concrete legs against an
//! instrument chain.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::{debug, warn};

use common::{
    expiry_label, FutureInstrument, InstrumentIndex, Leg, OptionInstrument, OptionType, Side,
};
use config::LotSizeTable;

use crate::error::{AnalyticsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyCategory {
    Bullish,
    Bearish,
    Neutral,
    Volatile,
    Others,
    /// Futures: outright long or short
    Directional,
    /// Futures: calendar spreads
    Spreads,
}

/// Which option expiry a template leg trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirySelector {
    Selected,
    NextAvailable,
}

/// Which futures contract a template leg trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractSelector {
    Selected,
    Nearest,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "leg_type", rename_all = "lowercase")]
pub enum TemplateLeg {
    Option {
        side: Side,
        option_type: OptionType,
        /// Strikes away from ATM; positive is higher
        strike_offset_steps: i32,
        lots_ratio: u32,
        expiry: ExpirySelector,
    },
    Future {
        side: Side,
        contract: ContractSelector,
        lots_ratio: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategyTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub category: StrategyCategory,
    pub legs: &'static [TemplateLeg],
    pub requires_different_expiries: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

impl StrategyTemplate {
    pub fn is_futures(&self) -> bool {
        self.legs.iter().all(|l| matches!(l, TemplateLeg::Future { .. }))
    }
}

const fn opt(
    side: Side,
    option_type: OptionType,
    strike_offset_steps: i32,
    lots_ratio: u32,
) -> TemplateLeg {
    TemplateLeg::Option {
        side,
        option_type,
        strike_offset_steps,
        lots_ratio,
        expiry: ExpirySelector::Selected,
    }
}

const fn opt_next(side: Side, option_type: OptionType, strike_offset_steps: i32) -> TemplateLeg {
    TemplateLeg::Option {
        side,
        option_type,
        strike_offset_steps,
        lots_ratio: 1,
        expiry: ExpirySelector::NextAvailable,
    }
}

const fn fut(side: Side, contract: ContractSelector) -> TemplateLeg {
    TemplateLeg::Future {
        side,
        contract,
        lots_ratio: 1,
    }
}

const BASE_TEMPLATE: StrategyTemplate = StrategyTemplate {
    id: "",
    name: "",
    category: StrategyCategory::Others,
    legs: &[],
    requires_different_expiries: false,
    description: None,
};

macro_rules! template {
    (
        $id:literal,
        $name:literal,
        $category:expr,
        [$($leg:expr),+ $(,)?]
        $(, $field:ident = $value:expr)* $(,)?
    ) => {
        StrategyTemplate {
            id: $id,
            name: $name,
            category: $category,
            legs: &[$($leg),+],
            $($field: $value,)*
            ..BASE_TEMPLATE
        }
    };
}

use ContractSelector::{Nearest, Next, Selected as SelectedContract};
use OptionType::{Call as CE, Put as PE};
use Side::{Buy, Sell};
use StrategyCategory::*;

pub static TEMPLATES: &[StrategyTemplate] = &[
    // Bullish
    template!("buy_call", "Buy Call", Bullish, [opt(Buy, CE, 0, 1)]),
    template!("sell_put", "Sell Put", Bullish, [opt(Sell, PE, 0, 1)]),
    template!(
        "bull_call_spread",
        "Bull Call Spread",
        Bullish,
        [opt(Buy, CE, -1, 1), opt(Sell, CE, 1, 1)],
    ),
    template!(
        "bull_put_spread",
        "Bull Put Spread",
        Bullish,
        [opt(Sell, PE, 1, 1), opt(Buy, PE, -1, 1)],
    ),
    template!(
        "long_synthetic_future_options",
        "Long Synthetic (Options)",
        Bullish,
        [opt(Buy, CE, 0, 1), opt(Sell, PE, 0, 1)],
    ),
    template!(
        "range_forward_bullish",
        "Range Forward (Bullish)",
        Bullish,
        [opt(Buy, CE, 1, 1), opt(Sell, PE, -1, 1)],
        description = Some("Buy OTM call, sell OTM put"),
    ),
    // Bearish
    template!("buy_put", "Buy Put", Bearish, [opt(Buy, PE, 0, 1)]),
    template!("sell_call", "Sell Call", Bearish, [opt(Sell, CE, 0, 1)]),
    template!(
        "bear_put_spread",
        "Bear Put Spread",
        Bearish,
        [opt(Buy, PE, 1, 1), opt(Sell, PE, -1, 1)],
    ),
    template!(
        "bear_call_spread",
        "Bear Call Spread",
        Bearish,
        [opt(Sell, CE, -1, 1), opt(Buy, CE, 1, 1)],
    ),
    template!(
        "short_synthetic_future_options",
        "Short Synthetic (Options)",
        Bearish,
        [opt(Sell, CE, 0, 1), opt(Buy, PE, 0, 1)],
    ),
    // Neutral
    template!(
        "long_calendar_calls",
        "Long Calendar (Calls)",
        Neutral,
        [opt(Sell, CE, 0, 1), opt_next(Buy, CE, 0)],
        requires_different_expiries = true,
        description = Some("Sell near-term ATM call, buy longer-term ATM call"),
    ),
    template!(
        "short_straddle",
        "Short Straddle",
        Neutral,
        [opt(Sell, CE, 0, 1), opt(Sell, PE, 0, 1)],
    ),
    template!(
        "short_strangle",
        "Short Strangle",
        Neutral,
        [opt(Sell, CE, 1, 1), opt(Sell, PE, -1, 1)],
    ),
    template!(
        "iron_condor",
        "Iron Condor",
        Neutral,
        [opt(Sell, PE, -1, 1), opt(Buy, PE, -2, 1), opt(Sell, CE, 1, 1), opt(Buy, CE, 2, 1)],
    ),
    template!(
        "long_call_butterfly",
        "Long Call Butterfly",
        Neutral,
        [opt(Buy, CE, -1, 1), opt(Sell, CE, 0, 2), opt(Buy, CE, 1, 1)],
    ),
    template!(
        "long_put_butterfly",
        "Long Put Butterfly",
        Neutral,
        [opt(Buy, PE, 1, 1), opt(Sell, PE, 0, 2), opt(Buy, PE, -1, 1)],
    ),
    // Volatile
    template!(
        "call_ratio_back_spread",
        "Call Ratio Back Spread",
        Volatile,
        [opt(Sell, CE, -1, 1), opt(Buy, CE, 0, 2)],
    ),
    template!(
        "put_ratio_back_spread",
        "Put Ratio Back Spread",
        Volatile,
        [opt(Sell, PE, 1, 1), opt(Buy, PE, 0, 2)],
    ),
    template!("long_straddle", "Long Straddle", Volatile, [opt(Buy, CE, 0, 1), opt(Buy, PE, 0, 1)]),
    template!(
        "long_strangle",
        "Long Strangle",
        Volatile,
        [opt(Buy, CE, 1, 1), opt(Buy, PE, -1, 1)],
    ),
    // Others
    template!(
        "range_forward_other",
        "Range Forward",
        Others,
        [opt(Buy, CE, 1, 1), opt(Sell, PE, -1, 1)],
    ),
    // Futures
    template!(
        "long_future",
        "Long Future",
        Directional,
        [fut(Buy, SelectedContract)],
        description = Some("Buy the selected futures contract"),
    ),
    template!(
        "short_future",
        "Short Future",
        Directional,
        [fut(Sell, SelectedContract)],
        description = Some("Sell the selected futures contract"),
    ),
    template!(
        "futures_calendar_spread_long",
        "Long Calendar Spread (Futures)",
        Spreads,
        [fut(Sell, Nearest), fut(Buy, Next)],
        requires_different_expiries = true,
        description = Some("Sell near-month future, buy next-month future"),
    ),
    template!(
        "futures_calendar_spread_short",
        "Short Calendar Spread (Futures)",
        Spreads,
        [fut(Buy, Nearest), fut(Sell, Next)],
        requires_different_expiries = true,
        description = Some("Buy near-month future, sell next-month future"),
    ),
];

pub fn find_template(id: &str) -> Option<&'static StrategyTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

pub fn templates_in(
    category: StrategyCategory,
) -> impl Iterator<Item = &'static StrategyTemplate> {
    TEMPLATES.iter().filter(move |t| t.category == category)
}

/// Strike nearest to `spot`; ties keep the earlier strike.
pub fn find_atm_strike(spot: f64, strikes: &[f64]) -> Option<f64> {
    strikes
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .reduce(|prev, curr| {
            if (curr - spot).abs() < (prev - spot).abs() {
                curr
            } else {
                prev
            }
        })
}

/// Strike `steps` positions away from ATM, clamped to the ends of the chain.
pub fn find_strike_by_offset_steps(spot: f64, strikes: &[f64], steps: i32) -> Option<f64> {
    let sorted: Vec<f64> = strikes
        .iter()
        .filter(|s| s.is_finite())
        .map(|s| OrderedFloat(*s))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|s| s.0)
        .collect();

    let atm = find_atm_strike(spot, &sorted)?;
    let atm_index = sorted.iter().position(|s| *s == atm)?;
    let target = (atm_index as i64 + steps as i64).clamp(0, sorted.len() as i64 - 1);

    sorted.get(target as usize).copied()
}

/// Market state a template is expanded against.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub underlying: &'a str,
    pub spot: f64,
    /// Expiry option legs trade unless they ask for the next one
    pub expiry: DateTime<Utc>,
    /// Token of the futures contract picked by the user
    pub selected_future: Option<&'a str>,
    /// Lots multiplied into every leg's ratio
    pub base_lots: u32,
    pub chain: &'a InstrumentIndex,
    pub lot_sizes: &'a LotSizeTable,
}

impl<'a> TemplateContext<'a> {
    fn belongs(&self, underlying: Option<&str>) -> bool {
        underlying.map_or(true, |u| u.eq_ignore_ascii_case(self.underlying))
    }

    fn options(&self) -> impl Iterator<Item = (&'a str, &'a OptionInstrument)> + '_ {
        self.chain
            .iter()
            .filter_map(|(token, details)| details.as_option().map(|o| (token, o)))
            .filter(|(_, o)| self.belongs(o.underlying.as_deref()))
    }

    /// Futures ordered by expiry, undated contracts last
    fn futures(&self) -> Vec<(&'a str, &'a FutureInstrument)> {
        let mut futures: Vec<(&'a str, &'a FutureInstrument)> = self
            .chain
            .iter()
            .filter_map(|(token, details)| details.as_future().map(|f| (token, f)))
            .filter(|(_, f)| self.belongs(f.underlying.as_deref()))
            .collect();
        futures.sort_by_key(|(_, f)| (f.expiry.is_none(), f.expiry));
        futures
    }

    fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.options().map(|(_, o)| o.expiry).filter(|e| *e > self.expiry).min()
    }

    fn lot_size(&self, instrument_lot_size: Option<u32>) -> u32 {
        instrument_lot_size
            .filter(|size| *size > 0)
            .unwrap_or_else(|| self.lot_sizes.lot_size_for(self.underlying))
    }

    fn lots(&self, ratio: u32) -> u32 {
        self.base_lots.max(1) * ratio.max(1)
    }
}

/// Expand `template` into concrete legs priced at the instruments' last price.
pub fn build_legs(template: &StrategyTemplate, ctx: &TemplateContext<'_>) -> Result<Vec<Leg>> {
    let legs = template
        .legs
        .iter()
        .map(|leg| match *leg {
            TemplateLeg::Option {
                side,
                option_type,
                strike_offset_steps,
                lots_ratio,
                expiry,
            } => build_option_leg(
                template,
                ctx,
                side,
                option_type,
                strike_offset_steps,
                lots_ratio,
                expiry,
            ),
            TemplateLeg::Future {
                side,
                contract,
                lots_ratio,
            } => build_future_leg(ctx, side, contract, lots_ratio),
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(template = template.id, legs = legs.len(), "Template expanded");
    Ok(legs)
}

/// Look up a template by id and expand it.
pub fn build_template_legs(id: &str, ctx: &TemplateContext<'_>) -> Result<Vec<Leg>> {
    let template =
        find_template(id).ok_or_else(|| AnalyticsError::UnknownTemplate(id.to_string()))?;
    build_legs(template, ctx)
}

fn build_option_leg(
    template: &StrategyTemplate,
    ctx: &TemplateContext<'_>,
    side: Side,
    option_type: OptionType,
    steps: i32,
    lots_ratio: u32,
    selector: ExpirySelector,
) -> Result<Leg> {
    let expiry = match selector {
        ExpirySelector::NextAvailable if template.requires_different_expiries => ctx
            .next_expiry()
            .ok_or_else(|| AnalyticsError::NoNextExpiry(expiry_label(&ctx.expiry)))?,
        _ => ctx.expiry,
    };

    let at_expiry: Vec<(&str, &OptionInstrument)> =
        ctx.options().filter(|(_, o)| o.expiry == expiry).collect();
    let strikes: Vec<f64> = at_expiry.iter().map(|(_, o)| o.strike).collect();

    let strike = find_strike_by_offset_steps(ctx.spot, &strikes, steps).ok_or_else(|| {
        AnalyticsError::EmptyChain {
            underlying: ctx.underlying.to_string(),
            expiry: expiry_label(&expiry),
        }
    })?;

    let (token, option) = at_expiry
        .iter()
        .find(|(_, o)| o.strike == strike && o.option_type == option_type)
        .ok_or_else(|| {
            AnalyticsError::MissingInstrument(format!(
                "{}{} {}",
                strike,
                option_type.code(),
                expiry_label(&expiry)
            ))
        })?;

    let symbol = option.symbol.clone().unwrap_or_else(|| {
        format!("{} {} {}{}", ctx.underlying, expiry_label(&expiry), strike, option_type.code())
    });

    Ok(
        Leg::option(side, *token, strike, option_type, option.last_price.unwrap_or(0.0))
            .with_lots(ctx.lots(lots_ratio))
            .with_lot_size(ctx.lot_size(option.lot_size))
            .with_symbol(symbol),
    )
}

fn build_future_leg(
    ctx: &TemplateContext<'_>,
    side: Side,
    contract: ContractSelector,
    lots_ratio: u32,
) -> Result<Leg> {
    let futures = ctx.futures();
    if futures.is_empty() {
        return Err(AnalyticsError::MissingContract(format!(
            "no futures listed for {}",
            ctx.underlying
        )));
    }

    let (token, future) = match contract {
        ContractSelector::Selected => {
            let selected = ctx.selected_future.ok_or_else(|| {
                AnalyticsError::MissingContract("no futures contract selected".to_string())
            })?;
            futures
                .iter()
                .find(|(token, _)| *token == selected)
                .copied()
                .ok_or_else(|| AnalyticsError::MissingContract(selected.to_string()))?
        }
        ContractSelector::Nearest => futures[0],
        ContractSelector::Next => match futures.get(1) {
            Some(next) => *next,
            None => {
                warn!(
                    underlying = ctx.underlying,
                    "Only one futures contract listed, using nearest for next"
                );
                futures[0]
            }
        },
    };

    let symbol = future
        .symbol
        .clone()
        .unwrap_or_else(|| format!("{} Future", ctx.underlying));

    Ok(Leg::future(side, token, future.last_price.unwrap_or(0.0))
        .with_lots(ctx.lots(lots_ratio))
        .with_lot_size(ctx.lot_size(future.lot_size))
        .with_symbol(symbol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};
    use common::InstrumentDetails;

    fn near() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 30, 10, 0, 0).unwrap()
    }

    fn far() -> DateTime<Utc> {
        near() + Duration::days(28)
    }

    fn option(strike: f64, option_type: OptionType, expiry: DateTime<Utc>) -> InstrumentDetails {
        InstrumentDetails::Option(OptionInstrument {
            strike,
            expiry,
            option_type,
            last_price: Some(strike / 100.0),
            symbol: None,
            underlying: Some("NIFTY".to_string()),
            iv: None,
            oi: None,
            lot_size: None,
        })
    }

    fn future(expiry: DateTime<Utc>, price: f64) -> InstrumentDetails {
        InstrumentDetails::Future(FutureInstrument {
            expiry: Some(expiry),
            last_price: Some(price),
            symbol: None,
            underlying: Some("NIFTY".to_string()),
            lot_size: Some(25),
        })
    }

    fn chain() -> InstrumentIndex {
        let mut index = InstrumentIndex::new();
        // Far month listed first to check ordering
        index.insert("FUT-JUN", future(far(), 23_150.0));
        index.insert("FUT-MAY", future(near(), 23_050.0));
        for (expiry, tag) in [(near(), "MAY"), (far(), "JUN")] {
            for strike in [22_900.0, 22_950.0, 23_000.0, 23_050.0, 23_100.0] {
                for (code, option_type) in [("CE", OptionType::Call), ("PE", OptionType::Put)] {
                    let token = format!("{tag}-{strike}-{code}");
                    index.insert(token, option(strike, option_type, expiry));
                }
            }
        }
        index
    }

    fn context<'a>(chain: &'a InstrumentIndex, lot_sizes: &'a LotSizeTable) -> TemplateContext<'a> {
        TemplateContext {
            underlying: "NIFTY",
            spot: 23_010.0,
            expiry: near(),
            selected_future: None,
            base_lots: 1,
            chain,
            lot_sizes,
        }
    }

    #[test]
    fn test_atm_and_offsets() {
        let strikes = [23_100.0, 22_900.0, 23_000.0, 22_950.0, 23_050.0];

        assert_eq!(find_atm_strike(23_010.0, &[22_900.0, 23_000.0, 23_050.0]), Some(23_000.0));
        assert_eq!(find_strike_by_offset_steps(23_010.0, &strikes, 0), Some(23_000.0));
        assert_eq!(find_strike_by_offset_steps(23_010.0, &strikes, 1), Some(23_050.0));
        assert_eq!(find_strike_by_offset_steps(23_010.0, &strikes, -2), Some(22_900.0));
        // Clamped at the edges
        assert_eq!(find_strike_by_offset_steps(23_010.0, &strikes, 10), Some(23_100.0));
        assert_eq!(find_strike_by_offset_steps(23_010.0, &strikes, -10), Some(22_900.0));
        assert_eq!(find_strike_by_offset_steps(23_010.0, &[], 0), None);
    }

    #[test]
    fn test_atm_tie_keeps_lower_strike() {
        assert_eq!(find_atm_strike(23_025.0, &[23_000.0, 23_050.0]), Some(23_000.0));
    }

    #[test]
    fn test_catalogue_ids_are_unique() {
        let ids: BTreeSet<&str> = TEMPLATES.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), TEMPLATES.len());
        assert!(find_template("iron_condor").is_some());
        assert!(find_template("does_not_exist").is_none());
        assert_eq!(templates_in(StrategyCategory::Spreads).count(), 2);
        assert!(find_template("long_future").unwrap().is_futures());
    }

    #[test]
    fn test_iron_condor_legs() {
        let chain = chain();
        let lot_sizes = LotSizeTable::default();
        let ctx = context(&chain, &lot_sizes);

        let legs = build_template_legs("iron_condor", &ctx).unwrap();

        let shape: Vec<(Side, OptionType, f64)> = legs
            .iter()
            .map(|l| (l.side, l.option_type().unwrap(), l.strike().unwrap()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (Side::Sell, OptionType::Put, 22_950.0),
                (Side::Buy, OptionType::Put, 22_900.0),
                (Side::Sell, OptionType::Call, 23_050.0),
                (Side::Buy, OptionType::Call, 23_100.0),
            ]
        );
        // Lot size falls back to the table for NIFTY
        assert!(legs.iter().all(|l| l.lot_size == 50 && l.lots == 1));
        assert_eq!(legs[0].token, "MAY-22950-PE");
        assert_eq!(legs[0].price, 229.5);
    }

    #[test]
    fn test_ratio_multiplies_base_lots() {
        let chain = chain();
        let lot_sizes = LotSizeTable::default();
        let ctx = TemplateContext {
            base_lots: 3,
            ..context(&chain, &lot_sizes)
        };

        let legs = build_template_legs("long_call_butterfly", &ctx).unwrap();

        let lots: Vec<u32> = legs.iter().map(|l| l.lots).collect();
        assert_eq!(lots, vec![3, 6, 3]);
    }

    #[test]
    fn test_calendar_uses_next_expiry() {
        let chain = chain();
        let lot_sizes = LotSizeTable::default();
        let ctx = context(&chain, &lot_sizes);

        let legs = build_template_legs("long_calendar_calls", &ctx).unwrap();

        assert_eq!(legs[0].token, "MAY-23000-CE");
        assert_eq!(legs[1].token, "JUN-23000-CE");

        let last = TemplateContext {
            expiry: far(),
            ..context(&chain, &lot_sizes)
        };
        assert_matches!(
            build_template_legs("long_calendar_calls", &last),
            Err(AnalyticsError::NoNextExpiry(_))
        );
    }

    #[test]
    fn test_futures_selection() {
        let chain = chain();
        let lot_sizes = LotSizeTable::default();
        let ctx = context(&chain, &lot_sizes);

        let spread = build_template_legs("futures_calendar_spread_long", &ctx).unwrap();
        assert_eq!(spread[0].token, "FUT-MAY");
        assert_eq!(spread[0].side, Side::Sell);
        assert_eq!(spread[1].token, "FUT-JUN");
        assert_eq!(spread[1].lot_size, 25);

        assert_matches!(
            build_template_legs("long_future", &ctx),
            Err(AnalyticsError::MissingContract(_))
        );

        let selected = TemplateContext {
            selected_future: Some("FUT-JUN"),
            ..context(&chain, &lot_sizes)
        };
        let long = build_template_legs("long_future", &selected).unwrap();
        assert_eq!(long[0].price, 23_150.0);
        assert_eq!(long[0].symbol.as_deref(), Some("NIFTY Future"));
    }

    #[test]
    fn test_missing_expiry_and_template() {
        let chain = chain();
        let lot_sizes = LotSizeTable::default();
        let ctx = TemplateContext {
            expiry: near() + Duration::days(7),
            ..context(&chain, &lot_sizes)
        };

        assert_matches!(
            build_template_legs("buy_call", &ctx),
            Err(AnalyticsError::EmptyChain { .. })
        );
        assert_matches!(
            build_template_legs("covered_call", &ctx),
            Err(AnalyticsError::UnknownTemplate(id)) if id == "covered_call"
        );
    }
}
