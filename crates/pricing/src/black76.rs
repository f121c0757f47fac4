use std::f64::consts::PI;

use common::OptionType;

use crate::types::{Black76Inputs, Greeks, MIN_PRICE};

/// Remaining life at or below which an option is valued at intrinsic.
pub const TIME_EPSILON: f64 = 1e-9;
/// Volatility at or below which an option is valued at intrinsic.
pub const VOL_EPSILON: f64 = 1e-9;
/// Time floor passed to the Greeks on the intrinsic fallback path.
pub const TIME_FLOOR: f64 = 1e-9;
/// Volatility floor passed to the Greeks on the intrinsic fallback path.
pub const VOL_FLOOR: f64 = 1e-4;

const DAYS_IN_YEAR_FOR_THETA: f64 = 365.0;

pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Abramowitz & Stegun 26.2.17).
pub fn norm_cdf(x: f64) -> f64 {
    let k = 1.0 / (1.0 + 0.2316419 * x.abs());
    let poly = k * (0.319381530
        + k * (-0.356563782 + k * (1.781477937 + k * (-1.821255978 + k * 1.330274429))));

    let approx = 1.0 - norm_pdf(x) * poly;

    if x >= 0.0 {
        approx
    } else {
        1.0 - approx
    }
}

pub fn d1_d2(input: &Black76Inputs) -> (f64, f64) {
    let f = input.forward.max(MIN_PRICE);
    let k = input.strike.max(MIN_PRICE);
    let v = input.vol;
    let sqrt_t = input.time.sqrt();

    let d1 = ((f / k).ln() + 0.5 * v * v * input.time) / (v * sqrt_t);
    let d2 = d1 - v * sqrt_t;

    (d1, d2)
}

/// Black-76 price of an option on a forward.
///
/// Requires `time > 0` and `vol > 0`.
pub fn black76_price(input: Black76Inputs) -> f64 {
    let (d1, d2) = d1_d2(&input);
    let f = input.forward.max(MIN_PRICE);
    let k = input.strike;
    let df = input.discount();

    let price = match input.option_type {
        OptionType::Call => df * (f * norm_cdf(d1) - k * norm_cdf(d2)),
        OptionType::Put => df * (k * norm_cdf(-d2) - f * norm_cdf(-d1)),
    };

    price.max(0.0)
}

/// Black-76 Greeks: theta per day, vega per 1% volatility.
///
/// Requires `time > 0` and `vol > 0`; at the boundary pass inputs through
/// [`Black76Inputs::floored`] with [`TIME_FLOOR`] and [`VOL_FLOOR`].
pub fn black76_greeks(input: Black76Inputs) -> Greeks {
    let (d1, d2) = d1_d2(&input);
    let f = input.forward.max(MIN_PRICE);
    let k = input.strike;
    let t = input.time;
    let v = input.vol;
    let r = input.rate;
    let df = input.discount();

    let pdf = norm_pdf(d1);
    let sqrt_t = t.sqrt();

    let delta = match input.option_type {
        OptionType::Call => df * norm_cdf(d1),
        OptionType::Put => df * (norm_cdf(d1) - 1.0),
    };

    let gamma = df * pdf / (f * v * sqrt_t);

    let vega = f * df * pdf * sqrt_t / 100.0;

    let decay = -(f * df * pdf * v) / (2.0 * sqrt_t);
    let theta_annual = match input.option_type {
        OptionType::Call => decay - r * k * df * norm_cdf(d2) + r * f * df * norm_cdf(d1),
        OptionType::Put => decay + r * k * df * norm_cdf(-d2) - r * f * df * norm_cdf(-d1),
    };

    Greeks {
        delta,
        gamma,
        theta: theta_annual / DAYS_IN_YEAR_FOR_THETA,
        vega,
    }
}

pub fn intrinsic_value(spot: f64, strike: f64, option_type: OptionType) -> f64 {
    option_type.intrinsic(spot, strike)
}
