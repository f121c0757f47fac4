//! Shared types for pricing

use common::OptionType;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Lower bound applied to forward and strike before taking logarithms.
pub const MIN_PRICE: f64 = 1e-6;

/// Inputs for Black-76 pricing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Black76Inputs {
    /// Forward price of the underlying for the option's remaining life
    pub forward: f64,
    /// Strike price
    pub strike: f64,
    /// Time to expiry (in years)
    pub time: f64,
    /// Annualised risk-free rate used for discounting
    pub rate: f64,
    /// Implied volatility (as decimal, e.g., 0.15 = 15%)
    pub vol: f64,
    /// Option type
    pub option_type: OptionType,
}

impl Black76Inputs {
    pub fn new(
        forward: f64,
        strike: f64,
        time: f64,
        rate: f64,
        vol: f64,
        option_type: OptionType,
    ) -> Self {
        Self {
            forward,
            strike,
            time,
            rate,
            vol,
            option_type,
        }
    }

    /// Clamp time and volatility to the given floors and prices to [`MIN_PRICE`]
    pub fn floored(mut self, time_floor: f64, vol_floor: f64) -> Self {
        self.time = self.time.max(time_floor);
        self.vol = self.vol.max(vol_floor);
        self.forward = self.forward.max(MIN_PRICE);
        self.strike = self.strike.max(MIN_PRICE);
        self
    }

    /// Discount factor `e^{-rT}`
    pub fn discount(&self) -> f64 {
        (-self.rate * self.time).exp()
    }
}

/// Option Greeks
///
/// Theta is per calendar day and vega per one volatility point (1%).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// Delta: ∂V/∂F
    pub delta: f64,
    /// Gamma: ∂²V/∂F²
    pub gamma: f64,
    /// Theta: value lost per day
    pub theta: f64,
    /// Vega: value change per 1% volatility
    pub vega: f64,
}

impl Greeks {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Greeks of one unit of a future: delta 1, everything else 0
    pub fn future() -> Self {
        Self {
            delta: 1.0,
            ..Self::default()
        }
    }

    /// Multiply every Greek by `factor`
    pub fn scale(self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            theta: self.theta * factor,
            vega: self.vega * factor,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.delta.is_finite()
            && self.gamma.is_finite()
            && self.theta.is_finite()
            && self.vega.is_finite()
    }
}

impl Add for Greeks {
    type Output = Greeks;

    fn add(self, rhs: Greeks) -> Greeks {
        Greeks {
            delta: self.delta + rhs.delta,
            gamma: self.gamma + rhs.gamma,
            theta: self.theta + rhs.theta,
            vega: self.vega + rhs.vega,
        }
    }
}

impl AddAssign for Greeks {
    fn add_assign(&mut self, rhs: Greeks) {
        *self = *self + rhs;
    }
}

impl Sum for Greeks {
    fn sum<I: Iterator<Item = Greeks>>(iter: I) -> Greeks {
        iter.fold(Greeks::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeks_scale_and_sum() {
        let g = Greeks {
            delta: 0.5,
            gamma: 0.01,
            theta: -2.0,
            vega: 3.0,
        };
        let total: Greeks = vec![g, g.scale(-1.0), Greeks::future()].into_iter().sum();

        assert_eq!(total.delta, 1.0);
        assert_eq!(total.gamma, 0.0);
        assert_eq!(total.theta, 0.0);
        assert_eq!(total.vega, 0.0);
    }

    #[test]
    fn test_inputs_floored() {
        let inputs = Black76Inputs::new(0.0, 100.0, 0.0, 0.05, 0.0, OptionType::Call)
            .floored(1e-9, 1e-4);
        assert_eq!(inputs.time, 1e-9);
        assert_eq!(inputs.vol, 1e-4);
        assert_eq!(inputs.forward, MIN_PRICE);
    }
}
