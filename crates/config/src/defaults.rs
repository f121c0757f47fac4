use std::collections::BTreeMap;

// Pricing defaults
pub fn default_risk_free_rate() -> f64 {
    0.065
}

pub fn default_volatility() -> f64 {
    0.15
}

pub fn default_time_floor() -> f64 {
    1e-9
}

pub fn default_vol_floor() -> f64 {
    1e-4
}

// Payoff curve defaults
pub fn default_points() -> usize {
    200
}

pub fn default_interval_step() -> f64 {
    50.0
}

pub fn default_padding_factor() -> f64 {
    0.10
}

pub fn default_max_range_from_center() -> f64 {
    0.50
}

pub fn default_sd_days() -> u32 {
    30
}

pub fn default_fallback_center() -> f64 {
    50000.0
}

pub fn default_fallback_upper_bound() -> f64 {
    2000.0
}

pub fn default_enabled() -> bool {
    true
}

// Payoff table defaults
pub fn default_rows_each_side() -> usize {
    10
}

// Contract size defaults
pub fn default_lot_size() -> u32 {
    1
}

pub fn default_lot_sizes() -> BTreeMap<String, u32> {
    [("NIFTY", 50), ("BANKNIFTY", 15), ("FINNIFTY", 40)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub fn default_strike_step() -> f64 {
    50.0
}

pub fn default_strike_steps() -> BTreeMap<String, f64> {
    [("NIFTY", 50.0), ("BANKNIFTY", 100.0)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
