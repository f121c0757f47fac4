//! Time to expiry

use chrono::{DateTime, Utc};

/// Days in a year for all year-fraction calculations
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Milliseconds in a [`DAYS_PER_YEAR`] year
pub const MILLIS_PER_YEAR: f64 = DAYS_PER_YEAR * 86_400_000.0;

/// Year fraction from `as_of` until `expiry`, clamped at zero once expired.
pub fn time_to_expiry(expiry: DateTime<Utc>, as_of: DateTime<Utc>) -> f64 {
    let millis = (expiry - as_of).num_milliseconds() as f64;
    (millis / MILLIS_PER_YEAR).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_full_year() {
        let as_of = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let expiry = as_of + Duration::hours(24 * 365 + 6);
        assert!((time_to_expiry(expiry, as_of) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_expired_is_zero() {
        let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let expiry = Utc.with_ymd_and_hms(2024, 5, 30, 10, 0, 0).unwrap();
        assert_eq!(time_to_expiry(expiry, as_of), 0.0);
        assert_eq!(time_to_expiry(as_of, as_of), 0.0);
    }
}
