use crate::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("{field} must be a positive float, got: {value}")]
    InvalidPositiveFloat { field: String, value: f64 },

    #[error("{field} must be a finite non-negative number, got: {value}")]
    InvalidNonNegative { field: String, value: f64 },

    #[error("{field} must be in [0, 1), got: {value}")]
    InvalidFraction { field: String, value: f64 },

    #[error("Lot size for '{underlying}' must be a positive integer")]
    InvalidLotSize { underlying: String },

    #[error("Strike step for '{underlying}' must be positive, got: {value}")]
    InvalidStrikeStep { underlying: String, value: f64 },
}

/// Raised when a configuration fails validation
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Configuration is invalid: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// Turn the report into a result, dropping warnings
    pub fn into_result(self) -> Result<(), ConfigError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(self.errors))
        }
    }
}

pub fn validate_config(config: &AnalyticsConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_pricing(&config.pricing, &mut report);
    validate_payoff(&config.payoff, &mut report);
    validate_table(&config.table, &mut report);
    validate_lot_sizes(&config.lot_sizes, &mut report);

    if config.summary.breakeven_decimals > 6 {
        report.add_warning(
            "summary.breakeven_decimals",
            "More than 6 decimals exposes interpolation noise in breakevens",
        );
    }

    report
}

fn non_negative(field: &str, value: f64, report: &mut ValidationReport) {
    if !value.is_finite() || value < 0.0 {
        report.add_error(ValidationError::InvalidNonNegative {
            field: field.to_string(),
            value,
        });
    }
}

fn positive(field: &str, value: f64, report: &mut ValidationReport) {
    if !value.is_finite() || value <= 0.0 {
        report.add_error(ValidationError::InvalidPositiveFloat {
            field: field.to_string(),
            value,
        });
    }
}

fn validate_pricing(pricing: &PricingConfig, report: &mut ValidationReport) {
    if !pricing.risk_free_rate.is_finite() {
        report.add_error(ValidationError::InvalidNonNegative {
            field: "pricing.risk_free_rate".to_string(),
            value: pricing.risk_free_rate,
        });
    } else if pricing.risk_free_rate < 0.0 {
        report.add_warning("pricing.risk_free_rate", "Negative rate discounts upwards");
    }

    positive("pricing.default_volatility", pricing.default_volatility, report);
    non_negative("pricing.time_floor", pricing.time_floor, report);
    non_negative("pricing.vol_floor", pricing.vol_floor, report);

    if pricing.default_volatility > 3.0 {
        report.add_warning(
            "pricing.default_volatility",
            "Volatility is a decimal; values above 3.0 look like percentages",
        );
    }
}

fn validate_payoff(payoff: &PayoffConfig, report: &mut ValidationReport) {
    if payoff.points == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "payoff.points".to_string(),
        });
    }

    positive("payoff.interval_step", payoff.interval_step, report);
    positive("payoff.fallback_upper_bound", payoff.fallback_upper_bound, report);
    non_negative("payoff.fallback_center", payoff.fallback_center, report);

    if !(0.0..1.0).contains(&payoff.padding_factor) {
        report.add_error(ValidationError::InvalidFraction {
            field: "payoff.padding_factor".to_string(),
            value: payoff.padding_factor,
        });
    }

    if !(payoff.max_range_from_center > 0.0 && payoff.max_range_from_center < 1.0) {
        report.add_error(ValidationError::InvalidFraction {
            field: "payoff.max_range_from_center".to_string(),
            value: payoff.max_range_from_center,
        });
    }

    if payoff.sd_days == 0 {
        report.add_warning("payoff.sd_days", "sd_days is 0; SD bands are disabled");
    }

    if payoff.points > 5000 {
        report.add_warning("payoff.points", "Large point counts slow down curve generation");
    }
}

fn validate_table(table: &TableConfig, report: &mut ValidationReport) {
    if let Some(interval) = table.interval {
        positive("table.interval", interval, report);
    }

    if table.rows_each_side == 0 {
        report.add_warning("table.rows_each_side", "Payoff table will only contain the center row");
    }
}

fn validate_lot_sizes(table: &LotSizeTable, report: &mut ValidationReport) {
    if table.default_lot_size == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "lot_sizes.default_lot_size".to_string(),
        });
    }

    for (underlying, size) in &table.sizes {
        if *size == 0 {
            report.add_error(ValidationError::InvalidLotSize {
                underlying: underlying.clone(),
            });
        }
    }

    positive("lot_sizes.default_strike_step", table.default_strike_step, report);

    for (underlying, step) in &table.strike_steps {
        if !step.is_finite() || *step <= 0.0 {
            report.add_error(ValidationError::InvalidStrikeStep {
                underlying: underlying.clone(),
                value: *step,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_config_is_valid() {
        let report = validate_config(&AnalyticsConfig::default());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let mut config = AnalyticsConfig::default();
        config.payoff.points = 0;
        config.payoff.padding_factor = 1.5;
        config.pricing.vol_floor = -1.0;
        config.lot_sizes.sizes.insert("NIFTY".to_string(), 0);
        config.table.interval = Some(0.0);

        let report = validate_config(&config);

        assert_eq!(report.errors.len(), 5);
        assert!(report.errors.contains(&ValidationError::InvalidLotSize {
            underlying: "NIFTY".to_string()
        }));
        assert!(report.errors.contains(&ValidationError::InvalidPositiveFloat {
            field: "table.interval".to_string(),
            value: 0.0
        }));
        assert_matches!(
            report.into_result(),
            Err(ConfigError::Invalid(errors)) if errors.len() == 5
        );
    }

    #[test]
    fn test_zero_sd_days_warns() {
        let mut config = AnalyticsConfig::default();
        config.payoff.sd_days = 0;

        let report = validate_config(&config);

        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].field, "payoff.sd_days");
    }
}
