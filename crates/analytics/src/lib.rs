//! Strategy analytics for StratX
//!
//! Projects the risk/reward profile of multi-leg option and futures
//! strategies under a scenario (target spot and target date).
//!
//! # Modules
//!
//! - [`valuation`] - Single-leg expiry value and scenario marks
//! - [`aggregator`] - Per-leg rows and portfolio totals at one scenario point
//! - [`payoff`] - Payoff curve over a spot range with SD bands
//! - [`summary`] - Max profit/loss, breakevens and risk/reward
//! - [`table`] - Payoff table around the scenario target
//! - [`templates`] - Ready-made strategies and strike selection
//! - [`engine`] - Builder facade running every analysis
//!
//! Every analysis is a pure function of its inputs. Data problems degrade to
//! fallbacks; only missing collaborators and template expansion return errors.

pub mod aggregator;
pub mod engine;
pub mod error;
pub mod payoff;
pub mod summary;
pub mod table;
pub mod templates;
pub mod types;
pub mod valuation;

pub use aggregator::{
    ExcludedLeg, ExclusionReason, LegRow, ScenarioAggregator, ScenarioReport, StrategyTotals,
};
pub use engine::{StrategyAnalysis, StrategyEngine, StrategyEngineBuilder};
pub use error::{AnalyticsError, Result};
pub use payoff::{PayoffCurve, PayoffCurveGenerator, PayoffPoint, SdBands, SdLevel, SdSummary};
pub use summary::{ExposureProfile, PnlBound, RiskReward, RiskSummary, RiskSummaryAnalyzer};
pub use table::{snap_to_interval, PayoffTableGenerator, PayoffTableRow};
pub use templates::{
    build_legs, build_template_legs, find_atm_strike, find_strike_by_offset_steps, find_template,
    templates_in, StrategyCategory, StrategyTemplate, TemplateContext, TemplateLeg, TEMPLATES,
};
pub use types::{EvaluationPoint, Scenario, ScenarioMode};
pub use valuation::{
    mark_leg, pnl_at_expiry, pnl_at_scenario, scaled_pnl, theoretical_price_at_scenario,
    value_at_expiry, LegMark, PriceModel, PricingParams,
};
