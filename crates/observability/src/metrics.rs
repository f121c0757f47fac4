//! Prometheus metrics for strategy evaluations
//!
//! The recorder is installed in-process; callers render the exposition text
//! from the returned handle when they need it.

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::debug!("Metrics recorder installed");
    Ok(handle)
}

/// Metrics for one kind of analysis run.
///
/// # Metrics
///
/// * `stratx_evaluations_total` - Completed evaluations
/// * `stratx_evaluation_duration_seconds` - Evaluation wall time
/// * `stratx_legs_evaluated` - Legs in the last evaluation
/// * `stratx_legs_excluded_total` - Legs left out for missing or mismatched data
/// * `stratx_curve_points` - Payoff curve size
#[derive(Clone)]
pub struct AnalyticsMetrics {
    evaluations_total: Counter,
    evaluation_duration: Histogram,
    legs_evaluated: Gauge,
    legs_excluded: Counter,
    curve_points: Histogram,
    operation: String,
}

impl AnalyticsMetrics {
    pub fn new(operation: &str) -> Self {
        let name = operation.to_string();

        Self {
            evaluations_total: counter!("stratx_evaluations_total", "operation" => name.clone()),
            evaluation_duration: histogram!(
                "stratx_evaluation_duration_seconds",
                "operation" => name.clone()
            ),
            legs_evaluated: gauge!("stratx_legs_evaluated", "operation" => name.clone()),
            legs_excluded: counter!("stratx_legs_excluded_total", "operation" => name.clone()),
            curve_points: histogram!("stratx_curve_points", "operation" => name.clone()),
            operation: name,
        }
    }

    pub fn record_evaluation(
        &self,
        duration: Duration,
        legs: usize,
        excluded: usize,
        points: usize,
    ) {
        self.evaluations_total.increment(1);
        self.evaluation_duration.record(duration.as_secs_f64());
        self.legs_evaluated.set(legs as f64);
        self.legs_excluded.increment(excluded as u64);
        self.curve_points.record(points as f64);
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

/// Records the evaluation on drop.
///
/// ```ignore
/// let metrics = AnalyticsMetrics::new("evaluate");
/// let mut timer = EvaluationTimer::new(&metrics);
/// let analysis = engine.evaluate(&legs, &scenario, &chain);
/// timer.set_counts(legs.len(), analysis.report.excluded.len(), analysis.curve.points.len());
/// ```
pub struct EvaluationTimer<'a> {
    metrics: &'a AnalyticsMetrics,
    start: Instant,
    legs: usize,
    excluded: usize,
    points: usize,
}

impl<'a> EvaluationTimer<'a> {
    pub fn new(metrics: &'a AnalyticsMetrics) -> Self {
        Self {
            metrics,
            start: Instant::now(),
            legs: 0,
            excluded: 0,
            points: 0,
        }
    }

    pub fn set_counts(&mut self, legs: usize, excluded: usize, points: usize) {
        self.legs = legs;
        self.excluded = excluded;
        self.points = points;
    }
}

impl Drop for EvaluationTimer<'_> {
    fn drop(&mut self) {
        self.metrics
            .record_evaluation(self.start.elapsed(), self.legs, self.excluded, self.points);
    }
}
