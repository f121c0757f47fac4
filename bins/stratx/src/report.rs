//! Plain text rendering of a strategy analysis

use std::fmt::Write;

use analytics::{PnlBound, ScenarioMode, StrategyAnalysis};
use common::StrikewiseIv;

fn bound(value: PnlBound) -> String {
    match value {
        PnlBound::Unlimited => "Unlimited".to_string(),
        PnlBound::Finite(v) => format!("{:.2}", v),
        PnlBound::NotAvailable => "N/A".to_string(),
    }
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

pub fn render_text(
    underlying: &str,
    analysis: &StrategyAnalysis,
    strikewise: &[StrikewiseIv],
) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, underlying, analysis, strikewise);
    out
}

fn write_report(
    out: &mut String,
    underlying: &str,
    analysis: &StrategyAnalysis,
    strikewise: &[StrikewiseIv],
) -> std::fmt::Result {
    let report = &analysis.report;

    writeln!(out, "=== {} Strategy ===", underlying)?;
    writeln!(out)?;

    match report.mode {
        ScenarioMode::Projected => writeln!(
            out,
            "Scenario: projected, spot {:.2} on {}",
            report.spot,
            report.date.format("%Y-%m-%d %H:%M UTC")
        )?,
        ScenarioMode::Live => writeln!(out, "Scenario: live, spot {:.2}", report.spot)?,
    }
    writeln!(out)?;

    writeln!(
        out,
        "{:<28} {:>10} {:>10} {:>10} {:>12} {:>9} {:>9} {:>9} {:>9}",
        "Leg", "Entry", "LTP", "Proj.", "P&L", "Delta", "Gamma", "Theta", "Vega"
    )?;
    for row in &report.rows {
        writeln!(
            out,
            "{:<28} {:>10.2} {:>10} {:>10.2} {:>12.2} {:>9.4} {:>9.6} {:>9.2} {:>9.2}",
            row.label,
            row.entry_price,
            optional(row.ltp),
            row.projected_price,
            row.pnl,
            row.position_greeks.delta,
            row.position_greeks.gamma,
            row.position_greeks.theta,
            row.position_greeks.vega
        )?;
    }
    let totals = &report.totals;
    writeln!(
        out,
        "{:<28} {:>10} {:>10} {:>10} {:>12.2} {:>9.4} {:>9.6} {:>9.2} {:>9.2}",
        "Total",
        "",
        "",
        "",
        totals.projected_pnl,
        totals.delta,
        totals.gamma,
        totals.theta,
        totals.vega
    )?;

    if !report.excluded.is_empty() {
        writeln!(out)?;
        writeln!(out, "Excluded legs ({}):", report.excluded.len())?;
        for leg in &report.excluded {
            writeln!(out, "  {} ({:?})", leg.token, leg.reason)?;
        }
    }

    let summary = &analysis.summary;
    writeln!(out)?;
    writeln!(out, "Max profit:      {}", bound(summary.max_profit))?;
    writeln!(out, "Max loss:        {}", bound(summary.max_loss))?;
    writeln!(out, "Risk/reward:     {}", summary.risk_reward)?;
    let breakevens = if summary.breakevens.is_empty() {
        "N/A".to_string()
    } else {
        summary
            .breakevens
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(" & ")
    };
    writeln!(out, "Breakevens:      {}", breakevens)?;
    writeln!(out, "Intrinsic value: {}", optional(summary.intrinsic_value))?;
    writeln!(out, "Time value:      {}", optional(summary.time_value))?;

    if let Some(sd) = &analysis.sd_summary {
        writeln!(out)?;
        writeln!(out, "SD moves ({} days, IV {:.2}%):", sd.days, sd.volatility * 100.0)?;
        for level in &sd.levels {
            writeln!(
                out,
                "  {}SD: {:.2} pts ({:.2}%)  {:.2} - {:.2}",
                level.level, level.points, level.percent, level.low, level.high
            )?;
        }
    }

    if !strikewise.is_empty() {
        writeln!(out)?;
        writeln!(out, "Strike-wise IV:")?;
        for row in strikewise {
            writeln!(
                out,
                "  {:<24} {:>7} -> {:>7} ({})",
                row.label,
                optional(row.original),
                optional(row.effective),
                optional(row.change)
            )?;
        }
    }

    let points = &analysis.curve.points;
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        writeln!(out)?;
        writeln!(
            out,
            "Payoff curve: {} points from {:.2} to {:.2}",
            points.len(),
            first.spot,
            last.spot
        )?;
    }

    if !analysis.table.is_empty() {
        writeln!(out)?;
        writeln!(out, "{:>12} {:>14} {:>14}", "Target", "P&L @ target", "P&L @ expiry")?;
        for row in &analysis.table {
            let marker = if row.is_current_target { " *" } else { "" };
            writeln!(
                out,
                "{:>12.0} {:>14.2} {:>14.2}{}",
                row.target_price, row.pnl_at_target_date, row.pnl_at_expiry, marker
            )?;
        }
    }

    Ok(())
}
