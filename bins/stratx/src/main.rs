//! StratX CLI Binary
//!
//! Evaluates option and futures strategies from a strategy file, expands
//! ready-made templates and manages the analytics configuration.

mod document;
mod report;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use analytics::{
    build_template_legs, templates_in, StrategyCategory, StrategyEngine, StrategyTemplate,
    TemplateContext, TEMPLATES,
};
use cli::{CategoryArg, Cli, Commands, OutputFormat};
use common::parse_expiry;
use config::{
    generate_default_config, load_config, save_config, validate_config, AnalyticsConfig, RatioMode,
};
use observability::{init_logging, init_metrics, AnalyticsMetrics, EvaluationTimer, LogFormat};
use tracing::{debug, error, info, warn};

use document::{ScenarioOverrides, StrategyDocument};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let format = LogFormat::parse(cli.log_format.as_str()).unwrap_or_default();
    init_logging("stratx", format)?;
    debug!(?cli, "CLI arguments parsed");

    match cli.command {
        Commands::Evaluate {
            input,
            config,
            target,
            target_date,
            live_spot,
            format,
            percentage,
            reward_risk,
            metrics,
        } => {
            info!("Executing 'evaluate' command");
            let mut config = load_or_default(config.as_deref())?;
            if percentage {
                config.payoff.show_percentage = true;
            }
            if reward_risk {
                config.summary.ratio_mode = RatioMode::RewardRisk;
            }
            let overrides = ScenarioOverrides {
                target_spot: target,
                target_date,
                live_spot,
            };
            evaluate_command(&input, config, &overrides, format, metrics)
        }
        Commands::Build {
            template,
            input,
            expiry,
            lots,
            future,
            config,
        } => {
            info!("Executing 'build' command");
            let config = load_or_default(config.as_deref())?;
            build_command(&template, &input, &expiry, lots, future.as_deref(), &config)
        }
        Commands::Templates { category } => {
            info!("Executing 'templates' command");
            templates_command(category);
            Ok(())
        }
        Commands::Validate { config } => {
            info!("Executing 'validate' command");
            validate_command(&config)
        }
        Commands::Init { output } => {
            info!("Executing 'init' command");
            init_command(output)
        }
    }
}

/// Load and validate a configuration file, or fall back to defaults
fn load_or_default(path: Option<&Path>) -> Result<AnalyticsConfig> {
    let config = match path {
        Some(path) => load_config(path)?,
        None => {
            debug!("No configuration file given, using defaults");
            AnalyticsConfig::default()
        }
    };

    let report = validate_config(&config);
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    if !report.is_valid() {
        for err in &report.errors {
            error!("{}", err);
        }
    }
    report.into_result()?;

    Ok(config)
}

fn evaluate_command(
    input: &Path,
    config: AnalyticsConfig,
    overrides: &ScenarioOverrides,
    format: OutputFormat,
    with_metrics: bool,
) -> Result<()> {
    let document = StrategyDocument::load(input)?;
    let index = document.index();
    let volatility = document.volatility(&index, &config);
    let scenario = document.scenario(&config, overrides)?;

    let engine = StrategyEngine::builder()
        .instrument_lookup(&index)
        .scenario_iv(&volatility)
        .config(config)
        .build()?;

    let handle = if with_metrics { Some(init_metrics()?) } else { None };
    let metrics = handle.as_ref().map(|_| AnalyticsMetrics::new("evaluate"));

    let analysis = {
        let mut timer = metrics.as_ref().map(EvaluationTimer::new);
        let analysis = engine.evaluate(&document.legs, &scenario, &index);
        if let Some(timer) = timer.as_mut() {
            timer.set_counts(
                document.legs.len(),
                analysis.report.excluded.len(),
                analysis.curve.points.len(),
            );
        }
        analysis
    };
    let strikewise = volatility.strikewise(&document.legs, &index);

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "underlying": document.underlying,
                "analysis": analysis,
                "strikewise_iv": strikewise,
            });
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialize analysis")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            print!("{}", report::render_text(&document.underlying, &analysis, &strikewise));
        }
    }

    if let Some(handle) = handle {
        eprintln!("{}", handle.render());
    }

    Ok(())
}

fn build_command(
    template: &str,
    input: &Path,
    expiry: &str,
    lots: u32,
    future: Option<&str>,
    config: &AnalyticsConfig,
) -> Result<()> {
    let document = StrategyDocument::load(input)?;
    let index = document.index();
    let expiry = parse_expiry(expiry).with_context(|| format!("Invalid expiry: '{}'", expiry))?;
    let spot = document
        .live_spot
        .context("Strategy file has no live_spot to pick strikes around")?;

    let ctx = TemplateContext {
        underlying: &document.underlying,
        spot,
        expiry,
        selected_future: future,
        base_lots: lots,
        chain: &index,
        lot_sizes: &config.lot_sizes,
    };
    let legs = build_template_legs(template, &ctx)?;
    info!(template, legs = legs.len(), "Template built");

    let yaml = serde_yaml::to_string(&legs).context("Failed to serialize legs")?;
    print!("{}", yaml);
    Ok(())
}

fn category(arg: CategoryArg) -> StrategyCategory {
    match arg {
        CategoryArg::Bullish => StrategyCategory::Bullish,
        CategoryArg::Bearish => StrategyCategory::Bearish,
        CategoryArg::Neutral => StrategyCategory::Neutral,
        CategoryArg::Volatile => StrategyCategory::Volatile,
        CategoryArg::Others => StrategyCategory::Others,
        CategoryArg::Directional => StrategyCategory::Directional,
        CategoryArg::Spreads => StrategyCategory::Spreads,
    }
}

fn listed_templates(filter: Option<CategoryArg>) -> Vec<&'static StrategyTemplate> {
    match filter {
        Some(arg) => templates_in(category(arg)).collect(),
        None => TEMPLATES.iter().collect(),
    }
}

fn templates_command(filter: Option<CategoryArg>) {
    println!("{:<28} {:<28} {:<12} {:>4}", "ID", "Name", "Category", "Legs");
    for template in listed_templates(filter) {
        println!(
            "{:<28} {:<28} {:<12} {:>4}",
            template.id,
            template.name,
            format!("{:?}", template.category),
            template.legs.len()
        );
    }
}

fn validate_command(config_path: &Path) -> Result<()> {
    info!(path = ?config_path, "Validating configuration");

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("Configuration is valid");
    Ok(())
}

fn init_command(output: PathBuf) -> Result<()> {
    info!(path = ?output, "Generating default configuration");

    if output.exists() {
        anyhow::bail!("Refusing to overwrite existing file: {:?}", output);
    }

    let config = generate_default_config();
    save_config(&config, &output)?;

    println!("Configuration written to {:?}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_templates_filter_by_category() {
        assert_eq!(listed_templates(None).len(), TEMPLATES.len());

        let spreads = listed_templates(Some(CategoryArg::Spreads));
        assert_eq!(spreads.len(), 2);
        assert!(spreads.iter().all(|t| t.category == StrategyCategory::Spreads));
    }
}
