use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stratx")]
#[command(about = "StratX - options and futures strategy analytics")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Log output format (logs go to stderr; level from RUST_LOG)
    #[arg(long, global = true, value_enum, default_value = "compact", env = "STRATX_LOG_FORMAT")]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a strategy file: per-leg table, payoff curve, summary and payoff table
    Evaluate {
        /// Strategy file (YAML or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Analytics configuration file; defaults apply when omitted
        #[arg(short, long, env = "STRATX_CONFIG")]
        config: Option<PathBuf>,

        /// Override the scenario target spot
        #[arg(long)]
        target: Option<f64>,

        /// Override the scenario target date (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        target_date: Option<String>,

        /// Override the live underlying spot
        #[arg(long)]
        live_spot: Option<f64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Include P&L as a percentage of the live spot in the curve
        #[arg(long)]
        percentage: bool,

        /// Report reward/risk instead of risk/reward
        #[arg(long)]
        reward_risk: bool,

        /// Print Prometheus metrics for the run to stderr
        #[arg(long)]
        metrics: bool,
    },

    /// Expand a ready-made strategy into legs against an instrument chain
    Build {
        /// Template id (see `stratx templates`)
        #[arg(short, long)]
        template: String,

        /// Strategy file providing the underlying, live spot and instruments
        #[arg(short, long)]
        input: PathBuf,

        /// Option expiry the legs trade (RFC 3339 or YYYY-MM-DD)
        #[arg(short, long)]
        expiry: String,

        /// Lots multiplied into every leg's ratio
        #[arg(long, default_value_t = 1)]
        lots: u32,

        /// Futures contract token for templates trading the selected contract
        #[arg(long)]
        future: Option<String>,

        /// Analytics configuration file for the lot size table
        #[arg(short, long, env = "STRATX_CONFIG")]
        config: Option<PathBuf>,
    },

    /// List the ready-made strategy templates
    Templates {
        /// Only list templates in this category
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },

    /// Validate an analytics configuration file
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "stratx.yaml")]
        config: PathBuf,
    },

    /// Write a configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "stratx.yaml")]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text report
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoryArg {
    Bullish,
    Bearish,
    Neutral,
    Volatile,
    Others,
    Directional,
    Spreads,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_evaluate() {
        let cli = Cli::try_parse_from([
            "stratx",
            "evaluate",
            "--input",
            "strategy.yaml",
            "--target",
            "23500",
            "--target-date",
            "2024-05-20",
            "--format",
            "json",
            "--reward-risk",
        ])
        .unwrap();

        match cli.command {
            Commands::Evaluate {
                input,
                target,
                target_date,
                format,
                reward_risk,
                percentage,
                ..
            } => {
                assert_eq!(input, PathBuf::from("strategy.yaml"));
                assert_eq!(target, Some(23500.0));
                assert_eq!(target_date.as_deref(), Some("2024-05-20"));
                assert_eq!(format, OutputFormat::Json);
                assert!(reward_risk);
                assert!(!percentage);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.log_format, LogFormatArg::Compact);
    }

    #[test]
    fn test_parse_templates_category() {
        let cli = Cli::try_parse_from(["stratx", "templates", "--category", "neutral"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Templates {
                category: Some(CategoryArg::Neutral)
            }
        ));
    }
}
