use crate::config::toml_config::AnalysisConfig;
use crate::domain::model::{BillingMode, MonthKey};
use crate::utils::error::Result;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "lesson-churn")]
#[command(about = "Monthly churn and revenue analysis for lesson subscriptions")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Customer export to analyze (overrides source.path)
    #[arg(short, long)]
    pub input: Option<String>,

    /// First month of the window, YYYY-MM
    #[arg(long)]
    pub from: Option<MonthKey>,

    /// Last month of the window, YYYY-MM
    #[arg(long)]
    pub to: Option<MonthKey>,

    #[arg(long, value_enum)]
    pub billing_mode: Option<BillingMode>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Log memory and timing per phase
    #[arg(long)]
    pub monitor: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Show the resolved configuration without running the analysis
    #[arg(long)]
    pub dry_run: bool,

    /// Print the result as single-line JSON
    #[arg(long)]
    pub compact: bool,
}

impl CliConfig {
    /// Loads the config file when one is given, then layers the flags on top.
    pub fn load_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path)?,
            None => AnalysisConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut AnalysisConfig) {
        if let Some(input) = &self.input {
            config.source.path = input.clone();
        }
        if self.from.is_some() {
            config.analysis.from_month = self.from;
        }
        if self.to.is_some() {
            config.analysis.to_month = self.to;
        }
        if let Some(mode) = self.billing_mode {
            config.analysis.billing_mode = mode;
        }
    }

    pub fn monitor_enabled(&self, config: &AnalysisConfig) -> bool {
        self.monitor || config.monitoring_enabled()
    }
}
