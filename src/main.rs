use clap::Parser;
use lesson_churn::config::AnalysisConfig;
use lesson_churn::utils::error::{AnalysisError, ErrorSeverity};
use lesson_churn::utils::{logger, validation::Validate};
use lesson_churn::{AnalysisEngine, CliConfig, CsvDataLoader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting lesson-churn");
    if let Some(path) = &args.config {
        tracing::info!("📁 Loading configuration from: {}", path);
    }

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    tracing::info!("✅ Configuration loaded and validated successfully");

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No analysis will run");
        perform_dry_run(&config)?;
        return Ok(());
    }

    let monitor_enabled = args.monitor_enabled(&config);
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let engine = AnalysisEngine::new_with_monitoring(
        CsvDataLoader::new(&config.source.path),
        config.catalog()?,
        config.filter_chain()?,
        config.to_request(),
        monitor_enabled,
    );

    match engine.run().await {
        Ok(outcome) => {
            let json = if args.compact {
                serde_json::to_string(&outcome)?
            } else {
                serde_json::to_string_pretty(&outcome)?
            };
            println!("{}", json);
            tracing::info!(
                "✅ {} finished: {} months, {} skipped records",
                config.name(),
                outcome.monthly_metrics.len(),
                outcome.skipped.len()
            );
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn exit_with(e: AnalysisError) {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Analysis failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}

fn perform_dry_run(config: &AnalysisConfig) -> Result<(), Box<dyn std::error::Error>> {
    let month_or = |month: Option<lesson_churn::MonthKey>, fallback: &str| {
        month.map_or_else(|| fallback.to_string(), |m| m.to_string())
    };

    println!("📋 Configuration Summary:");
    println!("  Analysis: {}", config.name());
    println!("  Source: {}", config.source.path);
    println!("  Billing mode: {}", config.analysis.billing_mode);
    println!(
        "  Window: {} ..= {}",
        month_or(config.analysis.from_month, "earliest start"),
        month_or(config.analysis.to_month, "latest activity")
    );
    if let Some(as_of) = config.analysis.as_of {
        println!("  As of: {}", as_of);
    }
    println!("  Overrides: {}", config.overrides.len());

    println!();
    println!("🧮 Plan Catalog:");
    for plan in config.catalog()?.plans() {
        let costs: Vec<String> = plan.cost_options.iter().map(|c| c.to_string()).collect();
        println!(
            "  {} ({}, {} months, {}x/week): {}",
            plan.label,
            plan.lesson_type,
            plan.duration_months,
            plan.weekly_frequency,
            costs.join(", ")
        );
    }

    println!();
    println!("🔎 Filters:");
    let chain = config.filter_chain()?;
    if chain.is_empty() {
        println!("  (none)");
    }
    for description in chain.active_filters() {
        println!("  - {}", description);
    }

    Ok(())
}
