use clap::Parser;
use okr_metrics::utils::error::ErrorSeverity;
use okr_metrics::utils::{logger, validation::Validate};
use okr_metrics::{
    CliArgs, DashboardConfig, DashboardEngine, DashboardPipeline, FileRowSource, LocalStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting okr-metrics");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match DashboardConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    if let Some(source) = &args.source {
        config.source.path = source.clone();
        tracing::info!("🔧 Source overridden to: {}", source);
    }
    if let Some(output) = &args.output {
        config.load.output_path = output.clone();
        tracing::info!("🔧 Output path overridden to: {}", output);
    }

    // 驗證配置；缺少 KR 定義是唯一會在啟動時中止的情況
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!(
        "✅ Configuration loaded: {} objectives, {} KRs",
        config.objectives.len(),
        config.total_krs()
    );

    // 格式在讀取時才解析，無法判斷時降級為「無資料」
    let source = FileRowSource::new(
        LocalStorage::new(".".to_string()),
        config.source_path().to_string(),
        config.source.format.clone(),
        config.source.sheet.clone(),
    );
    let storage = LocalStorage::new(config.output_path().to_string());
    let vocabulary = config.vocabulary();
    let engine = DashboardEngine::new(DashboardPipeline::new(source, storage, config, vocabulary));

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no output will be written");
        let report = engine.build_report().await?;
        for kr in report.kr_records() {
            tracing::info!(
                "{:<32} ← {:<32} {:>10} / {:<10} {:>3}% {}",
                kr.name,
                kr.matched_row.as_deref().unwrap_or("—"),
                kr.current_display,
                kr.target_display,
                kr.progress_pct,
                kr.status
            );
        }
        for diagnostic in &report.diagnostics {
            tracing::warn!("🩺 {}", diagnostic);
        }
        println!(
            "Dry run: {} KRs, average progress {}%, {} diagnostics",
            report.summary.total_krs,
            report.summary.avg_progress,
            report.diagnostics.len()
        );
        return Ok(());
    }

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Dashboard build completed successfully!");
            println!("✅ Dashboard build completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Dashboard build failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

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
    }

    Ok(())
}
