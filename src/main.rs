use clap::Parser;
use taxi_etl::config::Command;
use taxi_etl::core::schedule::DailySchedule;
use taxi_etl::core::TransformSummary;
use taxi_etl::utils::error::ErrorSeverity;
use taxi_etl::utils::{logger, validation::Validate};
use taxi_etl::{
    BigQueryClient, CliConfig, EtlEngine, EtlError, LocalStorage, TaxiPipeline, TomlConfig,
};

type Engine = EtlEngine<TaxiPipeline<LocalStorage, BigQueryClient>>;

fn fail(e: &EtlError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn build_engine(cli: &CliConfig, config: &TomlConfig) -> taxi_etl::Result<Engine> {
    let storage = LocalStorage::new(config.paths.data_dir.clone());

    let pipeline = if cli.command.needs_warehouse() {
        // 在任何階段開始前先驗證倉儲設定
        let warehouse = config.warehouse_config()?;
        tracing::debug!("Warehouse config: {:?}", warehouse);
        TaxiPipeline::new(
            storage,
            BigQueryClient::new(&warehouse),
            &config.paths,
            warehouse.destination.clone(),
            warehouse.poll_interval,
        )
    } else {
        TaxiPipeline::without_loader(storage, &config.paths)
    };

    Ok(
        EtlEngine::new_with_monitoring(pipeline, config.paths.clone(), config.monitoring.enabled)
            .with_retry_policy(config.retry_policy()),
    )
}

fn display_dry_run(config: &TomlConfig, engine: &Engine) {
    println!("📋 Pipeline Summary:");
    println!("  Data dir:  {}", config.paths.data_dir);
    println!("  Raw:       {}", config.paths.raw);
    println!("  Staging:   {}", config.paths.staging);
    println!("  Processed: {}", config.paths.processed);
    if let Some(destination) = engine.pipeline().destination() {
        println!("  Destination: {} (WRITE_TRUNCATE)", destination);
    }
    let retry = config.retry_policy();
    println!(
        "  Retries per stage: {} (delay {}s)",
        retry.retries,
        retry.delay.as_secs()
    );
}

fn print_transform_summary(summary: &TransformSummary) {
    println!(
        "📊 Rows: {} in, {} out, {} dropped",
        summary.rows_in,
        summary.rows_out,
        summary.rows_dropped()
    );
    for (column, count) in &summary.unparsed {
        println!("   Unparseable {}: {}", column, count);
    }
}

async fn run_daily(engine: &Engine, schedule: DailySchedule) {
    loop {
        let now = chrono::Utc::now();
        let next = schedule.next_after(now);
        tracing::info!("⏰ Next run at {}", next);
        tokio::time::sleep(schedule.wait_from(now)).await;

        match engine.run().await {
            Ok(report) => tracing::info!(
                destination = %report.destination,
                rows_in = report.transform.rows_in,
                rows_out = report.transform.rows_out,
                dropped = report.transform.rows_dropped(),
                "✅ Scheduled run completed"
            ),
            Err(e) => tracing::error!(
                category = ?e.category(),
                "❌ Scheduled run failed: {}",
                e
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting taxi-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = cli.resolve().unwrap_or_else(|e| fail(&e));

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }

    let engine = build_engine(&cli, &config).unwrap_or_else(|e| fail(&e));
    if engine.monitoring_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    match &cli.command {
        Command::Run { dry_run: true } => {
            tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
            display_dry_run(&config, &engine);
        }
        Command::Run { dry_run: false } => match engine.run().await {
            Ok(report) => {
                println!("✅ ETL process completed successfully!");
                println!("📁 Staging file: {}", report.staged_path);
                println!("📁 Processed file: {}", report.processed_path);
                println!("🗄️ Loaded into: {}", report.destination);
                print_transform_summary(&report.transform);
            }
            Err(e) => fail(&e),
        },
        Command::Schedule => {
            let schedule = config.daily_schedule().unwrap_or_else(|e| fail(&e));
            run_daily(&engine, schedule).await;
        }
        command => {
            // 單一階段：由外部排程器依序呼叫
            if let Some(stage) = command.stage() {
                match engine.run_stage(stage).await {
                    Ok(output) => println!("✅ {} finished: {}", stage, output),
                    Err(e) => fail(&e),
                }
            }
        }
    }

    Ok(())
}
