use clap::Parser;
use dsr_circuits::adapters::meraki::MerakiClient;
use dsr_circuits::adapters::postgres::{create_pool, run_migrations, PgStore};
use dsr_circuits::adapters::rdap::RdapClient;
use dsr_circuits::app::pipelines::{
    EnrichmentPipeline, HardwarePipeline, InventoryPipeline, MatchReportPipeline, ReportOptions,
    TrackingPipeline,
};
use dsr_circuits::config::cli::{Cli, Command};
use dsr_circuits::core::jobs::JobState;
use dsr_circuits::domain::model::CircuitPurpose;
use dsr_circuits::domain::notes::{parse_raw_notes, reformat_speed};
use dsr_circuits::domain::provider::{AliasTable, MappingIndex, MatcherSettings, ProviderMatcher};
use dsr_circuits::utils::error::{DsrError, ErrorSeverity, Result};
use dsr_circuits::utils::{logger, validation::Validate};
use dsr_circuits::{AppConfig, EtlEngine, JobRegistry, LocalStorage};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
struct RunContext {
    config: AppConfig,
    store: Arc<PgStore>,
    monitor: bool,
    dry_run: bool,
}

impl RunContext {
    fn storage(&self) -> LocalStorage {
        LocalStorage::new(&self.config.output.path)
    }

    fn report_options(&self) -> ReportOptions {
        report_options(&self.config)
    }
}

fn report_options(config: &AppConfig) -> ReportOptions {
    ReportOptions {
        compress: config.output.compress,
        bundle_name: config.output.bundle_name.clone(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logger::init_cli_logger(cli.verbose, cli.json_logs);
    tracing::info!("Starting dsr-circuits");

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,      // 警告，但成功
            ErrorSeverity::Medium => 2,   // 可重試
            ErrorSeverity::High => 1,     // 處理錯誤
            ErrorSeverity::Critical => 3, // 系統錯誤
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.command.is_offline() {
        let config = match AppConfig::load_optional(&cli.config) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("⚠️ Ignoring {}: {}", cli.config, e);
                None
            }
        };
        return run_offline(cli.command, config, cli.monitor).await;
    }

    let config = AppConfig::from_file(&cli.config)?;
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        return Err(e);
    }

    let monitor = cli.monitor || config.monitoring_enabled();
    if monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pool = create_pool(&config.database.url, config.database.max_connections).await?;
    if matches!(cli.command, Command::Migrate) {
        run_migrations(&pool, &config.database.migrations_dir).await?;
        println!("✅ Migrations applied");
        return Ok(());
    }

    let ctx = RunContext {
        config,
        store: Arc::new(PgStore::new(pool)),
        monitor,
        dry_run: cli.dry_run,
    };

    let summary = match cli.command {
        Command::RefreshInventory => refresh_inventory(&ctx).await?,
        Command::Enrich => enrich(&ctx).await?,
        Command::MatchReport => match_report(&ctx).await?,
        Command::ImportTracking {
            csv,
            previous,
            date,
        } => import_tracking(&ctx, &csv, previous, date).await?,
        Command::Nightly => nightly(ctx).await?,
        other => return run_offline(other, Some(ctx.config), ctx.monitor).await,
    };

    println!("✅ {}", summary);
    Ok(())
}

async fn run_offline(command: Command, config: Option<AppConfig>, monitor: bool) -> Result<()> {
    match command {
        Command::Match {
            dsr,
            arin,
            purpose,
        } => {
            let (aliases, settings) = match &config {
                Some(c) => (c.matching.alias_table(), c.matching.matcher_settings()),
                None => (AliasTable::with_defaults(), MatcherSettings::default()),
            };
            let matcher = ProviderMatcher::new(aliases, MappingIndex::default(), settings);
            let purpose = purpose.as_deref().and_then(CircuitPurpose::parse);
            let outcome = matcher.match_providers(&dsr, &arin, purpose);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::ParseNotes { text } => {
            let notes = parse_raw_notes(&text);
            println!(
                "WAN1: {} | {}",
                notes.wan1_provider,
                reformat_speed(&notes.wan1_speed, &notes.wan1_provider)
            );
            println!(
                "WAN2: {} | {}",
                notes.wan2_provider,
                reformat_speed(&notes.wan2_speed, &notes.wan2_provider)
            );
        }
        Command::ClassifyHardware { input } => {
            let config_output = config.as_ref().map(|c| c.output.path.clone());
            let output_path = config_output.unwrap_or_else(|| "./output".to_string());
            let mut pipeline =
                HardwarePipeline::new(LocalStorage::new(""), LocalStorage::new(output_path), &input);
            if let Some(c) = &config {
                pipeline = pipeline.with_report_options(report_options(c));
            }
            let summary = EtlEngine::new_with_monitoring(pipeline, monitor).run().await?;
            println!("✅ {}", summary);
        }
        Command::RunScript { program, args } => run_script(&program, &args).await?,
        other => {
            return Err(DsrError::ConfigError {
                message: format!("{:?} needs a database connection", other),
            })
        }
    }
    Ok(())
}

async fn refresh_inventory(ctx: &RunContext) -> Result<String> {
    let config = &ctx.config;
    config.validate_meraki()?;

    let meraki = MerakiClient::new(
        &config.meraki.base_url,
        &config.meraki.api_key,
        config.meraki.per_page,
        config.meraki.retry_policy(),
        config.meraki.timeout(),
    )?;
    let rdap = RdapClient::new(&config.arin.rdap_url, ctx.store.clone(), config.arin.timeout())?
        .with_static_ips(config.arin.static_ips.clone());

    let pipeline = InventoryPipeline::new(
        meraki,
        rdap,
        ctx.store.clone(),
        ctx.storage(),
        &config.meraki.org_name,
    )
    .with_report_options(ctx.report_options());
    EtlEngine::new_with_monitoring(pipeline, ctx.monitor).run().await
}

async fn enrich(ctx: &RunContext) -> Result<String> {
    let pipeline = EnrichmentPipeline::new(
        ctx.store.clone(),
        ctx.storage(),
        ctx.config.matching.alias_table(),
        ctx.config.enrichment.clone(),
    )
    .with_matcher_settings(ctx.config.matching.matcher_settings())
    .with_report_options(ctx.report_options())
    .with_dry_run(ctx.dry_run);
    EtlEngine::new_with_monitoring(pipeline, ctx.monitor).run().await
}

async fn match_report(ctx: &RunContext) -> Result<String> {
    let pipeline = MatchReportPipeline::new(
        ctx.store.clone(),
        ctx.storage(),
        ctx.config.matching.alias_table(),
        ctx.config.matching.matcher_settings(),
    )
    .with_report_options(ctx.report_options());
    EtlEngine::new_with_monitoring(pipeline, ctx.monitor).run().await
}

async fn import_tracking(
    ctx: &RunContext,
    csv: &str,
    previous: Option<String>,
    date: Option<chrono::NaiveDate>,
) -> Result<String> {
    let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let pipeline = TrackingPipeline::new(
        ctx.store.clone(),
        LocalStorage::new(""),
        ctx.storage(),
        csv,
        date,
    )
    .with_previous(previous)
    .with_report_options(ctx.report_options())
    .with_dry_run(ctx.dry_run);
    EtlEngine::new_with_monitoring(pipeline, ctx.monitor).run().await
}

/// Runs the nightly stages one after another; a failed stage does not stop the rest.
async fn nightly(ctx: RunContext) -> Result<String> {
    let registry = JobRegistry::new();
    let mut stages: Vec<&str> = vec!["refresh-inventory"];
    if ctx.config.tracking.csv_path.is_some() {
        stages.push("import-tracking");
    }
    stages.extend(["enrich", "match-report"]);

    let mut failed = Vec::new();
    for stage in &stages {
        let stage_ctx = ctx.clone();
        let stage_name = stage.to_string();
        let id = registry.submit(stage, move |out| async move {
            let summary = match stage_name.as_str() {
                "refresh-inventory" => refresh_inventory(&stage_ctx).await?,
                "import-tracking" => {
                    let tracking = &stage_ctx.config.tracking;
                    let csv = tracking.csv_path.clone().unwrap_or_default();
                    import_tracking(&stage_ctx, &csv, tracking.previous_csv_path.clone(), None)
                        .await?
                }
                "enrich" => enrich(&stage_ctx).await?,
                _ => match_report(&stage_ctx).await?,
            };
            out.line(summary);
            Ok(())
        })?;

        let done = registry.wait(id).await?;
        match done.state {
            JobState::Failed(reason) => {
                tracing::error!("❌ Nightly stage {} failed: {}", stage, reason);
                failed.push(stage.to_string());
            }
            state => {
                let elapsed = done
                    .finished_at
                    .zip(done.started_at)
                    .map(|(end, start)| (end - start).num_seconds())
                    .unwrap_or_default();
                tracing::info!("✅ Nightly stage {} {} in {}s", stage, state, elapsed);
            }
        }
    }

    if failed.is_empty() {
        Ok(format!("Nightly run completed ({} stages)", stages.len()))
    } else {
        Err(DsrError::ProcessingError {
            message: format!("Nightly stages failed: {}", failed.join(", ")),
        })
    }
}

async fn run_script(program: &str, args: &[String]) -> Result<()> {
    let registry = JobRegistry::new();
    let id = registry.spawn_command(program, program, args)?;

    let mut printed = 0;
    loop {
        let snapshot = registry.status(id)?;
        let lines = registry.output(id)?;
        for line in &lines[printed..] {
            println!("{}", line);
        }
        printed = lines.len();
        if !snapshot.state.is_active() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    match registry.wait(id).await?.state {
        JobState::Failed(reason) => Err(DsrError::ProcessingError { message: reason }),
        _ => Ok(()),
    }
}
