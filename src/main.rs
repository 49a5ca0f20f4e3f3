// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use scanward::config::{self, AppConfig, LogFormat};
use scanward::crawler::{CrawlSummary, Crawler, CrawlerSettings};
use scanward::database::PostgresStore;
use scanward::metrics::{MetricsCollector, MetricsSnapshot};
use scanward::scheduler::SchedulerService;
use scanward::store::{MemoryStore, ScanStore};
use scanward::types::{Finding, NewScan, Scan, ScanConfig, ScanType};
use scanward::worker::ScanWorker;

/// Scanward - scan orchestration and crawling engine
#[derive(Parser)]
#[command(name = "scanward")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version)]
#[command(about = "Crawls a web target, fingerprints it and reports vulnerabilities", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (yaml, toml or json)
    #[arg(short, long, global = true, env = "SCANWARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan to completion and print a JSON report
    Scan {
        /// Target URL
        url: String,

        /// Owning project id (random when omitted)
        #[arg(long)]
        project: Option<Uuid>,

        /// quick, standard or deep
        #[arg(long, default_value = "standard")]
        scan_type: ScanType,

        #[arg(long, default_value = "3")]
        max_depth: u32,

        #[arg(long, default_value = "100")]
        max_pages: u32,

        #[arg(long, default_value = "5")]
        concurrency: u32,

        /// Requests per second
        #[arg(long, default_value = "10")]
        rate_limit: u32,

        /// Ignore robots.txt
        #[arg(long)]
        no_robots: bool,

        /// Allow loopback and private-network targets
        #[arg(long)]
        allow_private: bool,
    },

    /// Run the recurring-scan scheduler until interrupted
    Schedule,

    /// Write a default configuration file
    InitConfig {
        #[arg(default_value = "scanward.yaml")]
        path: PathBuf,
    },
}

/// Printed by `scanward scan`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanReport {
    scan: Scan,
    summary: Option<CrawlSummary>,
    error: Option<String>,
    findings: Vec<Finding>,
    metrics: MetricsSnapshot,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        config::create_default_config(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let app_config = config::load(cli.config.as_deref())?;
    init_tracing(&app_config, cli.debug, cli.json_logs)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("scanward-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli.command, app_config))
}

fn init_tracing(config: &AppConfig, debug: bool, json: bool) -> Result<()> {
    let level = if debug { "debug" } else { config.observability.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json || config.observability.log_format == LogFormat::Json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn connect_store(config: &AppConfig) -> Result<Arc<dyn ScanStore>> {
    if !config.database.enabled {
        info!("Using in-memory scan store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PostgresStore::connect(&config.database).await?;
    if config.database.auto_migrate {
        store.init_schema().await?;
    }
    Ok(Arc::new(store))
}

async fn async_main(command: Commands, app_config: AppConfig) -> Result<()> {
    info!("Scanward v{} - Starting", env!("CARGO_PKG_VERSION"));

    let store = connect_store(&app_config).await?;
    let metrics = Arc::new(MetricsCollector::new(app_config.observability.metrics_enabled));

    match command {
        Commands::Scan {
            url,
            project,
            scan_type,
            max_depth,
            max_pages,
            concurrency,
            rate_limit,
            no_robots,
            allow_private,
        } => {
            let scan_config = ScanConfig {
                scan_type,
                max_depth,
                max_pages,
                concurrency,
                rate_limit,
                check_robots: !no_robots,
                ..ScanConfig::default()
            };
            let mut settings = CrawlerSettings::from(&app_config.scanner);
            settings.allow_private_targets |= allow_private;

            run_single_scan(store, metrics, settings, project.unwrap_or_else(Uuid::new_v4), &url, scan_config)
                .await
        }
        Commands::Schedule => run_scheduler(store, metrics, &app_config).await,
        Commands::InitConfig { .. } => Ok(()),
    }
}

async fn run_single_scan(
    store: Arc<dyn ScanStore>,
    metrics: Arc<MetricsCollector>,
    settings: CrawlerSettings,
    project_id: Uuid,
    url: &str,
    scan_config: ScanConfig,
) -> Result<()> {
    let crawler = Arc::new(Crawler::new(Arc::clone(&store), settings).with_metrics(Arc::clone(&metrics)));
    let worker = ScanWorker::new(crawler, 1);

    let scan = store
        .create_scan(NewScan::new(project_id, url, scan_config))
        .await
        .context("Failed to create scan")?;

    let run = worker.run_to_completion(&scan);
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling scan {}", scan.id);
            worker.cancel_scan(scan.id, "interrupted by operator").await?;
            run.await
        }
    };

    let (summary, error) = match result {
        Ok(summary) => (Some(summary), None),
        Err(e) => {
            error!("Scan {} failed: {}", scan.id, e);
            (None, Some(e.to_string()))
        }
    };

    let report = ScanReport {
        scan: worker.status(scan.id).await?,
        summary,
        error,
        findings: store.list_findings(scan.id).await?,
        metrics: metrics.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.error.is_some() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_scheduler(
    store: Arc<dyn ScanStore>,
    metrics: Arc<MetricsCollector>,
    app_config: &AppConfig,
) -> Result<()> {
    if !app_config.scheduler.enabled {
        warn!("[Scheduler] Disabled in configuration, nothing to do");
        return Ok(());
    }

    let settings = CrawlerSettings::from(&app_config.scanner);
    let crawler = Arc::new(Crawler::new(Arc::clone(&store), settings).with_metrics(Arc::clone(&metrics)));
    let worker = Arc::new(ScanWorker::new(crawler, app_config.scanner.max_concurrent_scans));

    let scheduler = Arc::new(
        SchedulerService::new(store, worker.clone(), app_config.scheduler.tick_interval())
            .with_metrics(Arc::clone(&metrics)),
    );

    let shutdown = CancellationToken::new();
    let scheduler_task = tokio::spawn(Arc::clone(&scheduler).run(shutdown.clone()));
    let metrics_task = tokio::spawn(
        Arc::clone(&metrics).report_periodically(app_config.observability.metrics_interval(), shutdown.clone()),
    );

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    shutdown.cancel();
    if let Err(e) = scheduler_task.await {
        error!("[Scheduler] Task ended abnormally: {}", e);
    }
    worker.shutdown("worker shutting down").await;
    let _ = metrics_task.await;

    info!("[SUCCESS] Stopped cleanly");
    Ok(())
}
