//! Sourcing Collector - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use sourcing_collector::cli::{Cli, Commands, RunArgs};
use sourcing_collector::config::{CollectorConfig, StorageTarget};
use sourcing_collector::dedup;
use sourcing_collector::feeds::HttpSnapshotPolicy;
use sourcing_collector::framework::{Orchestrator, RunContext};
use sourcing_collector::notify::{NoopNotifier, Notifier, WebhookNotifier};
use sourcing_collector::storage::{LocalBackend, ObjectBackend, ObjectStore, S3Backend};
use sourcing_common::logging::{init_logging, LogConfig, LogLevel};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const EXIT_CANDIDATE_FAILURES: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let base = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .log_file_prefix("sourcing-collector")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn,sqlx=warn,hyper=warn")
        .build();
    let log_config = match base.with_env_overrides() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid logging configuration: {e:#}");
            return ExitCode::from(EXIT_FATAL);
        }
    };
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e:#}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match cli.command {
        Commands::Run(args) => match run(*args).await {
            Ok(code) => code,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Run failed");
                eprintln!("Error: {e:#}");
                ExitCode::from(EXIT_FATAL)
            }
        },
    }
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let config = args.into_config().context("Invalid configuration")?;

    info!(
        feed_group = %config.feed_group,
        environment = %config.environment,
        source = %config.source_url,
        "Starting collector"
    );

    let orchestrator = build_orchestrator(&config).await?;
    let policy = HttpSnapshotPolicy::new(config.snapshot_config())?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    let ctx = RunContext::new(config.feed_group.clone(), config.environment);
    let result = orchestrator
        .run(&policy, &ctx, config.run_options(), &cancel)
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.has_failures() {
        Ok(ExitCode::from(EXIT_CANDIDATE_FAILURES))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn build_orchestrator(config: &CollectorConfig) -> Result<Orchestrator> {
    let backend: Arc<dyn ObjectBackend> = match &config.storage {
        StorageTarget::S3(s3) => Arc::new(S3Backend::new(s3.clone()).await?),
        StorageTarget::Local(root) => Arc::new(LocalBackend::new(root.clone())),
    };
    let store = ObjectStore::new(backend, config.storage_prefix.clone());

    let dedup_index = dedup::connect(&config.dedup_url)
        .await
        .context("Failed to open dedup index")?;

    let notifier: Arc<dyn Notifier> = match &config.notify_url {
        Some(url) => Arc::new(WebhookNotifier::new(
            url.clone(),
            Duration::from_secs(config.notify_timeout_secs),
        )?),
        None => Arc::new(NoopNotifier),
    };

    Ok(Orchestrator::new(
        dedup_index,
        store,
        notifier,
        config.orchestrator_settings(),
    ))
}

/// Cancel the run on Ctrl+C or SIGTERM
async fn cancel_on_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Shutdown requested, no new candidates will be started");
    cancel.cancel();
}
