//! Speaker clip worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sclip_firestore::RecordRepository;
use sclip_media::{check_ffmpeg, ClipExtractor, FetchConfig, MediaFetcher};
use sclip_storage::SpacesClient;
use sclip_worker::metrics::init_metrics;
use sclip_worker::{PipelineSettings, RecordPipeline, Scheduler, SchedulerSettings, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting sclip-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Err(e) = init_metrics(config.metrics_addr) {
        error!("{}", e);
        std::process::exit(1);
    }

    match check_ffmpeg() {
        Ok(path) => info!("Using ffmpeg at {}", path.display()),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }

    let store = match RecordRepository::from_env().await {
        Ok(repo) => repo,
        Err(e) => {
            error!("Failed to create record store: {}", e);
            std::process::exit(1);
        }
    };

    let spaces = match SpacesClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = spaces.check_connectivity().await {
        error!("Storage bucket unreachable: {}", e);
        std::process::exit(1);
    }

    let fetcher = match MediaFetcher::new(FetchConfig::from_env()) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create media fetcher: {}", e);
            std::process::exit(1);
        }
    };

    let extractor =
        ClipExtractor::new(config.clip_extension.clone()).with_timeout(config.ffmpeg_timeout_secs);

    let pipeline = Arc::new(RecordPipeline::new(
        Arc::new(store),
        Arc::new(fetcher),
        Arc::new(extractor),
        Arc::new(spaces),
        PipelineSettings::from_config(&config),
    ));

    if let Err(e) = pipeline.ping_store().await {
        error!("Record store unreachable: {}", e);
        std::process::exit(1);
    }

    let scheduler = Arc::new(Scheduler::new(
        pipeline,
        SchedulerSettings::from_config(&config),
    ));

    let signal_scheduler = Arc::clone(&scheduler);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_scheduler.shutdown();
    });

    if let Err(e) = scheduler.run().await {
        error!("Scheduler error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "sclip=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
