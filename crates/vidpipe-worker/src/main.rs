//! Trigger server binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidpipe_media::{check_ffmpeg, check_ffprobe, FfmpegEngine};
use vidpipe_storage::S3Store;
use vidpipe_worker::metrics::init_metrics;
use vidpipe_worker::{router, Pipeline, PipelineConfig, ServerConfig, TriggerState};

const DEFAULT_LOG_FILTER: &str = "vidpipe_worker=info,vidpipe_media=info,vidpipe_storage=info,tower_http=info";

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let server_config = ServerConfig::from_env();
    init_tracing(server_config.json_logs);

    info!("Starting vidpipe-worker");

    if let Err(e) = run(server_config).await {
        error!("Worker error: {:#}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

/// Colored output for dev, JSON for production.
fn init_tracing(json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if json {
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

async fn run(server_config: ServerConfig) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env().context("invalid pipeline configuration")?;
    info!("Pipeline config: {:?}", config);

    for check in [check_ffmpeg(), check_ffprobe()] {
        if let Err(e) = check {
            warn!("{}; every invocation will fail until it is installed", e);
        }
    }

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    let store = S3Store::from_env()
        .await
        .context("failed to create storage client")?;
    let engine = FfmpegEngine::new().with_timeout(config.ffmpeg_timeout_secs);

    tokio::fs::create_dir_all(&server_config.work_dir)
        .await
        .with_context(|| format!("failed to create {}", server_config.work_dir.display()))?;

    let pipeline = Pipeline::new(
        Arc::new(store),
        Arc::new(engine),
        Arc::new(config),
        server_config.work_dir.clone(),
    );
    let app = router(TriggerState::new(pipeline, metrics));

    let addr = server_config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");
}
