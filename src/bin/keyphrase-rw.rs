//! keyphrase-rw: consume concept suggestions and serve keyphrase annotations.
//!
//! Usage:
//!   keyphrase-rw [--port 8080] [--db path] [--feed -|path] [--throttle 1000]

use clap::Parser;
use keyphrase_rw::http;
use keyphrase_rw::ingest::{IngestPipeline, JsonLinesFeed, PipelineConfig, PipelineHandle};
use keyphrase_rw::{AnnotationService, OpenGateway, SqliteGateway};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(
    name = "keyphrase-rw",
    version,
    about = "Consumes concept suggestions, extracts keyphrases and writes them to a graph store"
)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Path to SQLite database file
    #[arg(long, env = "DB_PATH")]
    db: Option<PathBuf>,

    /// Feed messages consumed per second
    #[arg(long, env = "THROTTLE", default_value = "1000")]
    throttle: NonZeroU32,

    /// Maximum number of annotation writes in flight
    #[arg(long, env = "MAX_IN_FLIGHT", default_value_t = keyphrase_rw::ingest::DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Expected Origin-System-Id of feed messages
    #[arg(long, env = "ORIGIN_SYSTEM", default_value = keyphrase_rw::ingest::DEFAULT_ORIGIN_SYSTEM)]
    origin_system: String,

    /// JSON-lines feed to consume: `-` for stdin, or a file path
    #[arg(long, env = "FEED")]
    feed: Option<String>,
}

/// Get the default database path (~/.local/share/keyphrase-rw/keyphrase.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("keyphrase-rw").join("keyphrase.db")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}

async fn start_pipeline(
    service: AnnotationService,
    config: PipelineConfig,
    feed: &str,
) -> Result<PipelineHandle, String> {
    let pipeline = IngestPipeline::new(service, config);
    let handle = if feed == "-" {
        info!("consuming feed from stdin");
        pipeline.start(JsonLinesFeed::stdin())
    } else {
        info!(path = feed, "consuming feed from file");
        let reader = JsonLinesFeed::open(feed)
            .await
            .map_err(|e| format!("Failed to open feed {}: {}", feed, e))?;
        pipeline.start(reader)
    };
    Ok(handle)
}

async fn run(cli: Cli) -> Result<(), String> {
    let db_path = cli.db.unwrap_or_else(default_db_path);
    let gateway = SqliteGateway::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    info!(db = %db_path.display(), "graph store opened");

    let service = AnnotationService::new(Arc::new(gateway));
    service
        .initialise()
        .await
        .map_err(|e| format!("Failed to initialise store: {}", e))?;

    let pipeline = match cli.feed.as_deref() {
        Some(feed) => {
            let config = PipelineConfig::default()
                .with_throttle_rate(cli.throttle)
                .with_max_in_flight(cli.max_in_flight)
                .with_origin_system(cli.origin_system);
            Some(start_pipeline(service.clone(), config, feed).await?)
        }
        None => {
            info!("no feed configured, serving HTTP only");
            None
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;
    info!(%addr, "listening");

    axum::serve(listener, http::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    if let Some(pipeline) = pipeline {
        pipeline.shutdown().await;
        pipeline
            .join()
            .await
            .map_err(|e| format!("Ingest pipeline failed: {}", e))?;
    }

    info!("stopped");
    Ok(())
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("keyphrase_rw=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run(cli));
    // A stdin read parked on the blocking pool must not hold the process open
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
