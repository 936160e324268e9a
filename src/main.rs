//! `dual-listener` demo binary.
//!
//! Serves `/health` and `/hello/{name}` on the application port and the
//! Prometheus scrape endpoint on the metrics port until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use axum::{extract::Path, http::Method};
use clap::Parser;

use dual_listener::config::{load_config, Settings, Strategy};
use dual_listener::lifecycle::signals::wait_for_termination;
use dual_listener::observability::logging;
use dual_listener::{
    with_bind_address, with_failure_mode, with_handlers, with_metrics, with_metrics_path,
    with_metrics_port, with_port, AverageMetrics, Handler, RequestMetrics, Server, SloMetrics,
};

#[derive(Parser)]
#[command(name = "dual-listener")]
#[command(about = "Application + metrics HTTP listeners", long_about = None)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn hello(Path(name): Path<String>) -> String {
    format!("hello, {name}")
}

fn build_metrics(settings: &Settings) -> Result<Arc<dyn RequestMetrics>, prometheus::Error> {
    let registry = prometheus::default_registry();
    let name = &settings.server.name;
    Ok(match settings.metrics.strategy {
        Strategy::Slo => Arc::new(SloMetrics::with_buckets(
            name,
            settings.metrics.buckets.clone(),
            registry,
        )?),
        Strategy::Average => Arc::new(AverageMetrics::new(name, registry)?),
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };

    logging::init(&settings.logging.level);
    tracing::info!("dual-listener v{} starting", env!("CARGO_PKG_VERSION"));

    let metrics = match build_metrics(&settings) {
        Ok(metrics) => metrics,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register request metrics");
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::new([
        with_bind_address(settings.server.bind_address),
        with_port(settings.server.port),
        with_metrics_port(settings.metrics.port),
        with_metrics_path(settings.metrics.path.clone()),
        with_failure_mode(settings.server.failure_mode),
        with_metrics(metrics),
        with_handlers([
            Handler::new("/health", || async { "ok" }),
            Handler::new("/hello/{name}", hello).methods([Method::GET, Method::POST]),
        ]),
    ])
    .await
    {
        Ok(server) => Arc::new(server),
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        port = server.port(),
        metrics_port = server.metrics_port(),
        "Listening for connections"
    );

    let running = tokio::spawn({
        let server = server.clone();
        async move { server.run().await }
    });

    wait_for_termination().await;

    let mut errors = server.shutdown(settings.shutdown.timeout()).await;
    match running.await {
        Ok(run_errors) => errors.extend(run_errors),
        Err(e) => tracing::error!(error = %e, "Server task failed"),
    }

    if errors.is_empty() {
        tracing::info!("Shutdown complete");
        ExitCode::SUCCESS
    } else {
        for e in &errors {
            tracing::error!(error = %e, "Server error");
        }
        ExitCode::FAILURE
    }
}
