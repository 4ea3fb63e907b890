// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::{http::header::CONTENT_TYPE, http::StatusCode, response::IntoResponse, routing::get, Router};
use clap::Parser;
use k8s_openapi::api::core::v1::Service;
use kube::Client;
use nacos_bridge::{
    constants::{
        DEFAULT_DEBOUNCE_SECS, DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_STATUS_QUEUE_CAPACITY,
        METRICS_SERVER_DEFAULT_ADDRESS, METRICS_SERVER_PATH, TOKIO_WORKER_THREADS,
    },
    engine::SyncEngine,
    metrics::gather_metrics,
    registry::{NacosRegistry, Registry},
    scheduler::Scheduler,
    status::{KubeStore, StatusUpdateHandler},
    watch::watch_cluster,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Keeps a Nacos service registry in sync with Kubernetes services and nodes.
#[derive(Debug, Parser)]
#[command(name = "nacos-bridge", version, about)]
struct Args {
    /// Quiet period after the last cache change before a rebuild runs
    #[arg(long, env = "NACOS_BRIDGE_DEBOUNCE_SECS", default_value_t = DEFAULT_DEBOUNCE_SECS)]
    debounce_secs: u64,

    /// Capacity of the write-back queue; requests beyond it are dropped
    #[arg(
        long,
        env = "NACOS_BRIDGE_STATUS_QUEUE_CAPACITY",
        default_value_t = DEFAULT_STATUS_QUEUE_CAPACITY
    )]
    status_queue_capacity: usize,

    /// Listen address of the metrics endpoint, empty to disable it
    #[arg(long, env = "NACOS_BRIDGE_METRICS_ADDR", default_value = METRICS_SERVER_DEFAULT_ADDRESS)]
    metrics_addr: String,

    /// Log output format: `text` or `json`
    #[arg(long, env = "RUST_LOG_FORMAT", default_value = "text")]
    log_format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("nacos-bridge")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    init_logging(&args.log_format);

    info!("Starting Nacos bridge");
    debug!(?args, "Parsed arguments");

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    debug!("Kubernetes client initialized successfully");

    let cancel = CancellationToken::new();

    let status_handler =
        StatusUpdateHandler::<Service, _>::new(KubeStore::new(client.clone()), args.status_queue_capacity);
    let registries: Vec<Box<dyn Registry>> = vec![Box::new(NacosRegistry::new())];
    let engine = SyncEngine::new(registries, status_handler.writer());
    let (scheduler, events) = Scheduler::new(
        engine,
        Duration::from_secs(args.debounce_secs),
        DEFAULT_EVENT_QUEUE_CAPACITY,
    );

    let status_task = tokio::spawn(status_handler.run(cancel.clone()));
    let mut scheduler_task = tokio::spawn(scheduler.run(cancel.clone()));
    let watch_task = tokio::spawn(watch_cluster(client, events, cancel.clone()));
    let metrics_task = if args.metrics_addr.is_empty() {
        info!("Metrics endpoint disabled");
        None
    } else {
        Some(tokio::spawn(run_metrics_server(args.metrics_addr.clone(), cancel.clone())))
    };

    tokio::select! {
        () = shutdown_signal() => info!("Shutdown signal received"),
        result = &mut scheduler_task => {
            error!(panicked = result.is_err(), "CRITICAL: scheduler exited unexpectedly");
            cancel.cancel();
            anyhow::bail!("scheduler exited unexpectedly");
        }
    }

    cancel.cancel();
    let (status, scheduler, watch) = tokio::join!(status_task, scheduler_task, watch_task);
    status.context("Write-back handler panicked")?;
    scheduler.context("Scheduler panicked")?;
    watch.context("Watch feed panicked")?;
    if let Some(task) = metrics_task {
        task.await.context("Metrics server panicked")?;
    }

    info!("Nacos bridge stopped");
    Ok(())
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`). `format` selects `json` or compact text.
fn init_logging(format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

/// Run the metrics endpoint, logging a failure when it happens.
///
/// A metrics failure never stops the bridge.
async fn run_metrics_server(addr: String, cancel: CancellationToken) {
    if let Err(e) = serve_metrics(addr.clone(), cancel).await {
        let reason = format!("{e:#}");
        error!(address = %addr, error = %reason, "Metrics endpoint unavailable");
    }
}

/// Serve Prometheus metrics until `cancel` fires.
async fn serve_metrics(addr: String, cancel: CancellationToken) -> Result<()> {
    let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind metrics endpoint on {addr}"))?;

    info!(address = %addr, path = METRICS_SERVER_PATH, "Serving metrics");
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("Metrics server failed")
}

async fn metrics_handler() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
