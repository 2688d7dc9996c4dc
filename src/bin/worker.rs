//! `callscribe-worker`: the per-call transcription worker process.
//!
//! Grounded on the teacher crate's `bin/scribble-server/main.rs`: load
//! config, init logging/metrics, serve `/metrics` and `/healthz` on a small
//! axum app, then run the call to completion. Exit codes follow spec §6.7:
//! `0` on clean termination, non-zero on fatal startup error.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use callscribe::config::Config;
use callscribe::orchestrator::HttpOrchestrator;
use callscribe::transport::PlatformSignalingClient;
use callscribe::{logging, metrics, process};

#[tokio::main]
async fn main() {
    logging::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(err) = metrics::init() {
        warn!(error = %err, "metrics disabled (init failed)");
    }

    let orchestrator = match HttpOrchestrator::new(config.site_url.clone(), config.call_id.clone(), config.job_id.clone(), &config.auth_token) {
        Ok(orchestrator) => Arc::new(orchestrator),
        Err(err) => {
            error!(error = %err, "failed to construct orchestrator client");
            std::process::exit(1);
        }
    };

    let metrics_port: u16 = std::env::var("METRICS_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(9090);
    tokio::spawn(serve_metrics(metrics_port));

    let signaling = Arc::new(PlatformSignalingClient);

    // The interrupt listener and the call run concurrently: it only flips the
    // watch channel `process::run` already polls for its own graceful-stop
    // path (join in-flight tracks, stop live captions, stop the transcriber
    // pool) rather than racing and dropping the call future outright.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run_handle = tokio::spawn(process::run(signaling, orchestrator, config, shutdown_rx));
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("received interrupt signal, stopping gracefully");
        let _ = shutdown_tx.send(true);
    });

    let exit_code = match run_handle.await {
        Ok(Ok(())) => {
            info!("call processing finished cleanly");
            0
        }
        Ok(Err(err)) => {
            error!(error = %err, "call processing failed");
            1
        }
        Err(err) => {
            error!(error = %err, "call processing task panicked");
            1
        }
    };

    std::process::exit(exit_code);
}

async fn serve_metrics(port: u16) {
    let app = Router::new()
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/healthz", get(|| async { "ok" }))
        .route_layer(from_fn(metrics::track_http_metrics));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            warn!(%addr, error = %err, "failed to bind metrics listener, metrics endpoint disabled");
            return;
        }
    };

    info!(%addr, "serving /metrics and /healthz");
    if let Err(err) = axum::serve(listener, app).await {
        warn!(error = %err, "metrics server exited");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            std::future::pending::<()>().await;
            return;
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
