//! Prometheus metrics (A4, spec §4.13).
//!
//! Grounded on the teacher crate's `bin/scribble-server/metrics.rs`: a
//! lazily-initialized `Registry` behind a `OnceLock`, an axum `/metrics`
//! handler serving the text exposition format, and an HTTP middleware for
//! request counts/latency. Two counters are added beyond the teacher's set,
//! mirroring the `MetricMsg` variants of spec §6.4.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts as PromOpts, Registry, TextEncoder};

use crate::error::Error;

struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_in_flight_requests: IntGauge,
    live_captions_window_dropped_total: IntCounter,
    live_captions_transcriber_buf_full_total: IntCounter,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn build_metrics() -> Result<Metrics, Error> {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        PromOpts::new("callscribe_http_requests_total", "Total HTTP requests served by this worker."),
        &["status"],
    )
    .map_err(|e| Error::msg(format!("invalid definition for callscribe_http_requests_total: {e}")))?;

    let http_request_duration_seconds = HistogramVec::new(
        HistogramOpts::new("callscribe_http_request_duration_seconds", "HTTP request latency in seconds."),
        &["status"],
    )
    .map_err(|e| Error::msg(format!("invalid definition for callscribe_http_request_duration_seconds: {e}")))?;

    let http_in_flight_requests = IntGauge::new("callscribe_http_in_flight_requests", "Current number of in-flight HTTP requests.")
        .map_err(|e| Error::msg(format!("invalid definition for callscribe_http_in_flight_requests: {e}")))?;

    let live_captions_window_dropped_total = IntCounter::new(
        "callscribe_live_captions_window_dropped_total",
        "Live-captions windows dropped after hitting the pressure limit.",
    )
    .map_err(|e| Error::msg(format!("invalid definition for callscribe_live_captions_window_dropped_total: {e}")))?;

    let live_captions_transcriber_buf_full_total = IntCounter::new(
        "callscribe_live_captions_transcriber_buf_full_total",
        "Live-captions submissions dropped because the transcriber pool queue was full.",
    )
    .map_err(|e| Error::msg(format!("invalid definition for callscribe_live_captions_transcriber_buf_full_total: {e}")))?;

    registry
        .register(Box::new(http_requests_total.clone()))
        .map_err(|e| Error::msg(e.to_string()))?;
    registry
        .register(Box::new(http_request_duration_seconds.clone()))
        .map_err(|e| Error::msg(e.to_string()))?;
    registry
        .register(Box::new(http_in_flight_requests.clone()))
        .map_err(|e| Error::msg(e.to_string()))?;
    registry
        .register(Box::new(live_captions_window_dropped_total.clone()))
        .map_err(|e| Error::msg(e.to_string()))?;
    registry
        .register(Box::new(live_captions_transcriber_buf_full_total.clone()))
        .map_err(|e| Error::msg(e.to_string()))?;

    Ok(Metrics {
        registry,
        http_requests_total,
        http_request_duration_seconds,
        http_in_flight_requests,
        live_captions_window_dropped_total,
        live_captions_transcriber_buf_full_total,
    })
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

pub fn init() -> Result<(), Error> {
    if metrics().is_some() {
        return Ok(());
    }
    let built = build_metrics()?;
    let _ = METRICS.set(built);
    Ok(())
}

/// Increments `callscribe_live_captions_window_dropped_total` (C6 pressure
/// valve). A no-op before `init()` so callers in tests don't need metrics set up.
pub fn record_window_dropped() {
    if let Some(m) = metrics() {
        m.live_captions_window_dropped_total.inc();
    }
}

/// Increments `callscribe_live_captions_transcriber_buf_full_total` (C6/C7
/// pool queue full).
pub fn record_transcriber_buf_full() {
    if let Some(m) = metrics() {
        m.live_captions_transcriber_buf_full_total.inc();
    }
}

pub async fn prometheus_metrics() -> Response {
    if metrics().is_none()
        && let Err(err) = init()
    {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to initialize metrics: {err}")).into_response();
    }

    let Some(metrics) = metrics() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "metrics not initialized").into_response();
    };

    let families = metrics.registry.gather();
    let mut buf = Vec::new();
    if TextEncoder::new().encode(&families, &mut buf).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response();
    }

    ([(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"))], buf).into_response()
}

pub async fn track_http_metrics(req: Request<Body>, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str())
        .unwrap_or_else(|| req.uri().path())
        .to_owned();

    if route == "/metrics" || route == "/healthz" {
        return next.run(req).await;
    }

    let Some(metrics) = metrics() else {
        return next.run(req).await;
    };

    let start = Instant::now();
    metrics.http_in_flight_requests.inc();
    let response = next.run(req).await;
    metrics.http_in_flight_requests.dec();

    let status = response.status().as_u16().to_string();
    metrics.http_requests_total.with_label_values(&[&status]).inc();
    metrics.http_request_duration_seconds.with_label_values(&[&status]).observe(start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_registers_domain_counters() {
        init().unwrap();
        init().unwrap();

        record_window_dropped();
        record_transcriber_buf_full();

        let families = metrics().unwrap().registry.gather();
        let names: Vec<&str> = families.iter().map(|f| f.name()).collect();
        assert!(names.contains(&"callscribe_live_captions_window_dropped_total"));
        assert!(names.contains(&"callscribe_live_captions_transcriber_buf_full_total"));
    }
}
