//! End-to-end coverage of `HttpOrchestrator` against a real HTTP server
//! (spec §8 scenario 6 "Job failure reporting").

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use serde_json::Value;
use tokio::net::TcpListener;

use callscribe::orchestrator::{HttpOrchestrator, JobStatus, Orchestrator};

async fn spawn_server<F>(handler: F) -> SocketAddr
where
    F: Fn(Value) -> (StatusCode, String) + Send + Sync + 'static,
{
    let state = Arc::new(handler);

    async fn route(State(state): State<Arc<dyn Fn(Value) -> (StatusCode, String) + Send + Sync>>, Json(body): Json<Value>) -> impl IntoResponse {
        let (status, text) = state(body);
        (status, text)
    }

    let app = axum::Router::new()
        .route(
            "/plugins/com.mattermost.calls/bot/calls/{call_id}/jobs/{job_id}/status",
            post(route),
        )
        .with_state(state as Arc<dyn Fn(Value) -> (StatusCode, String) + Send + Sync>);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn call_id() -> String {
    "c".repeat(26)
}
fn job_id() -> String {
    "j".repeat(26)
}

#[tokio::test]
async fn reports_job_failure_with_transcribing_job_type() {
    let received = Arc::new(Mutex::new(None));
    let received_clone = received.clone();

    let addr = spawn_server(move |body| {
        *received_clone.lock().unwrap() = Some(body);
        (StatusCode::OK, String::new())
    })
    .await;

    let orchestrator = HttpOrchestrator::new(format!("http://{addr}"), call_id(), job_id(), "token").unwrap();

    orchestrator
        .report_job_status(JobStatus::Failed, Some("some error".to_owned()))
        .await
        .expect("stubbed endpoint returns success");

    let body = received.lock().unwrap().clone().expect("server received a request");
    assert_eq!(body["job_type"], "transcribing");
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"], "some error");
}

#[tokio::test]
async fn surfaces_exact_error_text_on_server_error() {
    let addr = spawn_server(|_body| (StatusCode::BAD_REQUEST, "server error".to_owned())).await;

    let orchestrator = HttpOrchestrator::new(format!("http://{addr}"), call_id(), job_id(), "token").unwrap();

    let err = orchestrator
        .report_job_status(JobStatus::Failed, Some("some error".to_owned()))
        .await
        .expect_err("400 response must surface as an error");

    assert_eq!(err.to_string(), "request failed: server error");
}
