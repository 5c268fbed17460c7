use std::net::Ipv4Addr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::App;
use crate::events::{EventLog, Sequenced};
use crate::scanner::{ScanState, ScanSummary};
use crate::types::{ScanRequest, StatusChange};

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<App>,
    pub events: Arc<EventLog>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanStatus {
    state: ScanState,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ScanSummary>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorRequest {
    /// Omitted: every host of the latest scan.
    pub addresses: Option<Vec<Ipv4Addr>>,
    pub search_hidden_hosts: bool,
    pub hidden_host_ports: Vec<u16>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonitorStatus {
    active: bool,
    hosts: Vec<StatusChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    after: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventPage {
    last_seq: u64,
    events: Vec<Sequenced>,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/scan", post(post_scan))
        .route("/scan/cancel", post(post_scan_cancel))
        .route("/hosts", get(get_hosts))
        .route("/history", get(get_history))
        .route("/monitor", get(get_monitor))
        .route("/monitor/start", post(post_monitor_start))
        .route("/monitor/stop", post(post_monitor_stop))
        .route("/events", get(get_events))
        .with_state(state);

    Router::new().nest("/api", api).layer(TraceLayer::new_for_http())
}

/// Serve the API on `bind` until `shutdown` resolves.
pub async fn serve(
    bind: &str,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("serving API on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;
    Ok(())
}

fn error(status: StatusCode, message: impl ToString) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

async fn post_scan(State(s): State<AppState>, Json(req): Json<ScanRequest>) -> Response {
    match s.app.scan(req).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(ScanStatus {
                state: s.app.scan_state(),
                summary: None,
            }),
        )
            .into_response(),
        Err(e) => error(StatusCode::BAD_REQUEST, e),
    }
}

async fn post_scan_cancel(State(s): State<AppState>) -> impl IntoResponse {
    let summary = s.app.cancel_scan().await;
    Json(ScanStatus {
        state: s.app.scan_state(),
        summary,
    })
}

async fn get_hosts(State(s): State<AppState>) -> impl IntoResponse {
    Json(s.app.hosts())
}

async fn get_history(State(s): State<AppState>) -> impl IntoResponse {
    Json(s.app.history())
}

async fn get_monitor(State(s): State<AppState>) -> impl IntoResponse {
    Json(MonitorStatus {
        active: s.app.is_monitoring(),
        hosts: s.app.monitor_statuses(),
    })
}

async fn post_monitor_start(
    State(s): State<AppState>,
    Json(req): Json<MonitorRequest>,
) -> Response {
    let started = s
        .app
        .start_monitoring(req.addresses, req.search_hidden_hosts, req.hidden_host_ports)
        .await;
    match started {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(MonitorStatus {
                active: s.app.is_monitoring(),
                hosts: s.app.monitor_statuses(),
            }),
        )
            .into_response(),
        Err(e) => error(StatusCode::SERVICE_UNAVAILABLE, e),
    }
}

async fn post_monitor_stop(State(s): State<AppState>) -> impl IntoResponse {
    s.app.stop_monitoring().await;
    Json(MonitorStatus {
        active: false,
        hosts: Vec::new(),
    })
}

async fn get_events(State(s): State<AppState>, Query(q): Query<EventsQuery>) -> impl IntoResponse {
    Json(EventPage {
        last_seq: s.events.last_seq(),
        events: s.events.since(q.after),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state() -> AppState {
        let events = Arc::new(EventLog::new(64));
        let app = Arc::new(App::new(&Config::default(), events.clone()));
        app.startup();
        AppState { app, events }
    }

    async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(v) => req
                .header("content-type", "application/json")
                .body(Body::from(v.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn rejected_scan_is_a_bad_request_and_logged_as_events() {
        let s = state();
        let (status, body) = call(
            &s,
            "POST",
            "/api/scan",
            Some(json!({"startIp": "10.0.0.9", "endIp": "10.0.0.1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Start IP cannot be greater than End IP");

        let (status, page) = call(&s, "GET", "/api/events?after=0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["lastSeq"], 2);
        assert_eq!(page["events"][0]["event"], "scanError");
        assert_eq!(page["events"][1], json!({"seq": 2, "event": "scanComplete", "data": false}));

        let (_, page) = call(&s, "GET", "/api/events?after=2", None).await;
        assert_eq!(page["events"], json!([]));
    }

    #[tokio::test]
    async fn history_records_requests_that_pass_the_presence_check() {
        let s = state();
        call(&s, "POST", "/api/scan", Some(json!({"startIp": "", "endIp": "10.0.0.1"}))).await;
        call(
            &s,
            "POST",
            "/api/scan",
            Some(json!({"startIp": "10.0.0.9", "endIp": "10.0.0.1"})),
        )
        .await;

        let (status, history) = call(&s, "GET", "/api/history", None).await;
        assert_eq!(status, StatusCode::OK);
        let entries = history.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["startIp"], "10.0.0.9");
        assert_eq!(entries[0]["endIp"], "10.0.0.1");
    }

    #[tokio::test]
    async fn monitor_with_nothing_to_watch_stays_idle() {
        let s = state();
        let (status, body) = call(&s, "POST", "/api/monitor/start", Some(json!({}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["active"], false);

        let (status, body) = call(&s, "GET", "/api/monitor", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"active": false, "hosts": []}));

        let (status, _) = call(&s, "POST", "/api/monitor/stop", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn hosts_start_empty_and_cancel_without_scan_reports_idle() {
        let s = state();
        let (_, hosts) = call(&s, "GET", "/api/hosts", None).await;
        assert_eq!(hosts, json!([]));

        let (status, body) = call(&s, "POST", "/api/scan/cancel", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"state": "idle"}));
    }
}
