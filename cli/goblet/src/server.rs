//! HTTP server for the deployed application.
//!
//! Cloud Scheduler invokes the service with `X-Goblet-Type: schedule` and
//! `X-Goblet-Name: <job>`; the request is routed to the matching handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use goblet_schedule::{HandlerRegistry, NAME_HEADER, SCHEDULE_TYPE, TYPE_HEADER};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::app::ScheduleHandler;

pub type SharedRegistry = Arc<HandlerRegistry<ScheduleHandler>>;

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub jobs: usize,
}

/// Error body for unroutable or failed invocations.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: message.into(),
        }),
    )
        .into_response()
}

/// Create the application routes.
pub fn router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn healthz(State(registry): State<SharedRegistry>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "goblet".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        jobs: registry.len(),
    })
}

/// Route an invocation to its handler by the goblet headers.
async fn dispatch(State(registry): State<SharedRegistry>, headers: HeaderMap) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    match header(TYPE_HEADER) {
        Some(SCHEDULE_TYPE) => {}
        Some(other) => {
            warn!(kind = other, "Unsupported invocation type");
            return error_response(
                StatusCode::NOT_FOUND,
                "unsupported_type",
                format!("no handlers of type {other:?}"),
            );
        }
        None => {
            return error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("missing {TYPE_HEADER} header"),
            );
        }
    }

    let Some(name) = header(NAME_HEADER) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("missing {NAME_HEADER} header"),
        );
    };

    let Some(handler) = registry.handler(name) else {
        warn!(job = name, "No handler registered");
        return error_response(
            StatusCode::NOT_FOUND,
            "job_not_found",
            format!("no scheduled job named {name:?}"),
        );
    };

    info!(job = name, "Running scheduled job");
    match handler.call().await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            error!(job = name, error = %e, "Scheduled job failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "handler_failed", e.to_string())
        }
    }
}

/// Serve `registry` on `addr` until Ctrl+C or SIGTERM.
///
/// In-flight invocations finish before the server returns.
pub async fn serve(registry: SharedRegistry, addr: SocketAddr) -> anyhow::Result<()> {
    let jobs = registry.len();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, jobs, "Listening");

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on the first of Ctrl+C or SIGTERM. Cloud Run stops containers
/// with SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use goblet_schedule::{JobScope, ScheduleOptions};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn registry() -> SharedRegistry {
        let mut registry = HandlerRegistry::new(JobScope::new("p", "us-central1").unwrap());
        registry
            .register(
                "nightly",
                "0 3 * * *",
                ScheduleOptions::new(),
                ScheduleHandler::new(|| async { Ok(json!({ "processed": 3 })) }),
            )
            .unwrap();
        registry
            .register(
                "broken",
                "0 4 * * *",
                ScheduleOptions::new(),
                ScheduleHandler::new(|| async { Err(anyhow::anyhow!("database unavailable")) }),
            )
            .unwrap();
        Arc::new(registry)
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = router(registry()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn invocation(kind: Option<&str>, name: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri("/");
        if let Some(kind) = kind {
            builder = builder.header(TYPE_HEADER, kind);
        }
        if let Some(name) = name {
            builder = builder.header(NAME_HEADER, name);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_healthz_returns_ok() {
        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["jobs"], 2);
    }

    #[tokio::test]
    async fn routes_schedule_invocation_to_handler() {
        let (status, body) = send(invocation(Some("schedule"), Some("nightly"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "processed": 3 }));
    }

    #[tokio::test]
    async fn header_names_are_case_insensitive() {
        let request = Request::builder()
            .method("POST")
            .uri("/anything")
            .header("x-goblet-type", "schedule")
            .header("x-goblet-name", "nightly")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let (status, body) = send(invocation(Some("schedule"), Some("weekly"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "job_not_found");
    }

    #[tokio::test]
    async fn missing_or_unsupported_type_is_not_found() {
        let (status, _) = send(invocation(None, Some("nightly"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(invocation(Some("pubsub"), Some("nightly"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "unsupported_type");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_triggers_shutdown() {
        let shutdown = tokio::spawn(shutdown_signal());
        // Let the signal handler install before raising.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let pid = std::process::id().to_string();
        let status = std::process::Command::new("kill")
            .args(["-TERM", &pid])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(std::time::Duration::from_secs(5), shutdown)
            .await
            .expect("shutdown signal should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn handler_failure_is_internal_error() {
        let (status, body) = send(invocation(Some("schedule"), Some("broken"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "database unavailable");
    }
}
