//! End-to-end routing through an `App`, the way Cloud Scheduler calls it.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use goblet::{App, JobScope, ScheduleOptions};
use rstest::rstest;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

fn app(counter: Arc<AtomicUsize>) -> App {
    let mut app = App::new("reports", JobScope::new("p", "us-central1").unwrap());

    app.schedule(
        "nightly",
        "0 3 * * *",
        ScheduleOptions::new().timezone("Europe/Paris"),
        move || {
            let counter = counter.clone();
            async move {
                let runs = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!({ "runs": runs }))
            }
        },
    )
    .unwrap();

    app.schedule("failing", "*/5 * * * *", ScheduleOptions::new(), || async {
        Err(anyhow::anyhow!("upstream timed out"))
    })
    .unwrap();

    app
}

async fn call(app: App, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    let mut request = Request::builder().method("POST").uri("/");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = app
        .router()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn scheduled_invocation_runs_handler_each_time() {
    let counter = Arc::new(AtomicUsize::new(0));
    let headers = [("X-Goblet-Type", "schedule"), ("X-Goblet-Name", "nightly")];

    let (status, body) = call(app(counter.clone()), &headers).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "runs": 1 }));

    let (_, body) = call(app(counter.clone()), &headers).await;
    assert_eq!(body, json!({ "runs": 2 }));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[rstest]
#[case(&[], StatusCode::NOT_FOUND, "not_found")]
#[case(&[("X-Goblet-Type", "schedule")], StatusCode::NOT_FOUND, "not_found")]
#[case(&[("X-Goblet-Type", "http"), ("X-Goblet-Name", "nightly")], StatusCode::NOT_FOUND, "unsupported_type")]
#[case(&[("X-Goblet-Type", "schedule"), ("X-Goblet-Name", "weekly")], StatusCode::NOT_FOUND, "job_not_found")]
#[case(&[("X-Goblet-Type", "schedule"), ("X-Goblet-Name", "failing")], StatusCode::INTERNAL_SERVER_ERROR, "handler_failed")]
#[tokio::test]
async fn unroutable_or_failed_invocations(
    #[case] headers: &[(&str, &str)],
    #[case] status: StatusCode,
    #[case] code: &str,
) {
    let (actual, body) = call(app(Arc::new(AtomicUsize::new(0))), headers).await;
    assert_eq!(actual, status);
    assert_eq!(body["code"], code);
}

#[tokio::test]
async fn removed_job_is_no_longer_routed() {
    let mut app = app(Arc::new(AtomicUsize::new(0)));
    let removed = app.remove_schedule("nightly").unwrap();
    assert_eq!(removed.time_zone(), "Europe/Paris");

    let (status, body) = call(
        app,
        &[("X-Goblet-Type", "schedule"), ("X-Goblet-Name", "nightly")],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "job_not_found");
}

#[tokio::test]
async fn healthz_reports_job_count() {
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = app(Arc::new(AtomicUsize::new(0)))
        .router()
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["jobs"], 2);
}
