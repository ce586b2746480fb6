use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use facetrain_core::{JobPhase, StatusResponse};
use facetrain_engine::{
    ApiError, AutomatedTrainingService, FailureKind, FixtureReply, FixtureTransport, HttpMethod,
    JobTracker, Transport,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::time::sleep;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(facetrain_logging::initialize_for_tests);
}

const BATCH_STATUS: &str = "/api/training/batch/b-1/status";

fn status(value: Value) -> StatusResponse {
    serde_json::from_value(value).expect("status body")
}

/// Status fetch answering from a script; the last entry repeats.
fn scripted(
    calls: Arc<AtomicUsize>,
    script: Vec<Result<Value, ApiError>>,
) -> impl Fn(String) -> futures_util::future::BoxFuture<'static, Result<StatusResponse, ApiError>>
       + Send
       + Sync {
    use futures_util::FutureExt;
    move |_job_id| {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        let reply = script[call.min(script.len() - 1)].clone();
        async move { reply.map(status) }.boxed()
    }
}

fn batch_tracker(transport: Arc<FixtureTransport>, interval: Duration) -> JobTracker {
    let service = AutomatedTrainingService::new(transport as Arc<dyn Transport>);
    JobTracker::new(Some("b-1".to_string()), interval, true, move |batch_id| {
        let service = service.clone();
        async move { service.batch_status(&batch_id).await }
    })
}

#[tokio::test(start_paused = true)]
async fn stops_after_processing_processing_completed() {
    init_logging();
    let calls = Arc::new(AtomicUsize::new(0));
    let tracker = JobTracker::new(
        Some("video-1".to_string()),
        Duration::from_secs(3),
        true,
        scripted(
            calls.clone(),
            vec![
                Ok(json!({"success": false, "status": "processing"})),
                Ok(json!({"success": false, "status": "processing"})),
                Ok(json!({"success": true, "status": "completed", "statistics": {"unique_persons": 2}})),
            ],
        ),
    );

    sleep(Duration::from_secs(30)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let snapshot = tracker.snapshot();
    assert!(!snapshot.is_polling);
    assert!(snapshot.is_complete());
    assert_eq!(snapshot.outcome, Some(JobPhase::Completed));
    assert_eq!(snapshot.error, None);
    assert!(!snapshot.loading);
}

#[tokio::test(start_paused = true)]
async fn checks_never_overlap() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let fetch = {
        let in_flight = in_flight.clone();
        let max_in_flight = max_in_flight.clone();
        move |_job_id: String| {
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_secs(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(status(json!({"status": "processing"})))
            }
        }
    };
    let tracker = JobTracker::new(Some("slow".to_string()), Duration::from_secs(1), true, fetch);

    sleep(Duration::from_secs(20)).await;
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    assert!(tracker.is_polling());
}

#[tokio::test(start_paused = true)]
async fn restart_during_a_check_keeps_one_check_in_flight() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let fetch = {
        let in_flight = in_flight.clone();
        let max_in_flight = max_in_flight.clone();
        move |_job_id: String| {
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(500)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(status(json!({"status": "processing"})))
            }
        }
    };
    let tracker = JobTracker::new(Some("slow".to_string()), Duration::from_secs(1), true, fetch);

    sleep(Duration::from_millis(100)).await;
    tracker.stop_polling();
    tracker.start_polling();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    assert!(tracker.is_polling());
}

#[tokio::test(start_paused = true)]
async fn restart_while_waiting_checks_at_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tracker = JobTracker::new(
        Some("video-9".to_string()),
        Duration::from_secs(10),
        true,
        scripted(calls.clone(), vec![Ok(json!({"status": "processing"}))]),
    );
    sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tracker.stop_polling();
    tracker.start_polling();
    sleep(Duration::from_millis(1)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(tracker.is_polling());
}

#[tokio::test(start_paused = true)]
async fn auto_start_without_job_id_never_fetches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tracker = JobTracker::new(
        None,
        Duration::from_secs(1),
        true,
        scripted(calls.clone(), vec![Ok(json!({"status": "processing"}))]),
    );

    tracker.start_polling();
    let snapshot = tracker.refetch().await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!snapshot.is_polling);
    assert_eq!(tracker.status(), None);
}

#[tokio::test(start_paused = true)]
async fn batch_lifecycle_ends_after_three_status_requests() {
    init_logging();
    let transport = Arc::new(FixtureTransport::new().route(
        HttpMethod::Get,
        BATCH_STATUS,
        vec![
            FixtureReply::ok(json!({"success": true, "status": "processing", "completed": 0, "total": 2})),
            FixtureReply::ok(json!({"success": true, "status": "processing", "completed": 1, "total": 2})),
            FixtureReply::ok(json!({"success": true, "status": "completed", "completed": 2, "total": 2})),
        ],
    ));
    let tracker = batch_tracker(transport.clone(), Duration::from_secs(3));

    sleep(Duration::from_secs(60)).await;

    assert_eq!(transport.request_count(HttpMethod::Get, BATCH_STATUS), 3);
    let snapshot = tracker.snapshot();
    assert!(snapshot.is_complete());
    assert!(!snapshot.is_polling);
    let status = snapshot.status.expect("status");
    assert_eq!(status.response.field("completed"), Some(&json!(2)));
}

#[tokio::test(start_paused = true)]
async fn terminal_status_is_not_fetched_again() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tracker = JobTracker::new(
        Some("done".to_string()),
        Duration::from_secs(1),
        true,
        scripted(calls.clone(), vec![Ok(json!({"success": true, "status": "completed"}))]),
    );
    sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let snapshot = tracker.refetch().await;
    tracker.start_polling();
    sleep(Duration::from_secs(5)).await;

    assert!(snapshot.is_terminal());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_job_stops_with_not_found() {
    let transport = Arc::new(FixtureTransport::new());
    let tracker = batch_tracker(transport.clone(), Duration::from_secs(1));

    sleep(Duration::from_secs(5)).await;

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.outcome, Some(JobPhase::NotFound));
    assert!(snapshot.error.is_some());
    assert!(!snapshot.is_polling);
    assert_eq!(transport.request_count(HttpMethod::Get, BATCH_STATUS), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_status_surfaces_the_server_message() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tracker = JobTracker::new(
        Some("video-9".to_string()),
        Duration::from_secs(1),
        true,
        scripted(
            calls.clone(),
            vec![Ok(json!({"success": false, "status": "error", "message": "Codec not supported"}))],
        ),
    );

    sleep(Duration::from_secs(5)).await;

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.error.as_deref(), Some("Codec not supported"));
    assert_eq!(snapshot.outcome, Some(JobPhase::Failed));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn transport_error_stops_polling() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tracker = JobTracker::new(
        Some("video-2".to_string()),
        Duration::from_secs(1),
        true,
        scripted(
            calls.clone(),
            vec![Err(ApiError::new(FailureKind::Timeout, "request timed out"))],
        ),
    );

    sleep(Duration::from_secs(5)).await;

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.error.as_deref(), Some("request timed out"));
    assert!(!snapshot.is_polling);
    assert!(!snapshot.is_terminal());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn changing_job_discards_the_previous_result() {
    let fetch = |job_id: String| async move {
        if job_id == "old" {
            sleep(Duration::from_millis(500)).await;
            Ok(status(json!({"success": true, "status": "completed", "video_id": "old"})))
        } else {
            Ok(status(json!({"status": "processing", "video_id": job_id})))
        }
    };
    let tracker = JobTracker::new(Some("old".to_string()), Duration::from_secs(1), true, fetch);

    sleep(Duration::from_millis(100)).await;
    tracker.set_job_id(Some("new".to_string()));
    sleep(Duration::from_secs(2)).await;

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.job_id.as_deref(), Some("new"));
    let status = snapshot.status.expect("status of new job");
    assert_eq!(status.response.field("video_id"), Some(&json!("new")));
    assert!(status.is_processing);
    assert!(snapshot.is_polling);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_polling_and_reads_status_once_more() {
    init_logging();
    let transport = Arc::new(
        FixtureTransport::new()
            .route(
                HttpMethod::Get,
                BATCH_STATUS,
                vec![
                    FixtureReply::ok(json!({"success": true, "status": "processing"})),
                    FixtureReply::ok(json!({"success": true, "status": "cancelled", "message": "Batch cancelled"})),
                ],
            )
            .route(
                HttpMethod::Post,
                "/api/training/batch/b-1/cancel",
                vec![FixtureReply::ok(json!({"success": true, "message": "Batch cancelled successfully"}))],
            ),
    );
    let service = AutomatedTrainingService::new(transport.clone() as Arc<dyn Transport>);
    let tracker = batch_tracker(transport.clone(), Duration::from_secs(3));

    sleep(Duration::from_secs(1)).await;
    let response = tracker
        .cancel(service.cancel_batch("b-1"))
        .await
        .expect("cancel accepted");
    assert_eq!(response.message.as_deref(), Some("Batch cancelled successfully"));

    sleep(Duration::from_secs(10)).await;
    let snapshot = tracker.snapshot();
    assert!(!snapshot.is_polling);
    assert!(snapshot.is_terminal());
    assert_eq!(snapshot.error.as_deref(), Some("Batch cancelled"));
    assert_eq!(transport.request_count(HttpMethod::Get, BATCH_STATUS), 2);
}

#[tokio::test(start_paused = true)]
async fn rejected_cancel_keeps_polling() {
    let transport = Arc::new(
        FixtureTransport::new()
            .route(
                HttpMethod::Get,
                BATCH_STATUS,
                vec![FixtureReply::ok(json!({"success": true, "status": "processing"}))],
            )
            .route(
                HttpMethod::Post,
                "/api/training/batch/b-1/cancel",
                vec![FixtureReply::ok(json!({"success": false, "message": "Batch already finished"}))],
            ),
    );
    let service = AutomatedTrainingService::new(transport.clone() as Arc<dyn Transport>);
    let tracker = batch_tracker(transport, Duration::from_secs(3));

    sleep(Duration::from_secs(1)).await;
    let err = tracker
        .cancel(service.cancel_batch("b-1"))
        .await
        .expect_err("cancel rejected");

    assert_eq!(err.kind, FailureKind::Application);
    assert_eq!(tracker.snapshot().error.as_deref(), Some("Batch already finished"));
    assert!(tracker.is_polling());
}
