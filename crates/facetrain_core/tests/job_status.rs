use facetrain_core::{classify_status, JobPhase, PollState, StatusResponse, TrackedStatus};
use serde_json::json;

fn response(value: serde_json::Value) -> StatusResponse {
    serde_json::from_value(value).expect("status response")
}

#[test]
fn processing_is_not_terminal_even_without_success() {
    let status = response(json!({"success": false, "status": "processing", "video_id": "v1"}));
    assert_eq!(classify_status(&status), JobPhase::Processing);
    assert!(!JobPhase::Processing.is_terminal());

    let tracked = TrackedStatus::from_response(status);
    assert!(tracked.is_processing);
    assert!(!tracked.is_complete);
    assert_eq!(tracked.response.field("video_id"), Some(&json!("v1")));
}

#[test]
fn completed_requires_success_flag() {
    let done = response(json!({"success": true, "status": "completed", "statistics": {}}));
    assert_eq!(done.phase(), JobPhase::Completed);
    assert!(TrackedStatus::from_response(done).is_complete);

    let odd = response(json!({"success": false, "status": "completed"}));
    assert_eq!(odd.phase(), JobPhase::Failed);
}

#[test]
fn not_found_and_errors_are_terminal() {
    let missing = StatusResponse::not_found("Video not found");
    assert_eq!(missing.phase(), JobPhase::NotFound);
    assert!(missing.phase().is_terminal());
    assert_eq!(missing.failure_message(), "Video not found");

    let failed = response(json!({"success": false, "status": "error"}));
    assert_eq!(failed.phase(), JobPhase::Failed);
    assert_eq!(failed.failure_message(), "Failed to get job status");
}

#[test]
fn batch_statuses_in_flight_keep_polling() {
    for status in ["queued", "pending", "running"] {
        let body = response(json!({"success": true, "status": status}));
        assert_eq!(body.phase(), JobPhase::Processing, "{status}");
    }
}

#[test]
fn poll_state_applies_cycles() {
    let mut state: PollState<u32> = PollState::new(true);
    assert!(state.loading);
    assert!(state.is_polling);

    state.apply::<String>(Ok(7));
    assert_eq!(state.data, Some(7));
    assert!(!state.loading);
    assert_eq!(state.revision, 1);

    state.apply(Err("network error".to_string()));
    assert_eq!(state.data, Some(7));
    assert_eq!(state.error.as_deref(), Some("network error"));
    assert_eq!(state.revision, 1);

    state.apply(Err(String::new()));
    assert_eq!(state.error.as_deref(), Some("Failed to fetch data"));

    state.apply::<String>(Ok(8));
    assert_eq!(state.error, None);
}
