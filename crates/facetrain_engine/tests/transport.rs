use std::sync::Arc;
use std::time::Duration;

use facetrain_engine::{
    ApiRequest, CallTimeout, FailureKind, ReqwestTransport, TrainingService, Transport,
    TransportSettings, UploadFile, VideoService, VideoUpload,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(server: &MockServer, token: Option<&str>) -> ReqwestTransport {
    ReqwestTransport::new(TransportSettings {
        base_url: server.uri(),
        auth_token: token.map(str::to_string),
        ..TransportSettings::default()
    })
    .expect("client")
}

#[tokio::test]
async fn token_is_sent_without_a_scheme_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/training/queue-status"))
        .and(header("authorization", "tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"pending": 3, "processing": 1, "completed": 7, "failed": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = TrainingService::new(Arc::new(transport_for(&server, Some("tok-123"))));
    let status = service.queue_status().await.expect("queue status");

    assert_eq!(status.pending, 3);
    assert_eq!(status.total(), 11);
}

#[tokio::test]
async fn query_parameters_are_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/excel/check-excel"))
        .and(query_param("country", "serbia"))
        .and(query_param("occupation", "actor,tennis player"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "message": "Generated 12 names"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = TrainingService::new(Arc::new(transport_for(&server, None)));
    let response = service
        .generate_names("serbia", &["actor".to_string(), "tennis player".to_string()])
        .await
        .expect("names");

    assert!(response.success);
    assert_eq!(response.message.as_deref(), Some("Generated 12 names"));
}

#[tokio::test]
async fn json_body_is_sent_with_delete() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/training/queue"))
        .and(body_json(json!({"id": "42"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "remaining_count": 4})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = TrainingService::new(Arc::new(transport_for(&server, None)));
    let removed = service.remove_from_queue("42").await.expect("removed");

    assert_eq!(removed.remaining_count, Some(4));
}

#[tokio::test]
async fn unauthorized_uses_the_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/storage/stats"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid token"})))
        .mount(&server)
        .await;

    let transport = transport_for(&server, Some("expired"));
    let err = transport
        .send(ApiRequest::get("/api/storage/stats"))
        .await
        .expect_err("401");

    assert_eq!(err.kind, FailureKind::Unauthorized(401));
    assert_eq!(err.message, "Invalid token");
    assert_eq!(err.status_code(), Some(401));
}

#[tokio::test]
async fn missing_resource_is_reported_as_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/training/batch/nope/status"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = transport_for(&server, None)
        .send(ApiRequest::get("/api/training/batch/nope/status"))
        .await
        .expect_err("404");

    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert!(err.is_not_found());
    assert_eq!(err.message, "http status 404");
}

#[tokio::test]
async fn slow_reply_times_out_with_the_call_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/video/info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true}))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let err = transport_for(&server, None)
        .send(
            ApiRequest::get("/api/video/info")
                .timeout(CallTimeout::Custom(Duration::from_millis(100))),
        )
        .await
        .expect_err("timeout");

    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn accepted_status_means_still_processing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/video/status/v-7"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"status": "queued"})))
        .mount(&server)
        .await;

    let service = VideoService::new(Arc::new(transport_for(&server, None)));
    let status = service.status("v-7").await.expect("status");

    assert_eq!(status.status, "processing");
    assert_eq!(status.field("video_id"), Some(&json!("v-7")));
}

#[tokio::test]
async fn upload_is_sent_as_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/video/upload-async"))
        .and(body_string_contains("name=\"domain\""))
        .and(body_string_contains("name=\"interval_seconds\""))
        .and(body_string_contains("filename=\"clip.mp4\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "video_id": "v-1",
            "status_endpoint": "/api/video/status/v-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = VideoService::new(Arc::new(transport_for(&server, None)));
    let upload = VideoUpload::new(UploadFile::from_bytes("clip.mp4", vec![0u8; 2048]), "serbia")
        .interval(2.5);
    let accepted = service.upload_async(upload).await.expect("accepted");

    assert_eq!(accepted.video_id, "v-1");
}
