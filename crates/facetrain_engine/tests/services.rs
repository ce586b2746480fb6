use std::sync::Arc;

use facetrain_core::{BatchSource, JobPhase, ListItem, Priority};
use facetrain_engine::{
    format_duration, format_size_mb, AbTestingService, AuthService, AutomatedTrainingService,
    CallTimeout, ComparisonUpload, FailureKind, FixtureReply, FixtureTransport, HttpMethod,
    LoginOutcome, MergeAction, MergeCandidatesService, MultipartField, RequestBody,
    SmartCycleConfig, SmartTrainingService, StorageService, TrainingService, Transport, UploadFile,
    VideoService, VideoUpload,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn shared(fixture: FixtureTransport) -> (Arc<FixtureTransport>, Arc<dyn Transport>) {
    let fixture = Arc::new(fixture);
    let transport = fixture.clone() as Arc<dyn Transport>;
    (fixture, transport)
}

#[tokio::test]
async fn oversized_video_is_rejected_before_any_request() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let file = tempfile::Builder::new()
        .suffix(".mp4")
        .tempfile()
        .expect("temp file");
    file.as_file()
        .set_len(150 * 1024 * 1024)
        .expect("sparse file");

    let upload = VideoUpload::new(
        UploadFile::from_path(file.path()).await.expect("metadata"),
        "serbia",
    );
    let err = VideoService::new(transport)
        .upload_async(upload)
        .await
        .expect_err("too large");

    assert_eq!(err.kind, FailureKind::Validation);
    assert_eq!(
        err.message,
        "File too large. Maximum size: 100 MB (current: 150.00 MB)"
    );
    assert!(fixture.requests().is_empty());
}

#[tokio::test]
async fn every_violation_is_reported() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let upload = VideoUpload::new(
        UploadFile {
            file_name: "notes.txt".to_string(),
            size_bytes: 101 * 1024 * 1024,
            contents: facetrain_engine::UploadContents::Memory(Default::default()),
        },
        "serbia",
    );

    let err = VideoService::new(transport)
        .upload_sync(upload)
        .await
        .expect_err("invalid");

    let message = err.message.as_str();
    assert!(message.starts_with("File too large."));
    assert!(message.contains("Invalid format. Allowed: mp4, avi, mov, mkv, webm, flv, wmv"));
    assert!(fixture.requests().is_empty());
}

#[tokio::test]
async fn interval_outside_range_is_rejected() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let file = UploadFile::from_bytes("clip.MOV", vec![1u8; 16]);
    let upload = VideoUpload::new(file, "serbia").interval(0.05);

    let err = VideoService::new(transport)
        .upload_async(upload)
        .await
        .expect_err("interval");

    assert_eq!(err.message, "Interval must be between 0.1 and 60 seconds");
    assert!(fixture.requests().is_empty());
}

#[tokio::test]
async fn valid_upload_carries_domain_and_interval() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let file = UploadFile::from_bytes("match.mp4", vec![1u8; 64]);
    let upload = VideoUpload::new(file, "croatia").interval(1.5);

    let accepted = VideoService::new(transport)
        .upload_async(upload)
        .await
        .expect("accepted");

    assert_eq!(accepted.video_id, "demo-video");
    let requests = fixture.requests();
    assert_eq!(requests.len(), 1);
    let RequestBody::Multipart(fields) = &requests[0].body else {
        panic!("expected multipart body");
    };
    let text = |wanted: &str| {
        fields.iter().find_map(|field| match field {
            MultipartField::Text { name, value } if name == wanted => Some(value.as_str()),
            _ => None,
        })
    };
    assert_eq!(text("domain"), Some("croatia"));
    assert_eq!(text("interval_seconds"), Some("1.5"));
}

#[tokio::test]
async fn video_status_maps_accepted_and_missing() {
    let (fixture, transport) = shared(
        FixtureTransport::new()
            .route(
                HttpMethod::Get,
                "/api/video/status/busy",
                vec![FixtureReply::with_status(202, json!({}))],
            )
            .route(
                HttpMethod::Get,
                "/api/video/status/gone",
                vec![FixtureReply::with_status(404, json!({"message": "Video not found"}))],
            )
            .route(
                HttpMethod::Get,
                "/api/video/status/broken",
                vec![FixtureReply::with_status(500, json!({"message": "Internal error"}))],
            ),
    );
    let video = VideoService::new(transport);

    assert_eq!(video.status("busy").await.expect("busy").phase(), JobPhase::Processing);
    let gone = video.status("gone").await.expect("gone");
    assert_eq!(gone.phase(), JobPhase::NotFound);
    assert_eq!(gone.failure_message(), "Video not found");

    let err = video.status("broken").await.expect_err("500");
    assert_eq!(err.kind, FailureKind::HttpStatus(500));
    assert_eq!(err.message, "Internal error");

    let requests = fixture.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.timeout == CallTimeout::Quick));
}

#[tokio::test]
async fn unsuccessful_envelope_is_an_application_error() {
    let (_, transport) = shared(FixtureTransport::new().route(
        HttpMethod::Get,
        "/api/excel/process",
        vec![FixtureReply::ok(json!({"success": false, "message": "Queue is empty"}))],
    ));

    let err = TrainingService::new(transport)
        .process_next()
        .await
        .expect_err("empty queue");

    assert_eq!(err.kind, FailureKind::Application);
    assert_eq!(err.message, "Queue is empty");
}

#[tokio::test]
async fn envelope_without_success_flag_is_rejected() {
    let (_, transport) = shared(FixtureTransport::new().route(
        HttpMethod::Get,
        "/api/storage/videos",
        vec![FixtureReply::ok(json!({"videos": []}))],
    ));

    let err = StorageService::new(transport)
        .videos()
        .await
        .expect_err("no flag");

    assert_eq!(err.message, "Request failed");
}

#[tokio::test]
async fn queue_list_accepts_numeric_ids() {
    let (_, transport) = shared(FixtureTransport::demo());
    let queue = TrainingService::new(transport)
        .queue_list()
        .await
        .expect("queue");

    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].id, "1");
    assert_eq!(queue[0].full_name(), "Novak Djokovic");
}

#[tokio::test]
async fn progress_reads_nested_folders() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let folders = TrainingService::new(transport)
        .training_progress("serbia")
        .await
        .expect("progress");

    assert_eq!(folders.len(), 2);
    assert_eq!(folders[0].image_count, 42);
    assert_eq!(
        fixture.requests()[0].query,
        vec![("domain".to_string(), "serbia".to_string())]
    );
}

#[tokio::test]
async fn all_batches_are_tagged_and_sorted_newest_first() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let all = AutomatedTrainingService::new(transport)
        .list_all_batches()
        .await
        .expect("batches");

    let completed: Vec<_> = all
        .completed
        .iter()
        .map(|batch| (batch.batch_id.as_str(), batch.source))
        .collect();
    assert_eq!(
        completed,
        vec![
            ("serp-1", Some(BatchSource::Serp)),
            ("wiki-0", Some(BatchSource::Wikidata)),
        ]
    );
    assert_eq!(all.running.len(), 1);
    assert_eq!(all.running[0].source, Some(BatchSource::Wikidata));
    assert_eq!(fixture.requests().len(), 2);
}

#[tokio::test]
async fn one_failing_batch_list_fails_the_merge() {
    let (_, transport) = shared(FixtureTransport::new().route(
        HttpMethod::Get,
        "/api/training/staging/serp-batches",
        vec![FixtureReply::ok(json!({"success": true, "running_batches": []}))],
    ));

    let err = AutomatedTrainingService::new(transport)
        .list_all_batches()
        .await
        .expect_err("training batches missing");

    assert!(err.is_not_found());
}

#[tokio::test]
async fn candidates_are_generated_and_batch_started() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let service = AutomatedTrainingService::new(transport);

    let batch = service
        .generate_candidates("serbia", "tennis_player", "serbia")
        .await
        .expect("candidates");
    assert_eq!(batch.statistics.new, 1);

    let fresh: Vec<_> = batch
        .candidates
        .into_iter()
        .filter(|candidate| !candidate.exists_in_db)
        .collect();
    let started = service.start_batch(&fresh, "serbia").await.expect("started");

    assert_eq!(started.batch_id, "demo-batch");
    let requests = fixture.requests();
    let RequestBody::Json(body) = &requests[1].body else {
        panic!("expected json body");
    };
    assert_eq!(body["domain"], json!("serbia"));
    assert_eq!(body["candidates"][0]["wikidata_id"], json!("Q5812"));
}

#[tokio::test]
async fn deploy_reports_deployed_folders() {
    let (_, transport) = shared(FixtureTransport::demo());
    let report = AutomatedTrainingService::new(transport)
        .deploy_to_production(&["novak_djokovic".to_string(), "ana_ivanovic".to_string()], "serbia")
        .await
        .expect("deployed");

    assert_eq!(report.deployed.len(), 2);
    assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn login_with_single_domain_returns_token() {
    let (_, transport) = shared(FixtureTransport::demo());
    let outcome = AuthService::new(transport)
        .login("demo@example.com")
        .await
        .expect("login");

    let LoginOutcome::Single(token) = outcome else {
        panic!("expected single domain");
    };
    assert_eq!(token.token, "demo-token");
    assert_eq!(token.email, "demo@example.com");
}

#[tokio::test]
async fn login_with_several_domains_asks_for_a_choice() {
    let (_, transport) = shared(FixtureTransport::new().route(
        HttpMethod::Post,
        "/api/auth/token-by-email",
        vec![FixtureReply::ok(json!({
            "success": true,
            "data": [
                {"token": "t-rs", "email": "a@b.c", "domain": "serbia"},
                {"token": "t-hr", "email": "a@b.c", "domain": "croatia"}
            ]
        }))],
    ));

    let outcome = AuthService::new(transport)
        .login("a@b.c")
        .await
        .expect("login");

    let LoginOutcome::MultiDomain(domains) = outcome else {
        panic!("expected several domains");
    };
    let names: Vec<_> = domains.iter().filter_map(|d| d.domain.as_deref()).collect();
    assert_eq!(names, vec!["serbia", "croatia"]);
}

#[tokio::test]
async fn failed_login_uses_error_field() {
    let (_, transport) = shared(FixtureTransport::new().route(
        HttpMethod::Post,
        "/api/auth/token-by-email",
        vec![FixtureReply::ok(json!({"success": false, "error": "Unknown email"}))],
    ));

    let err = AuthService::new(transport)
        .login("x@y.z")
        .await
        .expect_err("unknown");

    assert_eq!(err.message, "Unknown email");
}

#[tokio::test]
async fn storage_stats_flag_disk_pressure() {
    let (_, transport) = shared(FixtureTransport::demo());
    let stats = StorageService::new(transport).stats().await.expect("stats");

    assert_eq!(stats.total_videos, 1);
    assert!(stats.is_warning());
    assert!(!stats.is_critical());
}

#[test]
fn sizes_and_durations_are_human_readable() {
    assert_eq!(format_size_mb(0.5), "512.00 KB");
    assert_eq!(format_size_mb(12.5), "12.50 MB");
    assert_eq!(format_size_mb(2048.0), "2.00 GB");

    assert_eq!(format_duration(None), "N/A");
    assert_eq!(format_duration(Some(0.0)), "N/A");
    assert_eq!(format_duration(Some(75.9)), "1:15");
    assert_eq!(format_duration(Some(3725.0)), "1:02:05");
}

fn json_body(request: &facetrain_engine::ApiRequest) -> serde_json::Value {
    match &request.body {
        RequestBody::Json(body) => body.clone(),
        other => panic!("expected json body, got {other:?}"),
    }
}

#[tokio::test]
async fn comparison_uploads_image_with_ground_truth_only_when_given() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let upload = ComparisonUpload::new(UploadFile::from_bytes("face.jpg", vec![7u8; 32]))
        .ground_truth("Novak Djokovic");

    let result = AbTestingService::new(transport)
        .run_comparison(upload)
        .await
        .expect("compared");

    assert_eq!(result.pipeline_b_result.confidence, Some(97.2));
    assert!(result.comparison.comparison_metrics.results_match);
    let requests = fixture.requests();
    assert_eq!(requests[0].path, "/api/test/recognize");
    assert_eq!(requests[0].timeout, CallTimeout::Recognition);
    let RequestBody::Multipart(fields) = &requests[0].body else {
        panic!("expected multipart body");
    };
    let names: Vec<_> = fields
        .iter()
        .map(|field| match field {
            MultipartField::Text { name, .. } | MultipartField::File { name, .. } => name.as_str(),
        })
        .collect();
    assert_eq!(names, vec!["image", "ground_truth"]);
}

#[tokio::test]
async fn daily_metrics_filter_by_date_and_weekly_do_not() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let service = AbTestingService::new(transport);

    let daily = service
        .daily_metrics(Some("2026-01-05"))
        .await
        .expect("daily");
    let weekly = service.weekly_metrics().await.expect("weekly");

    assert_eq!(daily.total_comparisons, 1234);
    assert_eq!(daily.agreement.agreement_rate, 87.5);
    assert_eq!(daily.status_breakdown["both_succeeded"].count, 1015);
    assert_eq!(weekly.total_comparisons, 5234);
    let requests = fixture.requests();
    assert_eq!(
        requests[0].query,
        vec![("date".to_string(), "2026-01-05".to_string())]
    );
    assert!(requests[1].query.is_empty());
    assert_eq!(requests[1].timeout, CallTimeout::Quick);
}

#[tokio::test]
async fn health_lists_pipeline_states() {
    let (_, transport) = shared(FixtureTransport::demo());
    let health = AbTestingService::new(transport)
        .health()
        .await
        .expect("health");

    assert!(health.is_healthy());
    assert_eq!(health.pipelines["pipeline_b"], "operational");
}

#[tokio::test]
async fn smart_queue_is_read_without_an_envelope() {
    let (_, transport) = shared(FixtureTransport::demo());
    let queue = SmartTrainingService::new(transport)
        .queue("serbia")
        .await
        .expect("queue");

    assert_eq!(queue.queue_size, 2);
    assert_eq!(queue.queue[0].priority, Priority::High);
    assert_eq!(queue.queue[1].priority, Priority::Medium);
    assert_eq!(queue.queue[1].key(), "Ana Ivanovic");
}

#[tokio::test]
async fn promotion_moves_the_person_to_the_top() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    SmartTrainingService::new(transport)
        .update_priority("Ana Ivanovic", Priority::High, "serbia", true)
        .await
        .expect("promoted");

    let body = json_body(&fixture.requests()[0]);
    assert_eq!(
        body,
        json!({
            "person_name": "Ana Ivanovic",
            "priority": "high",
            "domain": "serbia",
            "move_to_top": true
        })
    );
}

#[tokio::test]
async fn smart_cycle_starts_with_default_limits() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let started = SmartTrainingService::new(transport)
        .start_cycle(&SmartCycleConfig::new("croatia"))
        .await
        .expect("started");

    assert_eq!(started.run_id, Some(json!(7)));
    let request = &fixture.requests()[0];
    assert_eq!(request.timeout, CallTimeout::Quick);
    assert_eq!(
        json_body(request),
        json!({
            "domain": "croatia",
            "discover_new": true,
            "benchmark_existing": true,
            "max_new_discoveries": 10,
            "max_training_per_run": 5,
            "images_per_person": 20
        })
    );
}

#[tokio::test]
async fn runs_and_benchmarks_are_decoded() {
    let (_, transport) = shared(FixtureTransport::demo());
    let service = SmartTrainingService::new(transport);

    let runs = service.runs("serbia").await.expect("runs");
    assert_eq!(runs[0].run_id, "7");
    assert_eq!(runs[0].training.as_ref().map(|t| t.successful), Some(1));

    let benchmark = service
        .benchmark_person("Novak Djokovic", "serbia", 20)
        .await
        .expect("benchmark");
    assert_eq!(benchmark.recognition_score, Some(62.0));

    let candidates = service
        .benchmark_candidates("serbia", 80)
        .await
        .expect("candidates");
    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn discovery_accepts_results_and_full_names() {
    let (_, transport) = shared(FixtureTransport::new().route(
        HttpMethod::Get,
        "/api/training/discover/trending",
        vec![FixtureReply::ok(json!({
            "success": true,
            "results": [{"full_name": "Nikola Jokic", "wikidata_id": "Q2009986"}]
        }))],
    ));

    let found = SmartTrainingService::new(transport)
        .discover_trending("serbia", 20)
        .await
        .expect("discovered");

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Nikola Jokic");
}

#[tokio::test]
async fn merge_candidates_are_keyed_by_scan_position() {
    let (_, transport) = shared(FixtureTransport::demo());
    let scan = MergeCandidatesService::new(transport)
        .candidates("serbia")
        .await
        .expect("scan");

    assert_eq!(scan.total_candidates, 2);
    assert_eq!(scan.summary.spelling_variants, 2);
    let keys: Vec<_> = scan.candidates.iter().map(|c| c.key().to_string()).collect();
    assert_eq!(keys, vec!["0", "1"]);
    assert_eq!(scan.candidates[1].index(), 1);
    assert_eq!(scan.candidates[1].kind, "SPELLING_VARIANT");
}

#[tokio::test]
async fn merge_actions_carry_rename_and_swap() {
    let (fixture, transport) = shared(FixtureTransport::demo());
    let service = MergeCandidatesService::new(transport);

    service
        .execute_action(1, &MergeAction::Merge { swap: true }, "serbia")
        .await
        .expect("merged");
    let rename = MergeAction::Rename {
        new_name: "Kevin Durant".to_string(),
    };
    service
        .execute_action(0, &rename, "serbia")
        .await
        .expect("renamed");

    let requests = fixture.requests();
    assert_eq!(requests[0].path, "/api/training/merge-candidates/1/action");
    assert_eq!(
        json_body(&requests[0]),
        json!({"domain": "serbia", "action": "MERGE", "new_name": null, "swap_direction": true})
    );
    assert_eq!(
        json_body(&requests[1]),
        json!({
            "domain": "serbia",
            "action": "RENAME",
            "new_name": "Kevin Durant",
            "swap_direction": false
        })
    );
}
