use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use facetrain_logging::ft_debug;
use serde_json::{json, Value};

use crate::transport::status_error;
use crate::{ApiError, ApiRequest, ApiResponse, FailureKind, HttpMethod, Transport};

#[derive(Debug, Clone, PartialEq)]
pub enum FixtureReply {
    Json { status: u16, body: Value },
    Error(ApiError),
}

impl FixtureReply {
    pub fn ok(body: Value) -> Self {
        Self::Json { status: 200, body }
    }

    pub fn with_status(status: u16, body: Value) -> Self {
        Self::Json { status, body }
    }

    pub fn error(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Error(ApiError::new(kind, message))
    }
}

/// In-process transport serving canned replies per route.
///
/// Each route holds a queue of replies consumed in order; the last reply is
/// repeated once the queue is down to one. Every request is recorded.
#[derive(Debug, Default)]
pub struct FixtureTransport {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<FixtureReply>>>,
    requests: Mutex<Vec<ApiRequest>>,
    latency: Option<Duration>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply, to mimic a remote round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn route(self, method: HttpMethod, path: &str, replies: Vec<FixtureReply>) -> Self {
        self.add_route(method, path, replies);
        self
    }

    pub fn add_route(&self, method: HttpMethod, path: &str, replies: Vec<FixtureReply>) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert((method, path.to_string()), replies.into());
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self, method: HttpMethod, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    fn next_reply(&self, method: HttpMethod, path: &str) -> Option<FixtureReply> {
        let mut routes = self.routes.lock().ok()?;
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    /// Canned data for running the console without a backend.
    pub fn demo() -> Self {
        let video_done = json!({
            "success": true,
            "status": "completed",
            "video_id": "demo-video",
            "domain": "serbia",
            "statistics": {
                "total_frames": 30,
                "recognized_frames": 18,
                "recognition_rate": 60.0,
                "unique_persons": 3,
                "persons_list": ["Novak Djokovic", "Ana Ivanovic", "Emir Kusturica"]
            }
        });
        let batch = |status: &str, completed: u32| {
            json!({
                "success": true,
                "batch_id": "demo-batch",
                "status": status,
                "total": 2,
                "completed": completed,
                "failed": 0,
                "progress_percentage": completed * 50
            })
        };

        let metrics = |total: u32| {
            json!({
                "success": true,
                "summary": {
                    "total_comparisons": total,
                    "date_range": {"start": "2026-01-01", "end": "2026-01-07"},
                    "status_breakdown": {"both_succeeded": {"count": 1015, "percentage": 82.3}},
                    "agreement": {"total_agreements": 1080, "total_disagreements": 154, "agreement_rate": 87.5},
                    "accuracy": {"total_with_ground_truth": 900, "pipeline_a_accuracy": 87.2,
                                 "pipeline_b_accuracy": 99.1, "improvement": 11.9},
                    "performance": {"avg_confidence_difference": 5.2, "avg_time_difference_ms": 280.0}
                }
            })
        };
        let merge_scan = FixtureReply::ok(json!({
            "success": true,
            "data": {
                "domain": "serbia",
                "scanned_at": "2026-01-02T10:00:00Z",
                "total_persons": 5000,
                "total_candidates": 2,
                "summary": {"typos": 0, "duplicates": 0, "spelling_variants": 2, "nicknames": 0},
                "candidates": [
                    {"source_name": "Kevin Durent", "source_embeddings": 20, "target_name": "Kevin Durant",
                     "target_embeddings": 45, "type": "SPELLING_VARIANT", "action": "MERGE",
                     "reason": "Serbian \"durent\" vs English \"durant\""},
                    {"source_name": "Kobi Brajant", "source_embeddings": 15, "target_name": "Kobe Bryant",
                     "target_embeddings": 50, "type": "SPELLING_VARIANT", "action": "MERGE",
                     "reason": "Serbian spelling variant"}
                ]
            }
        }));
        let ok = FixtureReply::ok(json!({"success": true}));

        Self::new()
            .with_latency(Duration::from_millis(150))
            .route(
                HttpMethod::Post,
                "/api/auth/token-by-email",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "data": {"token": "demo-token", "email": "demo@example.com"}
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/countries",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "countries": [{"id": "serbia", "name": "Serbia"}, {"id": "croatia", "name": "Croatia"}]
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/occupations",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "occupations": [{"id": "actor", "name": "Actor"}, {"id": "tennis_player", "name": "Tennis Player"}]
                }))],
            )
            .route(
                HttpMethod::Post,
                "/api/training/generate-candidates",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "candidates": [
                        {"full_name": "Novak Djokovic", "name": "Novak", "last_name": "Djokovic",
                         "occupation": "tennis_player", "country": "serbia", "wikidata_id": "Q5812",
                         "has_wikipedia_image": true, "exists_in_db": false, "existing_photo_count": 0,
                         "folder_name": "novak_djokovic"},
                        {"full_name": "Emir Kusturica", "name": "Emir", "last_name": "Kusturica",
                         "occupation": "director", "country": "serbia", "wikidata_id": "Q55411",
                         "has_wikipedia_image": true, "exists_in_db": true, "existing_photo_count": 47,
                         "folder_name": "emir_kusturica"}
                    ],
                    "statistics": {"total": 2, "new": 1, "existing": 1}
                }))],
            )
            .route(
                HttpMethod::Post,
                "/api/training/start-batch",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "message": "Started batch training for 1 people",
                    "batch_id": "demo-batch",
                    "total_people": 1
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/batch/demo-batch/status",
                vec![
                    FixtureReply::ok(batch("processing", 0)),
                    FixtureReply::ok(batch("processing", 1)),
                    FixtureReply::ok(batch("completed", 2)),
                ],
            )
            .route(
                HttpMethod::Post,
                "/api/training/batch/demo-batch/cancel",
                vec![FixtureReply::ok(json!({"success": true, "message": "Batch cancelled successfully"}))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/staging-list",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "people": [
                        {"folder_name": "novak_djokovic", "image_count": 28, "ready_for_production": true},
                        {"folder_name": "ana_ivanovic", "image_count": 31, "ready_for_production": true},
                        {"folder_name": "unknown_person", "image_count": 3, "ready_for_production": false}
                    ]
                }))],
            )
            .route(
                HttpMethod::Post,
                "/api/training/deploy",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "message": "Deployed 2 people to production",
                    "deployed": [{"folder": "novak_djokovic", "image_count": 28}, {"folder": "ana_ivanovic", "image_count": 31}],
                    "skipped": [],
                    "errors": []
                }))],
            )
            .route(
                HttpMethod::Post,
                "/api/training/staging/remove",
                vec![FixtureReply::ok(json!({"success": true, "message": "Removed from staging"}))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/staging/serp-batches",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "running_batches": [],
                    "completed_batches": [{"batch_id": "serp-1", "status": "completed", "created_at": "2026-01-02T10:00:00Z", "total": 3, "completed": 3}]
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/staging/training-batches",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "running_batches": [{"batch_id": "demo-batch", "status": "processing", "created_at": "2026-01-03T09:00:00Z", "total": 2, "completed": 1}],
                    "completed_batches": [{"batch_id": "wiki-0", "status": "completed", "created_at": "2026-01-01T08:00:00Z", "total": 5, "completed": 5}]
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/excel/check-excel",
                vec![FixtureReply::ok(json!({"success": true, "message": "Generated 2 names", "data": {"count": 2}}))],
            )
            .route(
                HttpMethod::Get,
                "/api/excel/process",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "data": {"person": "Novak Djokovic", "images_downloaded": 28, "status": "completed"}
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/queue-status",
                vec![FixtureReply::ok(json!({"success": true, "data": {"pending": 2, "processing": 0, "completed": 5, "failed": 1}}))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/queue-list",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "data": {"queue": [
                        {"id": 1, "name": "Novak", "last_name": "Djokovic", "occupation": "tennis_player", "country": "serbia"},
                        {"id": 2, "name": "Emir", "last_name": "Kusturica", "occupation": "director", "country": "serbia"}
                    ]}
                }))],
            )
            .route(
                HttpMethod::Delete,
                "/api/training/queue",
                vec![FixtureReply::ok(json!({"success": true, "remaining_count": 1}))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/progress",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "data": {"folders": [
                        {"name": "novak_djokovic", "imageCount": 42, "lastModified": "2026-01-02T10:00:00Z"},
                        {"name": "ana_ivanovic", "imageCount": 12}
                    ]}
                }))],
            )
            .route(
                HttpMethod::Post,
                "/sync-faces",
                vec![FixtureReply::ok(json!({"success": true, "message": "Faces synchronized"}))],
            )
            .route(
                HttpMethod::Get,
                "/api/video/info",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "supported_formats": ["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv"],
                    "max_file_size_mb": 100,
                    "default_interval_seconds": 3.0,
                    "min_interval_seconds": 0.1,
                    "max_interval_seconds": 60.0
                }))],
            )
            .route(
                HttpMethod::Post,
                "/api/video/upload-async",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "message": "Video uploaded successfully. Processing in background.",
                    "video_id": "demo-video",
                    "status_endpoint": "/api/video/status/demo-video"
                }))],
            )
            .route(
                HttpMethod::Post,
                "/api/video/upload",
                vec![FixtureReply::ok(video_done.clone())],
            )
            .route(
                HttpMethod::Get,
                "/api/video/status/demo-video",
                vec![
                    FixtureReply::with_status(202, json!({"status": "processing"})),
                    FixtureReply::with_status(202, json!({"status": "processing"})),
                    FixtureReply::ok(video_done),
                ],
            )
            .route(
                HttpMethod::Get,
                "/api/storage/stats",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "total_videos": 1,
                    "total_size_mb": 512.5,
                    "disk_usage": {"total_mb": 2100.0, "videos_mb": 1800.0, "frames_mb": 250.0, "results_mb": 50.0}
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/storage/videos",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "videos": [{"video_id": "demo-video", "filename": "match.mp4", "size_mb": 512.5,
                                "duration_seconds": 30.5, "uploaded_at": "2026-01-02T10:00:00Z",
                                "frames_extracted": 30, "results_available": true}]
                }))],
            )
            .route(
                HttpMethod::Delete,
                "/api/storage/videos/demo-video",
                vec![FixtureReply::ok(json!({"success": true, "message": "Video deleted"}))],
            )
            .route(
                HttpMethod::Post,
                "/api/storage/cleanup",
                vec![FixtureReply::ok(json!({"success": true, "videos_deleted": 0, "days_threshold": 30}))],
            )
            .route(
                HttpMethod::Post,
                "/api/test/recognize",
                vec![FixtureReply::ok(json!({
                    "image_id": "demo.jpg",
                    "pipeline_a_result": {"status": "success", "person": "Novak Djokovic", "confidence": 93.5,
                                          "processing_time": 2.14,
                                          "profile_used": {"name": "Current System", "model": "VGG-Face", "threshold": 0.35}},
                    "pipeline_b_result": {"status": "success", "person": "Novak Djokovic", "confidence": 97.2,
                                          "processing_time": 2.45,
                                          "profile_used": {"name": "Improved System", "model": "Facenet512", "threshold": 0.4}},
                    "comparison": {"comparison_id": "cmp_demo", "comparison_metrics": {
                        "both_succeeded": true, "results_match": true, "confidence_difference": 3.7,
                        "processing_time_difference": 0.31, "faster_pipeline": "pipeline_a",
                        "accuracy": {"winner": "both"}}},
                    "recommendation": "Both systems agree. Pipeline B has 3.7% higher confidence."
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/test/metrics/daily",
                vec![FixtureReply::ok(metrics(1234))],
            )
            .route(
                HttpMethod::Get,
                "/api/test/metrics/weekly",
                vec![FixtureReply::ok(metrics(5234))],
            )
            .route(
                HttpMethod::Get,
                "/api/test/health",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "status": "healthy",
                    "pipelines": {"pipeline_a": "operational", "pipeline_b": "operational"}
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/smart/queue",
                vec![FixtureReply::ok(json!({
                    "queue_size": 2,
                    "queue": [
                        {"person_name": "Novak Djokovic", "priority": "high", "recognition_score": 62.0},
                        {"person_name": "Ana Ivanovic", "priority": "medium", "occupation": "tennis player"}
                    ]
                }))],
            )
            .route(
                HttpMethod::Post,
                "/api/training/smart/queue/add",
                vec![ok.clone()],
            )
            .route(
                HttpMethod::Post,
                "/api/training/smart/queue/remove",
                vec![ok.clone()],
            )
            .route(
                HttpMethod::Post,
                "/api/training/smart/queue/priority",
                vec![ok.clone()],
            )
            .route(
                HttpMethod::Post,
                "/api/training/smart/run",
                vec![FixtureReply::ok(json!({"success": true, "run_id": 7, "message": "Smart training started"}))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/smart/runs",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "runs": [{"run_id": 7, "status": "completed", "started_at": "2026-01-02T10:00:00Z",
                              "discovery": {"discovered": 4, "queued": 2}, "benchmark": {"benchmarked": 3},
                              "training": {"attempted": 2, "successful": 1, "failed": 1}}]
                }))],
            )
            .route(
                HttpMethod::Post,
                "/api/training/benchmark/person",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "benchmark": {"person_name": "Novak Djokovic", "recognition_score": 62.0, "training_priority": "high"}
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/benchmark/candidates",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "candidates": [{"person_name": "Novak Djokovic", "recognition_score": 62.0}]
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/discover/trending",
                vec![FixtureReply::ok(json!({
                    "success": true,
                    "celebrities": [{"name": "Nikola Jokic", "occupation": "basketball player",
                                     "wikidata_id": "Q2009986", "score": 0.93}]
                }))],
            )
            .route(
                HttpMethod::Get,
                "/api/training/merge-candidates",
                vec![merge_scan.clone()],
            )
            .route(
                HttpMethod::Post,
                "/api/training/merge-candidates/scan",
                vec![merge_scan],
            )
            .route(
                HttpMethod::Post,
                "/api/training/merge-candidates/0/action",
                vec![ok.clone()],
            )
            .route(
                HttpMethod::Post,
                "/api/training/merge-candidates/1/action",
                vec![ok.clone()],
            )
            .route(
                HttpMethod::Post,
                "/api/training/merge-persons",
                vec![ok],
            )
    }
}

#[async_trait::async_trait]
impl Transport for FixtureTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        ft_debug!("fixture {} {}", request.method, request.path);
        let reply = self.next_reply(request.method, &request.path);
        let method = request.method;
        let path = request.path.clone();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match reply {
            Some(FixtureReply::Json { status, body }) if (200..300).contains(&status) => {
                Ok(ApiResponse { status, body })
            }
            Some(FixtureReply::Json { status, body }) => Err(status_error(status, &body)),
            Some(FixtureReply::Error(err)) => Err(err),
            None => Err(ApiError::new(
                FailureKind::HttpStatus(404),
                format!("no fixture for {method} {path}"),
            )),
        }
    }
}
