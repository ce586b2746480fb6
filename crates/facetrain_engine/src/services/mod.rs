//! Typed access to the training backend, one service per area.
//!
//! Every service shares one [`Transport`]. Bodies follow the backend's
//! envelope: a `success` flag plus either payload fields or a message.
mod ab_testing;
mod auth;
mod automated;
mod merge;
mod smart;
mod storage;
mod training;
mod video;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::transport::body_message;
use crate::{ApiError, ApiRequest, ApiResponse, CallTimeout, FailureKind};

pub use ab_testing::{
    AbTestingService, AccuracySummary, AccuracyVerdict, Agreement, Comparison, ComparisonMetrics,
    ComparisonResult, ComparisonUpload, DateRange, HealthReport, MetricsSummary, PerformanceSummary,
    PipelineResult, ProfileUsed, StatusShare,
};
pub use auth::{AuthService, DomainToken, LoginOutcome};
pub use automated::{
    AllBatches, AutomatedTrainingService, BatchList, CandidateBatch, CandidateStatistics,
    StartedBatch,
};
pub use merge::{MergeAction, MergeCandidatesService, MergeScan, MergeSummary};
pub use smart::{
    BenchmarkResult, Celebrity, SmartCycleConfig, SmartQueue, SmartTrainingService, StartedCycle,
};
pub use storage::{
    format_duration, format_size_mb, CleanupReport, DiskUsage, StorageService, StorageStats,
};
pub use training::{ProcessResult, RemovedFromQueue, TrainingService};
pub use video::{UploadAccepted, VideoApiInfo, VideoService, VideoUpload};

/// Generic reply of an action endpoint. Fields beyond the envelope are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An entry of a selectable list, such as a country or an occupation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A status or list read, bounded by the quick timeout.
pub(crate) fn quick_get(path: impl Into<String>) -> ApiRequest {
    ApiRequest::get(path).timeout(CallTimeout::Quick)
}

/// Unwrap the envelope: a body without `success: true` is an application
/// error carrying the server's message.
pub(crate) fn expect_success(response: ApiResponse) -> Result<Value, ApiError> {
    let succeeded = response
        .body
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if succeeded {
        Ok(response.body)
    } else {
        let message = body_message(&response.body);
        let message = message.unwrap_or_else(|| "Request failed".into());
        Err(ApiError::application(message))
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

/// Decode `body[key]`, treating a missing or null field as the default.
pub(crate) fn decode_field<T: DeserializeOwned + Default>(
    body: &Value,
    key: &str,
) -> Result<T, ApiError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => decode(value.clone()),
    }
}
