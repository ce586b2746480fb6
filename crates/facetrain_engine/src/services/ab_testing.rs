use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::{decode, decode_field, expect_success, quick_get};
use crate::{ApiError, ApiRequest, CallTimeout, MultipartField, Transport, UploadFile};

/// An image to recognize with both pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonUpload {
    pub file: UploadFile,
    pub image_id: Option<String>,
    /// The person actually shown, when known; lets the backend score accuracy.
    pub ground_truth: Option<String>,
}

impl ComparisonUpload {
    pub fn new(file: UploadFile) -> Self {
        Self {
            file,
            image_id: None,
            ground_truth: None,
        }
    }

    pub fn image_id(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn ground_truth(mut self, person: impl Into<String>) -> Self {
        self.ground_truth = Some(person.into());
        self
    }

    fn into_fields(self) -> Vec<MultipartField> {
        let mut fields = vec![MultipartField::File {
            name: "image".to_string(),
            file: self.file,
        }];
        let optional = [("image_id", self.image_id), ("ground_truth", self.ground_truth)];
        for (name, value) in optional {
            if let Some(value) = value.filter(|value| !value.is_empty()) {
                fields.push(MultipartField::Text {
                    name: name.to_string(),
                    value,
                });
            }
        }
        fields
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileUsed {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// What one pipeline made of the image.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub person: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Seconds.
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub profile_used: Option<ProfileUsed>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccuracyVerdict {
    #[serde(default)]
    pub pipeline_a_correct: Option<bool>,
    #[serde(default)]
    pub pipeline_b_correct: Option<bool>,
    /// `pipeline_a`, `pipeline_b`, `both` or `neither`.
    #[serde(default)]
    pub winner: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ComparisonMetrics {
    #[serde(default)]
    pub both_succeeded: bool,
    #[serde(default)]
    pub results_match: bool,
    #[serde(default)]
    pub confidence_difference: Option<f64>,
    #[serde(default)]
    pub processing_time_difference: Option<f64>,
    #[serde(default)]
    pub faster_pipeline: Option<String>,
    #[serde(default)]
    pub accuracy: Option<AccuracyVerdict>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Comparison {
    #[serde(default)]
    pub comparison_id: Option<Value>,
    #[serde(default)]
    pub comparison_metrics: ComparisonMetrics,
}

/// Side-by-side answer of the two recognition pipelines.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ComparisonResult {
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub ground_truth: Option<String>,
    #[serde(default)]
    pub pipeline_a_result: PipelineResult,
    #[serde(default)]
    pub pipeline_b_result: PipelineResult,
    #[serde(default)]
    pub comparison: Comparison,
    #[serde(default)]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusShare {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Agreement {
    #[serde(default)]
    pub total_agreements: u64,
    #[serde(default)]
    pub total_disagreements: u64,
    #[serde(default)]
    pub agreement_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccuracySummary {
    #[serde(default)]
    pub total_with_ground_truth: u64,
    #[serde(default)]
    pub pipeline_a_accuracy: Option<f64>,
    #[serde(default)]
    pub pipeline_b_accuracy: Option<f64>,
    #[serde(default)]
    pub improvement: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PerformanceSummary {
    #[serde(default)]
    pub avg_confidence_difference: Option<f64>,
    #[serde(default)]
    pub avg_time_difference_ms: Option<f64>,
    #[serde(default)]
    pub pipeline_b_faster_count: u64,
}

/// Aggregated comparisons over a day or a week.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetricsSummary {
    #[serde(default)]
    pub total_comparisons: u64,
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub status_breakdown: BTreeMap<String, StatusShare>,
    #[serde(default)]
    pub agreement: Agreement,
    #[serde(default)]
    pub accuracy: AccuracySummary,
    #[serde(default)]
    pub performance: PerformanceSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: String,
    /// Pipeline name to its state, such as `operational`.
    #[serde(default)]
    pub pipelines: BTreeMap<String, String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// A/B comparison of the current and the candidate recognition pipeline.
#[derive(Clone)]
pub struct AbTestingService {
    transport: Arc<dyn Transport>,
}

impl AbTestingService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Recognize one image with both pipelines. The body has no envelope.
    pub async fn run_comparison(
        &self,
        upload: ComparisonUpload,
    ) -> Result<ComparisonResult, ApiError> {
        let request = ApiRequest::post("/api/test/recognize")
            .multipart(upload.into_fields())
            .timeout(CallTimeout::Recognition);
        decode(self.transport.send(request).await?.body)
    }

    /// Metrics of one day; today when no date is given.
    pub async fn daily_metrics(&self, date: Option<&str>) -> Result<MetricsSummary, ApiError> {
        let mut request = quick_get("/api/test/metrics/daily");
        if let Some(date) = date {
            request = request.query("date", date);
        }
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body, "summary")
    }

    pub async fn weekly_metrics(&self) -> Result<MetricsSummary, ApiError> {
        let request = quick_get("/api/test/metrics/weekly");
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body, "summary")
    }

    pub async fn health(&self) -> Result<HealthReport, ApiError> {
        let request = quick_get("/api/test/health");
        decode(expect_success(self.transport.send(request).await?)?)
    }
}
