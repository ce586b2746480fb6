use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-side statuses that mean "keep asking".
const IN_PROGRESS_STATUSES: &[&str] = &["processing", "queued", "pending", "running"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Processing,
    Completed,
    Failed,
    NotFound,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobPhase::Processing)
    }
}

/// Raw body of a job-status endpoint. Fields other than the envelope are
/// kept untouched in `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl StatusResponse {
    pub fn processing(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: "processing".to_string(),
            message: Some(message.into()),
            payload: Map::new(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: "not_found".to_string(),
            message: Some(message.into()),
            payload: Map::new(),
        }
    }

    pub fn phase(&self) -> JobPhase {
        classify_status(self)
    }

    /// Message to surface when the response ends tracking unsuccessfully.
    pub fn failure_message(&self) -> String {
        match self.message.as_deref() {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => match self.phase() {
                JobPhase::NotFound => "Job not found".to_string(),
                _ => "Failed to get job status".to_string(),
            },
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// A `processing` status is never terminal, whatever `success` says; a
/// `completed` status only counts as success when `success` is set.
pub fn classify_status(response: &StatusResponse) -> JobPhase {
    let status = response.status.as_str();
    if IN_PROGRESS_STATUSES.contains(&status) {
        JobPhase::Processing
    } else if response.success && status == "completed" {
        JobPhase::Completed
    } else if status == "not_found" {
        JobPhase::NotFound
    } else {
        JobPhase::Failed
    }
}

/// Status as exposed to callers: the raw response plus derived flags.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedStatus {
    pub response: StatusResponse,
    pub is_processing: bool,
    pub is_complete: bool,
}

impl TrackedStatus {
    pub fn from_response(response: StatusResponse) -> Self {
        let phase = response.phase();
        Self {
            is_processing: phase == JobPhase::Processing,
            is_complete: phase == JobPhase::Completed,
            response,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.response.phase()
    }
}
