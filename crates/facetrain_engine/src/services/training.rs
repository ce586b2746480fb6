use std::sync::Arc;

use facetrain_core::{ProgressFolder, QueueItem, QueueStatus};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{decode, decode_field, expect_success, quick_get, ActionResponse, Choice};
use crate::{ApiError, ApiRequest, CallTimeout, Transport};

/// Outcome of processing the next person in the download queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    pub message: Option<String>,
    pub data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemovedFromQueue {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub remaining_count: Option<u64>,
}

/// Manual pipeline: name generation, the download queue and progress.
#[derive(Clone)]
pub struct TrainingService {
    transport: Arc<dyn Transport>,
}

impl TrainingService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Ask the backend to generate names for `country`, optionally limited to
    /// some occupations.
    pub async fn generate_names(
        &self,
        country: &str,
        occupations: &[String],
    ) -> Result<ActionResponse, ApiError> {
        let mut request = ApiRequest::get("/api/excel/check-excel")
            .query("country", country)
            .timeout(CallTimeout::Generation);
        if !occupations.is_empty() {
            request = request.query("occupation", occupations.join(","));
        }
        decode(expect_success(self.transport.send(request).await?)?)
    }

    pub async fn process_next(&self) -> Result<ProcessResult, ApiError> {
        let request = ApiRequest::get("/api/excel/process").timeout(CallTimeout::Processing);
        let body = expect_success(self.transport.send(request).await?)?;
        Ok(ProcessResult {
            message: body
                .get("message")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            data: body.get("data").cloned().unwrap_or(Value::Null),
        })
    }

    pub async fn queue_status(&self) -> Result<QueueStatus, ApiError> {
        let request = quick_get("/api/training/queue-status");
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body, "data")
    }

    pub async fn queue_list(&self) -> Result<Vec<QueueItem>, ApiError> {
        let request = quick_get("/api/training/queue-list");
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body["data"], "queue")
    }

    pub async fn remove_from_queue(&self, id: &str) -> Result<RemovedFromQueue, ApiError> {
        let request = ApiRequest::delete("/api/training/queue").json(json!({ "id": id }));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    pub async fn training_progress(&self, domain: &str) -> Result<Vec<ProgressFolder>, ApiError> {
        let request = quick_get("/api/training/progress").query("domain", domain);
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body["data"], "folders")
    }

    pub async fn sync_faces(&self) -> Result<ActionResponse, ApiError> {
        let request = ApiRequest::post("/sync-faces");
        decode(expect_success(self.transport.send(request).await?)?)
    }

    pub async fn occupations(&self) -> Result<Vec<Choice>, ApiError> {
        let request = quick_get("/api/excel/occupations");
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body, "occupations")
    }
}
