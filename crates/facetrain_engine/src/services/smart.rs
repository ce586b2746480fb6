use std::sync::Arc;

use facetrain_core::{Priority, SmartQueueEntry, SmartRun};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{decode, decode_field, expect_success, quick_get, ActionResponse};
use crate::{ApiError, ApiRequest, CallTimeout, Transport};

/// People waiting to be trained, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SmartQueue {
    #[serde(default)]
    pub queue_size: u32,
    #[serde(default)]
    pub queue: Vec<SmartQueueEntry>,
}

/// Parameters of one smart training cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmartCycleConfig {
    pub domain: String,
    pub discover_new: bool,
    pub benchmark_existing: bool,
    pub max_new_discoveries: u32,
    pub max_training_per_run: u32,
    pub images_per_person: u32,
}

impl SmartCycleConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            discover_new: true,
            benchmark_existing: true,
            max_new_discoveries: 10,
            max_training_per_run: 5,
            images_per_person: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartedCycle {
    #[serde(default)]
    pub run_id: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BenchmarkResult {
    #[serde(default)]
    pub person_name: String,
    #[serde(default)]
    pub recognition_score: Option<f64>,
    #[serde(default)]
    pub training_priority: Option<String>,
}

/// A trending person found by discovery.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Celebrity {
    #[serde(default, alias = "full_name")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub wikidata_id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Smart training: a priority queue fed by discovery and benchmarks, and the
/// cycles that train from it.
#[derive(Clone)]
pub struct SmartTrainingService {
    transport: Arc<dyn Transport>,
}

impl SmartTrainingService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// The queue body carries no envelope.
    pub async fn queue(&self, domain: &str) -> Result<SmartQueue, ApiError> {
        let request = quick_get("/api/training/smart/queue").query("domain", domain);
        decode(self.transport.send(request).await?.body)
    }

    pub async fn add_to_queue(
        &self,
        entry: &SmartQueueEntry,
        domain: &str,
    ) -> Result<ActionResponse, ApiError> {
        let request = ApiRequest::post("/api/training/smart/queue/add").json(json!({
            "person_name": entry.person_name,
            "domain": domain,
            "priority": entry.priority,
            "wikidata_id": entry.wikidata_id,
            "recognition_score": entry.recognition_score,
        }));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    pub async fn remove_from_queue(
        &self,
        person_name: &str,
        domain: &str,
    ) -> Result<ActionResponse, ApiError> {
        let request = ApiRequest::post("/api/training/smart/queue/remove")
            .json(json!({ "person_name": person_name, "domain": domain }));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    /// Change a person's priority; `move_to_top` also puts them first.
    pub async fn update_priority(
        &self,
        person_name: &str,
        priority: Priority,
        domain: &str,
        move_to_top: bool,
    ) -> Result<ActionResponse, ApiError> {
        let request = ApiRequest::post("/api/training/smart/queue/priority").json(json!({
            "person_name": person_name,
            "priority": priority,
            "domain": domain,
            "move_to_top": move_to_top,
        }));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    /// Start a cycle. The backend runs it in the background and answers at once.
    pub async fn start_cycle(&self, config: &SmartCycleConfig) -> Result<StartedCycle, ApiError> {
        let request = ApiRequest::post("/api/training/smart/run")
            .json(json!(config))
            .timeout(CallTimeout::Quick);
        decode(expect_success(self.transport.send(request).await?)?)
    }

    pub async fn runs(&self, domain: &str) -> Result<Vec<SmartRun>, ApiError> {
        let request = quick_get("/api/training/smart/runs")
            .query("domain", domain)
            .query("limit", "50");
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body, "runs")
    }

    /// Recognize a sample of the person's images and score the result.
    pub async fn benchmark_person(
        &self,
        person_name: &str,
        domain: &str,
        num_images: u32,
    ) -> Result<BenchmarkResult, ApiError> {
        let request = ApiRequest::post("/api/training/benchmark/person")
            .json(json!({
                "person_name": person_name,
                "domain": domain,
                "num_images": num_images,
            }))
            .timeout(CallTimeout::Recognition);
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body, "benchmark")
    }

    /// People whose last benchmark scored below `min_score`.
    pub async fn benchmark_candidates(
        &self,
        domain: &str,
        min_score: u32,
    ) -> Result<Vec<SmartQueueEntry>, ApiError> {
        let request = quick_get("/api/training/benchmark/candidates")
            .query("domain", domain)
            .query("min_score", min_score.to_string());
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body, "candidates")
    }

    pub async fn discover_trending(
        &self,
        country: &str,
        max_results: u32,
    ) -> Result<Vec<Celebrity>, ApiError> {
        let request = ApiRequest::get("/api/training/discover/trending")
            .query("country", country)
            .query("max_results", max_results.to_string())
            .timeout(CallTimeout::Generation);
        let body = expect_success(self.transport.send(request).await?)?;
        match body.get("celebrities") {
            Some(list) if !list.is_null() => decode(list.clone()),
            _ => decode_field(&body, "results"),
        }
    }
}
