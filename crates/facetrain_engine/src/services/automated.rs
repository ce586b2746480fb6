use std::sync::Arc;

use facetrain_core::{
    BatchSource, BatchSummary, CandidateItem, DeployReport, FolderSummary, StatusResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{decode, decode_field, expect_success, quick_get, ActionResponse, Choice};
use crate::{ApiError, ApiRequest, CallTimeout, Transport};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CandidateStatistics {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub new: u32,
    #[serde(default)]
    pub existing: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CandidateBatch {
    #[serde(default)]
    pub candidates: Vec<CandidateItem>,
    #[serde(default)]
    pub statistics: CandidateStatistics,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartedBatch {
    pub batch_id: String,
    #[serde(default)]
    pub total_people: u32,
    #[serde(default)]
    pub message: Option<String>,
}

/// Running and finished batches of one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchList {
    #[serde(default)]
    pub running_batches: Vec<BatchSummary>,
    #[serde(default)]
    pub completed_batches: Vec<BatchSummary>,
}

/// Batches of both pipelines, tagged by source, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllBatches {
    pub running: Vec<BatchSummary>,
    pub completed: Vec<BatchSummary>,
}

/// Automated pipeline: candidate generation, batch training and staging.
#[derive(Clone)]
pub struct AutomatedTrainingService {
    transport: Arc<dyn Transport>,
}

impl AutomatedTrainingService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn countries(&self) -> Result<Vec<Choice>, ApiError> {
        let body = self.get("/api/training/countries").await?;
        decode_field(&body, "countries")
    }

    pub async fn occupations(&self) -> Result<Vec<Choice>, ApiError> {
        let body = self.get("/api/training/occupations").await?;
        decode_field(&body, "occupations")
    }

    pub async fn generate_candidates(
        &self,
        country: &str,
        occupation: &str,
        domain: &str,
    ) -> Result<CandidateBatch, ApiError> {
        let request = ApiRequest::post("/api/training/generate-candidates")
            .json(json!({ "country": country, "occupation": occupation, "domain": domain }))
            .timeout(CallTimeout::Candidates);
        decode(expect_success(self.transport.send(request).await?)?)
    }

    pub async fn start_batch(
        &self,
        candidates: &[CandidateItem],
        domain: &str,
    ) -> Result<StartedBatch, ApiError> {
        let request = ApiRequest::post("/api/training/start-batch")
            .json(json!({ "candidates": candidates, "domain": domain }));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    /// Raw status of a batch. `success: false` is not an error here: the
    /// body's `status` decides what it means.
    pub async fn batch_status(&self, batch_id: &str) -> Result<StatusResponse, ApiError> {
        let request = quick_get(format!("/api/training/batch/{batch_id}/status"));
        decode(self.transport.send(request).await?.body)
    }

    pub async fn cancel_batch(&self, batch_id: &str) -> Result<ActionResponse, ApiError> {
        let request = ApiRequest::post(format!("/api/training/batch/{batch_id}/cancel"));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    pub async fn staging_list(&self, domain: &str) -> Result<Vec<FolderSummary>, ApiError> {
        let request = quick_get("/api/training/staging-list").query("domain", domain);
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body, "people")
    }

    pub async fn deploy_to_production(
        &self,
        people: &[String],
        domain: &str,
    ) -> Result<DeployReport, ApiError> {
        let request = ApiRequest::post("/api/training/deploy")
            .json(json!({ "people": people, "domain": domain }));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    pub async fn remove_from_staging(
        &self,
        people: &[String],
        domain: &str,
    ) -> Result<ActionResponse, ApiError> {
        let request = ApiRequest::post("/api/training/staging/remove")
            .json(json!({ "people": people, "domain": domain }));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    pub async fn serp_batches(&self) -> Result<BatchList, ApiError> {
        decode(self.get("/api/training/staging/serp-batches").await?)
    }

    pub async fn training_batches(&self) -> Result<BatchList, ApiError> {
        decode(self.get("/api/training/staging/training-batches").await?)
    }

    /// Both batch lists fetched concurrently; either failure fails the call.
    pub async fn list_all_batches(&self) -> Result<AllBatches, ApiError> {
        let batches = futures_util::future::try_join(self.serp_batches(), self.training_batches());
        let (serp, wikidata) = batches.await?;

        let mut all = AllBatches::default();
        for (list, source) in [(serp, BatchSource::Serp), (wikidata, BatchSource::Wikidata)] {
            all.running.extend(tag(list.running_batches, source));
            all.completed.extend(tag(list.completed_batches, source));
        }
        all.running.sort_by(|a, b| b.sort_key().cmp(a.sort_key()));
        all.completed.sort_by(|a, b| b.sort_key().cmp(a.sort_key()));
        Ok(all)
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        expect_success(self.transport.send(quick_get(path)).await?)
    }
}

fn tag(batches: Vec<BatchSummary>, source: BatchSource) -> impl Iterator<Item = BatchSummary> {
    batches.into_iter().map(move |mut batch| {
        batch.source = Some(source);
        batch
    })
}
