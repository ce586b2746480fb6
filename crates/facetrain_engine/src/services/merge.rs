use std::sync::Arc;

use facetrain_core::MergeCandidate;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{decode, decode_field, expect_success, quick_get, ActionResponse};
use crate::{ApiError, ApiRequest, CallTimeout, Transport};

/// Candidate counts per kind of likely duplicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MergeSummary {
    #[serde(default)]
    pub typos: u32,
    #[serde(default)]
    pub duplicates: u32,
    #[serde(default)]
    pub spelling_variants: u32,
    #[serde(default)]
    pub nicknames: u32,
}

/// Result of the latest duplicate scan of a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MergeScan {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub scanned_at: Option<String>,
    #[serde(default)]
    pub total_persons: u32,
    #[serde(default)]
    pub total_candidates: u32,
    #[serde(default)]
    pub summary: MergeSummary,
    #[serde(default)]
    pub candidates: Vec<MergeCandidate>,
}

impl MergeScan {
    /// Number each candidate by its position, the id the backend expects.
    fn indexed(mut self) -> Self {
        self.candidates = self
            .candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| candidate.with_index(index))
            .collect();
        self
    }
}

/// What to do with a merge candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    /// Fold the source into the target, or the target into the source when swapped.
    Merge { swap: bool },
    Rename { new_name: String },
    Delete,
    Skip,
}

impl MergeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeAction::Merge { .. } => "MERGE",
            MergeAction::Rename { .. } => "RENAME",
            MergeAction::Delete => "DELETE",
            MergeAction::Skip => "SKIP",
        }
    }

    fn body(&self, domain: &str) -> Value {
        let new_name = match self {
            MergeAction::Rename { new_name } => Some(new_name.as_str()),
            _ => None,
        };
        json!({
            "domain": domain,
            "action": self.as_str(),
            "new_name": new_name,
            "swap_direction": matches!(self, MergeAction::Merge { swap: true }),
        })
    }
}

/// Detection and cleanup of person entries that name the same person.
#[derive(Clone)]
pub struct MergeCandidatesService {
    transport: Arc<dyn Transport>,
}

impl MergeCandidatesService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn candidates(&self, domain: &str) -> Result<MergeScan, ApiError> {
        let request = quick_get("/api/training/merge-candidates").query("domain", domain);
        self.scan_reply(request).await
    }

    /// Rescan the whole domain. Positions of earlier candidates are invalidated.
    pub async fn scan(&self, domain: &str) -> Result<MergeScan, ApiError> {
        let request = ApiRequest::post("/api/training/merge-candidates/scan")
            .json(json!({ "domain": domain }))
            .timeout(CallTimeout::Candidates);
        self.scan_reply(request).await
    }

    /// Apply an action to the candidate at `index` of the latest scan.
    pub async fn execute_action(
        &self,
        index: usize,
        action: &MergeAction,
        domain: &str,
    ) -> Result<ActionResponse, ApiError> {
        let request = ApiRequest::post(format!("/api/training/merge-candidates/{index}/action"))
            .json(action.body(domain));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    /// Merge two persons by name; the source's images move to the target.
    pub async fn merge_persons(
        &self,
        source: &str,
        target: &str,
        domain: &str,
    ) -> Result<ActionResponse, ApiError> {
        let request = ApiRequest::post("/api/training/merge-persons").json(json!({
            "source_person": source,
            "target_person": target,
            "domain": domain,
        }));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    async fn scan_reply(&self, request: ApiRequest) -> Result<MergeScan, ApiError> {
        let body = expect_success(self.transport.send(request).await?)?;
        let scan: MergeScan = decode_field(&body, "data")?;
        Ok(scan.indexed())
    }
}
