//! Read-only projections of remote list entries.
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::ListItem;

/// Minimum images a training folder needs before it is considered adequate.
pub const MIN_TRAINING_IMAGES: u32 = 20;
/// Image count at which a training folder is considered complete.
pub const TARGET_TRAINING_IMAGES: u32 = 40;

/// A person waiting in the image-download queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub valid_photos: Option<u32>,
}

impl QueueItem {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn occupation_or_unknown(&self) -> &str {
        self.occupation.as_deref().unwrap_or("Unknown")
    }
}

impl ListItem for QueueItem {
    fn key(&self) -> &str {
        &self.id
    }

    fn search_text(&self) -> String {
        format!("{} {}", self.full_name(), self.occupation_or_unknown())
    }
}

/// Aggregate counters of the download queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
}

impl QueueStatus {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// A celebrity suggested for training by candidate generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub full_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub wikidata_id: String,
    #[serde(default)]
    pub has_wikipedia_image: bool,
    #[serde(default)]
    pub exists_in_db: bool,
    #[serde(default)]
    pub existing_photo_count: u32,
    #[serde(default)]
    pub folder_name: String,
}

impl ListItem for CandidateItem {
    fn key(&self) -> &str {
        &self.wikidata_id
    }

    fn search_text(&self) -> String {
        format!(
            "{} {}",
            self.full_name,
            self.occupation.as_deref().unwrap_or_default()
        )
    }

    /// People not yet in the database are selected for training by default.
    fn selected_by_default(&self) -> bool {
        !self.exists_in_db
    }
}

/// A person folder in staging, waiting for review and deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSummary {
    pub folder_name: String,
    #[serde(default)]
    pub image_count: u32,
    #[serde(default)]
    pub ready_for_production: bool,
}

impl ListItem for FolderSummary {
    fn key(&self) -> &str {
        &self.folder_name
    }

    fn search_text(&self) -> String {
        self.folder_name.replace('_', " ")
    }
}

/// A training folder as reported by the progress endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressFolder {
    pub name: String,
    #[serde(default)]
    pub image_count: u32,
    #[serde(default)]
    pub last_modified: Option<String>,
}

/// Readiness band of a training folder, by image count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Readiness {
    Empty,
    Insufficient,
    Adequate,
    Ready,
}

impl ProgressFolder {
    pub fn readiness(&self) -> Readiness {
        match self.image_count {
            0 => Readiness::Empty,
            n if n < MIN_TRAINING_IMAGES => Readiness::Insufficient,
            n if n < TARGET_TRAINING_IMAGES => Readiness::Adequate,
            _ => Readiness::Ready,
        }
    }
}

impl ListItem for ProgressFolder {
    fn key(&self) -> &str {
        &self.name
    }

    fn search_text(&self) -> String {
        self.name.replace('_', " ")
    }
}

/// Which pipeline produced a training batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchSource {
    Serp,
    Wikidata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default, rename = "type")]
    pub source: Option<BatchSource>,
}

impl BatchSummary {
    /// Timestamp used for newest-first ordering. RFC 3339 strings in UTC
    /// order lexicographically.
    pub fn sort_key(&self) -> &str {
        self.created_at
            .as_deref()
            .or(self.completed_at.as_deref())
            .unwrap_or_default()
    }
}

impl ListItem for BatchSummary {
    fn key(&self) -> &str {
        &self.batch_id
    }

    fn search_text(&self) -> String {
        format!("{} {}", self.batch_id, self.status)
    }
}

/// A processed video kept in server storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVideo {
    pub video_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size_mb: f64,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub frames_extracted: Option<u32>,
    #[serde(default)]
    pub results_available: bool,
}

impl ListItem for StoredVideo {
    fn key(&self) -> &str {
        &self.video_id
    }

    fn search_text(&self) -> String {
        format!(
            "{} {}",
            self.video_id,
            self.filename.as_deref().unwrap_or_default()
        )
    }
}

/// Result of a deploy-to-production action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReport {
    #[serde(default)]
    pub deployed: Vec<DeployedFolder>,
    #[serde(default)]
    pub skipped: Vec<SkippedFolder>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedFolder {
    pub folder: String,
    #[serde(default)]
    pub image_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFolder {
    pub folder: String,
    #[serde(default)]
    pub reason: String,
}

/// Training priority of a person in the smart queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person in the smart training queue, or a benchmark result that
/// suggests training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartQueueEntry {
    pub person_name: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub wikidata_id: Option<String>,
    #[serde(default)]
    pub recognition_score: Option<f64>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub added_at: Option<String>,
    #[serde(default)]
    pub last_benchmark: Option<String>,
}

impl SmartQueueEntry {
    pub fn new(person_name: impl Into<String>, priority: Priority) -> Self {
        Self {
            person_name: person_name.into(),
            priority,
            wikidata_id: None,
            recognition_score: None,
            occupation: None,
            added_at: None,
            last_benchmark: None,
        }
    }

    /// The entry as it looks after being moved to the top of the queue.
    pub fn promoted(&self) -> Self {
        Self {
            priority: Priority::High,
            ..self.clone()
        }
    }
}

impl ListItem for SmartQueueEntry {
    fn key(&self) -> &str {
        &self.person_name
    }

    fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.person_name,
            self.priority,
            self.occupation.as_deref().unwrap_or_default()
        )
    }
}

/// One run of the smart training cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartRun {
    #[serde(deserialize_with = "string_or_number")]
    pub run_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub discovery: Option<RunDiscovery>,
    #[serde(default)]
    pub benchmark: Option<RunBenchmark>,
    #[serde(default)]
    pub training: Option<RunTraining>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDiscovery {
    #[serde(default)]
    pub discovered: u32,
    #[serde(default)]
    pub queued: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunBenchmark {
    #[serde(default)]
    pub benchmarked: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTraining {
    #[serde(default)]
    pub attempted: u32,
    #[serde(default)]
    pub successful: u32,
    #[serde(default)]
    pub failed: u32,
}

/// Two person entries that look like the same person.
///
/// The backend addresses candidates by their position in the latest scan,
/// so the position doubles as the list key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCandidate {
    #[serde(skip)]
    index: usize,
    #[serde(skip)]
    key: String,
    pub source_name: String,
    #[serde(default)]
    pub source_embeddings: u32,
    #[serde(default)]
    pub target_name: Option<String>,
    #[serde(default)]
    pub target_embeddings: u32,
    /// `TYPO`, `DUPLICATE`, `SPELLING_VARIANT` or `NICKNAME`.
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub suggestion: Option<String>,
    /// Action proposed by the scan, such as `MERGE`.
    #[serde(default, rename = "action")]
    pub suggested_action: Option<String>,
}

impl MergeCandidate {
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self.key = index.to_string();
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl ListItem for MergeCandidate {
    fn key(&self) -> &str {
        &self.key
    }

    fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.source_name,
            self.target_name.as_deref().unwrap_or_default(),
            self.kind
        )
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
