//! Facetrain core: pure state machines, projections and view-model helpers.
mod effect;
mod history;
mod job;
mod models;
mod msg;
mod poll;
mod state;
mod update;
mod validate;
mod view_model;

pub use effect::Effect;
pub use history::{HistoryEntry, JobHistory, RecentJobs, COMPLETED_CAPACITY, PROCESSING_CAPACITY};
pub use job::{classify_status, JobPhase, StatusResponse, TrackedStatus};
pub use models::{
    BatchSource, BatchSummary, CandidateItem, DeployReport, DeployedFolder, FolderSummary,
    MergeCandidate, Priority, ProgressFolder, QueueItem, QueueStatus, Readiness, RunBenchmark,
    RunDiscovery, RunTraining, SkippedFolder, SmartQueueEntry, SmartRun, StoredVideo,
    MIN_TRAINING_IMAGES, TARGET_TRAINING_IMAGES,
};
pub use msg::PageMsg;
pub use poll::PollState;
pub use state::{
    ActionOutcome, ListItem, OptimisticChange, PageState, PendingAction, UpdateMode,
    DEFAULT_PAGE_SIZE,
};
pub use update::update;
pub use validate::{
    validate_interval, validate_video_file, ValidationError, ALLOWED_VIDEO_FORMATS,
    MAX_INTERVAL_SECONDS, MAX_VIDEO_SIZE_MB, MIN_INTERVAL_SECONDS,
};
pub use view_model::{group_by, group_counts, PageViewModel, RowView};
