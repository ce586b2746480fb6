//! Facetrain engine: transports, remote services and the async pollers that
//! keep local snapshots in step with the backend.
mod fixture;
mod list;
mod persist;
mod poller;
mod services;
mod tracker;
mod transport;
mod types;

pub use fixture::{FixtureReply, FixtureTransport};
pub use list::ListController;
pub use persist::{ensure_data_dir, AtomicFileWriter, PersistError};
pub use poller::{FetchFuture, Poller};
pub use services::{
    format_duration, format_size_mb, AbTestingService, AccuracySummary, AccuracyVerdict,
    ActionResponse, Agreement, AllBatches, AuthService, AutomatedTrainingService, BatchList,
    BenchmarkResult, CandidateBatch, CandidateStatistics, Celebrity, Choice, CleanupReport,
    Comparison, ComparisonMetrics, ComparisonResult, ComparisonUpload, DateRange, DiskUsage,
    DomainToken, HealthReport, LoginOutcome, MergeAction, MergeCandidatesService, MergeScan,
    MergeSummary, MetricsSummary, PerformanceSummary, PipelineResult, ProcessResult, ProfileUsed,
    RemovedFromQueue, SmartCycleConfig, SmartQueue, SmartTrainingService, StartedBatch,
    StartedCycle, StatusShare, StorageService, StorageStats, TrainingService, UploadAccepted,
    VideoApiInfo, VideoService, VideoUpload,
};
pub use tracker::{JobSnapshot, JobTracker};
pub use transport::{ReqwestTransport, Transport, TransportSettings, DEFAULT_BASE_URL};
pub use types::{
    ApiError, ApiRequest, ApiResponse, CallTimeout, FailureKind, HttpMethod, MultipartField,
    RequestBody, UploadContents, UploadFile,
};
