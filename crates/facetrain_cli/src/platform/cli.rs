use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use facetrain_core::{Priority, DEFAULT_PAGE_SIZE};

use super::config::Backend;

/// Console for the face-recognition training backend.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub(crate) struct Cli {
    /// RON configuration file (default: ./facetrain.ron when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the training API
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Answer from real HTTP calls or from built-in canned data
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// Default per-call timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Domain (country dataset) to work on
    #[arg(short, long, global = true)]
    pub domain: Option<String>,

    /// Log debug output to the terminal as well as the log file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log file path
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum BackendArg {
    Http,
    Fixture,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Http => Backend::Http,
            BackendArg::Fixture => Backend::Fixture,
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Exchange an email address for an API token
    Login {
        email: String,
        /// Pick this domain when the account has several
        #[arg(long)]
        select: Option<String>,
    },
    /// Forget the stored token
    Logout,
    /// Download queue of the manual pipeline
    Queue {
        #[command(subcommand)]
        action: Option<QueueCommand>,
    },
    /// Image counts of training folders
    Progress(ListArgs),
    /// Generate celebrity names for a country
    GenerateNames {
        #[arg(long)]
        country: String,
        /// Restrict to these occupations
        #[arg(long = "occupation")]
        occupations: Vec<String>,
    },
    /// Download images for the next person in the queue
    ProcessNext,
    /// Push trained faces to the recognition service
    SyncFaces,
    /// Available countries and occupations for candidate generation
    Choices,
    /// Suggest people to train and optionally start a batch
    Candidates {
        #[arg(long)]
        country: String,
        #[arg(long)]
        occupation: String,
        /// Start a batch for the default selection (people not yet trained)
        #[arg(long)]
        start: bool,
        /// Follow the started batch until it finishes
        #[arg(long, requires = "start")]
        watch: bool,
    },
    /// Follow or cancel one training batch
    Batch {
        #[command(subcommand)]
        action: BatchCommand,
    },
    /// All running and finished batches of both pipelines
    Batches,
    /// People waiting in staging for deployment
    Staging {
        #[command(subcommand)]
        action: StagingCommand,
    },
    /// Upload a video for recognition
    Upload {
        path: PathBuf,
        /// Seconds between sampled frames
        #[arg(long, default_value_t = 3.0)]
        interval: f64,
        /// Wait for the result in the same request
        #[arg(long)]
        sync: bool,
        /// Follow processing until it finishes
        #[arg(long, conflicts_with = "sync")]
        watch: bool,
    },
    /// Follow the processing status of an uploaded video
    Video { video_id: String },
    /// Upload limits advertised by the server
    Limits,
    /// Videos uploaded from this machine
    Recent {
        /// Ask the server again about videos last seen processing
        #[arg(long)]
        recheck: bool,
        /// Forget the finished videos
        #[arg(long)]
        clear_completed: bool,
    },
    /// Server-side video storage
    Storage {
        #[command(subcommand)]
        action: StorageCommand,
    },
    /// Compare the current recognition pipeline with the candidate one
    Ab {
        #[command(subcommand)]
        action: AbCommand,
    },
    /// Priority queue, cycles and benchmarks of smart training
    Smart {
        #[command(subcommand)]
        action: SmartCommand,
    },
    /// Person entries that look like the same person
    Merge {
        #[command(subcommand)]
        action: MergeCommand,
    },
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ListArgs {
    /// Only show entries containing this text
    #[arg(long)]
    pub filter: Option<String>,
    /// Page to show, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

impl Default for ListArgs {
    fn default() -> Self {
        Self {
            filter: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum QueueCommand {
    /// Show the queue grouped by occupation
    List(ListArgs),
    /// Keep the queue on screen, refreshing periodically
    Watch {
        /// Stop after this many refreshes
        #[arg(long)]
        updates: Option<u32>,
    },
    /// Remove one person from the queue
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
pub(crate) enum BatchCommand {
    Watch { batch_id: String },
    Cancel { batch_id: String },
}

#[derive(Subcommand, Debug)]
pub(crate) enum StagingCommand {
    List(ListArgs),
    /// Deploy folders to production (default: every folder marked ready)
    Deploy { folders: Vec<String> },
    /// Drop folders from staging
    Remove {
        #[arg(required = true)]
        folders: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum StorageCommand {
    Stats,
    Videos,
    Delete { video_id: String },
    /// Delete videos older than the given number of days
    Cleanup {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum AbCommand {
    /// Recognize one image with both pipelines
    Compare {
        image: PathBuf,
        #[arg(long)]
        image_id: Option<String>,
        /// Person actually shown in the image
        #[arg(long)]
        ground_truth: Option<String>,
    },
    /// Aggregated comparison metrics
    Metrics {
        /// Last seven days instead of one day
        #[arg(long, conflicts_with = "date")]
        weekly: bool,
        /// Day to report as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Keep the metrics on screen, refreshing periodically
        #[arg(long)]
        watch: bool,
        /// Stop after this many refreshes
        #[arg(long, requires = "watch")]
        updates: Option<u32>,
    },
    /// State of both pipelines
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum PriorityArg {
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum SmartCommand {
    /// Show the training queue
    Queue(ListArgs),
    Add {
        person: String,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
        #[arg(long)]
        wikidata_id: Option<String>,
    },
    Remove { person: String },
    /// Give a person high priority and move them to the top
    Promote { person: String },
    /// Start a smart training cycle in the background
    Run {
        /// Skip discovery of trending people
        #[arg(long)]
        no_discover: bool,
        /// Skip re-testing people already trained
        #[arg(long)]
        no_benchmark: bool,
        #[arg(long, default_value_t = 10)]
        max_discoveries: u32,
        #[arg(long, default_value_t = 5)]
        max_training: u32,
        #[arg(long, default_value_t = 20)]
        images_per_person: u32,
    },
    /// Past smart training cycles
    Runs,
    /// Measure how well a person is recognized
    Benchmark {
        person: String,
        #[arg(long, default_value_t = 20)]
        images: u32,
    },
    /// People whose recognition score is below the threshold
    Candidates {
        #[arg(long, default_value_t = 80)]
        min_score: u32,
    },
    /// Trending people of a country (default: the domain)
    Discover {
        #[arg(long)]
        country: Option<String>,
        #[arg(long, default_value_t = 20)]
        max_results: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum MergeActionArg {
    Merge,
    Rename,
    Delete,
    Skip,
}

#[derive(Subcommand, Debug)]
pub(crate) enum MergeCommand {
    /// Candidates of the latest scan
    List(ListArgs),
    /// Scan the domain again
    Scan,
    /// Apply an action to candidates, by position in the latest scan
    Act {
        #[arg(value_enum)]
        action: MergeActionArg,
        #[arg(required = true)]
        indices: Vec<usize>,
        /// Name to give the person when renaming
        #[arg(long, required_if_eq("action", "rename"))]
        new_name: Option<String>,
        /// Merge the target into the source instead
        #[arg(long)]
        swap: bool,
    },
    /// Move every image of one person to another
    Persons { source: String, target: String },
}
