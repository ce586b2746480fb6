use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use facetrain_core::{JobPhase, StatusResponse, TrackedStatus};
use facetrain_logging::{ft_debug, ft_info};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::ApiError;

type StatusFetchFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<StatusResponse, ApiError>> + Send + Sync>;

/// Observable state of one tracked job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub job_id: Option<String>,
    pub status: Option<TrackedStatus>,
    /// Outcome of the last applied fetch, including transport failures.
    pub outcome: Option<JobPhase>,
    pub loading: bool,
    pub error: Option<String>,
    pub is_polling: bool,
}

impl JobSnapshot {
    fn new(job_id: Option<String>) -> Self {
        Self {
            job_id,
            status: None,
            outcome: None,
            loading: false,
            error: None,
            is_polling: false,
        }
    }

    /// A terminal status body was received. It never changes afterwards.
    pub fn is_terminal(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|status| status.phase().is_terminal())
    }

    pub fn is_complete(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|status| status.is_complete)
    }
}

/// Polls a job's status endpoint until the job reaches a terminal state.
///
/// The next check is scheduled only after the previous one settles, so two
/// checks of the same job never overlap. Changing the job id abandons the
/// previous cycle and drops any of its results still in flight.
pub struct JobTracker {
    shared: Arc<Shared>,
}

struct Shared {
    fetch_status: StatusFetchFn,
    interval: Duration,
    auto_start: bool,
    inner: Mutex<Inner>,
    updates: watch::Sender<JobSnapshot>,
    shutdown: CancellationToken,
}

struct Inner {
    snapshot: JobSnapshot,
    generation: u64,
    disposed: bool,
    timer: Option<CancellationToken>,
    /// Generation of the cycle task still alive, if any.
    cycle: Option<u64>,
}

impl JobTracker {
    /// With `auto_start` and a job id, the first check is spawned right
    /// away, so this must then be called inside a Tokio runtime.
    pub fn new<F, Fut>(
        job_id: Option<String>,
        interval: Duration,
        auto_start: bool,
        fetch_status: F,
    ) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StatusResponse, ApiError>> + Send + 'static,
    {
        let snapshot = JobSnapshot::new(job_id);
        let (updates, _) = watch::channel(snapshot.clone());
        let tracker = Self {
            shared: Arc::new(Shared {
                fetch_status: Arc::new(move |job_id| fetch_status(job_id).boxed()),
                interval,
                auto_start,
                inner: Mutex::new(Inner {
                    snapshot,
                    generation: 0,
                    disposed: false,
                    timer: None,
                    cycle: None,
                }),
                updates,
                shutdown: CancellationToken::new(),
            }),
        };
        if auto_start {
            tracker.start_polling();
        }
        tracker
    }

    pub fn job_id(&self) -> Option<String> {
        self.shared.lock().snapshot.job_id.clone()
    }

    pub fn status(&self) -> Option<TrackedStatus> {
        self.shared.lock().snapshot.status.clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.lock().snapshot.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.shared.lock().snapshot.is_polling
    }

    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Check now and keep checking until the job is terminal. Does nothing
    /// without a job id, while already polling, or once terminal.
    ///
    /// If a check of the current job is still in flight, its cycle takes the
    /// new schedule instead of a second cycle being started.
    pub fn start_polling(&self) {
        let generation = {
            let mut inner = self.shared.lock();
            if inner.disposed
                || inner.timer.is_some()
                || inner.snapshot.job_id.is_none()
                || inner.snapshot.is_terminal()
            {
                return;
            }
            inner.timer = Some(self.shared.shutdown.child_token());
            inner.snapshot.is_polling = true;
            self.shared.publish(&inner.snapshot);
            if inner.cycle == Some(inner.generation) {
                ft_debug!("resuming the running cycle of {:?}", inner.snapshot.job_id);
                return;
            }
            inner.cycle = Some(inner.generation);
            inner.generation
        };
        ft_debug!("tracking job {:?}", self.job_id());
        tokio::spawn(run_cycle(self.shared.clone(), generation));
    }

    /// Cancel the pending check. A check already in flight still applies.
    pub fn stop_polling(&self) {
        let mut inner = self.shared.lock();
        if let Some(timer) = inner.timer.take() {
            timer.cancel();
        }
        if inner.disposed || !inner.snapshot.is_polling {
            return;
        }
        inner.snapshot.is_polling = false;
        self.shared.publish(&inner.snapshot);
    }

    /// Track a different job. The old cycle is abandoned and the snapshot
    /// reset; with `auto_start` a new cycle begins.
    pub fn set_job_id(&self, job_id: Option<String>) {
        {
            let mut inner = self.shared.lock();
            if inner.disposed || inner.snapshot.job_id == job_id {
                return;
            }
            if let Some(timer) = inner.timer.take() {
                timer.cancel();
            }
            inner.generation += 1;
            inner.snapshot = JobSnapshot::new(job_id);
            self.shared.publish(&inner.snapshot);
        }
        if self.shared.auto_start {
            self.start_polling();
        }
    }

    /// One check outside the schedule. A terminal snapshot is returned as is.
    pub async fn refetch(&self) -> JobSnapshot {
        let generation = {
            let inner = self.shared.lock();
            if inner.disposed || inner.snapshot.job_id.is_none() || inner.snapshot.is_terminal() {
                return inner.snapshot.clone();
            }
            inner.generation
        };
        check_once(&self.shared, generation).await;
        self.snapshot()
    }

    /// Run a cancel action for the job. When it succeeds polling stops and
    /// the status is read once more.
    pub async fn cancel<R, Fut>(&self, action: Fut) -> Result<R, ApiError>
    where
        Fut: Future<Output = Result<R, ApiError>>,
    {
        match action.await {
            Ok(response) => {
                ft_info!("job {:?} cancelled", self.job_id());
                self.stop_polling();
                self.refetch().await;
                Ok(response)
            }
            Err(err) => {
                let mut inner = self.shared.lock();
                if !inner.disposed {
                    inner.snapshot.error = Some(err.message.clone());
                    self.shared.publish(&inner.snapshot);
                }
                Err(err)
            }
        }
    }

    /// Tear down. The snapshot is left as it was; later results are dropped.
    pub fn dispose(&self) {
        let mut inner = self.shared.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.timer = None;
        self.shared.shutdown.cancel();
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, snapshot: &JobSnapshot) {
        self.updates.send_replace(snapshot.clone());
    }

    /// Timer of the schedule the cycle of `generation` should follow. Ends
    /// the cycle when polling stopped or the tracker moved on.
    fn current_timer(&self, generation: u64) -> Option<CancellationToken> {
        let mut inner = self.lock();
        if inner.disposed || inner.generation != generation || inner.timer.is_none() {
            if inner.cycle == Some(generation) {
                inner.cycle = None;
            }
            return None;
        }
        inner.timer.clone()
    }

    fn end_cycle(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.cycle == Some(generation) {
            inner.cycle = None;
        }
    }
}

async fn run_cycle(shared: Arc<Shared>, generation: u64) {
    loop {
        if check_once(&shared, generation).await != Some(JobPhase::Processing) {
            shared.end_cycle(generation);
            return;
        }
        let Some(timer) = shared.current_timer(generation) else {
            return;
        };
        tokio::select! {
            biased;
            _ = timer.cancelled() => {
                // Restarted while waiting: check at once on the new schedule.
                if shared.current_timer(generation).is_none() {
                    return;
                }
            }
            _ = tokio::time::sleep(shared.interval) => {}
        }
    }
}

/// Fetch and apply one status. Returns `None` when the result was dropped
/// because the tracker was disposed or moved on to another job.
async fn check_once(shared: &Shared, generation: u64) -> Option<JobPhase> {
    let job_id = {
        let mut inner = shared.lock();
        if inner.disposed || inner.generation != generation {
            return None;
        }
        let job_id = inner.snapshot.job_id.clone()?;
        inner.snapshot.loading = true;
        inner.snapshot.error = None;
        shared.publish(&inner.snapshot);
        job_id
    };

    let result = (shared.fetch_status)(job_id.clone()).await;

    let mut inner = shared.lock();
    if inner.disposed || inner.generation != generation {
        ft_debug!("discarding status of {job_id}");
        return None;
    }
    if inner.snapshot.is_terminal() {
        inner.snapshot.loading = false;
        shared.publish(&inner.snapshot);
        return inner.snapshot.outcome;
    }

    let phase = match result {
        Ok(response) => record(&mut inner.snapshot, response),
        Err(err) if err.is_not_found() => {
            record(&mut inner.snapshot, StatusResponse::not_found(err.message))
        }
        Err(err) => {
            ft_debug!("status of {job_id} failed: {err} ({})", err.kind);
            inner.snapshot.error = Some(err.message);
            JobPhase::Failed
        }
    };
    inner.snapshot.loading = false;
    inner.snapshot.outcome = Some(phase);
    if phase.is_terminal() {
        inner.snapshot.is_polling = false;
        if let Some(timer) = inner.timer.take() {
            timer.cancel();
        }
        ft_info!("job {job_id} finished: {phase:?}");
    }
    shared.publish(&inner.snapshot);
    Some(phase)
}

fn record(snapshot: &mut JobSnapshot, response: StatusResponse) -> JobPhase {
    let phase = response.phase();
    if matches!(phase, JobPhase::Failed | JobPhase::NotFound) {
        snapshot.error = Some(response.failure_message());
    }
    snapshot.status = Some(TrackedStatus::from_response(response));
    phase
}
