use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use facetrain_core::PollState;
use facetrain_logging::ft_debug;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::ApiError;

pub type FetchFuture<T> = BoxFuture<'static, Result<T, ApiError>>;
pub(crate) type FetchFn<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

/// Box an async closure into the shape the poller and tracker store.
pub(crate) fn boxed_fetch<T, F, Fut>(fetch: F) -> FetchFn<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    Arc::new(move || fetch().boxed())
}

/// Periodically refreshes one remote resource and publishes the result.
///
/// Ticks run at a fixed interval without waiting for the previous fetch, so
/// slow fetches may overlap; whichever settles last wins. Dropping the
/// poller disposes it: the timer stops and results that settle afterwards
/// are discarded.
pub struct Poller<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    fetch: FetchFn<T>,
    interval: Duration,
    inner: Mutex<Inner<T>>,
    updates: watch::Sender<PollState<T>>,
    shutdown: CancellationToken,
}

struct Inner<T> {
    state: PollState<T>,
    disposed: bool,
    timer: Option<CancellationToken>,
}

impl<T> Poller<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a poller. With `initially_enabled` the first fetch is spawned
    /// right away, so this must then be called inside a Tokio runtime.
    pub fn new<F, Fut>(fetch: F, interval: Duration, initially_enabled: bool) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let state = PollState::new(initially_enabled);
        let (updates, _) = watch::channel(state.clone());
        let poller = Self {
            shared: Arc::new(Shared {
                fetch: boxed_fetch(fetch),
                interval,
                inner: Mutex::new(Inner {
                    state,
                    disposed: false,
                    timer: None,
                }),
                updates,
                shutdown: CancellationToken::new(),
            }),
        };
        if initially_enabled {
            poller.start_polling();
        }
        poller
    }

    pub fn snapshot(&self) -> PollState<T> {
        self.shared.lock().state.clone()
    }

    pub fn data(&self) -> Option<T> {
        self.shared.lock().state.data.clone()
    }

    pub fn loading(&self) -> bool {
        self.shared.lock().state.loading
    }

    pub fn error(&self) -> Option<String> {
        self.shared.lock().state.error.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.shared.lock().state.is_polling
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Observe every applied write.
    pub fn subscribe(&self) -> watch::Receiver<PollState<T>> {
        self.shared.updates.subscribe()
    }

    /// Fetch now and then once per interval. Calling this while already
    /// polling does nothing.
    pub fn start_polling(&self) {
        let timer = {
            let mut inner = self.shared.lock();
            if inner.disposed || inner.timer.is_some() {
                return;
            }
            let timer = self.shared.shutdown.child_token();
            inner.timer = Some(timer.clone());
            inner.state.is_polling = true;
            self.shared.publish(&inner.state);
            timer
        };
        ft_debug!("poller started, interval {:?}", self.shared.interval);
        tokio::spawn(run_timer(self.shared.clone(), timer));
    }

    /// Stop scheduling ticks. A fetch already in flight still applies.
    pub fn stop_polling(&self) {
        let mut inner = self.shared.lock();
        if let Some(timer) = inner.timer.take() {
            timer.cancel();
            ft_debug!("poller stopped");
        }
        if inner.disposed || !inner.state.is_polling {
            return;
        }
        inner.state.is_polling = false;
        self.shared.publish(&inner.state);
    }

    /// One fetch outside the schedule, whether or not polling is active.
    pub async fn refetch(&self) {
        {
            let mut inner = self.shared.lock();
            if inner.disposed {
                return;
            }
            inner.state.loading = true;
            self.shared.publish(&inner.state);
        }
        fetch_once(self.shared.clone()).await;
    }
}

impl<T> Poller<T> {
    /// Tear down. The snapshot is left as it was; later results are dropped.
    pub fn dispose(&self) {
        let mut inner = self.shared.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.timer = None;
        self.shared.shutdown.cancel();
        ft_debug!("poller disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> Shared<T> {
    fn publish(&self, state: &PollState<T>) {
        self.updates.send_replace(state.clone());
    }

    fn apply(&self, result: Result<T, ApiError>) {
        let mut inner = self.lock();
        if inner.disposed {
            ft_debug!("discarding fetch result after dispose");
            return;
        }
        inner.state.apply(result);
        self.publish(&inner.state);
    }
}

async fn run_timer<T>(shared: Arc<Shared<T>>, timer: CancellationToken)
where
    T: Clone + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(shared.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = timer.cancelled() => break,
            _ = ticker.tick() => {
                tokio::spawn(fetch_once(shared.clone()));
            }
        }
    }
}

async fn fetch_once<T>(shared: Arc<Shared<T>>)
where
    T: Clone + Send + Sync + 'static,
{
    let fetch = (shared.fetch)();
    let result = fetch.await;
    if let Err(err) = &result {
        ft_debug!("poll fetch failed: {err} ({})", err.kind);
    }
    shared.apply(result);
}
