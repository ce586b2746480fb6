use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use facetrain_core::{update, Effect, ListItem, PageMsg, PageState, PageViewModel, PollState};
use facetrain_logging::ft_debug;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::watch;

use crate::{ApiError, Poller};

type ActionFn<A> =
    Arc<dyn Fn(String, A) -> BoxFuture<'static, Result<(), ApiError>> + Send + Sync>;

/// A polled remote list with local filter, paging, selection and actions.
///
/// The page projection follows the poller lazily: whenever a new list has
/// been applied since the last sync it replaces the projection wholesale.
/// Actions run through the executor given at construction and every
/// confirmed action is followed by a refetch.
pub struct ListController<T, A> {
    poller: Poller<Vec<T>>,
    page: PageState<T, A>,
    scope: Arc<RwLock<Option<String>>>,
    execute: ActionFn<A>,
    seen_revision: u64,
    seen_error: Option<String>,
}

impl<T, A> ListController<T, A>
where
    T: ListItem + Send + Sync + 'static,
    A: Clone + Send + 'static,
{
    /// `fetch` receives the current scope (for example the domain) on every
    /// call; `execute` sends one action for the entry with the given key.
    pub fn new<F, Fut, E, EFut>(
        scope: Option<String>,
        interval: Duration,
        initially_enabled: bool,
        fetch: F,
        execute: E,
    ) -> Self
    where
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, ApiError>> + Send + 'static,
        E: Fn(String, A) -> EFut + Send + Sync + 'static,
        EFut: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        let shared_scope = Arc::new(RwLock::new(scope.clone()));
        let fetch_scope = shared_scope.clone();
        let poller = Poller::new(
            move || {
                let scope = fetch_scope
                    .read()
                    .map(|scope| scope.clone())
                    .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
                fetch(scope)
            },
            interval,
            initially_enabled,
        );

        let mut page = PageState::default();
        if let Some(scope) = scope {
            page = page.with_scope(scope);
        }

        Self {
            poller,
            page,
            scope: shared_scope,
            execute: Arc::new(move |key, action| execute(key, action).boxed()),
            seen_revision: 0,
            seen_error: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page = std::mem::take(&mut self.page).with_page_size(page_size);
        self
    }

    pub fn poller(&self) -> &Poller<Vec<T>> {
        &self.poller
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState<Vec<T>>> {
        self.poller.subscribe()
    }

    pub fn state(&self) -> &PageState<T, A> {
        &self.page
    }

    /// Pull the latest poller result into the projection. Returns whether
    /// the page changed since the previous call.
    pub fn sync(&mut self) -> bool {
        let snapshot = self.poller.snapshot();
        if snapshot.revision != self.seen_revision {
            self.seen_revision = snapshot.revision;
            if let Some(items) = snapshot.data {
                self.apply(PageMsg::ListFetched(items));
            }
        }
        if snapshot.error != self.seen_error {
            self.seen_error = snapshot.error.clone();
            if let Some(message) = snapshot.error {
                self.apply(PageMsg::FetchFailed(message));
            }
        }
        self.page.consume_dirty()
    }

    pub fn view(&mut self) -> PageViewModel<T> {
        self.sync();
        self.page.view()
    }

    /// Fetch the list now and sync the projection.
    pub async fn refresh(&mut self) {
        self.poller.refetch().await;
        self.sync();
    }

    /// Apply a message and run every effect it leads to, including the
    /// follow-up messages of completed actions.
    pub async fn dispatch(&mut self, msg: PageMsg<T, A>) {
        self.sync();
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            if let PageMsg::ScopeChanged(scope) = &msg {
                let mut shared = self
                    .scope
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *shared = Some(scope.clone());
            }
            for effect in self.apply(msg) {
                match effect {
                    Effect::RunAction { key, action } => {
                        ft_debug!("running action for {key}");
                        let outcome = (self.execute)(key.clone(), action).await;
                        queue.push_back(match outcome {
                            Ok(()) => PageMsg::ActionSucceeded { key },
                            Err(err) => PageMsg::ActionFailed {
                                key,
                                message: err.message,
                            },
                        });
                    }
                    Effect::Refetch => self.refresh().await,
                }
            }
        }
    }

    fn apply(&mut self, msg: PageMsg<T, A>) -> Vec<Effect<A>> {
        let (page, effects) = update(std::mem::take(&mut self.page), msg);
        self.page = page;
        effects
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use facetrain_core::FolderSummary;

    use super::*;

    #[tokio::test]
    async fn scope_change_survives_a_poisoned_lock() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let fetch_seen = seen.clone();
        let mut list: ListController<FolderSummary, ()> = ListController::new(
            Some("serbia".to_string()),
            Duration::from_secs(30),
            false,
            move |scope| {
                fetch_seen.lock().unwrap().push(scope);
                async { Ok(Vec::new()) }
            },
            |_key, _action| async { Ok(()) },
        );

        let scope = list.scope.clone();
        let _ = std::thread::spawn(move || {
            let _guard = scope.write().unwrap();
            panic!("scope writer panicked");
        })
        .join();
        assert!(list.scope.is_poisoned());

        list.dispatch(PageMsg::ScopeChanged("croatia".to_string()))
            .await;
        list.refresh().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&Some("croatia".to_string())));
    }
}
