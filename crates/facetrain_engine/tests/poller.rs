use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use facetrain_engine::{ApiError, FailureKind, Poller};
use pretty_assertions::assert_eq;
use tokio::time::sleep;

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

/// A fetch that counts its calls and answers with the call number after `delay`.
fn counting_fetch(
    calls: Arc<AtomicUsize>,
    delay: Duration,
) -> impl Fn() -> futures_util::future::BoxFuture<'static, Result<usize, ApiError>> + Send + Sync
{
    use futures_util::FutureExt;
    move || {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            sleep(delay).await;
            Ok(call)
        }
        .boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn result_settling_after_dispose_is_discarded() {
    let calls = counter();
    let poller = Poller::new(
        counting_fetch(calls.clone(), Duration::from_millis(500)),
        Duration::from_secs(5),
        true,
    );

    sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let before = poller.snapshot();

    poller.dispose();
    sleep(Duration::from_secs(1)).await;

    let after = poller.snapshot();
    assert_eq!(after.data, None);
    assert_eq!(after.loading, before.loading);
    assert_eq!(after.revision, 0);
    assert!(poller.is_disposed());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_poller_leaves_observers_with_the_last_state() {
    let calls = counter();
    let settled = counter();
    let fetch = {
        let calls = calls.clone();
        let settled = settled.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let settled = settled.clone();
            async move {
                sleep(Duration::from_millis(500)).await;
                settled.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ApiError>(vec!["late".to_string()])
            }
        }
    };
    let poller = Poller::new(fetch, Duration::from_secs(5), true);
    let updates = poller.subscribe();

    sleep(Duration::from_millis(100)).await;
    drop(poller);
    sleep(Duration::from_secs(1)).await;

    assert_eq!(settled.load(Ordering::SeqCst), 1);
    assert_eq!(updates.borrow().data, None);
    assert!(updates.borrow().loading);
}

#[tokio::test(start_paused = true)]
async fn starting_twice_keeps_a_single_timer() {
    let calls = counter();
    let poller = Poller::new(
        counting_fetch(calls.clone(), Duration::ZERO),
        Duration::from_secs(1),
        false,
    );

    poller.start_polling();
    poller.start_polling();
    poller.start_polling();
    sleep(Duration::from_millis(2500)).await;

    // Ticks at 0 s, 1 s and 2 s.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn refetch_works_while_not_polling() {
    let calls = counter();
    let poller = Poller::new(
        counting_fetch(calls.clone(), Duration::from_millis(10)),
        Duration::from_secs(1),
        false,
    );
    assert!(!poller.is_polling());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    poller.refetch().await;

    let state = poller.snapshot();
    assert_eq!(state.data, Some(0));
    assert!(!state.loading);
    assert!(!state.is_polling);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_lets_the_in_flight_fetch_apply() {
    let calls = counter();
    let poller = Poller::new(
        counting_fetch(calls.clone(), Duration::from_millis(500)),
        Duration::from_secs(1),
        true,
    );

    sleep(Duration::from_millis(100)).await;
    poller.stop_polling();
    poller.stop_polling();
    assert!(!poller.is_polling());

    sleep(Duration::from_secs(3)).await;
    assert_eq!(poller.data(), Some(0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn overlapping_fetches_apply_in_settlement_order() {
    let calls = counter();
    let fetch = {
        let calls = calls.clone();
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            let delay = if call == 0 { 1500 } else { 100 };
            async move {
                sleep(Duration::from_millis(delay)).await;
                Ok::<_, ApiError>(call)
            }
        }
    };
    let poller = Poller::new(fetch, Duration::from_secs(1), true);

    sleep(Duration::from_millis(1200)).await;
    assert_eq!(poller.data(), Some(1));
    poller.stop_polling();

    sleep(Duration::from_millis(400)).await;
    let state = poller.snapshot();
    assert_eq!(state.data, Some(0));
    assert_eq!(state.revision, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn errors_are_kept_until_the_next_success() {
    let calls = counter();
    let fetch = {
        let calls = calls.clone();
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Err(ApiError::new(FailureKind::Network, "connection refused"))
                } else {
                    Ok(call)
                }
            }
        }
    };
    let poller = Poller::new(fetch, Duration::from_secs(1), true);

    sleep(Duration::from_millis(10)).await;
    assert_eq!(poller.error().as_deref(), Some("connection refused"));
    assert_eq!(poller.data(), None);
    assert!(!poller.loading());
    assert!(poller.is_polling());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(poller.error(), None);
    assert_eq!(poller.data(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_applied_results() {
    let calls = counter();
    let poller = Poller::new(
        counting_fetch(calls, Duration::from_millis(50)),
        Duration::from_secs(10),
        false,
    );
    let mut updates = poller.subscribe();

    poller.start_polling();
    loop {
        updates.changed().await.expect("poller alive");
        if updates.borrow_and_update().revision > 0 {
            break;
        }
    }
    assert_eq!(updates.borrow().data, Some(0));
}
