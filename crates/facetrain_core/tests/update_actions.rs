use facetrain_core::{
    update, ActionOutcome, Effect, FolderSummary, OptimisticChange, PageMsg, PageState, Priority,
    SmartQueueEntry, UpdateMode,
};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StagingAction {
    Remove,
    Approve,
}

type StagingPage = PageState<FolderSummary, StagingAction>;

fn folder(name: &str, image_count: u32, ready: bool) -> FolderSummary {
    FolderSummary {
        folder_name: name.to_string(),
        image_count,
        ready_for_production: ready,
    }
}

fn staging() -> StagingPage {
    let (state, _) = update(
        StagingPage::default(),
        PageMsg::ListFetched(vec![
            folder("novak_djokovic", 28, true),
            folder("ana_ivanovic", 31, true),
            folder("unknown_person", 3, false),
        ]),
    );
    state
}

fn names(state: &StagingPage) -> Vec<String> {
    state.items().iter().map(|f| f.folder_name.clone()).collect()
}

fn request(
    key: &str,
    action: StagingAction,
    change: OptimisticChange<FolderSummary>,
    mode: UpdateMode,
) -> PageMsg<FolderSummary, StagingAction> {
    PageMsg::ActionRequested {
        key: key.to_string(),
        action,
        change,
        mode,
    }
}

#[test]
fn confirmed_action_waits_for_server_then_refetches() {
    let (state, effects) = update(
        staging(),
        request(
            "unknown_person",
            StagingAction::Remove,
            OptimisticChange::Remove,
            UpdateMode::AfterConfirm,
        ),
    );
    assert_eq!(
        effects,
        vec![Effect::RunAction {
            key: "unknown_person".to_string(),
            action: StagingAction::Remove,
        }]
    );
    // Nothing changes before confirmation.
    assert_eq!(names(&state).len(), 3);
    assert!(state.view().rows.iter().any(|row| row.pending));

    let (state, effects) = update(
        state,
        PageMsg::ActionSucceeded {
            key: "unknown_person".to_string(),
        },
    );
    assert_eq!(effects, vec![Effect::Refetch]);
    assert_eq!(names(&state), vec!["novak_djokovic", "ana_ivanovic"]);
    assert!(!state.is_pending("unknown_person"));
}

#[test]
fn confirmed_action_failure_leaves_projection_untouched() {
    let before = staging();
    let (state, _) = update(
        before.clone(),
        request(
            "ana_ivanovic",
            StagingAction::Remove,
            OptimisticChange::Remove,
            UpdateMode::AfterConfirm,
        ),
    );
    let (state, effects) = update(
        state,
        PageMsg::ActionFailed {
            key: "ana_ivanovic".to_string(),
            message: "Failed to remove from staging".to_string(),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.items(), before.items());
    assert_eq!(state.error(), Some("Failed to remove from staging"));
}

#[test]
fn immediate_action_applies_first_and_reverts_on_failure() {
    let approved = folder("unknown_person", 3, true);
    let (state, effects) = update(
        staging(),
        request(
            "unknown_person",
            StagingAction::Approve,
            OptimisticChange::Replace(approved.clone()),
            UpdateMode::Immediate,
        ),
    );
    assert_eq!(effects.len(), 1);
    assert_eq!(state.items()[2], approved);

    let (state, effects) = update(
        state,
        PageMsg::ActionFailed {
            key: "unknown_person".to_string(),
            message: "rejected".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert!(!state.items()[2].ready_for_production);
    assert_eq!(state.error(), Some("rejected"));
}

#[test]
fn immediate_removal_is_restored_at_its_position() {
    let (state, _) = update(
        staging(),
        request(
            "novak_djokovic",
            StagingAction::Remove,
            OptimisticChange::Remove,
            UpdateMode::Immediate,
        ),
    );
    assert_eq!(names(&state), vec!["ana_ivanovic", "unknown_person"]);

    let (state, _) = update(
        state,
        PageMsg::ActionFailed {
            key: "novak_djokovic".to_string(),
            message: "offline".to_string(),
        },
    );
    assert_eq!(
        names(&state),
        vec!["novak_djokovic", "ana_ivanovic", "unknown_person"]
    );
}

#[test]
fn immediate_success_keeps_change_and_refetches() {
    let (state, _) = update(
        staging(),
        request(
            "novak_djokovic",
            StagingAction::Remove,
            OptimisticChange::Remove,
            UpdateMode::Immediate,
        ),
    );
    let (state, effects) = update(
        state,
        PageMsg::ActionSucceeded {
            key: "novak_djokovic".to_string(),
        },
    );
    assert_eq!(effects, vec![Effect::Refetch]);
    assert_eq!(names(&state), vec!["ana_ivanovic", "unknown_person"]);
}

#[test]
fn duplicate_request_while_pending_is_ignored() {
    let msg = request(
        "ana_ivanovic",
        StagingAction::Remove,
        OptimisticChange::Remove,
        UpdateMode::AfterConfirm,
    );
    let (state, first) = update(staging(), msg.clone());
    let (_state, second) = update(state, msg);

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}

#[test]
fn success_clears_previous_error() {
    let (state, _) = update(staging(), PageMsg::FetchFailed("timeout".to_string()));
    let (state, _) = update(
        state,
        request(
            "ana_ivanovic",
            StagingAction::Remove,
            OptimisticChange::Remove,
            UpdateMode::AfterConfirm,
        ),
    );
    let (state, _) = update(
        state,
        PageMsg::ActionSucceeded {
            key: "ana_ivanovic".to_string(),
        },
    );
    assert_eq!(state.error(), None);
}

#[test]
fn refetched_list_wins_over_optimistic_projection() {
    let (state, _) = update(
        staging(),
        request(
            "novak_djokovic",
            StagingAction::Remove,
            OptimisticChange::Remove,
            UpdateMode::Immediate,
        ),
    );
    let (state, _) = update(
        state,
        PageMsg::ActionSucceeded {
            key: "novak_djokovic".to_string(),
        },
    );
    // The server silently kept the folder; its list is authoritative.
    let (state, _) = update(
        state,
        PageMsg::ListFetched(vec![
            folder("novak_djokovic", 28, true),
            folder("ana_ivanovic", 31, true),
        ]),
    );
    assert_eq!(names(&state), vec!["novak_djokovic", "ana_ivanovic"]);
}

#[test]
fn last_action_records_how_the_server_answered() {
    let (state, _) = update(
        staging(),
        request(
            "unknown_person",
            StagingAction::Remove,
            OptimisticChange::Remove,
            UpdateMode::AfterConfirm,
        ),
    );
    assert_eq!(state.last_action(), None);

    let (state, _) = update(
        state,
        PageMsg::ActionSucceeded {
            key: "unknown_person".to_string(),
        },
    );
    assert_eq!(
        state.last_action(),
        Some(&ActionOutcome::Succeeded {
            key: "unknown_person".to_string()
        })
    );

    let (state, _) = update(
        state,
        request(
            "ana_ivanovic",
            StagingAction::Remove,
            OptimisticChange::Remove,
            UpdateMode::Immediate,
        ),
    );
    let (state, _) = update(
        state,
        PageMsg::ActionFailed {
            key: "ana_ivanovic".to_string(),
            message: "folder locked".to_string(),
        },
    );
    let outcome = state.last_action().expect("outcome recorded");
    assert_eq!(outcome.key(), "ana_ivanovic");
    assert_eq!(
        outcome,
        &ActionOutcome::Failed {
            key: "ana_ivanovic".to_string(),
            message: "folder locked".to_string()
        }
    );
}

#[test]
fn failed_refetch_after_confirmed_action_keeps_the_success() {
    let (state, _) = update(
        staging(),
        request(
            "unknown_person",
            StagingAction::Remove,
            OptimisticChange::Remove,
            UpdateMode::AfterConfirm,
        ),
    );
    let (state, effects) = update(
        state,
        PageMsg::ActionSucceeded {
            key: "unknown_person".to_string(),
        },
    );
    assert_eq!(effects, vec![Effect::Refetch]);

    let (state, _) = update(state, PageMsg::FetchFailed("network down".to_string()));

    assert_eq!(state.error(), Some("network down"));
    assert_eq!(
        state.last_action(),
        Some(&ActionOutcome::Succeeded {
            key: "unknown_person".to_string()
        })
    );
    assert_eq!(names(&state), vec!["novak_djokovic", "ana_ivanovic"]);
}

fn queued(name: &str, priority: Priority) -> SmartQueueEntry {
    SmartQueueEntry {
        person_name: name.to_string(),
        priority,
        wikidata_id: None,
        recognition_score: Some(42.0),
        occupation: Some("actor".to_string()),
        added_at: None,
        last_benchmark: None,
    }
}

#[test]
fn rejected_promotion_restores_the_old_priority() {
    #[derive(Debug, Clone, PartialEq)]
    enum SmartAction {
        Promote,
    }

    let (state, _) = update(
        PageState::<SmartQueueEntry, SmartAction>::default(),
        PageMsg::ListFetched(vec![
            queued("Ana Ivanovic", Priority::High),
            queued("Emir Kusturica", Priority::Low),
        ]),
    );
    let promoted = state.items()[1].promoted();
    let (state, effects) = update(
        state,
        PageMsg::ActionRequested {
            key: "Emir Kusturica".to_string(),
            action: SmartAction::Promote,
            change: OptimisticChange::Replace(promoted),
            mode: UpdateMode::Immediate,
        },
    );
    assert_eq!(effects.len(), 1);
    assert_eq!(state.items()[1].priority, Priority::High);

    let (state, _) = update(
        state,
        PageMsg::ActionFailed {
            key: "Emir Kusturica".to_string(),
            message: "queue busy".to_string(),
        },
    );

    assert_eq!(state.items()[1].priority, Priority::Low);
    assert_eq!(state.error(), Some("queue busy"));
}
