use crate::{ActionOutcome, Effect, ListItem, PageMsg, PageState, PendingAction, UpdateMode};

/// Pure update function: applies a message to page state and returns any effects.
///
/// Only server-side parameters and confirmed actions lead to a network round
/// trip; filtering, paging and selection are derived locally.
pub fn update<T: ListItem, A: Clone>(
    mut state: PageState<T, A>,
    msg: PageMsg<T, A>,
) -> (PageState<T, A>, Vec<Effect<A>>) {
    let effects = match msg {
        PageMsg::ListFetched(items) => {
            state.replace_items(items);
            Vec::new()
        }
        PageMsg::FetchFailed(message) => {
            state.set_error(message);
            Vec::new()
        }
        PageMsg::FilterChanged(filter) => {
            state.set_filter(filter);
            Vec::new()
        }
        PageMsg::PageChanged(page) => {
            state.set_page(page);
            Vec::new()
        }
        PageMsg::PageSizeChanged(page_size) => {
            state.set_page_size(page_size);
            Vec::new()
        }
        PageMsg::ScopeChanged(scope) => {
            if state.set_scope(scope) {
                vec![Effect::Refetch]
            } else {
                Vec::new()
            }
        }
        PageMsg::ToggleSelected(key) => {
            state.toggle_selected(&key);
            Vec::new()
        }
        PageMsg::SelectAll => {
            state.select_where(|_| true);
            Vec::new()
        }
        PageMsg::SelectNone => {
            state.select_where(|_| false);
            Vec::new()
        }
        PageMsg::SelectDefault => {
            state.select_where(|item| item.selected_by_default());
            Vec::new()
        }
        PageMsg::ActionRequested {
            key,
            action,
            change,
            mode,
        } => {
            // One action per entry at a time.
            if state.is_pending(&key) {
                return (state, Vec::new());
            }
            let previous = match mode {
                UpdateMode::Immediate => state.apply_change(&key, &change),
                UpdateMode::AfterConfirm => None,
            };
            state.insert_pending(
                key.clone(),
                PendingAction {
                    action: action.clone(),
                    change,
                    mode,
                    previous,
                },
            );
            vec![Effect::RunAction { key, action }]
        }
        PageMsg::ActionSucceeded { key } => match state.take_pending(&key) {
            Some(pending) => {
                if pending.mode == UpdateMode::AfterConfirm {
                    state.apply_change(&key, &pending.change);
                }
                state.clear_error();
                state.record_outcome(ActionOutcome::Succeeded { key });
                vec![Effect::Refetch]
            }
            None => Vec::new(),
        },
        PageMsg::ActionFailed { key, message } => {
            if let Some(pending) = state.take_pending(&key) {
                if let Some(previous) = pending.previous {
                    state.revert_change(&key, previous);
                }
            }
            state.record_outcome(ActionOutcome::Failed {
                key,
                message: message.clone(),
            });
            state.set_error(message);
            Vec::new()
        }
        PageMsg::ClearError => {
            state.clear_error();
            Vec::new()
        }
        PageMsg::NoOp => Vec::new(),
    };

    (state, effects)
}
