use crate::{OptimisticChange, UpdateMode};

#[derive(Debug, Clone, PartialEq)]
pub enum PageMsg<T, A> {
    /// A fetch of the full list succeeded; replaces the projection wholesale.
    ListFetched(Vec<T>),
    /// A fetch of the list failed.
    FetchFailed(String),
    /// User edited the search box.
    FilterChanged(String),
    /// User moved to another client-side page (1-based).
    PageChanged(usize),
    PageSizeChanged(usize),
    /// A server-side parameter such as the domain changed.
    ScopeChanged(String),
    ToggleSelected(String),
    SelectAll,
    SelectNone,
    /// Restore each entry's default selection.
    SelectDefault,
    /// User triggered an action on one entry.
    ActionRequested {
        key: String,
        action: A,
        change: OptimisticChange<T>,
        mode: UpdateMode,
    },
    /// The server confirmed an action.
    ActionSucceeded { key: String },
    /// The server rejected an action, or it could not be sent.
    ActionFailed { key: String, message: String },
    ClearError,
    /// Fallback for placeholder wiring.
    NoOp,
}
