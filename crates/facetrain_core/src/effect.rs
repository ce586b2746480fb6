#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect<A> {
    /// Send the action for `key` to the server.
    RunAction { key: String, action: A },
    /// Fetch the list again to reconcile with the server.
    Refetch,
}
