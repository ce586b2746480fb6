/// Observable state of one poller instance.
///
/// `revision` counts successful fetches that were applied, so consumers can
/// tell when `data` has been replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub is_polling: bool,
    pub revision: u64,
}

impl<T> PollState<T> {
    pub fn new(initially_enabled: bool) -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
            is_polling: initially_enabled,
            revision: 0,
        }
    }

    /// Apply the outcome of one fetch cycle.
    pub fn apply<E: std::fmt::Display>(&mut self, result: Result<T, E>) {
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
                self.revision += 1;
            }
            Err(err) => {
                let message = err.to_string();
                self.error = Some(if message.is_empty() {
                    "Failed to fetch data".to_string()
                } else {
                    message
                });
            }
        }
        self.loading = false;
    }
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self::new(false)
    }
}
