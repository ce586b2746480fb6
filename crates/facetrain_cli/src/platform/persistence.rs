use std::path::PathBuf;

use facetrain_core::{JobHistory, COMPLETED_CAPACITY};
use facetrain_engine::{AtomicFileWriter, PersistError};
use facetrain_logging::{ft_info, ft_warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const HISTORY_FILENAME: &str = "history.ron";
const SESSION_FILENAME: &str = "session.ron";

/// Credentials kept between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Session {
    pub token: String,
    pub email: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Local files under the data directory. Only remembers which jobs to ask
/// the server about; statuses always come from the server.
pub(crate) struct Store {
    writer: AtomicFileWriter,
    history_capacity: usize,
}

impl Store {
    pub(crate) fn new(dir: PathBuf, history_capacity: usize) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            history_capacity,
        }
    }

    /// Cap the size of each stored file.
    pub(crate) fn with_max_bytes(mut self, limit: usize) -> Self {
        self.writer = self.writer.with_max_bytes(limit);
        self
    }

    /// Unreadable or corrupt history is logged and replaced by an empty one.
    pub(crate) fn load_history(&self) -> JobHistory {
        let mut history = self
            .load::<JobHistory>(HISTORY_FILENAME)
            .unwrap_or_else(|| JobHistory::new(self.history_capacity, COMPLETED_CAPACITY));
        history.processing.set_capacity(self.history_capacity);
        history.completed.set_capacity(COMPLETED_CAPACITY);
        history
    }

    /// Write the history. If the write fails, the old file is removed and
    /// a halved history is written once more.
    pub(crate) fn save_history(&self, history: &JobHistory) -> Result<(), PersistError> {
        match self.save(HISTORY_FILENAME, history) {
            Ok(()) => Ok(()),
            Err(err) => {
                ft_warn!("Failed to save history ({err}); retrying with fewer entries");
                self.writer.remove(HISTORY_FILENAME)?;
                let mut pruned = history.clone();
                pruned.shrink();
                self.save(HISTORY_FILENAME, &pruned)
            }
        }
    }

    pub(crate) fn load_session(&self) -> Option<Session> {
        self.load(SESSION_FILENAME)
    }

    pub(crate) fn save_session(&self, session: &Session) -> Result<(), PersistError> {
        self.save(SESSION_FILENAME, session)
    }

    pub(crate) fn clear_session(&self) -> Result<(), PersistError> {
        self.writer.remove(SESSION_FILENAME)
    }

    fn load<T: DeserializeOwned>(&self, filename: &str) -> Option<T> {
        let path = self.writer.path_of(filename);
        let content = match self.writer.read(filename) {
            Ok(Some(content)) => content,
            Ok(None) => return None,
            Err(err) => {
                ft_warn!("Failed to read {:?}: {}", path, err);
                return None;
            }
        };
        match ron::from_str(&content) {
            Ok(value) => {
                ft_info!("Loaded {:?}", path);
                Some(value)
            }
            Err(err) => {
                ft_warn!("Failed to parse {:?}: {}", path, err);
                None
            }
        }
    }

    fn save<T: Serialize>(&self, filename: &str, value: &T) -> Result<(), PersistError> {
        self.writer.write(filename, &encode(value)?)?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, PersistError> {
    ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::new())
        .map_err(|err| PersistError::Encode(err.to_string()))
}
