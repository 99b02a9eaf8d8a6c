//! Persistence of the last known state.
//!
//! Without persistence every restart takes a fresh baseline and changes that
//! happened while infralog was down go unreported. Two stores exist:
//!
//! - [`FileStore`] keeps the last state as a JSON document.
//! - [`SqliteStore`] keeps the last state and a log of every change.

mod file;
pub mod sqlite;

use std::path::Path;

use crate::config::PersistenceConfig;
use crate::error::{Error, Result};
use crate::tfstate::{State, StateDiff};

pub use file::FileStore;
pub use sqlite::{ChangeKind, ChangeRecord, SqliteStore, StoreStats};

/// Storage for the last observed state.
pub trait StateStore: Send + Sync {
    /// Short store name for logs.
    fn name(&self) -> &'static str;

    /// Where the store lives on disk.
    fn location(&self) -> &Path;

    /// Load the last saved state, `None` when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored state exists but cannot be read.
    fn load(&self) -> Result<Option<State>>;

    /// Replace the saved state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    fn save(&self, state: &State) -> Result<()>;

    /// Append the changes of one poll to the history, if the store keeps one.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be written.
    fn record(&self, _diff: &StateDiff) -> Result<()> {
        Ok(())
    }
}

/// Open the configured store, if any.
///
/// # Errors
///
/// Returns an error if both stores are configured or the store cannot be
/// opened.
pub fn open_store(config: &PersistenceConfig) -> Result<Option<Box<dyn StateStore>>> {
    match (&config.state_file, &config.database) {
        (Some(_), Some(_)) => Err(Error::config(
            "persistence.state_file and persistence.database are mutually exclusive",
        )),
        (Some(path), None) => Ok(Some(Box::new(FileStore::new(path)?))),
        (None, Some(path)) => Ok(Some(Box::new(SqliteStore::open(path)?))),
        (None, None) => Ok(None),
    }
}
