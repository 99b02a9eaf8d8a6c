use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::StateStore;
use crate::error::{Error, Result};
use crate::tfstate::State;

/// Keeps the last state as pretty-printed JSON.
///
/// Writes go to `<path>.tmp` first and are renamed into place, so a crash
/// never leaves a truncated file behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Create a store at `path`, creating its parent directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty or the directory cannot be
    /// created.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.as_os_str().is_empty() {
            return Err(Error::config("persistence.state_file must not be empty"));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| Error::internal("state file lock poisoned"))
    }
}

impl StateStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Option<State>> {
        let _guard = self.guard()?;

        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::persistence(&self.path, format!("failed to read: {e}"))),
        };

        let state = serde_json::from_slice(&data)
            .map_err(|e| Error::persistence(&self.path, format!("failed to parse: {e}")))?;
        debug!(path = %self.path.display(), "loaded persisted state");
        Ok(Some(state))
    }

    fn save(&self, state: &State) -> Result<()> {
        let _guard = self.guard()?;

        let data = serde_json::to_vec_pretty(state)?;
        let tmp = self.tmp_path();

        std::fs::write(&tmp, data)
            .map_err(|e| Error::persistence(&self.path, format!("failed to write: {e}")))?;

        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(Error::persistence(&self.path, format!("failed to rename: {e}")));
        }

        debug!(path = %self.path.display(), serial = state.serial, "persisted state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_state() -> State {
        let data = std::fs::read(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/state_v1.json"),
        )
        .unwrap();
        State::parse(&data).unwrap()
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(FileStore::new("").is_err());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/state.json");
        let _store = FileStore::new(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("state.json")).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("state.json")).unwrap();
        let state = sample_state();

        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("state.json")).unwrap();
        let mut state = sample_state();

        store.save(&state).unwrap();
        state.serial += 1;
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap().unwrap().serial, state.serial);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path).unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_record_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("state.json")).unwrap();
        store.record(&crate::tfstate::StateDiff::default()).unwrap();
    }
}
