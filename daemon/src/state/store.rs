//! Durable "live mirroring enabled" flag
//!
//! The flag lives in a single JSON object `{"enabled": bool}` that is
//! rewritten wholesale on every transition.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// On-disk representation of the flag file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct FlagFile {
    enabled: bool,
}

/// Errors raised while reading or writing the flag file
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access flag file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("flag file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File-backed store for the enabled flag
#[derive(Debug, Clone)]
pub struct FlagStore {
    path: PathBuf,
}

impl FlagStore {
    /// Value assumed when no flag has been persisted yet
    pub const DEFAULT_ENABLED: bool = true;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted flag, `None` if the file does not exist
    pub fn read(&self) -> Result<Option<bool>, StoreError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let file: FlagFile = serde_json::from_slice(&raw).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        Ok(Some(file.enabled))
    }

    /// Read the flag, falling back to [`Self::DEFAULT_ENABLED`] on a missing
    /// or unreadable file
    pub fn load(&self) -> bool {
        match self.read() {
            Ok(Some(enabled)) => {
                debug!(path = ?self.path, enabled, "flag loaded");
                enabled
            }
            Ok(None) => {
                debug!(path = ?self.path, "no flag file, using default");
                Self::DEFAULT_ENABLED
            }
            Err(e) => {
                warn!(error = %e, "ignoring unreadable flag file");
                Self::DEFAULT_ENABLED
            }
        }
    }

    /// Replace the persisted flag
    ///
    /// Writes to a sibling temp file first so a crash never leaves a
    /// half-written object behind.
    pub fn save(&self, enabled: bool) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let body = serde_json::to_vec(&FlagFile { enabled }).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!(path = ?self.path, enabled, "flag saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn temp_store() -> (tempfile::TempDir, FlagStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FlagStore::new(dir.path().join("music_state.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_defaults_to_enabled() {
        let (_dir, store) = temp_store();
        assert_eq!(store.read().unwrap(), None);
        assert!(store.load());
    }

    #[test]
    fn test_save_then_load() {
        let (_dir, store) = temp_store();

        assert_ok!(store.save(false));
        assert!(!store.load());

        assert_ok!(store.save(true));
        assert!(store.load());
    }

    #[test]
    fn test_file_format() {
        let (_dir, store) = temp_store();
        store.save(false).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"{"enabled":false}"#);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let (_dir, store) = temp_store();
        std::fs::write(store.path(), "not json").unwrap();

        assert_err!(store.read());
        assert!(store.load());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlagStore::new(dir.path().join("nested").join("state.json"));

        store.save(true).unwrap();
        assert_eq!(store.read().unwrap(), Some(true));
    }
}
