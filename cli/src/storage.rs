//! Durable storage for the signed-in session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use todo_core::PersistedSession;

const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed session file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// `<state_dir>/session.json`, holding one `PersistedSession`.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been stored.
    pub fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Malformed {
                path: self.path.clone(),
                source,
            })
    }

    pub fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|source| self.io_error(source))?;
        }
        let json = serde_json::to_string_pretty(session).map_err(|source| StorageError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| self.io_error(source))?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Remove the stored session. Succeeds when there is none.
    pub fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "session cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn session() -> PersistedSession {
        PersistedSession {
            token: "a.b.c".into(),
            username: Some("alice".into()),
        }
    }

    #[test]
    fn load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path());
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(&dir.path().join("nested/state"));
        file.save(&session()).unwrap();
        assert_eq!(file.load().unwrap(), Some(session()));
    }

    #[test]
    fn save_overwrites_previous_session() {
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path());
        file.save(&session()).unwrap();
        let next = PersistedSession {
            token: "x.y.z".into(),
            username: None,
        };
        file.save(&next).unwrap();
        assert_eq!(file.load().unwrap(), Some(next));
    }

    #[test]
    fn clear_removes_file_and_tolerates_absence() {
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path());
        file.save(&session()).unwrap();
        file.clear().unwrap();
        assert!(!file.path().exists());
        file.clear().unwrap();
    }

    #[test]
    fn token_only_file_loads() {
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path());
        fs::write(file.path(), r#"{"token":"a.b.c"}"#).unwrap();
        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded.token, "a.b.c");
        assert_eq!(loaded.username, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path());
        fs::write(file.path(), "not json").unwrap();
        assert!(matches!(file.load(), Err(StorageError::Malformed { .. })));
    }
}
