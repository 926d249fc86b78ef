use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
#[cfg(unix)]
use std::{io::Write, os::unix::fs::OpenOptionsExt};
use thiserror::Error;

use crate::session::AuthSession;

/// Fixed key the session record is stored under.
pub const STORAGE_KEY: &str = "auth-storage";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot determine config directory")]
    NoConfigDir,
    #[error("Failed to access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Session record is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable storage for the single auth session record.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<AuthSession>, SessionError>;
    fn save(&self, session: &AuthSession) -> Result<(), SessionError>;
}

/// On-disk shape: the session state plus a schema version.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    state: AuthSession,
    #[serde(default)]
    version: u32,
}

/// Stores the session as `<config_dir>/prism/auth-storage.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_config_dir() -> Result<Self, SessionError> {
        Ok(Self::new(default_session_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn default_session_path() -> Result<PathBuf, SessionError> {
    Ok(dirs::config_dir()
        .ok_or(SessionError::NoConfigDir)?
        .join("prism")
        .join(format!("{}.json", STORAGE_KEY)))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SessionError + '_ {
    move |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn secure_write(path: &Path, content: &str) -> Result<(), SessionError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error(path))?;
    }

    #[cfg(unix)]
    {
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut file| file.write_all(content.as_bytes()))
            .map_err(io_error(path))?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, content).map_err(io_error(path))?;
    }

    Ok(())
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<AuthSession>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.path).map_err(io_error(&self.path))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let record: PersistedRecord = serde_json::from_str(&raw)?;
        Ok(Some(record.state))
    }

    fn save(&self, session: &AuthSession) -> Result<(), SessionError> {
        let record = PersistedRecord {
            state: session.clone(),
            version: 0,
        };
        let raw = serde_json::to_string_pretty(&record)?;
        secure_write(&self.path, &raw)
    }
}

/// Keeps the record in memory. Used by `--dev` runs and tests.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    record: Mutex<Option<AuthSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<AuthSession>, SessionError> {
        Ok(self
            .record
            .lock()
            .expect("session store lock poisoned")
            .clone())
    }

    fn save(&self, session: &AuthSession) -> Result<(), SessionError> {
        *self.record.lock().expect("session store lock poisoned") = Some(session.clone());
        Ok(())
    }
}
