//! Persisted session storage.
//!
//! Exactly one value survives a restart: the raw session token. The user
//! is always re-derived from the token's claims at startup, so identity
//! has a single source of truth.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("corrupt session file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Where the session token lives between restarts.
///
/// Implementations are written to only by the session store; nothing else
/// in the client touches persisted session state.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn save(&self, token: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    token: Option<String>,
}

/// Token storage backed by a small JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Write to a sibling tmp file and rename so a crash mid-write never
    // leaves a corrupt session file behind.
    fn write(&self, token: Option<&str>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec(&PersistedSession {
            token: token.map(str::to_string),
        })?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &body)?;
        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let persisted: PersistedSession = serde_json::from_slice(&bytes)?;
        Ok(persisted.token)
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        self.write(Some(token))
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.write(None)
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        let token = self.token.lock().unwrap_or_else(|err| err.into_inner());
        Ok(token.clone())
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        let mut slot = self.token.lock().unwrap_or_else(|err| err.into_inner());
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut slot = self.token.lock().unwrap_or_else(|err| err.into_inner());
        *slot = None;
        Ok(())
    }
}
