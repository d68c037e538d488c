use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Persistent local record mirroring the current access credential across reloads.
pub trait CredentialRecord: Send + Sync {
    fn load(&self) -> Result<Option<String>, Error>;
    fn save(&self, token: &str) -> Result<(), Error>;
    fn remove(&self) -> Result<(), Error>;
}

#[derive(Serialize, Deserialize)]
struct PersistedCredential {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// JSON file holding `{ "accessToken": "..." }`.
#[derive(Debug, Clone)]
pub struct FileRecord {
    path: PathBuf,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialRecord for FileRecord {
    fn load(&self) -> Result<Option<String>, Error> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let persisted: PersistedCredential = serde_json::from_str(&contents)?;
        Ok(Some(persisted.access_token).filter(|token| !token.is_empty()))
    }

    fn save(&self, token: &str) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string(&PersistedCredential {
            access_token: token.to_string(),
        })?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), Error> {
        match std::fs::remove_file(&self.path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Process-local record, used when no credential path is configured.
#[derive(Debug, Default)]
pub struct MemoryRecord {
    slot: Mutex<Option<String>>,
}

impl CredentialRecord for MemoryRecord {
    fn load(&self) -> Result<Option<String>, Error> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, token: &str) -> Result<(), Error> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), Error> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}
