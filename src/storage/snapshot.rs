use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::kernel::error::PersistenceError;
use crate::model::ModelState;

/// Holds the latest model snapshot. Saves replace the previous one atomically.
pub trait SnapshotStore: Send {
    fn save(&mut self, state: &ModelState) -> Result<(), PersistenceError>;
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<ModelState>, PersistenceError>;
}

/// JSON file written to a sibling temp file, synced, then renamed over the target.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "model".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&mut self, state: &ModelState) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }
        let bytes = serde_json::to_vec(state)?;
        let tmp = self.temp_path();

        let mut file = fs::File::create(&tmp).map_err(|e| PersistenceError::io(&tmp, e))?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| PersistenceError::io(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| PersistenceError::io(&self.path, e))
    }

    fn load(&self) -> Result<Option<ModelState>, PersistenceError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(&self.path, e)),
        }
    }
}

/// In-process snapshot slot holding serialized JSON. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored bytes, e.g. with garbage to simulate corruption.
    pub fn put_raw(&self, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(bytes.into());
        }
    }

    pub fn is_saved(&self) -> bool {
        self.slot.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&mut self, state: &ModelState) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(state)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| PersistenceError::Serialization("snapshot slot poisoned".into()))?;
        *slot = Some(bytes);
        Ok(())
    }

    fn load(&self) -> Result<Option<ModelState>, PersistenceError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| PersistenceError::Serialization("snapshot slot poisoned".into()))?;
        match slot.as_deref() {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }
}
