use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::feedback::FeedbackRecord;
use crate::kernel::error::PersistenceError;

/// Append-only store of feedback records.
pub trait FeedbackLog: Send {
    /// Durable once this returns `Ok`.
    fn append(&mut self, record: &FeedbackRecord) -> Result<(), PersistenceError>;
    /// Every readable record, oldest first.
    fn load_all(&self) -> Result<Vec<FeedbackRecord>, PersistenceError>;
}

/// One JSON object per line. A torn final line is skipped on load.
#[derive(Debug, Clone)]
pub struct JsonlFeedbackLog {
    path: PathBuf,
}

impl JsonlFeedbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeedbackLog for JsonlFeedbackLog {
    fn append(&mut self, record: &FeedbackRecord) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }
        let encoded = serde_json::to_string(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PersistenceError::io(&self.path, e))?;

        // A torn tail gets its own line so the fragment never swallows this record.
        let mut line = String::with_capacity(encoded.len() + 2);
        if ends_without_newline(&mut file).map_err(|e| PersistenceError::io(&self.path, e))? {
            warn!(path = %self.path.display(), "sealing torn feedback record");
            line.push('\n');
        }
        line.push_str(&encoded);
        line.push('\n');

        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| PersistenceError::io(&self.path, e))
    }

    fn load_all(&self) -> Result<Vec<FeedbackRecord>, PersistenceError> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(&self.path, e)),
        };

        let mut records = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| PersistenceError::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedbackRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = n + 1, error = %e, "skipping unreadable feedback record"),
            }
        }
        Ok(records)
    }
}

/// True when the file is non-empty and its last byte is not a newline.
fn ends_without_newline(file: &mut fs::File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[derive(Debug, Default)]
struct MemoryLogInner {
    records: Vec<FeedbackRecord>,
    failures_remaining: u32,
}

/// In-process log. Clones share contents, so a test can keep a handle after
/// handing one to the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeedbackLog {
    inner: Arc<Mutex<MemoryLogInner>>,
}

impl MemoryFeedbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` appends fail with an io error.
    pub fn fail_next(&self, n: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failures_remaining = n;
        }
    }

    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.inner
            .lock()
            .map(|inner| inner.records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FeedbackLog for MemoryFeedbackLog {
    fn append(&mut self, record: &FeedbackRecord) -> Result<(), PersistenceError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| PersistenceError::Serialization("feedback log poisoned".into()))?;
        if inner.failures_remaining > 0 {
            inner.failures_remaining -= 1;
            return Err(PersistenceError::io(
                "memory",
                std::io::Error::new(std::io::ErrorKind::Other, "injected failure"),
            ));
        }
        inner.records.push(record.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<FeedbackRecord>, PersistenceError> {
        Ok(self.records())
    }
}
