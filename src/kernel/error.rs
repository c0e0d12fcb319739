use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use super::time::Millis;

/// Malformed snapshot input. Novel content never produces this.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("history is empty")]
    EmptyHistory,
    #[error("negative timestamp {0}")]
    NegativeTimestamp(Millis),
    #[error("negative elapsed time {0}")]
    NegativeElapsed(Millis),
    #[error("history out of order: {later} precedes {earlier}")]
    OutOfOrder { earlier: Millis, later: Millis },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Serialization(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} is already awaiting a decision")]
    Busy(Uuid),
    #[error("unknown session {0}")]
    Unknown(Uuid),
    #[error("session {0} was already resolved")]
    AlreadyResolved(Uuid),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no action categories registered")]
    NoCategories,
    #[error("category `{0}` registered twice")]
    DuplicateCategory(String),
    #[error("`{0}` is not a registered category")]
    UnknownCategory(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure of an external candidate source. Always treated as "no candidates".
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("candidate source unavailable: {0}")]
    Unavailable(String),
    #[error("unusable reply: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("`{0}` is not declared in [actions]")]
    Undeclared(String),
    #[error("launch failed: {0}")]
    Launch(#[from] std::io::Error),
    #[error("`{program}` exited with {status}")]
    Exit { program: String, status: String },
}

/// Error surface of the engine. Every variant is local to one cycle or one session.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("candidate source timed out after {0:?}")]
    CandidateSourceTimeout(Duration),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
