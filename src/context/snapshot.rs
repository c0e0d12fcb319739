use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::app::{app_from_title, has_dirty_marker, normalize_app_name};
use crate::kernel::time::Millis;

/// Upper bound on `recent_files` carried by one snapshot.
pub const MAX_RECENT_FILES: usize = 8;

/// One observation of the desktop. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub timestamp_ms: Millis,
    #[serde(default)]
    pub window_title: String,
    #[serde(default)]
    pub window_class: String,
    #[serde(default)]
    pub process_name: String,
    #[serde(default)]
    pub pid: u32,
    /// Most recent first.
    #[serde(default, deserialize_with = "bounded_files")]
    pub recent_files: Vec<PathBuf>,
    /// Time since the previous snapshot from the same collector.
    #[serde(default)]
    pub elapsed_ms: Millis,
}

fn bounded_files<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut files = Vec::<PathBuf>::deserialize(deserializer)?;
    files.truncate(MAX_RECENT_FILES);
    Ok(files)
}

impl ContextSnapshot {
    pub fn builder(timestamp_ms: Millis) -> SnapshotBuilder {
        SnapshotBuilder::new(timestamp_ms)
    }

    /// Application name: the window class when the collector supplies one, else parsed from the title.
    pub fn app_name(&self) -> String {
        if !self.window_class.trim().is_empty() {
            return self.window_class.trim().to_string();
        }
        app_from_title(&self.window_title)
    }

    pub fn normalized_app(&self) -> String {
        normalize_app_name(&self.app_name())
    }

    pub fn head_file(&self) -> Option<&Path> {
        self.recent_files.first().map(PathBuf::as_path)
    }

    /// True while the focused editor reports unsaved changes.
    pub fn is_dirty(&self) -> bool {
        has_dirty_marker(&self.window_title)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    snapshot: ContextSnapshot,
}

impl SnapshotBuilder {
    fn new(timestamp_ms: Millis) -> Self {
        Self {
            snapshot: ContextSnapshot {
                id: Uuid::new_v4(),
                timestamp_ms,
                window_title: String::new(),
                window_class: String::new(),
                process_name: String::new(),
                pid: 0,
                recent_files: Vec::new(),
                elapsed_ms: 0,
            },
        }
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.snapshot.id = id;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.snapshot.window_title = title.into();
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.snapshot.window_class = class.into();
        self
    }

    pub fn process(mut self, name: impl Into<String>, pid: u32) -> Self {
        self.snapshot.process_name = name.into();
        self.snapshot.pid = pid;
        self
    }

    pub fn files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.snapshot.recent_files = files
            .into_iter()
            .take(MAX_RECENT_FILES)
            .map(Into::into)
            .collect();
        self
    }

    pub fn elapsed(mut self, elapsed_ms: Millis) -> Self {
        self.snapshot.elapsed_ms = elapsed_ms;
        self
    }

    pub fn build(self) -> ContextSnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_bounds_recent_files() {
        let snap = ContextSnapshot::builder(0)
            .files((0..20).map(|i| format!("/tmp/f{i}.txt")))
            .build();
        assert_eq!(snap.recent_files.len(), MAX_RECENT_FILES);
        assert_eq!(snap.head_file(), Some(Path::new("/tmp/f0.txt")));
    }

    #[test]
    fn deserialization_bounds_recent_files_and_assigns_id() {
        let files: Vec<String> = (0..12).map(|i| format!("\"/f{i}\"")).collect();
        let json = format!(
            r#"{{"timestamp_ms": 5, "window_title": "x - Zed", "recent_files": [{}]}}"#,
            files.join(",")
        );
        let snap: ContextSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap.recent_files.len(), MAX_RECENT_FILES);
        assert!(!snap.id.is_nil());
        assert_eq!(snap.app_name(), "Zed");
    }

    #[test]
    fn class_wins_over_title() {
        let snap = ContextSnapshot::builder(0)
            .title("notes - Something Else")
            .class("Obsidian")
            .build();
        assert_eq!(snap.app_name(), "Obsidian");
        assert_eq!(snap.normalized_app(), "obsidian");
    }
}
