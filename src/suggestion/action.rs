use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::context::{ContextSnapshot, ContextStore};

/// Parameters needed to carry out a suggestion. Opaque to ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    OpenFile { path: PathBuf },
    OpenApp { name: String },
    OpenUrl { url: String },
    /// Name of a command pre-declared in the `[actions]` config.
    RunCommand { name: String },
    ShowTip { text: String },
    None,
}

impl ActionPayload {
    /// Human-facing target substituted into description templates.
    pub fn target(&self) -> String {
        match self {
            ActionPayload::OpenFile { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            ActionPayload::OpenApp { name } => name.clone(),
            ActionPayload::OpenUrl { url } => url.clone(),
            ActionPayload::RunCommand { name } => name.clone(),
            ActionPayload::ShowTip { text } => text.clone(),
            ActionPayload::None => String::new(),
        }
    }
}

/// How a category (or rule) turns the current context into a concrete payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionTemplate {
    RunCommand { name: String },
    OpenHeadFile,
    OpenRelatedFile,
    OpenNextApp,
    OpenUrl { url: String },
    ShowTip { text: String },
    None,
}

/// What templates may look at while resolving.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub current: &'a ContextSnapshot,
    pub store: &'a ContextStore,
}

impl<'a> ActionContext<'a> {
    pub fn new(current: &'a ContextSnapshot, store: &'a ContextStore) -> Self {
        Self { current, store }
    }
}

impl ActionTemplate {
    /// `None` when the context cannot support the action (no file open, no learned next app).
    pub fn resolve(&self, ctx: &ActionContext<'_>) -> Option<ActionPayload> {
        match self {
            ActionTemplate::RunCommand { name } => Some(ActionPayload::RunCommand { name: name.clone() }),
            ActionTemplate::OpenHeadFile => ctx
                .current
                .head_file()
                .map(|p| ActionPayload::OpenFile { path: p.to_path_buf() }),
            ActionTemplate::OpenRelatedFile => {
                related_file(ctx).map(|path| ActionPayload::OpenFile { path })
            }
            ActionTemplate::OpenNextApp => {
                let app = ctx.current.normalized_app();
                ctx.store
                    .transitions_from(&app)
                    .into_iter()
                    .next()
                    .map(|(name, _)| ActionPayload::OpenApp { name })
            }
            ActionTemplate::OpenUrl { url } => Some(ActionPayload::OpenUrl { url: url.clone() }),
            ActionTemplate::ShowTip { text } => Some(ActionPayload::ShowTip { text: text.clone() }),
            ActionTemplate::None => Some(ActionPayload::None),
        }
    }
}

/// A file that belongs with the one being worked on: a sibling in the current
/// recent list first, then whatever the user most often has open in this app.
fn related_file(ctx: &ActionContext<'_>) -> Option<PathBuf> {
    let head = ctx.current.head_file()?;
    let parent = head.parent();

    let sibling = ctx
        .current
        .recent_files
        .iter()
        .skip(1)
        .find(|f| f.as_path() != head && f.parent() == parent);
    if let Some(found) = sibling {
        return Some(found.clone());
    }

    let app = ctx.current.normalized_app();
    ctx.store
        .frequent_files_with_app(&app)
        .into_iter()
        .map(|(path, _)| path)
        .find(|p| p.as_path() != head)
}

/// Fills `{target}` in a description template.
pub fn render_description(template: &str, payload: &ActionPayload) -> String {
    template.replace("{target}", &payload.target())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn related_file_prefers_siblings() {
        let current = ContextSnapshot::builder(0)
            .class("Code")
            .files(["/src/main.rs", "/docs/readme.md", "/src/lib.rs"])
            .build();
        let store = ContextStore::new(8);
        let ctx = ActionContext::new(&current, &store);
        assert_eq!(
            ActionTemplate::OpenRelatedFile.resolve(&ctx),
            Some(ActionPayload::OpenFile {
                path: PathBuf::from("/src/lib.rs")
            })
        );
    }

    #[test]
    fn next_app_needs_history() {
        let current = ContextSnapshot::builder(0).class("Code").build();
        let store = ContextStore::new(8);
        let ctx = ActionContext::new(&current, &store);
        assert_eq!(ActionTemplate::OpenNextApp.resolve(&ctx), None);
    }

    #[test]
    fn description_rendering() {
        let payload = ActionPayload::OpenFile {
            path: PathBuf::from("/a/b/notes.md"),
        };
        assert_eq!(render_description("Open {target}", &payload), "Open notes.md");
    }
}
