use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::context::normalize_app_name;
use crate::kernel::config::ActionsConfig;
use crate::kernel::error::ActionError;
use crate::suggestion::ActionPayload;

/// Carries out an accepted suggestion.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, payload: &ActionPayload) -> Result<(), ActionError>;
}

/// Opens files and URLs with the desktop opener and launches only what `[actions]` declares.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    actions: ActionsConfig,
}

impl SystemExecutor {
    pub fn new(actions: ActionsConfig) -> Self {
        Self { actions }
    }

    async fn open_detached(&self, target: String) -> Result<(), ActionError> {
        if !self.actions.allow_open {
            return Err(ActionError::Undeclared(target));
        }
        tokio::task::spawn_blocking(move || open::that_detached(&target))
            .await
            .map_err(|e| ActionError::Launch(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        Ok(())
    }
}

#[async_trait]
impl ActionExecutor for SystemExecutor {
    async fn execute(&self, payload: &ActionPayload) -> Result<(), ActionError> {
        match payload {
            ActionPayload::OpenFile { path } => {
                self.open_detached(path.to_string_lossy().into_owned()).await
            }
            ActionPayload::OpenUrl { url } => self.open_detached(url.clone()).await,
            ActionPayload::OpenApp { name } => {
                let key = normalize_app_name(name);
                let program = self
                    .actions
                    .apps
                    .get(&key)
                    .ok_or_else(|| ActionError::Undeclared(name.clone()))?;
                tokio::process::Command::new(program).spawn()?;
                info!(app = %key, "app launched");
                Ok(())
            }
            ActionPayload::RunCommand { name } => {
                let spec = self
                    .actions
                    .commands
                    .get(name)
                    .ok_or_else(|| ActionError::Undeclared(name.clone()))?;
                let mut command = tokio::process::Command::new(&spec.program);
                command.args(&spec.args);
                if let Some(cwd) = &spec.cwd {
                    command.current_dir(cwd);
                }
                let mut child = command.spawn()?;
                info!(command = %name, "command started");

                // Long-running commands are not awaited; their exit is only logged.
                let name = name.clone();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if status.success() => debug!(command = %name, "command finished"),
                        Ok(status) => warn!(command = %name, %status, "command failed"),
                        Err(e) => warn!(command = %name, error = %e, "command lost"),
                    }
                });
                Ok(())
            }
            // Displayed by the UI layer as the suggestion text itself.
            ActionPayload::ShowTip { .. } | ActionPayload::None => Ok(()),
        }
    }
}

/// Records payloads instead of running them. Optionally fails every call.
#[derive(Debug, Clone, Default)]
pub struct NoopExecutor {
    executed: Arc<Mutex<Vec<ActionPayload>>>,
    fail: bool,
}

impl NoopExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn executed(&self) -> Vec<ActionPayload> {
        self.executed
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActionExecutor for NoopExecutor {
    async fn execute(&self, payload: &ActionPayload) -> Result<(), ActionError> {
        if self.fail {
            return Err(ActionError::Exit {
                program: "noop".to_string(),
                status: "failure injected".to_string(),
            });
        }
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(payload.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn undeclared_actions_are_refused() {
        let exec = SystemExecutor::new(ActionsConfig::default());
        let err = exec
            .execute(&ActionPayload::RunCommand {
                name: "rm-everything".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Undeclared(_)));

        let err = exec
            .execute(&ActionPayload::OpenApp {
                name: "Firefox".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Undeclared(_)));
    }

    #[tokio::test]
    async fn tips_need_no_launch() {
        let exec = SystemExecutor::new(ActionsConfig::default());
        assert!(exec
            .execute(&ActionPayload::ShowTip { text: "hi".into() })
            .await
            .is_ok());
    }
}
