use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::action::ActionTemplate;
use crate::kernel::error::ConfigError;

/// Identifier for a class of suggestion, e.g. `run-build`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionCategory(String);

impl ActionCategory {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionCategory {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Declaration of one category: how to describe it and which action it resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub id: ActionCategory,
    /// `{target}` is replaced with the resolved action target.
    pub description: String,
    pub action: ActionTemplate,
}

impl CategorySpec {
    pub fn new(id: &str, description: &str, action: ActionTemplate) -> Self {
        Self {
            id: ActionCategory::new(id),
            description: description.to_string(),
            action,
        }
    }
}

/// The fixed set of categories for one engine instance. Order defines model output indices.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    specs: Vec<CategorySpec>,
    index: HashMap<ActionCategory, usize>,
}

impl CategoryRegistry {
    pub fn new(specs: Vec<CategorySpec>) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.id.clone(), i).is_some() {
                return Err(ConfigError::DuplicateCategory(spec.id.to_string()));
            }
        }
        Ok(Self { specs, index })
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn index_of(&self, category: &ActionCategory) -> Option<usize> {
        self.index.get(category).copied()
    }

    pub fn category(&self, index: usize) -> Option<&ActionCategory> {
        self.specs.get(index).map(|s| &s.id)
    }

    pub fn spec(&self, category: &ActionCategory) -> Option<&CategorySpec> {
        self.index_of(category).map(|i| &self.specs[i])
    }

    pub fn contains(&self, category: &ActionCategory) -> bool {
        self.index.contains_key(category)
    }

    pub fn ensure(&self, category: &ActionCategory) -> Result<(), ConfigError> {
        if self.contains(category) {
            Ok(())
        } else {
            Err(ConfigError::UnknownCategory(category.to_string()))
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &ActionCategory> {
        self.specs.iter().map(|s| &s.id)
    }

    pub fn specs(&self) -> &[CategorySpec] {
        &self.specs
    }
}

/// Categories registered when the config does not list its own.
pub fn default_categories() -> Vec<CategorySpec> {
    vec![
        CategorySpec::new("open-related-file", "Open {target}", ActionTemplate::OpenRelatedFile),
        CategorySpec::new(
            "run-build",
            "Run the {target} command",
            ActionTemplate::RunCommand {
                name: "build".to_string(),
            },
        ),
        CategorySpec::new("switch-context", "Switch to {target}", ActionTemplate::OpenNextApp),
        CategorySpec::new(
            "take-break",
            "{target}",
            ActionTemplate::ShowTip {
                text: "You have been at it for a while. Take a short break.".to_string(),
            },
        ),
        CategorySpec::new(
            "show-tip",
            "{target}",
            ActionTemplate::ShowTip {
                text: "Press Ctrl+Shift+P to reach any command without leaving the keyboard."
                    .to_string(),
            },
        ),
    ]
}
