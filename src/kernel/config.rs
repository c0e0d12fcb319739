use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::time::{Millis, MS_PER_SEC};
use crate::rules::{default_rules, Rule};
use crate::suggestion::{default_categories, CategoryRegistry, CategorySpec};

/// Full engine configuration. Every section has defaults, so an empty TOML file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub context: ContextConfig,
    pub encoder: EncoderConfig,
    pub model: ModelConfig,
    pub rules: RulesConfig,
    pub fusion: FusionConfig,
    pub session: SessionConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub actions: ActionsConfig,
    pub categories: Vec<CategorySpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context: ContextConfig::default(),
            encoder: EncoderConfig::default(),
            model: ModelConfig::default(),
            rules: RulesConfig::default(),
            fusion: FusionConfig::default(),
            session: SessionConfig::default(),
            llm: LlmConfig::default(),
            storage: StorageConfig::default(),
            actions: ActionsConfig::default(),
            categories: default_categories(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Snapshots retained before FIFO eviction.
    pub capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { capacity: 512 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// K: prior snapshots folded into each vector.
    pub history_window: usize,
    pub title_buckets: usize,
    pub app_buckets: usize,
    pub process_buckets: usize,
    pub file_buckets: usize,
    pub recency_decay: f32,
    /// Local time offset for the time-of-day features.
    pub utc_offset_minutes: i32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            history_window: 8,
            title_buckets: 32,
            app_buckets: 32,
            process_buckets: 16,
            file_buckets: 16,
            recency_decay: 0.6,
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub hidden_units: usize,
    pub learning_rate: f32,
    /// Scale of the loss applied on ignored/timed-out outcomes.
    pub negative_scale: f32,
    /// Step multiplier for suggestions proposed by more than one source.
    pub multi_source_boost: f32,
    /// Feedback records needed before model output counts at full weight.
    pub min_feedback: u64,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hidden_units: 24,
            learning_rate: 0.1,
            negative_scale: 0.3,
            multi_source_boost: 1.5,
            min_feedback: 20,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// First-N matching rules that emit candidates.
    pub max_matches: usize,
    pub min_weight: f32,
    pub max_weight: f32,
    pub boost: f32,
    pub decay: f32,
    pub table: Vec<Rule>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            max_matches: 3,
            min_weight: 0.25,
            max_weight: 2.0,
            boost: 1.15,
            decay: 0.85,
            table: default_rules(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Model categories considered per cycle.
    pub top_m: usize,
    pub confidence_floor: f32,
    pub suppression_secs: u64,
    pub max_suggestions: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            top_m: 3,
            confidence_floor: 0.15,
            suppression_secs: 600,
            max_suggestions: 1,
        }
    }
}

impl FusionConfig {
    pub fn suppression_ms(&self) -> Millis {
        self.suppression_secs as Millis * MS_PER_SEC
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub decision_deadline_secs: u64,
    /// Resolved session ids remembered for duplicate detection.
    pub resolved_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            decision_deadline_secs: 30,
            resolved_history: 256,
        }
    }
}

impl SessionConfig {
    pub fn deadline_ms(&self) -> Millis {
        self.decision_deadline_secs as Millis * MS_PER_SEC
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Candidates arriving later than this are dropped for the cycle.
    pub cutoff_ms: u64,
    pub n_predict: usize,
    pub temperature: f32,
    /// Ceiling on any confidence the language model reports.
    pub max_confidence: f32,
    pub max_candidates: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:8080".to_string(),
            cutoff_ms: 1_500,
            n_predict: 128,
            temperature: 0.2,
            max_confidence: 0.7,
            max_candidates: 3,
        }
    }
}

impl LlmConfig {
    pub fn cutoff(&self) -> Duration {
        Duration::from_millis(self.cutoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub feedback_log: PathBuf,
    pub model_snapshot: PathBuf,
    pub retry_attempts: u32,
    pub retry_base_ms: u64,
    /// Applied model updates between snapshot saves.
    pub snapshot_every: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            feedback_log: PathBuf::from("foresight-data/feedback.jsonl"),
            model_snapshot: PathBuf::from("foresight-data/model.json"),
            retry_attempts: 4,
            retry_base_ms: 50,
            snapshot_every: 25,
        }
    }
}

/// A command the executor is allowed to run, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

/// The only things `SystemExecutor` will launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub commands: BTreeMap<String, CommandSpec>,
    /// Normalized app name -> program to launch.
    pub apps: BTreeMap<String, String>,
    /// Allow `open_file` / `open_url` payloads through the desktop opener.
    pub allow_open: bool,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            commands: BTreeMap::new(),
            apps: BTreeMap::new(),
            allow_open: true,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn registry(&self) -> Result<CategoryRegistry, ConfigError> {
        CategoryRegistry::new(self.categories.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let registry = self.registry()?;

        let mut rule_ids = HashSet::new();
        for rule in &self.rules.table {
            registry.ensure(&rule.category)?;
            if !rule_ids.insert(rule.id.clone()) {
                return Err(ConfigError::Invalid(format!("rule `{}` declared twice", rule.id)));
            }
            if !(0.0..=1.0).contains(&rule.base_confidence) {
                return Err(ConfigError::Invalid(format!(
                    "rule `{}` base confidence {} outside [0, 1]",
                    rule.id, rule.base_confidence
                )));
            }
        }

        let r = &self.rules;
        if !(r.min_weight > 0.0 && r.min_weight <= 1.0 && r.max_weight >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "rule weight bounds [{}, {}] must bracket 1.0 with a positive floor",
                r.min_weight, r.max_weight
            )));
        }
        if r.boost < 1.0 || !(r.decay > 0.0 && r.decay <= 1.0) {
            return Err(ConfigError::Invalid("rule boost must be >= 1 and decay in (0, 1]".into()));
        }

        let e = &self.encoder;
        if e.history_window == 0 || self.context.capacity == 0 {
            return Err(ConfigError::Invalid("window sizes must be positive".into()));
        }
        if e.title_buckets == 0 || e.app_buckets == 0 || e.process_buckets == 0 || e.file_buckets == 0
        {
            return Err(ConfigError::Invalid("bucket counts must be positive".into()));
        }
        if !(e.recency_decay > 0.0 && e.recency_decay <= 1.0) {
            return Err(ConfigError::Invalid("recency decay must be in (0, 1]".into()));
        }

        let m = &self.model;
        if m.hidden_units == 0 || m.learning_rate <= 0.0 || m.negative_scale < 0.0 {
            return Err(ConfigError::Invalid("model sizes and rates must be positive".into()));
        }
        if m.multi_source_boost < 1.0 {
            return Err(ConfigError::Invalid("multi-source boost must be >= 1".into()));
        }

        if self.fusion.top_m == 0 || self.fusion.max_suggestions == 0 {
            return Err(ConfigError::Invalid("fusion must keep at least one candidate".into()));
        }
        if self.storage.retry_attempts == 0 {
            return Err(ConfigError::Invalid("at least one persistence attempt is required".into()));
        }
        if !(0.0..=1.0).contains(&self.llm.max_confidence) {
            return Err(ConfigError::Invalid(format!(
                "llm max confidence {} outside [0, 1]",
                self.llm.max_confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.encoder.history_window, 8);
        assert_eq!(config.fusion.suppression_ms(), 600_000);
        assert_eq!(config.categories.len(), 5);
        assert!(!config.rules.table.is_empty());
    }

    #[test]
    fn llm_confidence_cap_must_be_a_unit_value() {
        for bad in [-0.1_f32, 1.5, f32::NAN] {
            let mut config = EngineConfig::default();
            config.llm.max_confidence = bad;
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{bad}");
        }
        let config = EngineConfig::from_toml_str("[llm]\nmax_confidence = 0.9\n").unwrap();
        assert_eq!(config.llm.max_confidence, 0.9);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [fusion]
            max_suggestions = 2

            [actions.commands.build]
            program = "cargo"
            args = ["build"]
            "#,
        )
        .unwrap();
        assert_eq!(config.fusion.max_suggestions, 2);
        assert_eq!(config.fusion.top_m, 3);
        assert_eq!(config.actions.commands["build"].args, vec!["build"]);
    }

    #[test]
    fn rejects_inverted_weight_bounds() {
        let err = EngineConfig::from_toml_str("[rules]\nmin_weight = 3.0\nmax_weight = 2.0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_rules_for_unknown_categories() {
        let err = EngineConfig::from_toml_str(
            r#"
            [[categories]]
            id = "only-one"
            description = "x"
            action = { kind = "none" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCategory(_)));
    }

    #[test]
    fn rejects_zero_buckets() {
        let err = EngineConfig::from_toml_str("[encoder]\napp_buckets = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
