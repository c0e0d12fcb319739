use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::{build_prompt, is_actionable, response_schema};
use crate::kernel::config::LlmConfig;
use crate::kernel::error::CandidateError;
use crate::services::candidate::{CandidateRequest, CandidateSource};
use crate::suggestion::{ActionCategory, Suggestion, SuggestionSource};

/// Candidate source backed by a llama.cpp-style `/completion` endpoint.
#[derive(Clone)]
pub struct LocalLlmSource {
    client: Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct CompletionRequest {
    prompt: String,
    stream: bool,
    n_predict: usize,
    temperature: f32,
    stop: Vec<String>,
    json_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    suggestions: Vec<ReplyItem>,
}

#[derive(Debug, Deserialize)]
struct ReplyItem {
    category: String,
    #[serde(default)]
    description: Option<String>,
    confidence: f32,
}

impl LocalLlmSource {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(config.cutoff().max(Duration::from_millis(100)))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    async fn complete(&self, request: &CandidateRequest) -> Result<String> {
        let body = CompletionRequest {
            prompt: build_prompt(request, self.config.max_candidates),
            stream: false,
            n_predict: self.config.n_predict,
            temperature: self.config.temperature,
            stop: vec!["User:".to_string(), "System:".to_string()],
            json_schema: response_schema(request, self.config.max_candidates),
        };

        let response = self
            .client
            .post(format!("{}/completion", self.config.base_url.trim_end_matches('/')))
            .timeout(request.deadline)
            .json(&body)
            .send()
            .await
            .context("completion request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("LLM server error: {}", response.status()));
        }

        let parsed: CompletionResponse = response.json().await?;
        Ok(parsed.content.trim().to_string())
    }

    /// Maps a raw reply onto the offered categories. Unknown categories and
    /// chatter are discarded, confidences are capped.
    pub fn interpret(
        &self,
        request: &CandidateRequest,
        content: &str,
    ) -> Result<Vec<Suggestion>, CandidateError> {
        let reply: Reply =
            serde_json::from_str(content).map_err(|e| CandidateError::Malformed(e.to_string()))?;

        let mut out = Vec::new();
        for item in reply.suggestions.into_iter().take(self.config.max_candidates) {
            let category = ActionCategory::new(item.category.trim());
            let Some(option) = request.option(&category) else {
                debug!(category = %category, "model proposed an unoffered category");
                continue;
            };
            let description = match item.description {
                Some(text) if is_actionable(&text) => text.trim().to_string(),
                Some(_) => continue,
                None => option.description.clone(),
            };
            let confidence = item.confidence.clamp(0.0, self.config.max_confidence);
            out.push(Suggestion::new(
                category,
                description,
                SuggestionSource::Llm,
                confidence,
                option.payload.clone(),
            ));
        }
        Ok(out)
    }
}

#[async_trait]
impl CandidateSource for LocalLlmSource {
    fn name(&self) -> &str {
        "local-llm"
    }

    async fn request_candidates(
        &self,
        request: &CandidateRequest,
    ) -> Result<Vec<Suggestion>, CandidateError> {
        if request.options.is_empty() {
            return Ok(Vec::new());
        }
        let content = self
            .complete(request)
            .await
            .map_err(|e| CandidateError::Unavailable(format!("{e:#}")))?;
        self.interpret(request, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSnapshot;
    use crate::encoder::FeatureVector;
    use crate::services::candidate::CategoryOption;
    use crate::suggestion::ActionPayload;

    fn request() -> CandidateRequest {
        CandidateRequest {
            features: FeatureVector::zeros(1),
            snapshot: ContextSnapshot::builder(0).class("Code").build(),
            transitions: vec![],
            options: vec![CategoryOption {
                category: "run-build".into(),
                description: "Run the build command".into(),
                payload: ActionPayload::RunCommand {
                    name: "build".into(),
                },
            }],
            deadline: Duration::from_millis(100),
        }
    }

    #[test]
    fn interpret_filters_and_caps() {
        let source = LocalLlmSource::new(LlmConfig::default());
        let content = r#"{"suggestions": [
            {"category": "run-build", "description": "Build the project now", "confidence": 0.95},
            {"category": "launch-rockets", "confidence": 0.9},
            {"category": "run-build", "description": "I am a helpful assistant", "confidence": 0.5}
        ]}"#;
        let out = source.interpret(&request(), content).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.7);
        assert_eq!(out[0].source, SuggestionSource::Llm);
    }

    #[test]
    fn garbage_is_malformed() {
        let source = LocalLlmSource::new(LlmConfig::default());
        assert!(matches!(
            source.interpret(&request(), "not json"),
            Err(CandidateError::Malformed(_))
        ));
    }
}
