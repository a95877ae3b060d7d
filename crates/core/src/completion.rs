//! Completion trait: the abstraction over text/chat generation backends.
//!
//! A completion service takes a rendered prompt and returns generated text.
//! The kernel never talks to a concrete HTTP client; prompt functions and
//! planners receive an `Arc<dyn TextCompletion>` and call [`TextCompletion::complete`].
//! Timeouts and retries, if wanted, belong in the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CompletionError;

/// Settings sent along with a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSettings {
    /// The model to use (e.g., "gpt-4o"). `None` lets the service pick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model_id: None,
            temperature: default_temperature(),
            max_tokens: None,
            stop_sequences: Vec::new(),
        }
    }
}

impl CompletionSettings {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop_sequences(mut self, stops: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.stop_sequences = stops.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// The completion capability.
///
/// Every backend (OpenAI, Anthropic, a local model, a scripted test double)
/// implements this trait. Callers stay unaware of which one they got.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// A human-readable name for this service (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn complete(
        &self,
        prompt: &str,
        settings: &CompletionSettings,
    ) -> std::result::Result<String, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults() {
        let settings = CompletionSettings::default();
        assert!((settings.temperature - 0.7).abs() < f32::EPSILON);
        assert!(settings.max_tokens.is_none());
        assert!(settings.stop_sequences.is_empty());
    }

    #[test]
    fn settings_deserialize_with_missing_fields() {
        let settings: CompletionSettings =
            serde_json::from_str(r#"{"model_id":"gpt-4","max_tokens":256}"#).unwrap();
        assert_eq!(settings.model_id.as_deref(), Some("gpt-4"));
        assert_eq!(settings.max_tokens, Some(256));
        assert!((settings.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn builder_helpers() {
        let settings = CompletionSettings::default()
            .with_max_tokens(100)
            .with_temperature(0.0)
            .with_stop_sequences(["[OBSERVATION]"]);
        assert_eq!(settings.max_tokens, Some(100));
        assert_eq!(settings.stop_sequences, vec!["[OBSERVATION]".to_string()]);
        assert_eq!(settings.temperature, 0.0);
    }
}
