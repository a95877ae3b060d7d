//! Shared test helpers for planner tests.

use async_trait::async_trait;
use skein_config::PlannerConfig;
use skein_core::{CompletionError, CompletionSettings, FunctionRegistry, TextCompletion};
use skein_kernel::Kernel;
use std::sync::{Arc, Mutex};

/// A completion service that returns scripted responses in order.
///
/// Panics if more calls are made than responses provided, unless built
/// with [`SequentialMockCompletion::repeating`].
pub struct SequentialMockCompletion {
    responses: Vec<String>,
    repeat_last: bool,
    prompts: Mutex<Vec<String>>,
    settings: Mutex<Vec<CompletionSettings>>,
}

impl SequentialMockCompletion {
    pub fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: responses.iter().map(|r| r.to_string()).collect(),
            repeat_last: false,
            prompts: Mutex::new(Vec::new()),
            settings: Mutex::new(Vec::new()),
        })
    }

    /// Always answer with `response`.
    pub fn repeating(response: &str) -> Arc<Self> {
        Arc::new(Self {
            responses: vec![response.to_string()],
            repeat_last: true,
            prompts: Mutex::new(Vec::new()),
            settings: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn last_settings(&self) -> Option<CompletionSettings> {
        self.settings.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextCompletion for SequentialMockCompletion {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(
        &self,
        prompt: &str,
        settings: &CompletionSettings,
    ) -> Result<String, CompletionError> {
        let mut prompts = self.prompts.lock().unwrap();
        let call = prompts.len();
        prompts.push(prompt.to_string());
        self.settings.lock().unwrap().push(settings.clone());

        match self.responses.get(call) {
            Some(response) => Ok(response.clone()),
            None if self.repeat_last => Ok(self.responses.last().cloned().unwrap_or_default()),
            None => panic!(
                "SequentialMockCompletion: no more responses (call #{}, have {})",
                call,
                self.responses.len()
            ),
        }
    }
}

/// A kernel over the core plugins.
pub fn core_kernel() -> Arc<Kernel> {
    Arc::new(Kernel::new(skein_plugins::core_registry().unwrap()))
}

pub fn kernel_with(registry: FunctionRegistry) -> Arc<Kernel> {
    Arc::new(Kernel::new(registry))
}

/// Planner settings with a roomy prompt budget.
pub fn config(max_iterations: u32) -> PlannerConfig {
    PlannerConfig {
        max_iterations,
        max_prompt_tokens: 100_000,
        ..PlannerConfig::default()
    }
}

/// A stepwise action response.
pub fn action(thought: &str, function: &str, variables: serde_json::Value) -> String {
    format!(
        "[THOUGHT]\n{thought}\n[ACTION]\n{}",
        serde_json::json!({"action": function, "action_variables": variables})
    )
}
