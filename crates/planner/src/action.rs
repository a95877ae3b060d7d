//! Action planner: one completion call that picks a single function.
//!
//! The model answers with `{"plan": {"rationale", "function", "parameters"}}`,
//! usually wrapped in prose. The first balanced JSON object in the response
//! is taken as the plan.

use serde::{Deserialize, Serialize};
use skein_config::{CompletionDefaults, PlannerConfig, SkeinConfig};
use skein_core::{CancellationToken, CompletionSettings, ContextVariables, TextCompletion};
use skein_kernel::{Kernel, PipelineResult, default_settings};
use skein_template::{PromptTemplate, TemplateError};
use std::sync::Arc;
use tracing::{debug, info};

use crate::PlannerError;
use crate::functions::{FunctionFilter, function_list};
use crate::token::call_budget;
use crate::parser::{extract_json_object, value_to_string};
use crate::prompts::ACTION_PROMPT;

/// A single planned function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    /// `plugin.name` of the resolved function.
    pub function: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// The outcome of [`ActionPlanner::create_plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    #[serde(default)]
    pub rationale: String,
    /// `None` when the model found no fitting function.
    pub step: Option<PlannedStep>,
}

impl Plan {
    pub fn steps(&self) -> &[PlannedStep] {
        self.step.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.step.is_none()
    }

    /// Run the planned step through the kernel pipeline. Its parameters are
    /// layered over `variables` first. A plan without a step completes
    /// immediately with no value.
    pub async fn invoke(
        &self,
        kernel: &Kernel,
        variables: &mut ContextVariables,
        cancellation: &CancellationToken,
    ) -> Result<PipelineResult, PlannerError> {
        let Some(step) = &self.step else {
            return Ok(kernel.run(&[], variables, cancellation).await?);
        };

        let function = kernel.functions().resolve(&step.function)?.clone();
        for (name, value) in &step.parameters {
            variables.set(name, value_to_string(value));
        }
        Ok(kernel
            .invoke_with_arguments(&function, variables, &step.parameters, cancellation)
            .await?)
    }
}

pub struct ActionPlanner {
    kernel: Arc<Kernel>,
    completion: Arc<dyn TextCompletion>,
    filter: FunctionFilter,
    template: PromptTemplate,
    settings: CompletionSettings,
    max_completion_tokens: u32,
}

impl ActionPlanner {
    pub fn new(kernel: Arc<Kernel>, completion: Arc<dyn TextCompletion>) -> Result<Self, PlannerError> {
        Ok(Self {
            kernel,
            completion,
            filter: FunctionFilter::new(),
            template: PromptTemplate::parse(ACTION_PROMPT)?,
            settings: default_settings(&CompletionDefaults::default()),
            max_completion_tokens: PlannerConfig::default().max_completion_tokens,
        })
    }

    /// Build from the full configuration: the planner section plus the
    /// completion defaults.
    pub fn from_config(
        kernel: Arc<Kernel>,
        completion: Arc<dyn TextCompletion>,
        config: &SkeinConfig,
    ) -> Result<Self, PlannerError> {
        Ok(Self::new(kernel, completion)?
            .with_config(&config.planner)
            .with_settings(default_settings(&config.completion)))
    }

    /// Take the function filter and completion budget from planner config.
    pub fn with_config(mut self, config: &PlannerConfig) -> Self {
        self.filter = FunctionFilter::from_config(config);
        self.max_completion_tokens = config.max_completion_tokens;
        self
    }

    pub fn with_filter(mut self, filter: FunctionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Base completion settings. Their token limit caps the planner budget.
    pub fn with_settings(mut self, settings: CompletionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the prompt template. It is rendered with `goal` and
    /// `function_list` set.
    pub fn with_prompt_template(mut self, template: &str) -> Result<Self, PlannerError> {
        self.template = PromptTemplate::parse(template)?;
        Ok(self)
    }

    /// `// description` and `plugin.name` for every listed function.
    pub fn list_of_functions(&self) -> String {
        function_list(&self.filter.available(self.kernel.functions()))
    }

    pub async fn create_plan(
        &self,
        goal: &str,
        cancellation: &CancellationToken,
    ) -> Result<Plan, PlannerError> {
        let mut context = ContextVariables::new(goal);
        context.set("goal", goal);
        context.set("function_list", self.list_of_functions());

        let prompt = self
            .template
            .render(&context, self.kernel.functions(), cancellation)
            .await
            .map_err(|e| match e {
                TemplateError::Cancelled => PlannerError::Cancelled,
                e => PlannerError::Template(e),
            })?;

        let settings = self
            .settings
            .clone()
            .with_max_tokens(call_budget(&self.settings, self.max_completion_tokens));
        debug!(service = %self.completion.name(), prompt_chars = prompt.len(), "Requesting action plan");
        let response = tokio::select! {
            _ = cancellation.cancelled() => return Err(PlannerError::Cancelled),
            completed = self.completion.complete(&prompt, &settings) => completed?,
        };

        let plan = self.parse_plan(goal, &response)?;
        info!(
            function = plan.step.as_ref().map(|s| s.function.as_str()).unwrap_or(""),
            "Action plan created"
        );
        Ok(plan)
    }

    fn parse_plan(&self, goal: &str, response: &str) -> Result<Plan, PlannerError> {
        let malformed = |reason: String| PlannerError::MalformedOutput { reason, attempts: 1 };

        let blob = extract_json_object(response)
            .ok_or_else(|| malformed("Response does not contain a JSON object".into()))?;
        let value: serde_json::Value =
            serde_json::from_str(blob).map_err(|e| malformed(format!("Invalid plan JSON: {e}")))?;
        let plan = value
            .get("plan")
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| malformed("Plan JSON has no \"plan\" object".into()))?;

        let rationale = plan
            .get("rationale")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let function = plan
            .get("function")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .unwrap_or_default();

        if function.is_empty() {
            return Ok(Plan {
                goal: goal.to_string(),
                rationale,
                step: None,
            });
        }

        let descriptor = self.kernel.functions().resolve(function)?;
        let parameters = plan
            .get("parameters")
            .and_then(serde_json::Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(Plan {
            goal: goal.to_string(),
            rationale,
            step: Some(PlannedStep {
                function: descriptor.qualified_name(),
                parameters,
            }),
        })
    }
}
