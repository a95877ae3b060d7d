//! Stepwise planner: Thought → Action → Observation until a final answer.
//!
//! Each iteration renders the planner prompt (question, function manual,
//! scratchpad, suffix) through the template engine, asks the completion
//! service for the next step and either executes the named function through
//! the kernel or stops on `[FINAL ANSWER]`.
//!
//! # Termination
//!
//! - **Final answer**: `Ok(PlannerResult)` on the iteration it is parsed
//! - **Iteration budget**: `Err(IterationBudgetExceeded)` with the history so far
//! - **Malformed output**: retried within the iteration, then `Err(MalformedOutput)`
//! - **Prompt budget**: oldest steps are dropped from the rendered window;
//!   `Err(TokenBudgetExceeded)` once nothing is left to drop

use chrono::Utc;
use serde::{Deserialize, Serialize};
use skein_config::{CompletionDefaults, PlannerConfig, SkeinConfig};
use skein_core::{
    CancellationToken, CompletionSettings, ContextVariables, FunctionResult, KernelEvent,
    TextCompletion,
};
use skein_kernel::{Kernel, PipelineStatus, default_settings};
use skein_template::{PromptTemplate, TemplateError};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::PlannerError;
use crate::functions::{FunctionFilter, function_manuals};
use crate::history::{PlannerStep, ScratchPad};
use crate::parser::{ParsedResponse, parse_response, value_to_string};
use crate::prompts::{CONTINUE_SUFFIX, FIRST_SUFFIX, STEPWISE_PROMPT, STOP_SEQUENCES};
use crate::token::{call_budget, estimate_tokens};

/// The result of a stepwise run that reached a final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerResult {
    pub final_answer: String,
    /// Every recorded step, the final one included.
    pub steps: Vec<PlannerStep>,
    /// Rendered history in marker format.
    pub transcript: String,
    pub iterations: u32,
    pub function_calls: u32,
}

impl PlannerResult {
    /// Present the run as a function result, carrying `iterations`,
    /// `function_calls` and `steps_taken` as metadata.
    pub fn to_function_result(&self) -> FunctionResult {
        let mut metadata = serde_json::Map::new();
        metadata.insert("iterations".into(), self.iterations.into());
        metadata.insert("function_calls".into(), self.function_calls.into());
        metadata.insert(
            "steps_taken".into(),
            serde_json::to_value(&self.steps).unwrap_or_default(),
        );
        FunctionResult {
            plugin_name: "planner".into(),
            function_name: "execute_plan".into(),
            value: Some(self.final_answer.clone()),
            metadata,
        }
    }
}

pub struct StepwisePlanner {
    kernel: Arc<Kernel>,
    completion: Arc<dyn TextCompletion>,
    config: PlannerConfig,
    filter: FunctionFilter,
    template: PromptTemplate,
    settings: CompletionSettings,
}

impl StepwisePlanner {
    pub fn new(kernel: Arc<Kernel>, completion: Arc<dyn TextCompletion>) -> Result<Self, PlannerError> {
        Ok(Self {
            kernel,
            completion,
            config: PlannerConfig::default(),
            filter: FunctionFilter::new(),
            template: PromptTemplate::parse(STEPWISE_PROMPT)?,
            settings: default_settings(&CompletionDefaults::default()),
        })
    }

    /// Build from the full configuration: planner budgets and filters plus
    /// the completion defaults.
    pub fn from_config(
        kernel: Arc<Kernel>,
        completion: Arc<dyn TextCompletion>,
        config: &SkeinConfig,
    ) -> Result<Self, PlannerError> {
        Ok(Self::new(kernel, completion)?
            .with_config(config.planner.clone())
            .with_settings(default_settings(&config.completion)))
    }

    /// Apply budgets and replace the function filter with the configured lists.
    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.filter = FunctionFilter::from_config(&config);
        self.config = config;
        self
    }

    pub fn with_filter(mut self, filter: FunctionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Base completion settings. Stop sequences are set per call and the
    /// token limit caps `max_completion_tokens`.
    pub fn with_settings(mut self, settings: CompletionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the prompt template. It is rendered with `question`,
    /// `function_descriptions`, `agent_scratch_pad` and `suffix` set.
    pub fn with_prompt_template(mut self, template: &str) -> Result<Self, PlannerError> {
        self.template = PromptTemplate::parse(template)?;
        Ok(self)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Work towards an answer for `goal`.
    pub async fn execute(
        &self,
        goal: &str,
        cancellation: &CancellationToken,
    ) -> Result<PlannerResult, PlannerError> {
        let manual = function_manuals(&self.filter.available(self.kernel.functions()));
        let settings = self
            .settings
            .clone()
            .with_max_tokens(call_budget(&self.settings, self.config.max_completion_tokens))
            .with_stop_sequences(STOP_SEQUENCES);
        let mut pad = ScratchPad::new();
        let mut function_calls = 0u32;

        info!(
            service = %self.completion.name(),
            max_iter = self.config.max_iterations,
            "Stepwise planner starting"
        );

        for iteration in 1..=self.config.max_iterations {
            if cancellation.is_cancelled() {
                info!(iteration, "Stepwise planner cancelled");
                return Err(PlannerError::Cancelled);
            }
            debug!(iteration, steps = pad.len(), "Planner iteration");

            let prompt = self.render_prompt(goal, &manual, &pad, iteration, cancellation).await?;
            let response = self.next_step(&prompt, &settings, iteration, cancellation).await?;

            match response {
                ParsedResponse::FinalAnswer { thought, answer } => {
                    self.publish(KernelEvent::PlannerIteration {
                        iteration,
                        action: None,
                        timestamp: Utc::now(),
                    });
                    self.publish(KernelEvent::PlannerFinished {
                        iterations: iteration,
                        answered: true,
                        timestamp: Utc::now(),
                    });
                    info!(iterations = iteration, function_calls, "Stepwise planner completed");

                    pad.push(PlannerStep::final_answer(thought, answer.clone()));
                    return Ok(PlannerResult {
                        final_answer: answer,
                        transcript: pad.transcript(),
                        steps: pad.into_steps(),
                        iterations: iteration,
                        function_calls,
                    });
                }
                ParsedResponse::Action {
                    thought,
                    action,
                    variables,
                } => {
                    self.publish(KernelEvent::PlannerIteration {
                        iteration,
                        action: Some(action.clone()),
                        timestamp: Utc::now(),
                    });
                    let (observation, invoked) = self.act(&action, &variables, cancellation).await?;
                    if invoked {
                        function_calls += 1;
                    }
                    debug!(iteration, action = %action, observation_chars = observation.len(), "Observed");
                    pad.push(PlannerStep::action(thought, action, variables).with_observation(observation));
                }
            }
        }

        warn!("Stepwise planner: max iterations reached ({})", self.config.max_iterations);
        self.publish(KernelEvent::PlannerFinished {
            iterations: self.config.max_iterations,
            answered: false,
            timestamp: Utc::now(),
        });
        Err(PlannerError::IterationBudgetExceeded {
            iterations: self.config.max_iterations,
            history: pad.into_steps(),
        })
    }

    /// Render the prompt, dropping the oldest steps from the scratchpad
    /// window until it fits the token budget.
    async fn render_prompt(
        &self,
        goal: &str,
        manual: &str,
        pad: &ScratchPad,
        iteration: u32,
        cancellation: &CancellationToken,
    ) -> Result<String, PlannerError> {
        let mut context = ContextVariables::new(goal);
        context.set("question", goal);
        context.set("function_descriptions", manual);
        context.set(
            "suffix",
            if iteration == 1 { FIRST_SUFFIX } else { CONTINUE_SUFFIX },
        );

        let mut prompt_tokens = 0;
        for skip in 0..=pad.len() {
            context.set("agent_scratch_pad", pad.render_window(skip));
            let prompt = self
                .template
                .render(&context, self.kernel.functions(), cancellation)
                .await
                .map_err(|e| match e {
                    TemplateError::Cancelled => PlannerError::Cancelled,
                    e => PlannerError::Template(e),
                })?;

            prompt_tokens = estimate_tokens(&prompt);
            if prompt_tokens <= self.config.max_prompt_tokens {
                if skip > 0 {
                    debug!(iteration, dropped = skip, prompt_tokens, "Trimmed planner history to fit budget");
                }
                return Ok(prompt);
            }
        }

        warn!(
            iteration,
            prompt_tokens,
            max_prompt_tokens = self.config.max_prompt_tokens,
            "Planner prompt over budget with no history left to drop"
        );
        Err(PlannerError::TokenBudgetExceeded {
            prompt_tokens,
            max_prompt_tokens: self.config.max_prompt_tokens,
        })
    }

    /// Ask for the next step, retrying malformed responses.
    async fn next_step(
        &self,
        prompt: &str,
        settings: &CompletionSettings,
        iteration: u32,
        cancellation: &CancellationToken,
    ) -> Result<ParsedResponse, PlannerError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let text = tokio::select! {
                _ = cancellation.cancelled() => return Err(PlannerError::Cancelled),
                completed = self.completion.complete(prompt, settings) => completed?,
            };

            match parse_response(&text) {
                Ok(parsed) => return Ok(parsed),
                Err(reason) if attempts <= self.config.max_malformed_retries => {
                    warn!(iteration, attempt = attempts, %reason, "Malformed planner output, retrying");
                }
                Err(reason) => {
                    self.publish(KernelEvent::ErrorOccurred {
                        context: "stepwise_planner".into(),
                        error_message: reason.clone(),
                        timestamp: Utc::now(),
                    });
                    return Err(PlannerError::MalformedOutput { reason, attempts });
                }
            }
        }
    }

    /// Execute one action. Failures become `Error: ...` observations; only
    /// cancellation ends the run. Returns the observation and whether the
    /// function actually ran.
    async fn act(
        &self,
        action: &str,
        variables: &serde_json::Map<String, serde_json::Value>,
        cancellation: &CancellationToken,
    ) -> Result<(String, bool), PlannerError> {
        let function = match self.kernel.functions().resolve(action) {
            Ok(function) => function.clone(),
            Err(e) => {
                warn!(action, error = %e, "Planner action could not be resolved");
                return Ok((format!("Error: {e}"), false));
            }
        };

        let mut context = ContextVariables::empty();
        for (name, value) in variables {
            context.set(name, value_to_string(value));
        }

        match self
            .kernel
            .invoke_with_arguments(&function, &mut context, variables, cancellation)
            .await
        {
            Ok(outcome) => match (outcome.status, outcome.value) {
                (PipelineStatus::Aborted, _) => Err(PlannerError::Cancelled),
                (_, Some(value)) => Ok((value, true)),
                (PipelineStatus::Cancelled { .. }, None) => {
                    Ok(("Action was cancelled before it produced a result".into(), false))
                }
                (_, None) => Ok(("Action completed without a result".into(), true)),
            },
            Err(e) => {
                warn!(action, error = %e, "Planner action failed");
                Ok((format!("Error: {e}"), true))
            }
        }
    }

    fn publish(&self, event: KernelEvent) {
        if let Some(bus) = self.kernel.event_bus() {
            bus.publish(event);
        }
    }
}
