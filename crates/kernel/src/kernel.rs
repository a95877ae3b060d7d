//! The kernel owns the function registry and the observers, and runs
//! pipelines of functions against a shared Context.

use chrono::Utc;
use skein_config::PipelineConfig;
use skein_core::{
    CancellationToken, ContextVariables, EventBus, FunctionDescriptor, FunctionError,
    FunctionInvocation, FunctionRegistry, KernelEvent,
};
use skein_template::{PromptTemplate, TemplateError};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::events::{
    FunctionInvokedEvent, FunctionInvokingEvent, InvokedObserver, InvokingObserver,
    PROMPT_OBSERVERS, PromptObservers, PromptRenderedEvent, PromptRenderingEvent,
};
use crate::pipeline::{CancelStage, PipelineResult, PipelineStatus};

pub struct Kernel {
    functions: Arc<FunctionRegistry>,
    invoking: Vec<InvokingObserver>,
    invoked: Vec<InvokedObserver>,
    prompt: Arc<PromptObservers>,
    config: PipelineConfig,
    event_bus: Option<Arc<EventBus>>,
}

impl Kernel {
    pub fn builder() -> KernelBuilder {
        KernelBuilder::default()
    }

    /// A kernel over `functions` with default settings and no observers.
    pub fn new(functions: FunctionRegistry) -> Self {
        Self::builder().with_functions(functions).build()
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Shared handle to the registry.
    pub fn function_registry(&self) -> Arc<FunctionRegistry> {
        Arc::clone(&self.functions)
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Option<&Arc<EventBus>> {
        self.event_bus.as_ref()
    }

    /// Register a pre-invocation observer.
    pub fn on_function_invoking<F>(&mut self, observer: F)
    where
        F: Fn(&mut FunctionInvokingEvent<'_>) + Send + Sync + 'static,
    {
        self.invoking.push(Arc::new(observer));
    }

    /// Register a post-invocation observer.
    pub fn on_function_invoked<F>(&mut self, observer: F)
    where
        F: Fn(&mut FunctionInvokedEvent<'_>) + Send + Sync + 'static,
    {
        self.invoked.push(Arc::new(observer));
    }

    /// Register an observer run by prompt functions before rendering.
    pub fn on_prompt_rendering<F>(&mut self, observer: F)
    where
        F: Fn(&mut PromptRenderingEvent<'_>) + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.prompt).rendering.push(Arc::new(observer));
    }

    /// Register an observer run by prompt functions after rendering.
    pub fn on_prompt_rendered<F>(&mut self, observer: F)
    where
        F: Fn(&mut PromptRenderedEvent<'_>) + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.prompt).rendered.push(Arc::new(observer));
    }

    /// Run `steps` in order against `variables`.
    ///
    /// Each executed step's value becomes the next step's `input`. Observer
    /// cancellation and token cancellation are reported in the returned
    /// [`PipelineStatus`]; a failing step aborts the run with its error.
    pub async fn run(
        &self,
        steps: &[FunctionDescriptor],
        variables: &mut ContextVariables,
        cancellation: &CancellationToken,
    ) -> Result<PipelineResult, FunctionError> {
        self.execute(steps, variables, None, cancellation).await
    }

    async fn execute(
        &self,
        steps: &[FunctionDescriptor],
        variables: &mut ContextVariables,
        arguments: Option<&serde_json::Map<String, serde_json::Value>>,
        cancellation: &CancellationToken,
    ) -> Result<PipelineResult, FunctionError> {
        let mut outcome = PipelineResult::new();
        debug!(steps = steps.len(), "Pipeline starting");

        'steps: for (index, step) in steps.iter().enumerate() {
            let mut repeats = 0u32;

            loop {
                if cancellation.is_cancelled() {
                    info!(step = index, "Pipeline aborted by cancellation token");
                    outcome.status = PipelineStatus::Aborted;
                    break 'steps;
                }

                // ── Pre-invocation observers ──
                let mut invoking = FunctionInvokingEvent::new(step, variables, index);
                for observer in &self.invoking {
                    observer(&mut invoking);
                }
                if invoking.is_cancel_requested() {
                    info!(step = index, function = %step.qualified_name(), "Pipeline cancelled before invoke");
                    outcome.status = PipelineStatus::Cancelled {
                        step: index,
                        stage: CancelStage::BeforeInvoke,
                    };
                    break 'steps;
                }
                if invoking.is_skip_requested() {
                    debug!(step = index, function = %step.qualified_name(), "Skipping step");
                    outcome.skipped.push(index);
                    continue 'steps;
                }

                // ── Invoke ──
                debug!(step = index, function = %step.qualified_name(), "Invoking step");
                let started = std::time::Instant::now();
                let invoked = PROMPT_OBSERVERS
                    .scope(
                        self.prompt.clone(),
                        step.invoke(FunctionInvocation {
                            variables: &mut *variables,
                            arguments,
                            functions: &self.functions,
                            cancellation,
                        }),
                    )
                    .await;
                let duration_ms = started.elapsed().as_millis() as u64;
                self.publish(KernelEvent::FunctionInvoked {
                    plugin: step.plugin_name().to_string(),
                    function: step.name().to_string(),
                    success: invoked.is_ok(),
                    duration_ms,
                    timestamp: Utc::now(),
                });

                let result = match invoked {
                    Ok(result) => result,
                    Err(FunctionError::Cancelled(_)) => {
                        info!(step = index, "Pipeline aborted during invoke");
                        outcome.status = PipelineStatus::Aborted;
                        break 'steps;
                    }
                    Err(e) => {
                        warn!(step = index, function = %step.qualified_name(), error = %e, "Step failed");
                        self.publish(KernelEvent::ErrorOccurred {
                            context: step.qualified_name(),
                            error_message: e.to_string(),
                            timestamp: Utc::now(),
                        });
                        return Err(e);
                    }
                };

                // ── Post-invocation observers ──
                let mut event = FunctionInvokedEvent::new(step, variables, index, result);
                for observer in &self.invoked {
                    observer(&mut event);
                }
                let cancel = event.is_cancel_requested();
                let repeat = event.is_repeat_requested();
                let result = event.into_result();

                if let Some(value) = &result.value {
                    variables.update(value.clone());
                }
                outcome.record(result);

                if cancel {
                    info!(step = index, function = %step.qualified_name(), "Pipeline cancelled after invoke");
                    outcome.status = PipelineStatus::Cancelled {
                        step: index,
                        stage: CancelStage::AfterInvoke,
                    };
                    break 'steps;
                }

                if repeat {
                    if repeats < self.config.max_repeats {
                        repeats += 1;
                        debug!(step = index, repeats, "Repeating step");
                        continue;
                    }
                    warn!(
                        step = index,
                        max_repeats = self.config.max_repeats,
                        "Repeat limit reached, moving on"
                    );
                }
                break;
            }
        }

        self.publish(KernelEvent::PipelineFinished {
            executed: outcome.invocation_count(),
            skipped: outcome.skipped.len(),
            cancelled: !outcome.is_completed(),
            timestamp: Utc::now(),
        });
        debug!(
            executed = outcome.invocation_count(),
            skipped = outcome.skipped.len(),
            "Pipeline finished"
        );
        Ok(outcome)
    }

    /// Run a single function through the pipeline.
    pub async fn invoke(
        &self,
        function: &FunctionDescriptor,
        variables: &mut ContextVariables,
        cancellation: &CancellationToken,
    ) -> Result<PipelineResult, FunctionError> {
        self.run(std::slice::from_ref(function), variables, cancellation)
            .await
    }

    /// Run a single function with structured arguments alongside the Context.
    ///
    /// Planners use this to hand a model-chosen action's JSON arguments to
    /// functions that read them directly.
    pub async fn invoke_with_arguments(
        &self,
        function: &FunctionDescriptor,
        variables: &mut ContextVariables,
        arguments: &serde_json::Map<String, serde_json::Value>,
        cancellation: &CancellationToken,
    ) -> Result<PipelineResult, FunctionError> {
        self.execute(
            std::slice::from_ref(function),
            variables,
            Some(arguments),
            cancellation,
        )
        .await
    }

    /// Resolve `plugin.function` (or a bare name) and run it.
    pub async fn invoke_by_name(
        &self,
        reference: &str,
        variables: &mut ContextVariables,
        cancellation: &CancellationToken,
    ) -> Result<PipelineResult, FunctionError> {
        let function = self.functions.resolve(reference)?.clone();
        self.invoke(&function, variables, cancellation).await
    }

    /// Resolve several references into pipeline steps.
    pub fn steps<'r>(
        &self,
        references: impl IntoIterator<Item = &'r str>,
    ) -> Result<Vec<FunctionDescriptor>, FunctionError> {
        references
            .into_iter()
            .map(|r| self.functions.resolve(r).cloned())
            .collect()
    }

    /// Parse and render a template against this kernel's functions.
    pub async fn render(
        &self,
        template: &str,
        variables: &ContextVariables,
        cancellation: &CancellationToken,
    ) -> Result<String, TemplateError> {
        let template = PromptTemplate::parse(template)?;
        template
            .render(variables, &self.functions, cancellation)
            .await
    }

    fn publish(&self, event: KernelEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

#[derive(Default)]
pub struct KernelBuilder {
    functions: Option<Arc<FunctionRegistry>>,
    invoking: Vec<InvokingObserver>,
    invoked: Vec<InvokedObserver>,
    prompt: PromptObservers,
    config: PipelineConfig,
    event_bus: Option<Arc<EventBus>>,
}

impl KernelBuilder {
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Some(Arc::new(functions));
        self
    }

    pub fn with_function_registry(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn with_pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn on_function_invoking<F>(mut self, observer: F) -> Self
    where
        F: Fn(&mut FunctionInvokingEvent<'_>) + Send + Sync + 'static,
    {
        self.invoking.push(Arc::new(observer));
        self
    }

    pub fn on_function_invoked<F>(mut self, observer: F) -> Self
    where
        F: Fn(&mut FunctionInvokedEvent<'_>) + Send + Sync + 'static,
    {
        self.invoked.push(Arc::new(observer));
        self
    }

    pub fn on_prompt_rendering<F>(mut self, observer: F) -> Self
    where
        F: Fn(&mut PromptRenderingEvent<'_>) + Send + Sync + 'static,
    {
        self.prompt.rendering.push(Arc::new(observer));
        self
    }

    pub fn on_prompt_rendered<F>(mut self, observer: F) -> Self
    where
        F: Fn(&mut PromptRenderedEvent<'_>) + Send + Sync + 'static,
    {
        self.prompt.rendered.push(Arc::new(observer));
        self
    }

    pub fn build(self) -> Kernel {
        Kernel {
            functions: self.functions.unwrap_or_default(),
            invoking: self.invoking,
            invoked: self.invoked,
            prompt: Arc::new(self.prompt),
            config: self.config,
            event_bus: self.event_bus,
        }
    }
}
