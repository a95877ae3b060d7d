//! Pipeline observer events.
//!
//! Observers are plain callbacks run synchronously, in registration order,
//! before and after every step. They steer the pipeline by flipping flags
//! on the event instead of returning errors.
//!
//! Prompt observers fire inside a [`PromptFunction`](crate::PromptFunction)
//! invoked by the kernel, around template rendering.

use skein_core::{
    CompletionSettings, ContextVariables, FunctionDescriptor, FunctionMetadata, FunctionResult,
};
use std::sync::Arc;

/// Observer fired before a step executes.
pub type InvokingObserver = Arc<dyn Fn(&mut FunctionInvokingEvent<'_>) + Send + Sync>;

/// Observer fired after a step executes.
pub type InvokedObserver = Arc<dyn Fn(&mut FunctionInvokedEvent<'_>) + Send + Sync>;

/// Raised before a function runs. May skip the step or cancel the pipeline.
pub struct FunctionInvokingEvent<'a> {
    function: &'a FunctionDescriptor,
    variables: &'a mut ContextVariables,
    step: usize,
    cancel: bool,
    skip: bool,
}

impl<'a> FunctionInvokingEvent<'a> {
    pub(crate) fn new(
        function: &'a FunctionDescriptor,
        variables: &'a mut ContextVariables,
        step: usize,
    ) -> Self {
        Self {
            function,
            variables,
            step,
            cancel: false,
            skip: false,
        }
    }

    pub fn function(&self) -> &FunctionDescriptor {
        self.function
    }

    /// Zero-based index of the step in the pipeline.
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn variables(&self) -> &ContextVariables {
        self.variables
    }

    /// Mutable access to the shared Context, e.g. to inject variables.
    pub fn variables_mut(&mut self) -> &mut ContextVariables {
        &mut *self.variables
    }

    /// Stop the whole pipeline before this step runs.
    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    /// Don't run this step; continue with the next one.
    pub fn skip(&mut self) {
        self.skip = true;
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel
    }

    pub fn is_skip_requested(&self) -> bool {
        self.skip
    }
}

/// Raised after a function ran. May rewrite the result, repeat the step
/// or cancel the rest of the pipeline.
pub struct FunctionInvokedEvent<'a> {
    function: &'a FunctionDescriptor,
    variables: &'a mut ContextVariables,
    step: usize,
    result: FunctionResult,
    cancel: bool,
    repeat: bool,
}

impl<'a> FunctionInvokedEvent<'a> {
    pub(crate) fn new(
        function: &'a FunctionDescriptor,
        variables: &'a mut ContextVariables,
        step: usize,
        result: FunctionResult,
    ) -> Self {
        Self {
            function,
            variables,
            step,
            result,
            cancel: false,
            repeat: false,
        }
    }

    pub fn function(&self) -> &FunctionDescriptor {
        self.function
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn variables(&self) -> &ContextVariables {
        self.variables
    }

    pub fn variables_mut(&mut self) -> &mut ContextVariables {
        &mut *self.variables
    }

    pub fn result(&self) -> &FunctionResult {
        &self.result
    }

    pub fn result_mut(&mut self) -> &mut FunctionResult {
        &mut self.result
    }

    /// Replace the step's return value.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.result.value = Some(value.into());
    }

    /// Keep this result but run no further steps.
    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    /// Run this step once more (pre- and post-observers fire again).
    pub fn repeat(&mut self) {
        self.repeat = true;
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel
    }

    pub fn is_repeat_requested(&self) -> bool {
        self.repeat
    }

    pub(crate) fn into_result(self) -> FunctionResult {
        self.result
    }
}

// ── Prompt observers ──

/// Observer fired before a prompt function renders its template.
pub type PromptRenderingObserver = Arc<dyn Fn(&mut PromptRenderingEvent<'_>) + Send + Sync>;

/// Observer fired after a prompt function rendered, before the completion call.
pub type PromptRenderedObserver = Arc<dyn Fn(&mut PromptRenderedEvent<'_>) + Send + Sync>;

/// Prompt observers registered on a kernel. Every [`PromptFunction`] the
/// kernel invokes runs them.
///
/// [`PromptFunction`]: crate::PromptFunction
#[derive(Clone, Default)]
pub struct PromptObservers {
    pub(crate) rendering: Vec<PromptRenderingObserver>,
    pub(crate) rendered: Vec<PromptRenderedObserver>,
}

impl PromptObservers {
    pub fn is_empty(&self) -> bool {
        self.rendering.is_empty() && self.rendered.is_empty()
    }
}

/// Raised before the template renders. May adjust variables or settings.
pub struct PromptRenderingEvent<'a> {
    function: &'a FunctionMetadata,
    variables: &'a mut ContextVariables,
    settings: &'a mut CompletionSettings,
}

impl<'a> PromptRenderingEvent<'a> {
    pub(crate) fn new(
        function: &'a FunctionMetadata,
        variables: &'a mut ContextVariables,
        settings: &'a mut CompletionSettings,
    ) -> Self {
        Self {
            function,
            variables,
            settings,
        }
    }

    pub fn function(&self) -> &FunctionMetadata {
        self.function
    }

    pub fn variables(&self) -> &ContextVariables {
        self.variables
    }

    pub fn variables_mut(&mut self) -> &mut ContextVariables {
        &mut *self.variables
    }

    pub fn settings(&self) -> &CompletionSettings {
        self.settings
    }

    /// Settings for this call only; the function's own settings are untouched.
    pub fn settings_mut(&mut self) -> &mut CompletionSettings {
        &mut *self.settings
    }
}

/// Raised after rendering. May rewrite the prompt or cancel the call.
pub struct PromptRenderedEvent<'a> {
    function: &'a FunctionMetadata,
    variables: &'a ContextVariables,
    prompt: String,
    cancel: bool,
}

impl<'a> PromptRenderedEvent<'a> {
    pub(crate) fn new(
        function: &'a FunctionMetadata,
        variables: &'a ContextVariables,
        prompt: String,
    ) -> Self {
        Self {
            function,
            variables,
            prompt,
            cancel: false,
        }
    }

    pub fn function(&self) -> &FunctionMetadata {
        self.function
    }

    pub fn variables(&self) -> &ContextVariables {
        self.variables
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Replace the text sent to the completion service.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Skip the completion call; the function fails as cancelled.
    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel
    }

    pub(crate) fn into_prompt(self) -> String {
        self.prompt
    }
}

tokio::task_local! {
    /// Prompt observers of the kernel currently running a step.
    pub(crate) static PROMPT_OBSERVERS: Arc<PromptObservers>;
}
