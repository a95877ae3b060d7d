//! Pipeline outcome types.
//!
//! Cancellation and skipping are reported here as data. Only genuine
//! failures (a step erroring out) come back as `Err`.

use serde::{Deserialize, Serialize};
use skein_core::FunctionResult;

/// Where an observer cancelled the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelStage {
    /// A pre-observer cancelled; the step never ran.
    BeforeInvoke,
    /// A post-observer cancelled; the step's result was kept.
    AfterInvoke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PipelineStatus {
    /// Every step was executed or skipped.
    Completed,
    /// An observer cancelled at `step`.
    Cancelled { step: usize, stage: CancelStage },
    /// The cancellation token fired, or a step reported itself cancelled.
    Aborted,
}

/// The outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Value of the last step that actually executed.
    pub value: Option<String>,
    /// One entry per executed invocation, repeats included.
    pub function_results: Vec<FunctionResult>,
    /// Indices of skipped steps.
    pub skipped: Vec<usize>,
    pub status: PipelineStatus,
}

impl PipelineResult {
    pub(crate) fn new() -> Self {
        Self {
            value: None,
            function_results: Vec::new(),
            skipped: Vec::new(),
            status: PipelineStatus::Completed,
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Number of function invocations that actually ran.
    pub fn invocation_count(&self) -> usize {
        self.function_results.len()
    }

    pub fn is_completed(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, PipelineStatus::Cancelled { .. })
    }

    pub(crate) fn record(&mut self, result: FunctionResult) {
        self.value = result.value.clone();
        self.function_results.push(result);
    }
}
