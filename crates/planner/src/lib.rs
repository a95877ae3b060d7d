//! # skein planner
//!
//! Model-driven function selection:
//!
//! - [`StepwisePlanner`] alternates reasoning and function calls
//!   (Thought → Action → Observation) until the model gives a final answer,
//!   within iteration and prompt-token budgets.
//! - [`ActionPlanner`] asks once for the single best function and its
//!   parameters.
//!
//! Both render their prompts through the template engine and execute
//! through the kernel pipeline, so observers see planner actions too.

pub mod action;
pub mod functions;
pub mod history;
pub mod parser;
pub mod prompts;
pub mod stepwise;
pub mod token;

#[cfg(test)]
mod test_helpers;

pub use action::{ActionPlanner, Plan, PlannedStep};
pub use functions::FunctionFilter;
pub use history::{PlannerStep, ScratchPad};
pub use stepwise::{PlannerResult, StepwisePlanner};

use skein_core::{CompletionError, FunctionError};
use skein_template::TemplateError;

/// Errors that end a planner run.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Planner output was malformed after {attempts} attempt(s): {reason}")]
    MalformedOutput { reason: String, attempts: u32 },

    #[error("Planner reached its limit of {iterations} iterations without a final answer")]
    IterationBudgetExceeded {
        iterations: u32,
        /// Everything recorded before the budget ran out.
        history: Vec<PlannerStep>,
    },

    #[error("ChatHistory is too long to get a completion. Try reducing the available functions.")]
    TokenBudgetExceeded {
        prompt_tokens: usize,
        max_prompt_tokens: usize,
    },

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Planner prompt error: {0}")]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error("Planner run cancelled")]
    Cancelled,
}
