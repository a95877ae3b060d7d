//! # skein kernel
//!
//! Runs functions. The [`Kernel`] executes an ordered list of function
//! steps against one shared Context, firing observer callbacks before and
//! after each step:
//!
//! ```text
//! Pending → (pre-observers) → Skipped | Cancelled | Invoking
//! Invoking → Invoked → (post-observers) → Cancelled | Repeat | Done
//! ```
//!
//! [`PromptFunction`] adds model-driven functions: a template rendered
//! against the Context and sent to a completion service. Prompt observers
//! registered on the kernel can rewrite or cancel the rendered prompt.

pub mod events;
pub mod kernel;
pub mod pipeline;
pub mod prompt_function;

pub use events::{
    FunctionInvokedEvent, FunctionInvokingEvent, InvokedObserver, InvokingObserver,
    PromptObservers, PromptRenderedEvent, PromptRenderedObserver, PromptRenderingEvent,
    PromptRenderingObserver,
};
pub use kernel::{Kernel, KernelBuilder};
pub use pipeline::{CancelStage, PipelineResult, PipelineStatus};
pub use prompt_function::{PromptFunction, PromptFunctionConfig, default_settings};
