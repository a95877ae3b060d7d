//! # skein core
//!
//! Domain types, traits, and error definitions for the skein function kernel.
//! Every other crate in the workspace depends inward on this one.
//!
//! ## Design Philosophy
//!
//! The collaborators the kernel talks to are defined as traits here:
//! - [`Function`] for anything invocable (native closures, prompt templates, plugins)
//! - [`TextCompletion`] for the external text/chat completion service
//!
//! Implementations live in their respective crates, which keeps the
//! template engine, the pipeline and the planners testable with stubs.

pub mod completion;
pub mod context;
pub mod error;
pub mod event;
pub mod function;
pub mod registry;

// Re-export key types at crate root for ergonomics
pub use completion::{CompletionSettings, TextCompletion};
pub use context::{ContextVariables, INPUT};
pub use error::{CompletionError, FunctionError, RegistryError};
pub use event::{EventBus, KernelEvent};
pub use function::{
    Function, FunctionDefinition, FunctionDescriptor, FunctionInvocation, FunctionMetadata,
    FunctionOutput, FunctionResult, NativeFunction, ParameterMetadata, ParameterType,
    ReturnParameterMetadata,
};
pub use registry::FunctionRegistry;
pub use tokio_util::sync::CancellationToken;
