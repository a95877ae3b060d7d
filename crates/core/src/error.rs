//! Error types for the skein domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum. Higher crates wrap these in
//! their own enums (`TemplateError`, `PlannerError`).

use thiserror::Error;

// --- Bounded context errors ---

/// Failures reported by the external completion capability.
///
/// The kernel treats these as opaque and never retries them itself.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("Completion service failed: {0}")]
    Service(String),

    #[error("Rate limited by completion service, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Completion request timed out: {0}")]
    Timeout(String),

    #[error("Completion service not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Error)]
pub enum FunctionError {
    #[error("Function not found: {0}")]
    NotFound(String),

    #[error("Function name '{name}' is ambiguous, candidates: {}", candidates.join(", "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },

    #[error("Missing required argument '{parameter}' for function {function}")]
    MissingArgument { function: String, parameter: String },

    #[error("Invalid function arguments: {0}")]
    InvalidArguments(String),

    #[error("Function execution failed: {function}: {reason}")]
    ExecutionFailed { function: String, reason: String },

    #[error("Function invocation cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl FunctionError {
    /// Shorthand for an execution failure of `function`.
    pub fn failed(function: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        FunctionError::ExecutionFailed {
            function: function.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Invalid plugin name '{0}': only ASCII letters, digits and '_' are allowed")]
    InvalidPluginName(String),

    #[error("Invalid function name '{0}': only ASCII letters, digits and '_' are allowed")]
    InvalidFunctionName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_error_displays_correctly() {
        let err = CompletionError::RateLimited {
            retry_after_secs: 30,
        };
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn ambiguous_error_lists_candidates() {
        let err = FunctionError::Ambiguous {
            name: "summarize".into(),
            candidates: vec!["text.summarize".into(), "docs.summarize".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("text.summarize"));
        assert!(msg.contains("docs.summarize"));
    }

    #[test]
    fn completion_error_is_transparent_inside_function_error() {
        let err: FunctionError = CompletionError::Timeout("30s elapsed".into()).into();
        assert_eq!(err.to_string(), "Completion request timed out: 30s elapsed");
    }
}
