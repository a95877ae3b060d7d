//! Two-pass template renderer.
//!
//! Pass 1 substitutes Variable blocks from the Context. Pass 2 evaluates
//! Code blocks left to right against the registry. Every function call
//! runs on its own copy of the Context, so nothing a function writes is
//! visible to later blocks or to the caller.

use skein_core::{
    CancellationToken, ContextVariables, FunctionDescriptor, FunctionError, FunctionInvocation,
    FunctionRegistry, INPUT,
};
use tracing::{debug, warn};

use crate::block::{Argument, ArgumentValue, Block, CodeBlock, FunctionRef};
use crate::{PromptTemplate, TemplateError};

/// Pass 1: replace every Variable block with a Text block holding its
/// current value (empty when unset). Code blocks are left untouched.
pub fn render_variables(blocks: &[Block], variables: &ContextVariables) -> Vec<Block> {
    blocks
        .iter()
        .map(|block| match block {
            Block::Variable(name) => Block::Text(lookup(variables, name).to_string()),
            other => other.clone(),
        })
        .collect()
}

/// Render a parsed template to a string.
pub async fn render(
    template: &PromptTemplate,
    variables: &ContextVariables,
    functions: &FunctionRegistry,
    cancellation: &CancellationToken,
) -> Result<String, TemplateError> {
    render_blocks(template.blocks(), variables, functions, cancellation).await
}

/// Render an already-parsed block list.
pub async fn render_blocks(
    blocks: &[Block],
    variables: &ContextVariables,
    functions: &FunctionRegistry,
    cancellation: &CancellationToken,
) -> Result<String, TemplateError> {
    let resolved = render_variables(blocks, variables);
    let mut output = String::new();

    for block in &resolved {
        match block {
            Block::Text(text) => output.push_str(text),
            Block::Variable(name) => output.push_str(lookup(variables, name)),
            Block::Code(code) => {
                if cancellation.is_cancelled() {
                    return Err(TemplateError::Cancelled);
                }
                let value = evaluate(code, variables, functions, cancellation).await?;
                output.push_str(&value);
            }
        }
    }

    Ok(output)
}

async fn evaluate(
    code: &CodeBlock,
    variables: &ContextVariables,
    functions: &FunctionRegistry,
    cancellation: &CancellationToken,
) -> Result<String, TemplateError> {
    let descriptor = resolve(&code.function, functions).inspect_err(|e| {
        warn!(block = %code.content, error = %e, "Failed to resolve template function");
    })?;

    let mut local = variables.clone();
    for argument in &code.arguments {
        match argument {
            Argument::Literal(text) => bind_positional(&mut local, descriptor, text),
            Argument::Variable(name) => bind_positional(&mut local, descriptor, lookup(variables, name)),
            Argument::Named { name, value } => {
                let value = match value {
                    ArgumentValue::Literal(text) => text.as_str(),
                    ArgumentValue::Variable(var) => lookup(variables, var),
                };
                local.set(name, value);
            }
        }
    }

    debug!(function = %descriptor.qualified_name(), "Evaluating code block");
    let result = descriptor
        .invoke(FunctionInvocation {
            variables: &mut local,
            arguments: None,
            functions,
            cancellation,
        })
        .await
        .map_err(|source| match source {
            FunctionError::Cancelled(_) => TemplateError::Cancelled,
            source => {
                warn!(block = %code.content, error = %source, "Template function failed");
                TemplateError::Function {
                    name: code.function.to_string(),
                    source,
                }
            }
        })?;

    Ok(result.value.unwrap_or_default())
}

fn resolve<'r>(
    reference: &FunctionRef,
    functions: &'r FunctionRegistry,
) -> Result<&'r FunctionDescriptor, TemplateError> {
    match &reference.plugin {
        Some(plugin) => functions
            .get(plugin, &reference.name)
            .ok_or_else(|| TemplateError::FunctionNotFound(reference.to_string())),
        None => functions.find(&reference.name).map_err(|e| match e {
            FunctionError::Ambiguous { name, candidates } => {
                TemplateError::AmbiguousFunction { name, candidates }
            }
            _ => TemplateError::FunctionNotFound(reference.to_string()),
        }),
    }
}

/// A positional argument feeds `input` and the function's first declared
/// parameter when that one has a different name.
fn bind_positional(local: &mut ContextVariables, descriptor: &FunctionDescriptor, value: &str) {
    local.set(INPUT, value);
    if let Some(first) = descriptor.metadata().parameters.first()
        && !first.name.eq_ignore_ascii_case(INPUT)
    {
        local.set(&first.name, value);
    }
}

fn lookup<'v>(variables: &'v ContextVariables, name: &str) -> &'v str {
    variables.get(name).unwrap_or_default()
}
