//! # skein template
//!
//! The prompt template mini-language:
//!
//! ```text
//! Hello {{$name}}, today is {{time.today}}.
//! {{text.uppercase $input}}
//! {{plugin.fn input=$input age='42'}}
//! ```
//!
//! Templates are parsed once into a flat list of [`Block`]s and rendered
//! any number of times against a [`ContextVariables`] and a
//! [`FunctionRegistry`]. Function references are resolved at render time.

pub mod block;
pub mod parser;
pub mod renderer;

pub use block::{Argument, ArgumentValue, Block, CodeBlock, FunctionRef};
pub use parser::parse;
pub use renderer::{render, render_blocks, render_variables};

use skein_core::{CancellationToken, ContextVariables, FunctionError, FunctionRegistry};

/// Errors from parsing or rendering a template.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TemplateError {
    #[error("Template syntax error: {message}")]
    Syntax { message: String },

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Function reference '{name}' is ambiguous, candidates: {}", candidates.join(", "))]
    AmbiguousFunction {
        name: String,
        candidates: Vec<String>,
    },

    #[error("Function '{name}' failed: {source}")]
    Function {
        name: String,
        #[source]
        source: FunctionError,
    },

    #[error("Template rendering cancelled")]
    Cancelled,
}

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    source: String,
    blocks: Vec<Block>,
}

impl PromptTemplate {
    /// Parse `source`. Syntax errors surface here, never at render time.
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let blocks = parser::parse(&source)?;
        Ok(Self { source, blocks })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Variable names referenced anywhere in the template, first mention
    /// first, deduplicated case-insensitively.
    pub fn referenced_variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();

        for block in &self.blocks {
            match block {
                Block::Variable(name) => push_unique(&mut names, name),
                Block::Code(code) => {
                    for argument in &code.arguments {
                        match argument {
                            Argument::Variable(name) => push_unique(&mut names, name),
                            Argument::Named {
                                value: ArgumentValue::Variable(name),
                                ..
                            } => push_unique(&mut names, name),
                            _ => {}
                        }
                    }
                }
                Block::Text(_) => {}
            }
        }
        names
    }

    /// Render against `variables`, resolving functions in `functions`.
    pub async fn render(
        &self,
        variables: &ContextVariables,
        functions: &FunctionRegistry,
        cancellation: &CancellationToken,
    ) -> Result<String, TemplateError> {
        renderer::render(self, variables, functions, cancellation).await
    }
}

fn push_unique<'a>(names: &mut Vec<&'a str>, name: &'a str) {
    if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        names.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_source_and_blocks() {
        let template = PromptTemplate::parse("Hi {{$name}}!").unwrap();
        assert_eq!(template.source(), "Hi {{$name}}!");
        assert_eq!(template.blocks().len(), 3);
    }

    #[test]
    fn referenced_variables_are_deduplicated_in_order() {
        let template =
            PromptTemplate::parse("{{$b}} {{f $A}} {{g x=$B y='lit'}} {{$a}} {{$c}}").unwrap();
        assert_eq!(template.referenced_variables(), vec!["b", "A", "c"]);
    }

    #[test]
    fn syntax_error_display() {
        let err = PromptTemplate::parse("{{f a=b}}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Template syntax error: Named argument values need to be prefixed with a quote or $."
        );
    }
}
