//! Parsed template blocks.

use std::fmt;

/// One unit of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Literal text, emitted verbatim.
    Text(String),
    /// `{{$name}}`: replaced by the variable's current value.
    Variable(String),
    /// `{{plugin.fn args...}}`: replaced by the function's return value.
    Code(CodeBlock),
}

impl Block {
    pub fn is_text(&self) -> bool {
        matches!(self, Block::Text(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Block::Variable(_))
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Block::Code(_))
    }

    /// The raw content of the block (text, variable name or code expression).
    pub fn content(&self) -> &str {
        match self {
            Block::Text(text) => text,
            Block::Variable(name) => name,
            Block::Code(code) => &code.content,
        }
    }
}

/// A function call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Verbatim (trimmed) expression between the delimiters.
    pub content: String,
    pub function: FunctionRef,
    pub arguments: Vec<Argument>,
}

impl CodeBlock {
    /// The single positional argument, if any.
    pub fn positional(&self) -> Option<&Argument> {
        self.arguments
            .iter()
            .find(|a| !matches!(a, Argument::Named { .. }))
    }
}

/// `plugin.name` or a bare `name`, resolved late against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub plugin: Option<String>,
    pub name: String,
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.plugin {
            Some(plugin) => write!(f, "{plugin}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// `'text'`: bound to `input`.
    Literal(String),
    /// `$name`: bound to `input`.
    Variable(String),
    /// `name='text'` or `name=$var`.
    Named { name: String, value: ArgumentValue },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    Literal(String),
    Variable(String),
}
