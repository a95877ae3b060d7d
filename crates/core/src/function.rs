//! Function trait: the abstraction over invocable capabilities.
//!
//! A function is anything the kernel can call with a [`ContextVariables`]
//! bag: a native closure, a prompt template backed by a completion
//! service, or a hand-written plugin struct. Functions are registered once,
//! with explicit metadata, in the [`FunctionRegistry`] and looked up by
//! `(plugin, name)` afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::context::ContextVariables;
use crate::error::FunctionError;
use crate::registry::FunctionRegistry;

/// Declared type of a parameter, mirrored into JSON schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    pub fn as_json_type(self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
            ParameterType::Object => "object",
        }
    }
}

/// Metadata for one function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMetadata {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,

    #[serde(default)]
    pub is_required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<ParameterType>,
}

impl ParameterMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            default_value: None,
            is_required: false,
            parameter_type: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn with_type(mut self, parameter_type: ParameterType) -> Self {
        self.parameter_type = Some(parameter_type);
        self
    }
}

/// Metadata describing a function's return value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnParameterMetadata {
    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<ParameterType>,
}

/// Everything the kernel and the planners know about a function, minus its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parameters: Vec<ParameterMetadata>,

    #[serde(default)]
    pub return_parameter: ReturnParameterMetadata,
}

impl FunctionMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            return_parameter: ReturnParameterMetadata::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterMetadata) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_return(mut self, description: impl Into<String>, parameter_type: ParameterType) -> Self {
        self.return_parameter = ReturnParameterMetadata {
            description: description.into(),
            parameter_type: Some(parameter_type),
        };
        self
    }

    /// Find a parameter by name (case-insensitive).
    pub fn parameter(&self, name: &str) -> Option<&ParameterMetadata> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Everything a function gets when it is invoked.
pub struct FunctionInvocation<'a> {
    /// The Context this call may read and write.
    pub variables: &'a mut ContextVariables,

    /// Structured arguments, when the caller has them (e.g. a planner action).
    pub arguments: Option<&'a serde_json::Map<String, serde_json::Value>>,

    /// Registry for nested lookups (prompt functions rendering templates).
    pub functions: &'a FunctionRegistry,

    /// Cooperative cancellation signal.
    pub cancellation: &'a CancellationToken,
}

/// What a function body hands back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionOutput {
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl FunctionOutput {
    /// An output with no value (a function returning nothing).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl From<String> for FunctionOutput {
    fn from(value: String) -> Self {
        Self {
            value: Some(value),
            metadata: serde_json::Map::new(),
        }
    }
}

impl From<&str> for FunctionOutput {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

/// The result of one executed function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    pub plugin_name: String,
    pub function_name: String,
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl FunctionResult {
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Look up a metadata entry (e.g. `iterations` on a planner result).
    pub fn metadata_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}

/// The core Function trait.
///
/// Native plugins implement this directly; closures go through
/// [`NativeFunction`]; model-driven functions live in the kernel crate.
#[async_trait]
pub trait Function: Send + Sync {
    fn metadata(&self) -> &FunctionMetadata;

    async fn invoke(
        &self,
        invocation: FunctionInvocation<'_>,
    ) -> std::result::Result<FunctionOutput, FunctionError>;
}

type NativeBody =
    dyn Fn(&mut ContextVariables) -> std::result::Result<FunctionOutput, FunctionError> + Send + Sync;

/// A synchronous function backed by a closure over the Context.
pub struct NativeFunction {
    metadata: FunctionMetadata,
    body: Box<NativeBody>,
}

impl NativeFunction {
    pub fn new<F>(metadata: FunctionMetadata, body: F) -> Self
    where
        F: Fn(&mut ContextVariables) -> std::result::Result<FunctionOutput, FunctionError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            metadata,
            body: Box::new(body),
        }
    }

    /// Wrap into the shared handle the registry stores.
    pub fn into_arc(self) -> Arc<dyn Function> {
        Arc::new(self)
    }
}

#[async_trait]
impl Function for NativeFunction {
    fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }

    async fn invoke(
        &self,
        invocation: FunctionInvocation<'_>,
    ) -> std::result::Result<FunctionOutput, FunctionError> {
        (self.body)(invocation.variables)
    }
}

/// A tool definition for function-calling models, in JSON-schema form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Fully-qualified name: `plugin-function`, or just `function` without a plugin.
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A registered function: owning plugin, metadata and invoker.
#[derive(Clone)]
pub struct FunctionDescriptor {
    plugin_name: String,
    function: Arc<dyn Function>,
}

impl FunctionDescriptor {
    pub fn new(plugin_name: impl Into<String>, function: Arc<dyn Function>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            function,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn name(&self) -> &str {
        &self.function.metadata().name
    }

    pub fn description(&self) -> &str {
        &self.function.metadata().description
    }

    pub fn metadata(&self) -> &FunctionMetadata {
        self.function.metadata()
    }

    /// `plugin.name`, or `name` when the plugin is empty.
    pub fn qualified_name(&self) -> String {
        if self.plugin_name.is_empty() {
            self.name().to_string()
        } else {
            format!("{}.{}", self.plugin_name, self.name())
        }
    }

    /// Invoke the function against the given Context.
    ///
    /// Missing parameters with a default are filled in first; a required
    /// parameter that is still missing fails the call before the body runs.
    pub async fn invoke(
        &self,
        invocation: FunctionInvocation<'_>,
    ) -> std::result::Result<FunctionResult, FunctionError> {
        if invocation.cancellation.is_cancelled() {
            return Err(FunctionError::Cancelled(self.qualified_name()));
        }

        for parameter in &self.metadata().parameters {
            if let Some(default) = &parameter.default_value {
                invocation.variables.set_if_absent(&parameter.name, default.clone());
            }
            if parameter.is_required && !invocation.variables.contains(&parameter.name) {
                return Err(FunctionError::MissingArgument {
                    function: self.qualified_name(),
                    parameter: parameter.name.clone(),
                });
            }
        }

        let output = self.function.invoke(invocation).await?;
        Ok(FunctionResult {
            plugin_name: self.plugin_name.clone(),
            function_name: self.name().to_string(),
            value: output.value,
            metadata: output.metadata,
        })
    }

    /// Convert into a JSON-schema tool definition.
    pub fn to_definition(&self) -> FunctionDefinition {
        let metadata = self.metadata();
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for parameter in &metadata.parameters {
            let description = match &parameter.default_value {
                Some(default) if !default.is_empty() => {
                    format!("{} (default value: {})", parameter.description, default)
                }
                _ => parameter.description.clone(),
            };
            let json_type = parameter
                .parameter_type
                .map(ParameterType::as_json_type)
                .unwrap_or("string");
            properties.insert(
                parameter.name.clone(),
                serde_json::json!({ "type": json_type, "description": description }),
            );
            if parameter.is_required {
                required.push(serde_json::Value::String(parameter.name.clone()));
            }
        }

        let name = if self.plugin_name.is_empty() {
            metadata.name.clone()
        } else {
            format!("{}-{}", self.plugin_name, metadata.name)
        };

        FunctionDefinition {
            name,
            description: metadata.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "required": required,
                "properties": properties,
            }),
        }
    }
}

impl std::fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("plugin_name", &self.plugin_name)
            .field("metadata", self.metadata())
            .finish()
    }
}
