//! Which functions a planner offers the model, and how they are described.
//!
//! Filtering applies to the listing only. A hidden function that the model
//! names anyway is still executed.

use skein_config::PlannerConfig;
use skein_core::{FunctionDescriptor, FunctionRegistry};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionFilter {
    excluded_plugins: Vec<String>,
    excluded_functions: Vec<String>,
    included_functions: Vec<String>,
}

impl FunctionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self {
            excluded_plugins: config.excluded_plugins.clone(),
            excluded_functions: config.excluded_functions.clone(),
            included_functions: config.included_functions.clone(),
        }
    }

    pub fn exclude_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.excluded_plugins.push(plugin.into());
        self
    }

    /// Hide a function, by bare name or `plugin.name`.
    pub fn exclude_function(mut self, function: impl Into<String>) -> Self {
        self.excluded_functions.push(function.into());
        self
    }

    /// Restrict the listing to an allowlist, by bare name or `plugin.name`.
    pub fn include_function(mut self, function: impl Into<String>) -> Self {
        self.included_functions.push(function.into());
        self
    }

    pub fn allows(&self, function: &FunctionDescriptor) -> bool {
        if self
            .excluded_plugins
            .iter()
            .any(|p| p.eq_ignore_ascii_case(function.plugin_name()))
        {
            return false;
        }
        if self.excluded_functions.iter().any(|f| names(function, f)) {
            return false;
        }
        self.included_functions.is_empty() || self.included_functions.iter().any(|f| names(function, f))
    }

    /// The functions to offer, in registration order.
    pub fn available<'r>(&self, registry: &'r FunctionRegistry) -> Vec<&'r FunctionDescriptor> {
        registry.functions().filter(|f| self.allows(f)).collect()
    }
}

fn names(function: &FunctionDescriptor, reference: &str) -> bool {
    match reference.split_once('.') {
        Some((plugin, name)) => {
            function.plugin_name().eq_ignore_ascii_case(plugin) && function.name().eq_ignore_ascii_case(name)
        }
        None => function.name().eq_ignore_ascii_case(reference),
    }
}

/// Stepwise listing: `plugin.name: description` and one line per parameter.
pub fn function_manual(function: &FunctionDescriptor) -> String {
    let mut manual = format!("{}: {}\n", function.qualified_name(), function.description());
    for parameter in &function.metadata().parameters {
        manual.push_str("- ");
        manual.push_str(&parameter.name);
        if !parameter.description.is_empty() {
            manual.push_str(": ");
            manual.push_str(&parameter.description);
        }
        if let Some(default) = parameter.default_value.as_deref().filter(|d| !d.is_empty()) {
            manual.push_str(&format!(" (default value: {default})"));
        }
        manual.push('\n');
    }
    manual
}

pub fn function_manuals(functions: &[&FunctionDescriptor]) -> String {
    functions
        .iter()
        .map(|f| function_manual(f))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Action-planner listing: `// description` then `plugin.name`.
pub fn function_list(functions: &[&FunctionDescriptor]) -> String {
    functions
        .iter()
        .map(|f| format!("// {}\n{}\n", f.description(), f.qualified_name()))
        .collect()
}
