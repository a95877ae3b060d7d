//! Function registry: owns every registered function, keyed by plugin.
//!
//! Lookups by `(plugin, name)` are case-insensitive. Enumeration follows
//! registration order, which is what planners show the model.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{FunctionError, RegistryError};
use crate::function::{Function, FunctionDefinition, FunctionDescriptor};

/// A registry of available functions.
///
/// The kernel uses this to:
/// 1. Resolve `plugin.function` references in templates and plans
/// 2. Enumerate functions for planner prompts and tool definitions
#[derive(Default)]
pub struct FunctionRegistry {
    /// Keyed by lowercased `(plugin, name)`.
    functions: IndexMap<(String, String), FunctionDescriptor>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `plugin`. Replaces an existing entry with
    /// the same `(plugin, name)` in place.
    pub fn register(
        &mut self,
        plugin: &str,
        function: Arc<dyn Function>,
    ) -> std::result::Result<(), RegistryError> {
        if !plugin.is_empty() && !is_valid_name(plugin) {
            return Err(RegistryError::InvalidPluginName(plugin.to_string()));
        }
        let name = function.metadata().name.clone();
        if !is_valid_name(&name) {
            return Err(RegistryError::InvalidFunctionName(name));
        }

        debug!(plugin, function = %name, "Registering function");
        // `insert` on an existing key keeps its position.
        self.functions
            .insert(fold(plugin, &name), FunctionDescriptor::new(plugin, function));
        Ok(())
    }

    /// Register several functions under one plugin.
    pub fn register_plugin(
        &mut self,
        plugin: &str,
        functions: impl IntoIterator<Item = Arc<dyn Function>>,
    ) -> std::result::Result<(), RegistryError> {
        for function in functions {
            self.register(plugin, function)?;
        }
        Ok(())
    }

    /// Get a function by plugin and name.
    pub fn get(&self, plugin: &str, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(&fold(plugin, name))
    }

    /// Find a function by bare name across all plugins.
    ///
    /// Fails with [`FunctionError::Ambiguous`] when more than one plugin
    /// exposes the name.
    pub fn find(&self, name: &str) -> std::result::Result<&FunctionDescriptor, FunctionError> {
        let mut matches = self
            .functions
            .values()
            .filter(|f| f.name().eq_ignore_ascii_case(name));

        let first = matches
            .next()
            .ok_or_else(|| FunctionError::NotFound(name.to_string()))?;

        let rest: Vec<_> = matches.collect();
        if rest.is_empty() {
            return Ok(first);
        }

        let candidates = std::iter::once(first)
            .chain(rest)
            .map(FunctionDescriptor::qualified_name)
            .collect();
        Err(FunctionError::Ambiguous {
            name: name.to_string(),
            candidates,
        })
    }

    /// Resolve `plugin.function` or a bare `function` reference.
    pub fn resolve(&self, reference: &str) -> std::result::Result<&FunctionDescriptor, FunctionError> {
        match reference.split_once('.') {
            Some((plugin, name)) => self
                .get(plugin, name)
                .ok_or_else(|| FunctionError::NotFound(reference.to_string())),
            None => self.find(reference),
        }
    }

    /// All functions in registration order.
    pub fn functions(&self) -> indexmap::map::Values<'_, (String, String), FunctionDescriptor> {
        self.functions.values()
    }

    /// Distinct plugin names in registration order.
    pub fn plugins(&self) -> Vec<&str> {
        let mut plugins: Vec<&str> = Vec::new();
        for f in self.functions.values() {
            if !plugins.iter().any(|p| p.eq_ignore_ascii_case(f.plugin_name())) {
                plugins.push(f.plugin_name());
            }
        }
        plugins
    }

    /// All tool definitions (for function-calling models).
    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        self.functions().map(FunctionDescriptor::to_definition).collect()
    }

    pub fn contains(&self, plugin: &str, name: &str) -> bool {
        self.functions.contains_key(&fold(plugin, name))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn fold(plugin: &str, name: &str) -> (String, String) {
    (plugin.to_ascii_lowercase(), name.to_ascii_lowercase())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FunctionMetadata, FunctionOutput, NativeFunction};

    fn constant(name: &str, value: &'static str) -> Arc<dyn Function> {
        NativeFunction::new(FunctionMetadata::new(name), move |_| Ok(value.into())).into_arc()
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = FunctionRegistry::new();
        registry.register("text", constant("upper", "A")).unwrap();
        assert!(registry.get("TEXT", "Upper").is_some());
        assert!(registry.get("text", "nonexistent").is_none());
        assert!(registry.contains("text", "upper"));
    }

    #[test]
    fn reregistering_replaces_in_place() {
        let mut registry = FunctionRegistry::new();
        registry.register("a", constant("one", "1")).unwrap();
        registry.register("a", constant("two", "2")).unwrap();
        registry.register("A", constant("ONE", "uno")).unwrap();

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.functions().map(|f| f.name()).collect();
        assert_eq!(names, vec!["ONE", "two"]);
    }

    #[test]
    fn find_reports_ambiguity_and_absence() {
        let mut registry = FunctionRegistry::new();
        registry.register("text", constant("summarize", "t")).unwrap();
        registry.register("docs", constant("summarize", "d")).unwrap();
        registry.register("docs", constant("index", "i")).unwrap();

        assert_eq!(registry.find("index").unwrap().plugin_name(), "docs");
        match registry.find("summarize") {
            Err(FunctionError::Ambiguous { candidates, .. }) => {
                assert_eq!(candidates, vec!["text.summarize", "docs.summarize"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(matches!(registry.find("missing"), Err(FunctionError::NotFound(_))));
    }

    #[test]
    fn resolve_accepts_qualified_and_bare_references() {
        let mut registry = FunctionRegistry::new();
        registry.register("math", constant("add", "3")).unwrap();
        assert_eq!(registry.resolve("math.add").unwrap().name(), "add");
        assert_eq!(registry.resolve("add").unwrap().plugin_name(), "math");
        assert!(matches!(registry.resolve("text.add"), Err(FunctionError::NotFound(_))));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut registry = FunctionRegistry::new();
        assert!(matches!(
            registry.register("bad-plugin", constant("ok", "")),
            Err(RegistryError::InvalidPluginName(_))
        ));
        assert!(matches!(
            registry.register("ok", constant("bad.name", "")),
            Err(RegistryError::InvalidFunctionName(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn plugins_and_definitions_follow_registration_order() {
        let mut registry = FunctionRegistry::new();
        registry
            .register_plugin("email", [constant("send", ""), constant("read", "")])
            .unwrap();
        registry.register("math", constant("add", "")).unwrap();
        registry
            .register(
                "",
                NativeFunction::new(FunctionMetadata::new("bare"), |_| Ok(FunctionOutput::empty()))
                    .into_arc(),
            )
            .unwrap();

        assert_eq!(registry.plugins(), vec!["email", "math", ""]);
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["email-send", "email-read", "math-add", "bare"]);
    }
}
