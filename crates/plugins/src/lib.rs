//! # skein plugins
//!
//! Built-in native functions, grouped by plugin:
//! - `text`: uppercase, lowercase, trim, length, concat
//! - `math`: add, subtract, evaluate
//! - `time`: now, today, year

pub mod math;
pub mod text;
pub mod time;

use skein_core::{FunctionRegistry, RegistryError};
use tracing::info;

/// Register every built-in plugin into `registry`.
pub fn register_core_plugins(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    registry.register_plugin(text::PLUGIN, text::functions())?;
    registry.register_plugin(math::PLUGIN, math::functions())?;
    registry.register_plugin(time::PLUGIN, time::functions())?;
    info!(functions = registry.len(), "Registered core plugins");
    Ok(())
}

/// A fresh registry with all built-in plugins.
pub fn core_registry() -> Result<FunctionRegistry, RegistryError> {
    let mut registry = FunctionRegistry::new();
    register_core_plugins(&mut registry)?;
    Ok(registry)
}
