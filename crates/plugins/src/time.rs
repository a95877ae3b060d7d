//! Time plugin: the current UTC date and time.

use chrono::{Datelike, Utc};
use skein_core::{Function, FunctionMetadata, NativeFunction, ParameterType};
use std::sync::Arc;

pub const PLUGIN: &str = "time";

fn clock(name: &str, description: &str, read: fn() -> String) -> Arc<dyn Function> {
    let metadata = FunctionMetadata::new(name)
        .with_description(description)
        .with_return(description, ParameterType::String);
    NativeFunction::new(metadata, move |_| Ok(read().into())).into_arc()
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    vec![
        clock("now", "The current UTC date and time (RFC 3339)", || Utc::now().to_rfc3339()),
        clock("today", "Today's UTC date (YYYY-MM-DD)", || {
            Utc::now().format("%Y-%m-%d").to_string()
        }),
        clock("year", "The current year", || Utc::now().year().to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};
    use skein_core::{CancellationToken, ContextVariables, FunctionInvocation, FunctionRegistry};

    async fn call(name: &str) -> String {
        let mut registry = FunctionRegistry::new();
        registry.register_plugin(PLUGIN, functions()).unwrap();
        let descriptor = registry.get(PLUGIN, name).unwrap().clone();
        let mut vars = ContextVariables::empty();
        descriptor
            .invoke(FunctionInvocation {
                variables: &mut vars,
                arguments: None,
                functions: &registry,
                cancellation: &CancellationToken::new(),
            })
            .await
            .unwrap()
            .value
            .unwrap()
    }

    #[tokio::test]
    async fn outputs_parse_back() {
        assert!(DateTime::parse_from_rfc3339(&call("now").await).is_ok());
        assert!(NaiveDate::parse_from_str(&call("today").await, "%Y-%m-%d").is_ok());
        assert!(call("year").await.parse::<i32>().unwrap() >= 2024);
    }
}
