//! Text plugin: small string transforms over `input`.

use skein_core::{
    Function, FunctionError, FunctionMetadata, FunctionOutput, NativeFunction, ParameterMetadata,
    ParameterType,
};
use std::sync::Arc;

pub const PLUGIN: &str = "text";

fn unary(name: &str, description: &str, transform: fn(&str) -> String) -> Arc<dyn Function> {
    let metadata = FunctionMetadata::new(name)
        .with_description(description)
        .with_parameter(ParameterMetadata::new("input").with_description("The text to transform"))
        .with_return("The transformed text", ParameterType::String);
    NativeFunction::new(metadata, move |vars| Ok(transform(vars.input()).into())).into_arc()
}

/// All text functions, in listing order.
pub fn functions() -> Vec<Arc<dyn Function>> {
    vec![
        unary("uppercase", "Convert the input to upper case", str::to_uppercase),
        unary("lowercase", "Convert the input to lower case", str::to_lowercase),
        unary("trim", "Strip leading and trailing whitespace", |s| s.trim().to_string()),
        length(),
        concat(),
    ]
}

fn length() -> Arc<dyn Function> {
    let metadata = FunctionMetadata::new("length")
        .with_description("Count the characters in the input")
        .with_parameter(ParameterMetadata::new("input"))
        .with_return("Number of characters", ParameterType::Integer);
    NativeFunction::new(metadata, |vars| {
        Ok(vars.input().chars().count().to_string().into())
    })
    .into_arc()
}

fn concat() -> Arc<dyn Function> {
    let metadata = FunctionMetadata::new("concat")
        .with_description("Append input2 to the input")
        .with_parameter(ParameterMetadata::new("input"))
        .with_parameter(
            ParameterMetadata::new("input2")
                .with_description("Text to append")
                .required(),
        );
    NativeFunction::new(metadata, |vars| {
        let tail = vars
            .get("input2")
            .ok_or_else(|| FunctionError::InvalidArguments("input2 is not set".into()))?;
        Ok(FunctionOutput::from(format!("{}{tail}", vars.input())))
    })
    .into_arc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{CancellationToken, ContextVariables, FunctionInvocation, FunctionRegistry};

    async fn call(name: &str, vars: &mut ContextVariables) -> Result<Option<String>, FunctionError> {
        let mut registry = FunctionRegistry::new();
        registry.register_plugin(PLUGIN, functions()).unwrap();
        let descriptor = registry.get(PLUGIN, name).unwrap().clone();
        let result = descriptor
            .invoke(FunctionInvocation {
                variables: vars,
                arguments: None,
                functions: &registry,
                cancellation: &CancellationToken::new(),
            })
            .await?;
        Ok(result.value)
    }

    #[tokio::test]
    async fn case_and_trim() {
        let mut vars = ContextVariables::new("  Hello World ");
        assert_eq!(call("uppercase", &mut vars).await.unwrap().as_deref(), Some("  HELLO WORLD "));
        assert_eq!(call("lowercase", &mut vars).await.unwrap().as_deref(), Some("  hello world "));
        assert_eq!(call("trim", &mut vars).await.unwrap().as_deref(), Some("Hello World"));
    }

    #[tokio::test]
    async fn length_counts_chars_not_bytes() {
        let mut vars = ContextVariables::new("héllo");
        assert_eq!(call("length", &mut vars).await.unwrap().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn missing_input_is_empty() {
        let mut vars = ContextVariables::empty();
        assert_eq!(call("uppercase", &mut vars).await.unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn concat_requires_second_input() {
        let mut vars = ContextVariables::new("foo");
        let err = call("concat", &mut vars).await.unwrap_err();
        assert!(matches!(err, FunctionError::MissingArgument { .. }));

        vars.set("input2", "bar");
        assert_eq!(call("concat", &mut vars).await.unwrap().as_deref(), Some("foobar"));
    }
}
