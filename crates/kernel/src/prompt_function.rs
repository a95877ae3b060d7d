//! Model-driven functions: a prompt template sent to a completion service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skein_config::CompletionDefaults;
use skein_core::{
    CompletionSettings, Function, FunctionError, FunctionInvocation, FunctionMetadata,
    FunctionOutput, ParameterMetadata, TextCompletion,
};
use skein_template::{PromptTemplate, TemplateError};
use std::sync::Arc;
use tracing::debug;

use crate::events::{PROMPT_OBSERVERS, PromptRenderedEvent, PromptRenderingEvent};

/// Completion settings seeded from the `[completion]` config table.
pub fn default_settings(defaults: &CompletionDefaults) -> CompletionSettings {
    CompletionSettings {
        model_id: defaults.model_id.clone(),
        temperature: defaults.temperature,
        max_tokens: Some(defaults.max_tokens),
        ..CompletionSettings::default()
    }
}

/// Serializable definition of a prompt function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptFunctionConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub template: String,

    /// Declared inputs. When empty, every variable the template references
    /// becomes an optional parameter.
    #[serde(default)]
    pub input_parameters: Vec<ParameterMetadata>,

    #[serde(default)]
    pub execution_settings: CompletionSettings,
}

/// A function whose body is a rendered prompt and a completion call.
pub struct PromptFunction {
    metadata: FunctionMetadata,
    template: PromptTemplate,
    completion: Arc<dyn TextCompletion>,
    settings: CompletionSettings,
}

impl PromptFunction {
    pub fn new(
        name: impl Into<String>,
        template: PromptTemplate,
        completion: Arc<dyn TextCompletion>,
    ) -> Self {
        let mut metadata = FunctionMetadata::new(name);
        metadata.parameters = template
            .referenced_variables()
            .into_iter()
            .map(ParameterMetadata::new)
            .collect();
        Self {
            metadata,
            template,
            completion,
            settings: default_settings(&CompletionDefaults::default()),
        }
    }

    pub fn from_config(
        config: PromptFunctionConfig,
        completion: Arc<dyn TextCompletion>,
    ) -> Result<Self, TemplateError> {
        let template = PromptTemplate::parse(config.template)?;
        let mut function = Self::new(config.name, template, completion)
            .with_description(config.description)
            .with_settings(config.execution_settings);
        if !config.input_parameters.is_empty() {
            function.metadata.parameters = config.input_parameters;
        }
        Ok(function)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    pub fn with_settings(mut self, settings: CompletionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the derived parameter list.
    pub fn with_parameters(mut self, parameters: Vec<ParameterMetadata>) -> Self {
        self.metadata.parameters = parameters;
        self
    }

    /// Fill the model and token limit from config where the function's own
    /// settings leave them unset.
    pub fn with_defaults(mut self, defaults: &CompletionDefaults) -> Self {
        if self.settings.model_id.is_none() {
            self.settings.model_id = defaults.model_id.clone();
        }
        if self.settings.max_tokens.is_none() {
            self.settings.max_tokens = Some(defaults.max_tokens);
        }
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    pub fn into_arc(self) -> Arc<dyn Function> {
        Arc::new(self)
    }
}

#[async_trait]
impl Function for PromptFunction {
    fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }

    async fn invoke(
        &self,
        invocation: FunctionInvocation<'_>,
    ) -> Result<FunctionOutput, FunctionError> {
        let name = self.metadata.name.as_str();
        let observers = PROMPT_OBSERVERS
            .try_with(Arc::clone)
            .ok()
            .filter(|o| !o.is_empty());
        let mut settings = self.settings.clone();

        if let Some(observers) = &observers {
            let mut rendering = PromptRenderingEvent::new(
                &self.metadata,
                &mut *invocation.variables,
                &mut settings,
            );
            for observer in &observers.rendering {
                observer(&mut rendering);
            }
        }

        let mut prompt = self
            .template
            .render(invocation.variables, invocation.functions, invocation.cancellation)
            .await
            .map_err(|e| match e {
                TemplateError::Cancelled => FunctionError::Cancelled(name.to_string()),
                e => FunctionError::failed(name, e),
            })?;

        if let Some(observers) = &observers {
            let mut rendered = PromptRenderedEvent::new(&self.metadata, invocation.variables, prompt);
            for observer in &observers.rendered {
                observer(&mut rendered);
            }
            if rendered.is_cancel_requested() {
                debug!(function = %name, "Prompt cancelled after rendering");
                return Err(FunctionError::Cancelled(name.to_string()));
            }
            prompt = rendered.into_prompt();
        }

        debug!(
            function = %name,
            service = %self.completion.name(),
            prompt_chars = prompt.len(),
            "Sending prompt to completion service"
        );

        let text = tokio::select! {
            _ = invocation.cancellation.cancelled() => {
                return Err(FunctionError::Cancelled(name.to_string()));
            }
            completed = self.completion.complete(&prompt, &settings) => completed?,
        };

        Ok(FunctionOutput::from(text).with_metadata("rendered_prompt", serde_json::Value::String(prompt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{
        CancellationToken, CompletionError, ContextVariables, FunctionDescriptor, FunctionRegistry,
        NativeFunction,
    };
    use std::sync::Mutex;

    /// Echoes the prompt back and remembers the settings it saw.
    struct EchoCompletion {
        seen: Mutex<Vec<CompletionSettings>>,
    }

    impl EchoCompletion {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextCompletion for EchoCompletion {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            prompt: &str,
            settings: &CompletionSettings,
        ) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(settings.clone());
            Ok(format!("echo: {prompt}"))
        }
    }

    struct FailingCompletion;

    #[async_trait]
    impl TextCompletion for FailingCompletion {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(
            &self,
            _prompt: &str,
            _settings: &CompletionSettings,
        ) -> Result<String, CompletionError> {
            Err(CompletionError::Service("503 upstream".into()))
        }
    }

    async fn call(
        function: Arc<dyn Function>,
        registry: &FunctionRegistry,
        vars: &mut ContextVariables,
    ) -> Result<String, FunctionError> {
        let descriptor = FunctionDescriptor::new("prompts", function);
        let result = descriptor
            .invoke(FunctionInvocation {
                variables: vars,
                arguments: None,
                functions: registry,
                cancellation: &CancellationToken::new(),
            })
            .await?;
        Ok(result.value.unwrap_or_default())
    }

    #[tokio::test]
    async fn renders_template_then_completes() {
        let mut registry = FunctionRegistry::new();
        registry
            .register(
                "text",
                NativeFunction::new(FunctionMetadata::new("upper"), |v| {
                    Ok(v.input().to_uppercase().into())
                })
                .into_arc(),
            )
            .unwrap();

        let completion = EchoCompletion::new();
        let function = PromptFunction::new(
            "summarize",
            PromptTemplate::parse("Summarize {{text.upper $topic}} for {{$audience}}").unwrap(),
            completion.clone(),
        )
        .with_settings(CompletionSettings::default().with_max_tokens(64));

        let names: Vec<_> = function.metadata().parameters.iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["topic", "audience"]);

        let mut vars = ContextVariables::empty();
        vars.set("topic", "rust");
        vars.set("audience", "kids");
        let out = call(function.into_arc(), &registry, &mut vars).await.unwrap();

        assert_eq!(out, "echo: Summarize RUST for kids");
        assert_eq!(completion.seen.lock().unwrap()[0].max_tokens, Some(64));
    }

    #[tokio::test]
    async fn from_config_applies_declared_parameters_and_defaults() {
        let config: PromptFunctionConfig = serde_json::from_value(serde_json::json!({
            "name": "joke",
            "description": "Tells a joke",
            "template": "Tell a {{$style}} joke about {{$input}}",
            "input_parameters": [
                {"name": "input", "description": "Topic", "is_required": true},
                {"name": "style", "description": "Style", "default_value": "dry"}
            ],
            "execution_settings": {"temperature": 0.2}
        }))
        .unwrap();

        let function = PromptFunction::from_config(config, EchoCompletion::new()).unwrap();
        assert_eq!(function.metadata().description, "Tells a joke");
        assert!((function.settings().temperature - 0.2).abs() < f32::EPSILON);

        let mut vars = ContextVariables::new("ducks");
        let out = call(function.into_arc(), &FunctionRegistry::new(), &mut vars)
            .await
            .unwrap();
        assert_eq!(out, "echo: Tell a dry joke about ducks");
    }

    #[test]
    fn from_config_rejects_bad_templates() {
        let config = PromptFunctionConfig {
            name: "bad".into(),
            description: String::new(),
            template: "{{f a=b}}".into(),
            input_parameters: Vec::new(),
            execution_settings: CompletionSettings::default(),
        };
        assert!(matches!(
            PromptFunction::from_config(config, EchoCompletion::new()),
            Err(TemplateError::Syntax { .. })
        ));
    }

    #[tokio::test]
    async fn completion_failure_surfaces_as_function_error() {
        let function = PromptFunction::new(
            "f",
            PromptTemplate::parse("hi").unwrap(),
            Arc::new(FailingCompletion),
        );
        let err = call(function.into_arc(), &FunctionRegistry::new(), &mut ContextVariables::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, FunctionError::Completion(CompletionError::Service(_))));
    }

    #[test]
    fn config_defaults_fill_unset_settings() {
        let defaults = CompletionDefaults {
            model_id: Some("small".into()),
            temperature: 0.5,
            max_tokens: 300,
        };
        let function = PromptFunction::new("f", PromptTemplate::parse("hi").unwrap(), EchoCompletion::new())
            .with_settings(CompletionSettings::default())
            .with_defaults(&defaults);
        assert_eq!(function.settings().model_id.as_deref(), Some("small"));
        assert_eq!(function.settings().max_tokens, Some(300));

        let own = PromptFunction::new("g", PromptTemplate::parse("hi").unwrap(), EchoCompletion::new())
            .with_settings(CompletionSettings::default().with_max_tokens(64))
            .with_defaults(&defaults);
        assert_eq!(own.settings().max_tokens, Some(64));

        let seeded = default_settings(&defaults);
        assert!((seeded.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(seeded.max_tokens, Some(300));
    }

    #[test]
    fn new_functions_use_the_default_token_limit() {
        let function = PromptFunction::new("f", PromptTemplate::parse("hi").unwrap(), EchoCompletion::new());
        assert_eq!(
            function.settings().max_tokens,
            Some(CompletionDefaults::default().max_tokens)
        );
    }

    fn prompt_registry(completion: Arc<EchoCompletion>) -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry
            .register(
                "prompts",
                PromptFunction::new(
                    "greet",
                    PromptTemplate::parse("Hello {{$name}}").unwrap(),
                    completion,
                )
                .into_arc(),
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn prompt_observers_rewrite_variables_settings_and_prompt() {
        let completion = EchoCompletion::new();
        let kernel = crate::Kernel::builder()
            .with_functions(prompt_registry(completion.clone()))
            .on_prompt_rendering(|e| {
                e.variables_mut().set("name", "Grace");
                e.settings_mut().max_tokens = Some(12);
            })
            .on_prompt_rendered(|e| {
                let rewritten = format!("{} (be brief)", e.prompt());
                e.set_prompt(rewritten);
            })
            .build();

        let mut vars = ContextVariables::empty();
        vars.set("name", "Ada");
        let result = kernel
            .invoke_by_name("prompts.greet", &mut vars, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.value(), Some("echo: Hello Grace (be brief)"));
        assert_eq!(completion.seen.lock().unwrap()[0].max_tokens, Some(12));
    }

    #[tokio::test]
    async fn cancelled_prompt_never_reaches_the_service() {
        let completion = EchoCompletion::new();
        let kernel = crate::Kernel::builder()
            .with_functions(prompt_registry(completion.clone()))
            .on_prompt_rendered(|e| {
                if e.prompt().contains("Mallory") {
                    e.cancel();
                }
            })
            .build();

        let mut vars = ContextVariables::empty();
        vars.set("name", "Mallory");
        let result = kernel
            .invoke_by_name("prompts.greet", &mut vars, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, crate::PipelineStatus::Aborted);
        assert_eq!(result.value(), None);
        assert!(completion.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn direct_calls_run_without_observers() {
        let completion = EchoCompletion::new();
        let registry = prompt_registry(completion.clone());
        let function = registry.resolve("prompts.greet").unwrap().clone();
        let mut vars = ContextVariables::empty();
        vars.set("name", "Ada");
        let out = function
            .invoke(FunctionInvocation {
                variables: &mut vars,
                arguments: None,
                functions: &registry,
                cancellation: &CancellationToken::new(),
            })
            .await
            .unwrap();
        assert_eq!(out.value.as_deref(), Some("echo: Hello Ada"));
    }
}
