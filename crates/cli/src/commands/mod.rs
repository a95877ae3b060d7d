//! CLI command implementations.

pub mod config_cmd;
pub mod functions;
pub mod render;
pub mod run;

use skein_config::SkeinConfig;
use skein_core::{CancellationToken, ContextVariables};
use skein_kernel::Kernel;

/// Parse a `name=value` pair for `--var`.
pub fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Build the Context from `--input` and `--var` flags. A `--var input=...`
/// wins over `--input`.
pub fn build_context(input: Option<String>, vars: Vec<(String, String)>) -> ContextVariables {
    let mut context = ContextVariables::new(input.unwrap_or_default());
    for (name, value) in vars {
        context.set(&name, value);
    }
    context
}

/// A kernel over the built-in plugins, honoring pipeline settings.
pub fn build_kernel(config: &SkeinConfig) -> Result<Kernel, Box<dyn std::error::Error>> {
    let registry = skein_plugins::core_registry()?;
    Ok(Kernel::builder()
        .with_functions(registry)
        .with_pipeline_config(config.pipeline.clone())
        .build())
}

/// A token that is cancelled on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vars() {
        assert_eq!(parse_var("name=Mario").unwrap(), ("name".into(), "Mario".into()));
        assert_eq!(parse_var("expr=a=b").unwrap(), ("expr".into(), "a=b".into()));
        assert_eq!(parse_var("empty=").unwrap(), ("empty".into(), String::new()));
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn var_overrides_input_flag() {
        let context = build_context(
            Some("from flag".into()),
            vec![("input".into(), "from var".into()), ("name".into(), "Mario".into())],
        );
        assert_eq!(context.input(), "from var");
        assert_eq!(context.get("name"), Some("Mario"));
    }

    #[test]
    fn kernel_has_core_plugins() {
        let kernel = build_kernel(&SkeinConfig::default()).unwrap();
        assert!(kernel.functions().contains("text", "uppercase"));
        assert_eq!(kernel.pipeline_config().max_repeats, SkeinConfig::default().pipeline.max_repeats);
    }
}
