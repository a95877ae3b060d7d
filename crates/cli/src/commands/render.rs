//! `skein render`: render a template file against the built-in plugins.

use std::io::Read;

use skein_config::SkeinConfig;
use tracing::debug;

use super::{build_context, build_kernel, cancel_on_ctrl_c};

pub async fn run(
    file: &str,
    input: Option<String>,
    vars: Vec<(String, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SkeinConfig::load()?;
    let kernel = build_kernel(&config)?;
    let source = read_source(file)?;
    debug!(file, chars = source.len(), "Rendering template");

    let context = build_context(input, vars);
    let rendered = kernel.render(&source, &context, &cancel_on_ctrl_c()).await?;
    println!("{rendered}");
    Ok(())
}

/// Read the template from a path, or stdin for `-`.
fn read_source(file: &str) -> std::io::Result<String> {
    if file == "-" {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        std::fs::read_to_string(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::CancellationToken;

    #[test]
    fn reads_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greeting.skein");
        std::fs::write(&path, "Hello {{$name}}").unwrap();

        let source = read_source(path.to_str().unwrap()).unwrap();
        assert_eq!(source, "Hello {{$name}}");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_source("/definitely/not/here.skein").is_err());
    }

    #[tokio::test]
    async fn renders_with_vars_and_functions() {
        let kernel = build_kernel(&SkeinConfig::default()).unwrap();
        let context = build_context(Some("mario".into()), vec![("greeting".into(), "hi".into())]);
        let rendered = kernel
            .render("{{$greeting}} {{text.uppercase}} {{math.add '2' amount='3'}}", &context, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(rendered, "hi MARIO 5");
    }

    #[tokio::test]
    async fn bare_argument_is_a_syntax_error() {
        let kernel = build_kernel(&SkeinConfig::default()).unwrap();
        let err = kernel
            .render("{{math.add 2 amount='3'}}", &build_context(None, Vec::new()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, skein_template::TemplateError::Syntax { .. }));
    }
}
