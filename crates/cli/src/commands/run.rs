//! `skein run`: run functions as a pipeline.

use skein_config::SkeinConfig;
use skein_core::{CancellationToken, ContextVariables};
use skein_kernel::{Kernel, PipelineResult, PipelineStatus};
use tracing::info;

use super::{build_context, build_kernel, cancel_on_ctrl_c};

pub async fn run(
    functions: &[String],
    input: Option<String>,
    vars: Vec<(String, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SkeinConfig::load()?;
    let kernel = build_kernel(&config)?;
    let mut context = build_context(input, vars);

    let result = run_pipeline(&kernel, functions, &mut context, &cancel_on_ctrl_c()).await?;
    match &result.status {
        PipelineStatus::Completed => {}
        PipelineStatus::Cancelled { step, stage } => {
            eprintln!("Pipeline cancelled at step {step} ({stage:?})");
        }
        PipelineStatus::Aborted => eprintln!("Pipeline interrupted"),
    }
    if let Some(value) = result.value() {
        println!("{value}");
    }
    Ok(())
}

async fn run_pipeline(
    kernel: &Kernel,
    functions: &[String],
    context: &mut ContextVariables,
    cancellation: &CancellationToken,
) -> Result<PipelineResult, Box<dyn std::error::Error>> {
    let steps = kernel.steps(functions.iter().map(String::as_str))?;
    info!(steps = steps.len(), "Running pipeline");
    Ok(kernel.run(&steps, context, cancellation).await?)
}
