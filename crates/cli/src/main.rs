//! skein CLI: the main entry point.
//!
//! Commands:
//! - `render`: render a template with the built-in plugins
//! - `run`: run functions as a pipeline
//! - `functions`: list registered functions
//! - `config`: show the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "skein",
    about = "Compose functions with templates, pipelines and planners",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template file (`-` reads stdin)
    Render {
        file: String,

        /// Set a variable, as name=value (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = commands::parse_var)]
        vars: Vec<(String, String)>,

        /// Value for the `input` variable
        #[arg(short, long)]
        input: Option<String>,
    },

    /// Run functions in order, chaining each result into the next `input`
    Run {
        /// Functions as plugin.name or a bare name
        #[arg(required = true)]
        functions: Vec<String>,

        /// Initial `input`
        #[arg(short, long)]
        input: Option<String>,

        /// Set a variable, as name=value (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = commands::parse_var)]
        vars: Vec<(String, String)>,
    },

    /// List registered functions
    Functions {
        /// Print JSON tool definitions instead of the text manual
        #[arg(long)]
        json: bool,

        /// Hide a plugin (repeatable)
        #[arg(long = "exclude-plugin", value_name = "PLUGIN")]
        exclude_plugins: Vec<String>,
    },

    /// Show the effective configuration as TOML
    Config {
        /// Print the config file path instead
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render { file, vars, input } => commands::render::run(&file, input, vars).await?,
        Commands::Run {
            functions,
            input,
            vars,
        } => commands::run::run(&functions, input, vars).await?,
        Commands::Functions {
            json,
            exclude_plugins,
        } => commands::functions::run(json, &exclude_plugins)?,
        Commands::Config { path } => commands::config_cmd::run(path)?,
    }

    Ok(())
}
