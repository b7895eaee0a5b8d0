mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "onnmhaire", about = "Inspect provider manifests and export requests")]
struct Args {
    /// Exporter config (defaults to ~/.onnmhaire/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tag index of a provider manifest
    Tags {
        #[arg(long)]
        manifest: PathBuf,
    },
    /// Resolve a request into a binding plan
    Plan {
        #[arg(long)]
        manifest: PathBuf,
        /// Request tokens as a JSON array, e.g. '["f1", [":b", {"prefix": "x_"}]]'
        request: Option<String>,
    },
    /// Resolve and install into a simulated namespace
    Install {
        #[arg(long)]
        manifest: PathBuf,
        /// Names already bound in the namespace
        #[arg(long, value_delimiter = ',')]
        existing: Vec<String>,
        request: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = commands::load_config(args.config.as_deref())?;

    let response = match args.command {
        Command::Tags { manifest } => commands::tags(&manifest, &config).await?,
        Command::Plan { manifest, request } => {
            commands::plan(&manifest, request.as_deref(), config).await?
        }
        Command::Install {
            manifest,
            existing,
            request,
        } => commands::install(&manifest, &existing, request.as_deref(), config).await?,
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
