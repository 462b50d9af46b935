mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gradebox-cli")]
#[command(about = "Gradebox CLI - Run and validate sandboxed code evaluations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a code file against a tests file in the sandbox
    Evaluate {
        /// Path to the candidate source file
        #[arg(short, long)]
        code: String,

        /// Path to the test spec JSON file
        #[arg(short, long)]
        tests: String,

        /// Emit the raw verdict JSON instead of a human summary
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Check a test spec file for shape problems without running anything
    Validate {
        /// Path to the test spec JSON file
        #[arg(short, long)]
        tests: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate { code, tests, json } => {
            commands::evaluate(&code, &tests, json).await?;
        }
        Commands::Validate { tests } => {
            commands::validate(&tests)?;
        }
    }

    Ok(())
}
