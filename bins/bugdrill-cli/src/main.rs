mod commands;

use anyhow::Result;
use bugdrill_common::BindingStrategy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bugdrill-cli")]
#[command(about = "bugdrill CLI - Run, grade and inspect Python submissions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file once in the sandbox
    Run {
        /// Python source file
        #[arg(short, long)]
        file: PathBuf,

        /// Wall-clock limit in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Executor service to call instead of the local Docker daemon
        #[arg(short, long, env = "EXECUTOR_URL")]
        executor_url: Option<String>,
    },

    /// Grade a source file against a JSON file of test cases
    Grade {
        /// Python source file
        #[arg(short, long)]
        file: PathBuf,

        /// Test cases: an array, or an object with a `test_cases` array
        #[arg(long)]
        tests: PathBuf,

        /// Wall-clock limit per run in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Argument binding (known|declared)
        #[arg(short, long, default_value = "known")]
        binding: BindingStrategy,

        /// Run test cases concurrently
        #[arg(long)]
        parallel: bool,

        /// Executor service to call instead of the local Docker daemon
        #[arg(short, long, env = "EXECUTOR_URL")]
        executor_url: Option<String>,

        /// Print the raw report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the harness generated for one input without running it
    Harness {
        /// Python source file
        #[arg(short, long)]
        file: PathBuf,

        /// Named inputs as a JSON object
        #[arg(short, long)]
        input: String,

        /// Argument binding (known|declared)
        #[arg(short, long, default_value = "known")]
        binding: BindingStrategy,
    },

    /// Check that a remote executor service is up
    Health {
        #[arg(short, long, env = "EXECUTOR_URL")]
        executor_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            timeout,
            executor_url,
        } => {
            commands::run_file(&file, timeout, executor_url.as_deref()).await?;
        }
        Commands::Grade {
            file,
            tests,
            timeout,
            binding,
            parallel,
            executor_url,
            json,
        } => {
            commands::grade_file(
                &file,
                &tests,
                timeout,
                binding,
                parallel,
                executor_url.as_deref(),
                json,
            )
            .await?;
        }
        Commands::Harness {
            file,
            input,
            binding,
        } => {
            commands::show_harness(&file, &input, binding)?;
        }
        Commands::Health { executor_url } => {
            commands::check_health(&executor_url).await?;
        }
    }

    Ok(())
}
