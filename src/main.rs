// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use linear_scanner::constants::DEFAULT_LOG_FILE;
use std::path::PathBuf;

mod cli;

use cli::{BackendChoice, ModeChoice};

#[derive(Parser)]
#[command(name = "linear-scanner")]
#[command(about = "Sweep a Kinect's tilt motor and log the centre depth at every angle")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a tilt sweep and log depth samples
    Sweep {
        /// Acquisition mode
        #[arg(short, long, value_enum, default_value = "polled")]
        mode: ModeChoice,

        /// Device backend
        #[arg(short, long, value_enum, default_value = "v4l2")]
        backend: BackendChoice,

        /// V4L2 depth node (default: first Kinect found)
        #[arg(short, long)]
        device: Option<String>,

        /// freedepth device index
        #[arg(short, long, default_value = "0")]
        index: usize,

        /// Log file path (default: linear_scanner.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not print a line per sample
        #[arg(short, long)]
        quiet: bool,
    },

    /// List connected Kinect sensors
    List,

    /// Summarise a sample log
    Inspect {
        /// Log file to read
        #[arg(default_value = DEFAULT_LOG_FILE)]
        path: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=linear_scanner=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sweep {
            mode,
            backend,
            device,
            index,
            output,
            quiet,
        } => {
            let config = cli::sweep_config(mode, backend, device, index, output, quiet)?;
            cli::run_sweep(config)
        }
        Commands::List => cli::list_devices(),
        Commands::Inspect { path, json } => cli::inspect(&path, json),
    }
}
