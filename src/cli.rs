// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the scanner
//!
//! This module provides command-line functionality for:
//! - Running a tilt sweep
//! - Listing connected sensors
//! - Summarising an existing sample log

use linear_scanner::backends::{self, BackendError};
use linear_scanner::logger::{LogSummary, read_rows};
use linear_scanner::{AcquisitionMode, BackendKind, SweepConfig, scanner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Run a sweep with the given configuration
pub fn run_sweep(config: SweepConfig) -> Result<(), Box<dyn std::error::Error>> {
    match serde_json::to_string(&config) {
        Ok(json) => info!(config = %json, "Sweep configuration"),
        Err(e) => warn!(error = %e, "Failed to serialize configuration"),
    }

    let mut session = backends::open_session(&config.backend)?;
    println!("Using device: {}", session.name());
    println!("Logging to: {}", config.output.display());
    println!("Sweeping... (press Ctrl+C to stop early)");

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let report = scanner::run(session.as_mut(), &config, &stop_flag)?;

    println!();
    if report.cancelled {
        println!("Stopped early after {} steps.", report.steps);
    } else {
        println!("Sweep complete: {} steps.", report.steps);
    }
    println!(
        "Logged {} samples to {}",
        report.rows_logged,
        config.output.display()
    );

    Ok(())
}

/// List all connected sensors
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = backends::list_devices();

    if devices.is_empty() {
        println!("No Kinect sensors found.");
        return Ok(());
    }

    println!("Available sensors:");
    println!();
    for device in &devices {
        println!("  {}", device);
    }

    Ok(())
}

/// Print a summary of a sample log
pub fn inspect(path: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let rows = read_rows(path)?;
    let summary = LogSummary::from_rows(&rows);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Log: {}", path.display());
    println!("  Rows:        {}", summary.rows);
    println!("  Runs:        {}", summary.runs);
    if let (Some(min), Some(max)) = (summary.min_angle, summary.max_angle) {
        println!("  Angles:      {}° to {}°", min, max);
    }
    println!("  Up / down:   {} / {}", summary.rows_up, summary.rows_down);
    if let Some(mean) = summary.mean_depth {
        println!("  Mean depth:  {:.1}", mean);
    }

    Ok(())
}

/// Backend selected on the command line
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum BackendChoice {
    /// In-process simulated sensor
    Simulated,
    /// Kernel driver through V4L2
    V4l2,
    /// freedepth userspace driver
    Freedepth,
}

/// Acquisition mode selected on the command line
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ModeChoice {
    Polled,
    Streamed,
}

/// Build the run configuration from command line choices
pub fn sweep_config(
    mode: ModeChoice,
    backend: BackendChoice,
    device: Option<String>,
    index: usize,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<SweepConfig, BackendError> {
    let mode = match mode {
        ModeChoice::Polled => AcquisitionMode::Polled,
        ModeChoice::Streamed => AcquisitionMode::Streamed,
    };

    let backend = match backend {
        BackendChoice::Simulated => BackendKind::Simulated,
        BackendChoice::V4l2 => match device {
            Some(device_path) => BackendKind::V4l2 { device_path },
            None => backends::v4l2_depth::enumerate_kinect_nodes()
                .into_iter()
                .next()
                .map(|info| BackendKind::V4l2 {
                    device_path: info.locator,
                })
                .ok_or_else(|| {
                    BackendError::DeviceNotFound("no Kinect V4L2 device found".to_string())
                })?,
        },
        BackendChoice::Freedepth => BackendKind::Freedepth { index },
    };

    let mut config = SweepConfig::for_mode(mode);
    config.backend = backend;
    config.print_progress = !quiet;
    if let Some(output) = output {
        config.output = output;
    }
    Ok(config)
}
