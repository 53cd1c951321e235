use anyhow::{Context, Result};
use quality_engine::ValidationEngine;
use quality_parser::parse_file;
use std::path::Path;
use tracing::{info, warn};

use crate::{Format, output};

/// Settings given on the command line, applied over the job's own.
#[derive(Debug, Default, Clone, Copy, clap::Args)]
pub struct Overrides {
    /// Files validated in parallel (overrides settings.workers)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Records per batch (overrides settings.chunk_size)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Failing records kept per rule (overrides settings.max_sample_failures)
    #[arg(long)]
    pub max_sample_failures: Option<usize>,
}

pub async fn execute(config_path: &str, format: Format, overrides: Overrides) -> Result<i32> {
    info!("Validating job: {}", config_path);

    let mut job = parse_file(Path::new(config_path))
        .with_context(|| format!("Failed to load job file: {}", config_path))?;

    if let Some(workers) = overrides.workers {
        job.settings.workers = workers;
    }
    if let Some(chunk_size) = overrides.chunk_size {
        job.settings.chunk_size = chunk_size;
    }
    if let Some(max) = overrides.max_sample_failures {
        job.settings.max_sample_failures = max;
    }

    if format == Format::Text {
        output::print_info(&format!(
            "Job loaded: {} ({} file(s), {} worker(s))",
            job.name,
            job.files.len(),
            job.settings.workers
        ));
    }

    let engine = ValidationEngine::new();
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling validation");
            cancel.cancel();
        }
    });

    let report = engine
        .run(job)
        .await
        .with_context(|| format!("Validation of {} aborted", config_path))?;

    output::print_validation_report(&report, format)?;
    Ok(report.exit_code())
}
