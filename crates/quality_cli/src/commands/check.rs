use anyhow::{Context, Result};
use colored::*;
use quality_core::{EXIT_ERROR, EXIT_PASSED};
use quality_engine::ValidationEngine;
use quality_parser::parse_file;
use std::path::Path;
use tracing::info;

use crate::output;

pub fn execute(config_path: &str) -> Result<i32> {
    info!("Checking job: {}", config_path);

    let job = parse_file(Path::new(config_path))
        .with_context(|| format!("Failed to load job file: {}", config_path))?;

    output::print_info(&format!("Job loaded: {}", job.name));

    let issues = ValidationEngine::new()
        .check(&job)
        .with_context(|| format!("Job {} is not runnable", config_path))?;

    println!("\nJob Summary:");
    println!("  Name:        {}", job.name);
    println!("  Description: {}", job.description.as_deref().unwrap_or("N/A"));
    println!("  Chunk size:  {}", job.settings.chunk_size);
    println!("  Workers:     {}", job.settings.workers);
    println!("  Files:       {}", job.files.len());
    for file in &job.files {
        let format = file
            .resolved_format()
            .map(|f| f.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let enabled = file.enabled_rules().count();
        let disabled = file.validations.len() - enabled;
        println!(
            "    - {} ({}, {}): {} rule(s){}",
            file.name,
            file.path,
            format,
            enabled,
            if disabled > 0 {
                format!(", {} disabled", disabled)
            } else {
                String::new()
            }
        );
    }

    if issues.is_empty() {
        println!();
        output::print_success("All rules and conditions are valid");
        return Ok(EXIT_PASSED);
    }

    println!("\n{}", "Rule errors:".red().bold());
    for (i, issue) in issues.iter().enumerate() {
        println!(
            "  {}. {} / {}: {}",
            i + 1,
            issue.file,
            issue.rule,
            issue.error.to_string().red()
        );
    }
    Ok(EXIT_ERROR)
}
