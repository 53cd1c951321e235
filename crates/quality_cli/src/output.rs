use anyhow::Result;
use colored::*;
use quality_core::{FileValidationReport, Severity, Status, ValidationReport, ValidationResult};
use serde_json::json;

use crate::Format;

/// Failing records shown per rule in the text report.
const TEXT_SAMPLES: usize = 5;

pub fn print_validation_report(report: &ValidationReport, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json_report(report),
        Format::Text => {
            print_text_report(report);
            Ok(())
        }
    }
}

fn status_label(status: Status) -> ColoredString {
    let label = status.to_string();
    match status {
        Status::Passed => label.green().bold(),
        Status::Warning => label.yellow().bold(),
        Status::Failed => label.red().bold(),
        Status::Cancelled => label.magenta().bold(),
    }
}

fn print_text_report(report: &ValidationReport) {
    println!("\n{}", "═".repeat(60));
    println!("{}", format!("  VALIDATION REPORT: {}", report.job_name).bold());
    println!("{}", "═".repeat(60));

    for file in &report.files {
        print_file(file);
    }

    println!("\n{}", "Summary:".bold());
    println!("  Status:          {}", status_label(report.status()));
    println!("  Files:           {}", report.files.len());
    println!("  Failed errors:   {}", report.error_count());
    println!("  Failed warnings: {}", report.warning_count());
    println!("  Duration:        {} ms", report.duration_ms);
    println!("  Exit code:       {}", report.exit_code());
    println!("{}", "═".repeat(60));
}

fn print_file(file: &FileValidationReport) {
    println!(
        "\n{} {} ({} record(s), {} ms)",
        status_label(file.status()),
        file.file_name.bold(),
        file.rows_processed,
        file.duration_ms
    );
    println!("  {}", file.path.dimmed());

    if !file.errors.is_empty() {
        println!("  {}", "Errors:".red().bold());
        for (i, error) in file.errors.iter().enumerate() {
            println!("    {}. {}", i + 1, error.red());
        }
    }

    for result in &file.results {
        print_result(result);
    }
    if file.cancelled {
        println!("  {}", "Cancelled before all rules finished".magenta());
    }
}

fn print_result(result: &ValidationResult) {
    let mark = match (result.passed, result.severity) {
        (true, _) => "✓".green().bold(),
        (false, Severity::Error) => "✗".red().bold(),
        (false, Severity::Warning) => "!".yellow().bold(),
    };
    println!(
        "  {} [{}] {}: {}",
        mark,
        result.severity,
        result.rule_name.bold(),
        result.message
    );
    if result.passed {
        return;
    }
    for sample in result.samples.iter().take(TEXT_SAMPLES) {
        let value = sample
            .value
            .as_deref()
            .map(|v| format!(" = '{}'", v))
            .unwrap_or_default();
        let field = sample.field.as_deref().unwrap_or("-");
        println!(
            "      row {}: {}{}: {}",
            sample.row,
            field,
            value,
            sample.message.dimmed()
        );
    }
    if result.samples.len() > TEXT_SAMPLES {
        println!("      ... {} more sample(s)", result.samples.len() - TEXT_SAMPLES);
    }
}

fn print_json_report(report: &ValidationReport) -> Result<()> {
    let output = json!({
        "job_name": report.job_name,
        "status": report.status().to_string(),
        "exit_code": report.exit_code(),
        "duration_ms": report.duration_ms,
        "summary": {
            "files": report.files.len(),
            "error_count": report.error_count(),
            "warning_count": report.warning_count(),
        },
        "files": report.files.iter().map(|file| json!({
            "file_name": file.file_name,
            "path": file.path,
            "status": file.status().to_string(),
            "rows_processed": file.rows_processed,
            "cancelled": file.cancelled,
            "errors": file.errors,
            "duration_ms": file.duration_ms,
            "results": file.results,
        })).collect::<Vec<_>>(),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}
