//! Builder pattern for creating validation jobs.
//!
//! This module provides ergonomic builders for constructing jobs, files
//! and rules with a fluent API. Mostly used by tests and embedders that do
//! not go through a configuration file.

use crate::{FileFormat, FileSpec, JobSettings, RuleSpec, Severity, ValidationJob};
use serde_json::Value;

/// Builder for creating a `ValidationJob`.
///
/// # Example
///
/// ```rust
/// use quality_core::JobBuilder;
///
/// let job = JobBuilder::new("nightly")
///     .description("Nightly feed checks")
///     .chunk_size(1_000)
///     .max_sample_failures(5)
///     .build();
/// assert_eq!(job.settings.max_sample_failures, 5);
/// ```
#[derive(Debug)]
pub struct JobBuilder {
    name: String,
    description: Option<String>,
    settings: JobSettings,
    files: Vec<FileSpec>,
}

impl JobBuilder {
    /// Creates a new job builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            settings: JobSettings::default(),
            files: Vec::new(),
        }
    }

    /// Sets the job description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the batch size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.settings.chunk_size = chunk_size;
        self
    }

    /// Sets the per-rule sample cap.
    pub fn max_sample_failures(mut self, max: usize) -> Self {
        self.settings.max_sample_failures = max;
        self
    }

    /// Sets how many files may be processed in parallel.
    pub fn workers(mut self, workers: usize) -> Self {
        self.settings.workers = workers;
        self
    }

    /// Adds a file.
    pub fn file(mut self, file: FileSpec) -> Self {
        self.files.push(file);
        self
    }

    /// Builds the job.
    pub fn build(self) -> ValidationJob {
        ValidationJob {
            name: self.name,
            description: self.description,
            settings: self.settings,
            files: self.files,
        }
    }
}

/// Builder for creating a `FileSpec`.
///
/// # Example
///
/// ```rust
/// use quality_core::{FileFormat, FileSpecBuilder};
///
/// let file = FileSpecBuilder::new("orders", "orders.txt")
///     .format(FileFormat::Csv)
///     .delimiter('|')
///     .build();
/// assert_eq!(file.delimiter, Some('|'));
/// ```
#[derive(Debug)]
pub struct FileSpecBuilder {
    spec: FileSpec,
}

impl FileSpecBuilder {
    /// Creates a new file builder.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            spec: FileSpec::new(name, path),
        }
    }

    /// Sets an explicit format.
    pub fn format(mut self, format: FileFormat) -> Self {
        self.spec.format = Some(format);
        self
    }

    /// Sets the field delimiter.
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.spec.delimiter = Some(delimiter);
        self
    }

    /// Sets whether delimited text has a header row.
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.spec.has_header = has_header;
        self
    }

    /// Sets the text encoding.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.spec.encoding = Some(encoding.into());
        self
    }

    /// Selects a workbook sheet.
    pub fn sheet(mut self, sheet: impl Into<String>) -> Self {
        self.spec.sheet = Some(sheet.into());
        self
    }

    /// Restricts the columns read from the file.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a rule.
    pub fn rule(mut self, rule: RuleSpec) -> Self {
        self.spec.validations.push(rule);
        self
    }

    /// Builds the file spec.
    pub fn build(self) -> FileSpec {
        self.spec
    }
}

/// Builder for creating a `RuleSpec`.
///
/// # Example
///
/// ```rust
/// use quality_core::{RuleSpecBuilder, Severity};
///
/// let rule = RuleSpecBuilder::new("RangeCheck")
///     .param("field", "age")
///     .param("min_value", 0)
///     .param("max_value", 120)
///     .severity(Severity::Warning)
///     .condition("country == 'IT'")
///     .build();
/// assert_eq!(rule.params.len(), 3);
/// ```
#[derive(Debug)]
pub struct RuleSpecBuilder {
    spec: RuleSpec,
}

impl RuleSpecBuilder {
    /// Creates a new rule builder.
    pub fn new(rule_type: impl Into<String>) -> Self {
        Self {
            spec: RuleSpec::new(rule_type),
        }
    }

    /// Sets the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.spec.name = Some(name.into());
        self
    }

    /// Sets the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.spec.severity = severity;
        self
    }

    /// Sets a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.spec.params.insert(key.into(), value.into());
        self
    }

    /// Sets the row condition.
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.spec.condition = Some(condition.into());
        self
    }

    /// Enables or disables the rule.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.spec.enabled = enabled;
        self
    }

    /// Builds the rule spec.
    pub fn build(self) -> RuleSpec {
        self.spec
    }
}
