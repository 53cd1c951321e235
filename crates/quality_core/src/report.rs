//! Validation results and reports.
//!
//! Reports are produced by the engine and handed to renderers untouched.
//! Statuses are always derived from the results, never stored.

use crate::Severity;
use serde::{Deserialize, Serialize};

/// Exit code for a PASSED (or WARNING-only) job.
pub const EXIT_PASSED: i32 = 0;

/// Exit code when an ERROR-severity rule failed.
pub const EXIT_FAILED: i32 = 1;

/// Exit code for configuration or runtime errors.
pub const EXIT_ERROR: i32 = 2;

/// Verdict for a file or a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// No rule failed
    Passed,
    /// Only WARNING-severity rules failed
    Warning,
    /// At least one ERROR-severity rule failed
    Failed,
    /// Processing stopped on a cancellation request
    Cancelled,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Status::Passed => "PASSED",
            Status::Warning => "WARNING",
            Status::Failed => "FAILED",
            Status::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// One failing record kept as evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    /// 1-based record number within the file
    pub row: u64,

    /// Offending field, when the failure is field-specific
    pub field: Option<String>,

    /// Offending value rendered as text
    pub value: Option<String>,

    /// Why the record failed
    pub message: String,
}

/// Outcome of one rule on one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Display name of the rule
    pub rule_name: String,

    /// Registry key of the rule
    pub rule_type: String,

    /// Severity configured for the rule
    pub severity: Severity,

    /// Whether the rule passed
    pub passed: bool,

    /// Human-readable summary
    pub message: String,

    /// Records that failed (never greater than `total_count`)
    pub failed_count: u64,

    /// Records the rule considered
    pub total_count: u64,

    /// Bounded sample of failing records
    pub samples: Vec<FailedRecord>,
}

impl ValidationResult {
    /// Builds a failed result that carries only a diagnostic message.
    ///
    /// Used when a rule could not be built or could not run.
    pub fn errored(
        rule_name: impl Into<String>,
        rule_type: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            rule_type: rule_type.into(),
            severity,
            passed: false,
            message: message.into(),
            failed_count: 0,
            total_count: 0,
            samples: Vec::new(),
        }
    }

    /// True if this result failed with ERROR severity.
    pub fn is_error(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }

    /// True if this result failed with WARNING severity.
    pub fn is_warning(&self) -> bool {
        !self.passed && self.severity == Severity::Warning
    }

    /// Fraction of considered records that failed, 0.0 for no records.
    pub fn failure_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.failed_count as f64 / self.total_count as f64
        }
    }
}

/// Results for a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileValidationReport {
    /// Logical file name
    pub file_name: String,

    /// Path that was read
    pub path: String,

    /// Rule results, in rule declaration order
    pub results: Vec<ValidationResult>,

    /// Records streamed from the file
    pub rows_processed: u64,

    /// Whether processing stopped early on cancellation
    pub cancelled: bool,

    /// File-level diagnostics (unreadable source, bad rule configuration)
    pub errors: Vec<String>,

    /// Wall-clock time spent on the file
    pub duration_ms: u64,
}

impl FileValidationReport {
    /// Creates an empty report for a file.
    pub fn new(file_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            path: path.into(),
            results: Vec::new(),
            rows_processed: 0,
            cancelled: false,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Derived status of the file.
    pub fn status(&self) -> Status {
        if self.cancelled {
            Status::Cancelled
        } else if self.results.iter().any(ValidationResult::is_error) {
            Status::Failed
        } else if self.results.iter().any(ValidationResult::is_warning) {
            Status::Warning
        } else {
            Status::Passed
        }
    }

    /// Number of failed ERROR-severity results.
    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }

    /// Number of failed WARNING-severity results.
    pub fn warning_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_warning()).count()
    }

    /// Looks up a result by rule name.
    pub fn result(&self, rule_name: &str) -> Option<&ValidationResult> {
        self.results.iter().find(|r| r.rule_name == rule_name)
    }
}

/// Results for a whole job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Job name
    pub job_name: String,

    /// Per-file reports, in job declaration order
    pub files: Vec<FileValidationReport>,

    /// Wall-clock time for the run
    pub duration_ms: u64,
}

impl ValidationReport {
    /// Creates a report from per-file reports.
    pub fn new(job_name: impl Into<String>, files: Vec<FileValidationReport>) -> Self {
        Self {
            job_name: job_name.into(),
            files,
            duration_ms: 0,
        }
    }

    /// Overall job verdict.
    ///
    /// Cancellation outranks everything; otherwise any ERROR failure fails
    /// the job, and WARNING failures alone yield WARNING.
    pub fn status(&self) -> Status {
        let statuses: Vec<Status> = self.files.iter().map(|f| f.status()).collect();
        if statuses.contains(&Status::Cancelled) {
            Status::Cancelled
        } else if statuses.contains(&Status::Failed) {
            Status::Failed
        } else if statuses.contains(&Status::Warning) {
            Status::Warning
        } else {
            Status::Passed
        }
    }

    /// Failed ERROR-severity results across all files.
    pub fn error_count(&self) -> usize {
        self.files.iter().map(|f| f.error_count()).sum()
    }

    /// Failed WARNING-severity results across all files.
    pub fn warning_count(&self) -> usize {
        self.files.iter().map(|f| f.warning_count()).sum()
    }

    /// Whether any file carries a configuration or runtime diagnostic.
    pub fn has_diagnostics(&self) -> bool {
        self.files.iter().any(|f| !f.errors.is_empty())
    }

    /// Process exit code for this report.
    pub fn exit_code(&self) -> i32 {
        match self.status() {
            Status::Cancelled => EXIT_ERROR,
            _ if self.has_diagnostics() => EXIT_ERROR,
            Status::Failed => EXIT_FAILED,
            Status::Warning | Status::Passed => EXIT_PASSED,
        }
    }

    /// Looks up a file report by name.
    pub fn file(&self, name: &str) -> Option<&FileValidationReport> {
        self.files.iter().find(|f| f.file_name == name)
    }
}
