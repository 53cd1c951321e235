//! Validation job types.
//!
//! A job is immutable once constructed. The engine only ever borrows it.

use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

/// Parameter key through which cross-source rules name their reference file.
pub const REFERENCE_FILE_PARAM: &str = "reference_file";

/// Default number of records per batch.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Default cap on failing records kept per rule.
pub const DEFAULT_MAX_SAMPLE_FAILURES: usize = 100;

/// A complete validation job.
///
/// # Example
///
/// ```rust
/// use quality_core::{FileSpec, JobSettings, ValidationJob};
///
/// let job = ValidationJob {
///     name: "nightly".to_string(),
///     description: None,
///     settings: JobSettings::default(),
///     files: vec![FileSpec::new("orders", "orders.csv")],
/// };
/// assert_eq!(job.settings.chunk_size, 50_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationJob {
    /// Job name, shown in reports
    pub name: String,

    /// Optional human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Global settings
    #[serde(default)]
    pub settings: JobSettings,

    /// Files to validate, in declaration order
    #[serde(default)]
    pub files: Vec<FileSpec>,
}

/// Global settings for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    /// Records per batch
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum failing records sampled per rule
    #[serde(default = "default_max_sample_failures")]
    pub max_sample_failures: usize,

    /// Files processed in parallel
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_sample_failures() -> usize {
    DEFAULT_MAX_SAMPLE_FAILURES
}

fn default_workers() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_sample_failures: DEFAULT_MAX_SAMPLE_FAILURES,
            workers: 1,
        }
    }
}

/// Physical format of a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Comma (or custom) delimited text
    Csv,
    /// Tab delimited text
    Tsv,
    /// JSON array of objects, or JSON Lines
    Json,
    /// JSON Lines (one object per line)
    #[serde(alias = "ndjson")]
    Jsonl,
    /// Apache Parquet
    Parquet,
    /// Spreadsheet workbook
    #[serde(alias = "xlsx", alias = "xls")]
    Excel,
    /// Apache Avro object container
    Avro,
}

impl FileFormat {
    /// Maps a file extension to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "csv" | "txt" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::Jsonl),
            "parquet" | "pq" => Some(Self::Parquet),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            "avro" => Some(Self::Avro),
            _ => None,
        }
    }

    /// Infers the format from a path's extension.
    pub fn infer(path: &str) -> Option<Self> {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Lowercase name of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Json => "json",
            Self::Jsonl => "jsonl",
            Self::Parquet => "parquet",
            Self::Excel => "excel",
            Self::Avro => "avro",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One data file and the rules applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSpec {
    /// Logical name, unique within the job
    pub name: String,

    /// Path or URI of the data
    pub path: String,

    /// Explicit format; inferred from the extension when absent
    #[serde(default)]
    pub format: Option<FileFormat>,

    /// Field delimiter for delimited text
    #[serde(default)]
    pub delimiter: Option<char>,

    /// Whether delimited text starts with a header row
    #[serde(default = "default_true")]
    pub has_header: bool,

    /// Text encoding (e.g., "utf-8", "latin-1")
    #[serde(default)]
    pub encoding: Option<String>,

    /// Sheet name for spreadsheet workbooks
    #[serde(default)]
    pub sheet: Option<String>,

    /// Column projection applied at read time
    #[serde(default)]
    pub columns: Option<Vec<String>>,

    /// Rules, in declaration order
    #[serde(default, alias = "rules")]
    pub validations: Vec<RuleSpec>,
}

impl FileSpec {
    /// Creates a file spec with default options and no rules.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            format: None,
            delimiter: None,
            has_header: true,
            encoding: None,
            sheet: None,
            columns: None,
            validations: Vec::new(),
        }
    }

    /// The explicit format, or the one inferred from the path.
    pub fn resolved_format(&self) -> Option<FileFormat> {
        self.format.or_else(|| FileFormat::infer(&self.path))
    }

    /// Rules with `enabled: true`, paired with their declaration index.
    pub fn enabled_rules(&self) -> impl Iterator<Item = (usize, &RuleSpec)> {
        self.validations
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.enabled)
    }
}

/// Rule severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// A failure fails the job
    #[default]
    #[serde(alias = "error")]
    Error,
    /// A failure is recorded but does not fail the job
    #[serde(alias = "warning", alias = "WARN", alias = "warn")]
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => f.write_str("ERROR"),
            Severity::Warning => f.write_str("WARNING"),
        }
    }
}

/// Declarative rule entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Registry key of the rule type (e.g., "MandatoryFieldCheck")
    #[serde(rename = "type")]
    pub rule_type: String,

    /// Optional display name; defaults to the type
    #[serde(default)]
    pub name: Option<String>,

    /// Severity of a failure
    #[serde(default)]
    pub severity: Severity,

    /// Rule parameters
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Optional predicate restricting the rows the rule sees
    #[serde(default)]
    pub condition: Option<String>,

    /// Disabled rules never produce a result
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RuleSpec {
    /// Creates an enabled ERROR rule with no parameters.
    pub fn new(rule_type: impl Into<String>) -> Self {
        Self {
            rule_type: rule_type.into(),
            name: None,
            severity: Severity::Error,
            params: Map::new(),
            condition: None,
            enabled: true,
        }
    }

    /// Name used in results: the explicit name, else the type.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.rule_type)
    }

    /// The file this rule reads as a reference, if any.
    pub fn reference_file(&self) -> Option<&str> {
        self.params
            .get(REFERENCE_FILE_PARAM)
            .and_then(Value::as_str)
    }
}

impl ValidationJob {
    /// Looks up a file by logical name.
    pub fn file(&self, name: &str) -> Option<&FileSpec> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Position of a file by logical name.
    pub fn file_index(&self, name: &str) -> Option<usize> {
        self.files.iter().position(|f| f.name == name)
    }

    /// Checks the shape of the job.
    ///
    /// Reports the first problem found. Rule parameters and conditions are
    /// not inspected here; that needs the rule registry.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyJobName);
        }

        let settings = &self.settings;
        if settings.chunk_size == 0 {
            return Err(ConfigError::invalid_setting(
                "chunk_size",
                "must be a positive integer",
            ));
        }
        if settings.max_sample_failures == 0 {
            return Err(ConfigError::invalid_setting(
                "max_sample_failures",
                "must be a positive integer",
            ));
        }
        if settings.workers == 0 {
            return Err(ConfigError::invalid_setting(
                "workers",
                "must be a positive integer",
            ));
        }

        let mut seen = HashSet::new();
        for (index, file) in self.files.iter().enumerate() {
            if file.name.trim().is_empty() {
                return Err(ConfigError::EmptyFileName { index });
            }
            if file.path.trim().is_empty() {
                return Err(ConfigError::EmptyPath(file.name.clone()));
            }
            if !seen.insert(file.name.as_str()) {
                return Err(ConfigError::DuplicateFile(file.name.clone()));
            }
            for (index, rule) in file.validations.iter().enumerate() {
                if rule.rule_type.trim().is_empty() {
                    return Err(ConfigError::EmptyRuleType {
                        file: file.name.clone(),
                        index,
                    });
                }
            }
        }

        for file in &self.files {
            for (_, rule) in file.enabled_rules() {
                if let Some(reference) = rule.reference_file() {
                    if self.file(reference).is_none() {
                        return Err(ConfigError::UnknownReference {
                            file: file.name.clone(),
                            rule: rule.display_name().to_string(),
                            reference: reference.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
