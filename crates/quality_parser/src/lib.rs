//! Parser for Data Quality Engine job files (YAML/TOML/JSON formats).
//!
//! This module turns job configuration text into the strongly-typed
//! `ValidationJob` structure. Parsing also runs the job's shape checks, so a
//! successfully parsed job is ready to hand to the engine.
//!
//! Two layouts are accepted: a flat one with `name` at the top level, and a
//! sectioned one with the job header under `validation_job`.
//!
//! # Example
//!
//! ```rust
//! use quality_parser::parse_yaml;
//!
//! let yaml = r#"
//! validation_job:
//!   name: customers_daily
//! settings:
//!   chunk_size: 1000
//! files:
//!   - name: customers
//!     path: data/customers.csv
//!     validations:
//!       - type: MandatoryFieldCheck
//!         params:
//!           fields: [email]
//! "#;
//!
//! let job = parse_yaml(yaml).expect("Failed to parse job");
//! assert_eq!(job.name, "customers_daily");
//! assert_eq!(job.files[0].validations.len(), 1);
//! ```

use quality_core::{ConfigError, FileSpec, JobSettings, ValidationJob};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Reasons a job file could not be turned into a [`ValidationJob`].
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Malformed YAML job: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("Malformed TOML job: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Malformed JSON job: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot read job file: {0}")]
    Io(#[from] std::io::Error),

    /// Extension is present but not one of yml, yaml, toml or json.
    #[error("Job files ending in '.{0}' are not supported")]
    UnknownExtension(String),

    #[error("Job file has no extension to infer its format from")]
    MissingExtension,

    /// Neither `name` nor `validation_job.name` was given
    #[error("Job name is missing (set 'name' or 'validation_job.name')")]
    MissingName,

    #[error("Invalid job configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ParserError>;

/// Supported job file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yml` / `.yaml`
    Yaml,
    Toml,
    Json,
}

#[derive(Debug, Deserialize)]
struct JobHeader {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobDocument {
    #[serde(default)]
    validation_job: Option<JobHeader>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    settings: JobSettings,
    #[serde(default)]
    files: Vec<FileSpec>,
}

impl JobDocument {
    fn into_job(self) -> Result<ValidationJob> {
        let (name, description) = match self.validation_job {
            Some(header) => (header.name, header.description.or(self.description)),
            None => (self.name.ok_or(ParserError::MissingName)?, self.description),
        };

        let job = ValidationJob {
            name,
            description,
            settings: self.settings,
            files: self.files,
        };
        job.validate()?;
        Ok(job)
    }
}

/// Parse a job from a YAML string.
///
/// # Example
///
/// ```rust
/// use quality_parser::parse_yaml;
///
/// let job = parse_yaml("name: empty_job\n").unwrap();
/// assert!(job.files.is_empty());
/// ```
pub fn parse_yaml(content: &str) -> Result<ValidationJob> {
    let document: JobDocument = serde_yaml_ng::from_str(content)?;
    document.into_job()
}

/// Parse a job from a TOML string.
///
/// # Example
///
/// ```rust
/// use quality_parser::parse_toml;
///
/// let toml = r#"
/// name = "orders"
///
/// [[files]]
/// name = "orders"
/// path = "orders.parquet"
///
/// [[files.validations]]
/// type = "RowCountRangeCheck"
/// params = { min_rows = 1 }
/// "#;
///
/// let job = parse_toml(toml).unwrap();
/// assert_eq!(job.files[0].validations[0].rule_type, "RowCountRangeCheck");
/// ```
pub fn parse_toml(content: &str) -> Result<ValidationJob> {
    let document: JobDocument = toml::from_str(content)?;
    document.into_job()
}

/// Parse a job from a JSON string.
pub fn parse_json(content: &str) -> Result<ValidationJob> {
    let document: JobDocument = serde_json::from_str(content)?;
    document.into_job()
}

/// Maps a job file's extension (case-insensitive) to its [`ConfigFormat`].
///
/// Fails with [`ParserError::MissingExtension`] or
/// [`ParserError::UnknownExtension`].
pub fn detect_format(path: &Path) -> Result<ConfigFormat> {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return Err(ParserError::MissingExtension);
    };

    if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") {
        Ok(ConfigFormat::Yaml)
    } else if ext.eq_ignore_ascii_case("toml") {
        Ok(ConfigFormat::Toml)
    } else if ext.eq_ignore_ascii_case("json") {
        Ok(ConfigFormat::Json)
    } else {
        Err(ParserError::UnknownExtension(ext.to_owned()))
    }
}

/// Parse a job from a file with automatic format detection.
///
/// Relative data paths in the job are resolved against the directory that
/// contains the job file. Absolute paths and URIs are left untouched.
///
/// # Example
///
/// ```no_run
/// use quality_parser::parse_file;
/// use std::path::Path;
///
/// let job = parse_file(Path::new("jobs/customers.yml")).unwrap();
/// println!("Loaded job: {}", job.name);
/// ```
pub fn parse_file(path: &Path) -> Result<ValidationJob> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    let mut job = match format {
        ConfigFormat::Yaml => parse_yaml(&content)?,
        ConfigFormat::Toml => parse_toml(&content)?,
        ConfigFormat::Json => parse_json(&content)?,
    };

    if let Some(base) = path.parent() {
        resolve_paths(&mut job, base);
    }

    Ok(job)
}

/// Rewrites relative file paths so they are relative to `base`.
pub fn resolve_paths(job: &mut ValidationJob, base: &Path) {
    for file in &mut job.files {
        if file.path.contains("://") || Path::new(&file.path).is_absolute() {
            continue;
        }
        file.path = base.join(&file.path).to_string_lossy().into_owned();
    }
}
