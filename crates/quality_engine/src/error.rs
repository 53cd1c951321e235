//! Error types for validation operations.
//!
//! Only `EngineError` aborts a run. Every other error is caught by the
//! engine and recorded against the file or rule it belongs to.

use quality_core::ConfigError;
use thiserror::Error;

/// A data file could not be opened or read.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    /// File does not exist
    #[error("File not found: {path}")]
    NotFound { path: String },

    /// File exists but cannot be read
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    /// File content does not match its format
    #[error("Malformed {format} data in {path}: {message}")]
    Malformed {
        path: String,
        format: String,
        message: String,
    },

    /// Text is not valid in the declared encoding
    #[error("Encoding error in {path}: {message}")]
    Encoding { path: String, message: String },

    /// No adapter for the declared or inferred format
    #[error("Unsupported format for {path}: {message}")]
    UnsupportedFormat { path: String, message: String },

    /// Other I/O failure
    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },
}

impl SourceError {
    /// Maps an I/O error to the matching source error.
    pub fn from_io(path: impl Into<String>, err: &std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::InvalidData => Self::Encoding {
                path,
                message: err.to_string(),
            },
            _ => Self::Io {
                path,
                message: err.to_string(),
            },
        }
    }

    /// Creates a new malformed-data error.
    pub fn malformed(
        path: impl Into<String>,
        format: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Malformed {
            path: path.into(),
            format: format.into(),
            message: message.into(),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encoding {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A condition expression is invalid.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConditionError {
    /// Expression does not follow the grammar
    #[error("Syntax error in condition '{expression}' at position {position}: {message}")]
    Syntax {
        expression: String,
        position: usize,
        message: String,
    },

    /// Expression references a column the file does not declare
    #[error("Condition references unknown field '{field}'")]
    UnknownField { field: String },
}

/// A rule could not be constructed from its parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuleConfigError {
    /// Required parameter is absent
    #[error("{rule}: missing required parameter '{param}'")]
    MissingParameter { rule: String, param: String },

    /// Parameter has the wrong type or an invalid value
    #[error("{rule}: invalid parameter '{param}': {message}")]
    InvalidParameter {
        rule: String,
        param: String,
        message: String,
    },

    /// No constructor registered under this name
    #[error("Unknown rule type '{name}'{}", suggestion_hint(.suggestion))]
    UnknownRuleType {
        name: String,
        suggestion: Option<String>,
    },

    /// The rule's condition is invalid
    #[error("Invalid condition: {0}")]
    Condition(#[from] ConditionError),
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{}'?)", name),
        None => String::new(),
    }
}

impl RuleConfigError {
    /// Creates a new missing parameter error.
    pub fn missing(rule: impl Into<String>, param: impl Into<String>) -> Self {
        Self::MissingParameter {
            rule: rule.into(),
            param: param.into(),
        }
    }

    /// Creates a new invalid parameter error.
    pub fn invalid(
        rule: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            rule: rule.into(),
            param: param.into(),
            message: message.into(),
        }
    }
}

/// A SQL collaborator failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    /// Could not connect to the database
    #[error("Connection error: {0}")]
    Connection(String),

    /// The query was rejected
    #[error("Query error: {0}")]
    QuerySyntax(String),
}

/// Errors that abort a whole validation run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The job definition is malformed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cross-source references form a cycle
    #[error("Circular cross-source reference: {}", .cycle.join(" -> "))]
    CircularReference { cycle: Vec<String> },

    /// A file task could not be joined
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl EngineError {
    /// Process exit code for an aborted run.
    pub fn exit_code(&self) -> i32 {
        quality_core::EXIT_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_rule_type_message() {
        let err = RuleConfigError::UnknownRuleType {
            name: "MandatoryFeildCheck".to_string(),
            suggestion: Some("MandatoryFieldCheck".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Unknown rule type 'MandatoryFeildCheck' (did you mean 'MandatoryFieldCheck'?)"
        );

        let err = RuleConfigError::UnknownRuleType {
            name: "X".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Unknown rule type 'X'");
    }

    #[test]
    fn test_io_mapping() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(
            SourceError::from_io("a.csv", &err),
            SourceError::NotFound {
                path: "a.csv".to_string()
            }
        );
    }

    #[test]
    fn test_cycle_message() {
        let err = EngineError::CircularReference {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Circular cross-source reference: a -> b -> a");
    }
}
