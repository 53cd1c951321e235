//! Error types for validation job definitions.
//!
//! A `ConfigError` means the job itself is malformed. It is always raised
//! before any data is read and aborts the whole run.

use thiserror::Error;

/// Result type for job definition checks.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Malformed job, file or rule definition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Job has no name
    #[error("Validation job name must not be empty")]
    EmptyJobName,

    /// A global setting is out of range
    #[error("Invalid setting '{setting}': {message}")]
    InvalidSetting {
        /// Setting key (e.g., "chunk_size")
        setting: String,
        /// Why the value was rejected
        message: String,
    },

    /// A file entry has no name
    #[error("File entry #{index} has an empty name")]
    EmptyFileName {
        /// Position of the file in the job (0-based)
        index: usize,
    },

    /// A file entry has no path
    #[error("File '{0}' has an empty path")]
    EmptyPath(String),

    /// Two file entries share a name
    #[error("Duplicate file name '{0}'")]
    DuplicateFile(String),

    /// A rule entry has no type
    #[error("Rule #{index} in file '{file}' has an empty type")]
    EmptyRuleType {
        /// Owning file
        file: String,
        /// Position of the rule in the file (0-based)
        index: usize,
    },

    /// A cross-source rule names a file that is not part of the job
    #[error("Rule '{rule}' in file '{file}' references unknown file '{reference}'")]
    UnknownReference {
        /// Owning file
        file: String,
        /// Rule display name
        rule: String,
        /// Referenced file name
        reference: String,
    },

    /// Generic configuration error
    #[error("{0}")]
    Other(String),
}

impl ConfigError {
    /// Creates a new invalid setting error.
    pub fn invalid_setting(setting: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            setting: setting.into(),
            message: message.into(),
        }
    }
}
