//! # Data Quality Core
//!
//! Core data structures for the Data Quality Engine.
//!
//! This crate holds the declarative side of a validation run: what to read,
//! which rules to apply, and the shape of the verdict that comes back. It has
//! no knowledge of file formats or rule logic; those live in `quality_engine`.
//!
//! ## Key Concepts
//!
//! - **ValidationJob**: a named, ordered list of files with global settings
//! - **FileSpec**: one data file, its format options and its rules
//! - **RuleSpec**: a rule type name, severity, parameters and optional condition
//! - **ValidationReport**: per-file results and the derived job verdict
//!
//! ## Example
//!
//! ```rust
//! use quality_core::{FileSpecBuilder, JobBuilder, RuleSpecBuilder, Severity};
//!
//! let job = JobBuilder::new("customers_daily")
//!     .chunk_size(10_000)
//!     .file(
//!         FileSpecBuilder::new("customers", "data/customers.csv")
//!             .rule(
//!                 RuleSpecBuilder::new("MandatoryFieldCheck")
//!                     .param("fields", vec!["email"])
//!                     .severity(Severity::Error)
//!                     .build(),
//!             )
//!             .build(),
//!     )
//!     .build();
//!
//! assert!(job.validate().is_ok());
//! ```

pub mod builder;
pub mod error;
pub mod job;
pub mod report;

pub use builder::*;
pub use error::*;
pub use job::*;
pub use report::*;
