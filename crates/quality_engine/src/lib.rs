//! # Data Quality Engine
//!
//! Streaming validation engine. Given a [`quality_core::ValidationJob`], it
//! reads every file in bounded batches and evaluates the job's rules in one
//! pass per file:
//!
//! - Field rules (presence, patterns, ranges, formats, types)
//! - Aggregate rules (uniqueness, completeness, statistics, freshness)
//! - Cross-source rules (referential integrity, cross-file comparison)
//! - SQL-backed rules against an external database
//!
//! Files are processed in parallel. A file that other files reference is
//! always finished first.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quality_core::{FileSpecBuilder, JobBuilder, RuleSpecBuilder};
//! use quality_engine::ValidationEngine;
//!
//! # async fn run() -> Result<(), quality_engine::EngineError> {
//! let job = JobBuilder::new("customers_daily")
//!     .file(
//!         FileSpecBuilder::new("customers", "data/customers.csv")
//!             .rule(
//!                 RuleSpecBuilder::new("MandatoryFieldCheck")
//!                     .param("fields", vec!["email"])
//!                     .build(),
//!             )
//!             .build(),
//!     )
//!     .build();
//!
//! let report = ValidationEngine::new().run(job).await?;
//! println!("{}: {}", report.job_name, report.status());
//! # Ok(())
//! # }
//! ```

mod batch;
mod engine;
mod error;
mod params;
mod registry;
mod value;

pub mod condition;
pub mod pipeline;
pub mod query;
pub mod reference;
pub mod rules;
pub mod source;
pub mod stats;

pub use batch::*;
pub use engine::*;
pub use error::*;
pub use params::*;
pub use registry::*;
pub use value::*;

pub use condition::{CompiledPredicate, compile, compile_with_columns};
pub use query::{NoopExecutor, QueryExecutor, QueryRow, default_executor};
pub use rules::{AggregateCheck, CrossSourceCheck, FinalizeContext, Outcome, RowCheck, RowFailure, Rule, RuleFamily};
pub use stats::SampleBuffer;

#[cfg(feature = "sqlite")]
pub use query::SqliteExecutor;
