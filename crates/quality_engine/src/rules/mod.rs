//! Rule families and the built-in catalogue.
//!
//! Rules come in three shapes:
//! - [`RowCheck`]: judges each record on its own
//! - [`AggregateCheck`]: accumulates state over the whole file and decides at the end
//! - [`CrossSourceCheck`]: like an aggregate, but also needs a key set or
//!   aggregate computed from another file before streaming starts
//!
//! The registry hands out a [`Rule`], a closed enum over the three families,
//! so the pipeline dispatches statically once a rule has been built.

pub mod aggregate;
pub mod cross;
pub mod database;
pub mod field;
pub mod temporal;

use crate::query::QueryExecutor;
use crate::reference::{ReferenceData, ReferenceRequest};
use crate::stats::SampleBuffer;
use crate::{Batch, DataValue, RowView};
use chrono::{DateTime, Utc};
use quality_core::FailedRecord;
use std::fmt;

/// The behavioral shape of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleFamily {
    /// Stateless, per record
    Row,
    /// Stateful over the whole file
    Aggregate,
    /// Needs another file's keys or aggregate
    CrossSource,
}

impl fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleFamily::Row => f.write_str("row"),
            RuleFamily::Aggregate => f.write_str("aggregate"),
            RuleFamily::CrossSource => f.write_str("cross-source"),
        }
    }
}

/// Why a single record failed a row check.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub field: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl RowFailure {
    /// A failure not tied to one field.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            value: None,
            message: message.into(),
        }
    }

    /// A failure on `field` holding `value`.
    pub fn on(field: &str, value: &DataValue, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.to_string()),
            value: value.render(),
            message: message.into(),
        }
    }

    fn into_record(self, row: u64) -> FailedRecord {
        FailedRecord {
            row,
            field: self.field,
            value: self.value,
            message: self.message,
        }
    }
}

/// A stateless check applied to every record.
pub trait RowCheck: Send {
    /// What the check enforces, used in result messages.
    fn describe(&self) -> String;

    /// Judges one record.
    fn check(&self, row: &RowView<'_>) -> Option<RowFailure>;

    /// Columns the check reads and expects the file to have.
    ///
    /// A record without one of these is skipped by `check`, so the pipeline
    /// fails the rule outright when the file lacks the column.
    fn fields(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Judges every record of a batch, counting failures into `failures`.
    fn check_batch(&self, batch: &Batch, failures: &mut SampleBuffer) {
        for row in batch.rows() {
            if let Some(failure) = self.check(&row) {
                failures.record(failure.into_record(row.row_number()));
            }
        }
    }
}

/// File-level facts available when an aggregating rule finalizes.
pub struct FinalizeContext<'a> {
    /// Records read from the file, before any condition
    pub rows_processed: u64,
    /// Columns the source exposed
    pub columns: &'a [String],
    /// Size of the file on disk
    pub file_size: Option<u64>,
    /// Sample cap for this job
    pub max_samples: usize,
    /// SQL collaborator
    pub executor: &'a dyn QueryExecutor,
    /// Reference time for freshness checks
    pub now: DateTime<Utc>,
}

/// A check that accumulates state across the whole file.
pub trait AggregateCheck: Send {
    /// Feeds one batch. Called zero or more times, in file order.
    fn consume(&mut self, batch: &Batch);

    /// Produces the verdict. Called exactly once, after the last batch.
    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> Outcome;
}

/// A check that compares this file against another one.
pub trait CrossSourceCheck: Send {
    /// What must be materialized from the reference file.
    fn reference(&self) -> ReferenceRequest;

    /// Receives the materialized reference before streaming starts.
    fn bind(&mut self, reference: ReferenceData);

    /// Feeds one batch of this file.
    fn consume(&mut self, batch: &Batch);

    /// Produces the verdict.
    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> Outcome;
}

/// A constructed rule.
pub enum Rule {
    Row(Box<dyn RowCheck>),
    Aggregate(Box<dyn AggregateCheck>),
    CrossSource(Box<dyn CrossSourceCheck>),
}

impl Rule {
    /// Wraps a row check.
    pub fn row(check: impl RowCheck + 'static) -> Self {
        Rule::Row(Box::new(check))
    }

    /// Wraps an aggregating check.
    pub fn aggregate(check: impl AggregateCheck + 'static) -> Self {
        Rule::Aggregate(Box::new(check))
    }

    /// Wraps a cross-source check.
    pub fn cross_source(check: impl CrossSourceCheck + 'static) -> Self {
        Rule::CrossSource(Box::new(check))
    }

    pub fn family(&self) -> RuleFamily {
        match self {
            Rule::Row(_) => RuleFamily::Row,
            Rule::Aggregate(_) => RuleFamily::Aggregate,
            Rule::CrossSource(_) => RuleFamily::CrossSource,
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Row(check) => write!(f, "Rule::Row({})", check.describe()),
            Rule::Aggregate(_) => f.write_str("Rule::Aggregate"),
            Rule::CrossSource(check) => write!(f, "Rule::CrossSource({:?})", check.reference()),
        }
    }
}

/// Verdict of an aggregating or cross-source rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub passed: bool,
    pub message: String,
    pub failed_count: u64,
    pub total_count: u64,
    pub samples: Vec<FailedRecord>,
}

impl Outcome {
    /// A passing outcome over `total` records.
    pub fn pass(message: impl Into<String>, total: u64) -> Self {
        Self {
            passed: true,
            message: message.into(),
            failed_count: 0,
            total_count: total,
            samples: Vec::new(),
        }
    }

    /// A failing outcome.
    pub fn fail(message: impl Into<String>, failed: u64, total: u64) -> Self {
        Self {
            passed: false,
            message: message.into(),
            failed_count: failed.min(total),
            total_count: total,
            samples: Vec::new(),
        }
    }

    /// Passes or fails on `passed`, keeping the counts as given.
    pub fn judge(passed: bool, message: impl Into<String>, failed: u64, total: u64) -> Self {
        if passed {
            Self {
                failed_count: failed.min(total),
                ..Self::pass(message, total)
            }
        } else {
            Self::fail(message, failed, total)
        }
    }

    /// Attaches failing records.
    pub fn with_samples(mut self, samples: Vec<FailedRecord>) -> Self {
        self.samples = samples;
        self
    }
}

/// Registers every built-in rule.
pub(crate) fn register_builtins(registry: &mut crate::RuleRegistry) {
    field::register(registry);
    aggregate::register(registry);
    temporal::register(registry);
    cross::register(registry);
    database::register(registry);
}

/// Reads the values of `fields` from a record, `None` when a column is absent.
pub(crate) fn row_values<'a>(row: &RowView<'a>, fields: &[String]) -> Option<Vec<&'a DataValue>> {
    fields.iter().map(|f| row.get(f)).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for rule unit tests.

    use super::*;
    use crate::query::NoopExecutor;
    use crate::{Columns, RuleParams, RuleRegistry};
    use serde_json::Value;
    use std::sync::Arc;

    pub fn params(rule_type: &str, value: Value) -> RuleParams {
        match value {
            Value::Object(map) => RuleParams::new(rule_type, map),
            _ => RuleParams::new(rule_type, Default::default()),
        }
    }

    pub fn build(rule_type: &str, value: Value) -> Rule {
        RuleRegistry::with_builtins()
            .create(rule_type, &params(rule_type, value))
            .unwrap()
    }

    pub fn batch(columns: &[&str], rows: Vec<Vec<DataValue>>) -> Batch {
        Batch::from_rows(Arc::new(Columns::new(columns.iter().copied())), rows, 1)
    }

    pub fn text_batch(columns: &[&str], rows: &[&[&str]]) -> Batch {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| if v.is_empty() { DataValue::Null } else { DataValue::from(*v) })
                    .collect()
            })
            .collect();
        batch(columns, rows)
    }

    pub struct RowRun {
        pub failed: u64,
        pub samples: Vec<FailedRecord>,
    }

    pub fn run_row(rule: &Rule, batch: &Batch) -> RowRun {
        let Rule::Row(check) = rule else {
            panic!("expected a row rule, got {:?}", rule);
        };
        let mut buffer = SampleBuffer::new(100);
        check.check_batch(batch, &mut buffer);
        RowRun {
            failed: buffer.failed(),
            samples: buffer.take_samples(),
        }
    }

    pub fn context<'a>(columns: &'a [String], rows: u64, executor: &'a NoopExecutor) -> FinalizeContext<'a> {
        FinalizeContext {
            rows_processed: rows,
            columns,
            file_size: None,
            max_samples: 100,
            executor,
            now: Utc::now(),
        }
    }

    pub fn run_aggregate(rule: &mut Rule, batches: &[Batch]) -> Outcome {
        let Rule::Aggregate(check) = rule else {
            panic!("expected an aggregate rule, got {:?}", rule);
        };
        let columns: Vec<String> = batches
            .first()
            .map(|b| b.columns().names().to_vec())
            .unwrap_or_default();
        let rows = batches.iter().map(|b| b.len() as u64).sum();
        for batch in batches {
            check.consume(batch);
        }
        let executor = NoopExecutor;
        check.finalize(&context(&columns, rows, &executor))
    }
}
