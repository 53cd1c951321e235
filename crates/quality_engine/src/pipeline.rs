//! Per-file validation pipeline.
//!
//! A file moves through `Init -> Streaming -> Finalizing -> Reported`:
//!
//! - `Init` builds every enabled rule (compiling its condition), loads the
//!   references cross-source rules need, and opens the source
//! - `Streaming` pulls batches in order and hands each one to every rule,
//!   filtered through the rule's condition first
//! - `Finalizing` asks each aggregating rule for its verdict, in
//!   declaration order
//! - `Reported` assembles the [`FileValidationReport`]
//!
//! Failures stay as local as possible: a rule that cannot be built or
//! whose reference cannot be loaded fails alone, and a file that cannot be
//! read fails all of its rules without touching other files.

use crate::condition::{CompiledPredicate, compile, compile_with_columns};
use crate::query::QueryExecutor;
use crate::reference::resolve_reference;
use crate::rules::{AggregateCheck, CrossSourceCheck, FinalizeContext, Outcome, RowCheck, Rule};
use crate::source::{ChunkSource, file_size, open_source};
use crate::stats::SampleBuffer;
use crate::{Batch, RuleConfigError, RuleParams, RuleRegistry};
use chrono::Utc;
use quality_core::{FileSpec, FileValidationReport, RuleSpec, ValidationJob, ValidationResult};
use std::borrow::Cow;
use std::fmt;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Init,
    Streaming,
    Finalizing,
    Reported,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileState::Init => "init",
            FileState::Streaming => "streaming",
            FileState::Finalizing => "finalizing",
            FileState::Reported => "reported",
        };
        f.write_str(name)
    }
}

/// Everything a file pipeline borrows from the run.
pub struct PipelineContext<'a> {
    pub job: &'a ValidationJob,
    pub registry: &'a RuleRegistry,
    pub executor: &'a dyn QueryExecutor,
    pub cancel: &'a CancellationToken,
}

/// Builds one rule from its spec, compiling its condition.
///
/// `columns` is the declared projection, used to reject conditions on
/// columns the file will never have.
pub fn build_rule(
    registry: &RuleRegistry,
    spec: &RuleSpec,
    columns: Option<&[String]>,
    max_samples: usize,
) -> Result<(Rule, Option<CompiledPredicate>), RuleConfigError> {
    let condition = match (&spec.condition, columns) {
        (None, _) => None,
        (Some(expression), Some(columns)) => Some(compile_with_columns(expression, columns)?),
        (Some(expression), None) => Some(compile(expression)?),
    };
    let params = RuleParams::new(&spec.rule_type, spec.params.clone()).with_max_samples(max_samples);
    let rule = registry.create(&spec.rule_type, &params)?;
    Ok((rule, condition))
}

enum Check {
    Row {
        check: Box<dyn RowCheck>,
        failures: SampleBuffer,
        considered: u64,
    },
    Aggregate(Box<dyn AggregateCheck>),
    CrossSource(Box<dyn CrossSourceCheck>),
}

struct ActiveRule<'a> {
    spec: &'a RuleSpec,
    condition: Option<CompiledPredicate>,
    check: Check,
}

impl ActiveRule<'_> {
    fn consume(&mut self, batch: &Batch) {
        let view = match &self.condition {
            Some(condition) => Cow::Owned(batch.filter(&condition.evaluate(batch))),
            None => Cow::Borrowed(batch),
        };
        match &mut self.check {
            Check::Row {
                check,
                failures,
                considered,
            } => {
                *considered += view.len() as u64;
                check.check_batch(&view, failures);
            }
            Check::Aggregate(check) => check.consume(&view),
            Check::CrossSource(check) => check.consume(&view),
        }
    }

    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> ValidationResult {
        let outcome = match &mut self.check {
            Check::Row {
                check,
                failures,
                considered,
            } => {
                if let Some(column) = absent_column(check.fields(), ctx) {
                    Outcome::fail(format!("Column '{}' not found in file", column), 0, *considered)
                } else {
                    let failed = failures.failed();
                    let message = if failed == 0 {
                        format!("All {} record(s) satisfy {}", considered, check.describe())
                    } else {
                        format!("{} of {} record(s) violate {}", failed, considered, check.describe())
                    };
                    Outcome::judge(failed == 0, message, failed, *considered).with_samples(failures.take_samples())
                }
            }
            Check::Aggregate(check) => check.finalize(ctx),
            Check::CrossSource(check) => check.finalize(ctx),
        };
        into_result(self.spec, outcome, ctx.max_samples)
    }
}

/// First field the file does not have. A file that exposed no columns and
/// no records is not judged, since its shape is unknown.
fn absent_column<'f>(fields: Vec<&'f str>, ctx: &FinalizeContext<'_>) -> Option<&'f str> {
    if ctx.columns.is_empty() && ctx.rows_processed == 0 {
        return None;
    }
    fields.into_iter().find(|field| !ctx.columns.iter().any(|c| c == field))
}

fn into_result(spec: &RuleSpec, outcome: Outcome, max_samples: usize) -> ValidationResult {
    let mut samples = outcome.samples;
    samples.truncate(max_samples);
    ValidationResult {
        rule_name: spec.display_name().to_string(),
        rule_type: spec.rule_type.clone(),
        severity: spec.severity,
        passed: outcome.passed,
        message: outcome.message,
        failed_count: outcome.failed_count.min(outcome.total_count),
        total_count: outcome.total_count,
        samples,
    }
}

fn errored(spec: &RuleSpec, message: impl Into<String>) -> ValidationResult {
    ValidationResult::errored(spec.display_name(), &spec.rule_type, spec.severity, message)
}

/// A rule slot: either still running, or already decided during `Init`.
enum Slot<'a> {
    Active(ActiveRule<'a>),
    Done(ValidationResult),
}

/// Runs one file through the pipeline.
///
/// Never fails: every problem ends up in the returned report.
pub fn run_file(ctx: &PipelineContext<'_>, spec: &FileSpec) -> FileValidationReport {
    let started = Instant::now();
    let mut report = FileValidationReport::new(&spec.name, &spec.path);
    let settings = &ctx.job.settings;
    let max_samples = settings.max_sample_failures;

    info!(file = %spec.name, state = %FileState::Init, "processing file");

    let mut slots: Vec<Slot<'_>> = Vec::new();
    for (_, rule_spec) in spec.enabled_rules() {
        let slot = match build_rule(ctx.registry, rule_spec, spec.columns.as_deref(), max_samples) {
            Ok((rule, condition)) => init_rule(ctx, rule_spec, rule, condition, &mut report),
            Err(err) => {
                warn!(file = %spec.name, rule = %rule_spec.display_name(), error = %err, "rule could not be built");
                report
                    .errors
                    .push(format!("rule '{}': {}", rule_spec.display_name(), err));
                Slot::Done(errored(rule_spec, format!("Rule configuration error: {}", err)))
            }
        };
        slots.push(slot);
    }

    if ctx.cancel.is_cancelled() {
        return cancelled(report, slots, started);
    }

    let mut source = match open_source(spec, settings.chunk_size) {
        Ok(source) => source,
        Err(err) => {
            warn!(file = %spec.name, error = %err, "source could not be opened");
            report.errors.push(err.to_string());
            report.results = fail_active(slots, &format!("File could not be read: {}", err));
            return finish(report, started);
        }
    };

    debug!(file = %spec.name, state = %FileState::Streaming, "streaming");
    match stream(ctx, spec, source.as_mut(), &mut slots, &mut report) {
        Ok(true) => {}
        Ok(false) => return cancelled(report, slots, started),
        Err(message) => {
            report.results = fail_active(slots, &message);
            return finish(report, started);
        }
    }

    debug!(file = %spec.name, state = %FileState::Finalizing, rows = report.rows_processed, "finalizing");
    let columns = source.columns().names().to_vec();
    let finalize_ctx = FinalizeContext {
        rows_processed: report.rows_processed,
        columns: &columns,
        file_size: file_size(&spec.path),
        max_samples,
        executor: ctx.executor,
        now: Utc::now(),
    };

    let mut results = Vec::with_capacity(slots.len());
    for slot in slots {
        if ctx.cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        results.push(match slot {
            Slot::Active(mut rule) => rule.finalize(&finalize_ctx),
            Slot::Done(result) => result,
        });
    }
    report.results = results;

    finish(report, started)
}

/// Turns a built rule into a slot, loading its reference if it needs one.
fn init_rule<'a>(
    ctx: &PipelineContext<'_>,
    spec: &'a RuleSpec,
    rule: Rule,
    condition: Option<CompiledPredicate>,
    report: &mut FileValidationReport,
) -> Slot<'a> {
    let check = match rule {
        Rule::Row(check) => Check::Row {
            check,
            failures: SampleBuffer::new(ctx.job.settings.max_sample_failures),
            considered: 0,
        },
        Rule::Aggregate(check) => Check::Aggregate(check),
        Rule::CrossSource(mut check) => {
            let request = check.reference();
            let resolved = match ctx.job.file(request.file()) {
                Some(reference) => resolve_reference(reference, &request, ctx.job.settings.chunk_size, ctx.cancel)
                    .map_err(|err| err.to_string()),
                None => Err("not declared in this job".to_string()),
            };
            match resolved {
                Ok(data) => check.bind(data),
                Err(err) => {
                    let message = format!("Reference file '{}' unavailable: {}", request.file(), err);
                    warn!(file = %report.file_name, rule = %spec.display_name(), "{}", message);
                    report.errors.push(format!("rule '{}': {}", spec.display_name(), message));
                    return Slot::Done(errored(spec, message));
                }
            }
            Check::CrossSource(check)
        }
    };
    Slot::Active(ActiveRule { spec, condition, check })
}

/// Streams every batch. `Ok(false)` means the run was cancelled.
fn stream(
    ctx: &PipelineContext<'_>,
    spec: &FileSpec,
    source: &mut dyn ChunkSource,
    slots: &mut [Slot<'_>],
    report: &mut FileValidationReport,
) -> Result<bool, String> {
    loop {
        let batch = match source.next_batch() {
            Ok(Some(batch)) => batch,
            Ok(None) => return Ok(true),
            Err(err) => {
                warn!(file = %spec.name, rows = report.rows_processed, error = %err, "read failed");
                let message = format!("Read failed after {} record(s): {}", report.rows_processed, err);
                report.errors.push(err.to_string());
                return Err(message);
            }
        };
        report.rows_processed += batch.len() as u64;
        for slot in slots.iter_mut() {
            if let Slot::Active(rule) = slot {
                rule.consume(&batch);
            }
        }
        if ctx.cancel.is_cancelled() {
            return Ok(false);
        }
    }
}

fn fail_active(slots: Vec<Slot<'_>>, message: &str) -> Vec<ValidationResult> {
    slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Active(rule) => errored(rule.spec, message),
            Slot::Done(result) => result,
        })
        .collect()
}

/// Keeps only results decided before cancellation.
fn cancelled(mut report: FileValidationReport, slots: Vec<Slot<'_>>, started: Instant) -> FileValidationReport {
    info!(file = %report.file_name, rows = report.rows_processed, "cancelled");
    report.cancelled = true;
    report.results = slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Done(result) => Some(result),
            Slot::Active(_) => None,
        })
        .collect();
    finish(report, started)
}

fn finish(mut report: FileValidationReport, started: Instant) -> FileValidationReport {
    report.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        file = %report.file_name,
        state = %FileState::Reported,
        status = %report.status(),
        rows = report.rows_processed,
        errors = report.error_count(),
        warnings = report.warning_count(),
        "file done"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::NoopExecutor;
    use pretty_assertions::assert_eq;
    use quality_core::{FileSpecBuilder, JobBuilder, RuleSpecBuilder, Severity};
    use std::io::Write;

    fn csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn run(job: &ValidationJob, file: &str) -> FileValidationReport {
        let registry = RuleRegistry::with_builtins();
        let cancel = CancellationToken::new();
        let ctx = PipelineContext {
            job,
            registry: &registry,
            executor: &NoopExecutor,
            cancel: &cancel,
        };
        run_file(&ctx, job.file(file).unwrap())
    }

    const PEOPLE: &str = "id,email,age,country\n1,a@x.io,30,IT\n2,,17,IT\n3,c@x.io,40,FR\n4,d@x.io,15,FR\n5,e@x.io,50,IT\n";

    #[test]
    fn test_condition_excludes_rows_from_both_counts() {
        let data = csv(PEOPLE);
        let job = JobBuilder::new("job")
            .chunk_size(2)
            .file(
                FileSpecBuilder::new("people", data.path().to_string_lossy())
                    .rule(
                        RuleSpecBuilder::new("RangeCheck")
                            .param("field", "age")
                            .param("min_value", 18)
                            .condition("country == 'IT'")
                            .build(),
                    )
                    .build(),
            )
            .build();

        let report = run(&job, "people");
        let result = &report.results[0];
        assert_eq!((result.failed_count, result.total_count), (1, 3));
        assert_eq!(result.samples[0].row, 2);
        assert_eq!(report.rows_processed, 5);
    }

    #[test]
    fn test_row_rule_on_absent_column_fails() {
        let data = csv(PEOPLE);
        let job = JobBuilder::new("job")
            .file(
                FileSpecBuilder::new("people", data.path().to_string_lossy())
                    .rule(RuleSpecBuilder::new("RangeCheck").param("field", "agee").param("min_value", 18).build())
                    .rule(
                        RuleSpecBuilder::new("CrossFieldComparisonCheck")
                            .param("field_a", "age")
                            .param("operator", "<")
                            .param("field_b", "ceiling")
                            .build(),
                    )
                    .rule(RuleSpecBuilder::new("RangeCheck").param("field", "age").param("min_value", 0).build())
                    .build(),
            )
            .build();

        let report = run(&job, "people");
        let typo = &report.results[0];
        assert!(!typo.passed);
        assert_eq!(typo.message, "Column 'agee' not found in file");
        assert_eq!((typo.failed_count, typo.total_count), (0, 5));
        assert_eq!(report.results[1].message, "Column 'ceiling' not found in file");
        assert!(report.results[2].passed);
    }

    #[test]
    fn test_bad_rule_fails_alone() {
        let data = csv(PEOPLE);
        let job = JobBuilder::new("job")
            .file(
                FileSpecBuilder::new("people", data.path().to_string_lossy())
                    .rule(RuleSpecBuilder::new("RangeChek").param("field", "age").build())
                    .rule(
                        RuleSpecBuilder::new("MandatoryFieldCheck")
                            .param("fields", serde_json::json!(["email"]))
                            .condition("age >")
                            .build(),
                    )
                    .rule(
                        RuleSpecBuilder::new("MandatoryFieldCheck")
                            .name("email present")
                            .param("fields", serde_json::json!(["email"]))
                            .build(),
                    )
                    .build(),
            )
            .build();

        let report = run(&job, "people");
        assert_eq!(report.results.len(), 3);
        assert!(report.results[0].message.contains("did you mean 'RangeCheck'"));
        assert!(report.results[1].message.contains("Syntax error"));
        let email = report.result("email present").unwrap();
        assert_eq!((email.failed_count, email.total_count), (1, 5));
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_missing_file_fails_every_rule() {
        let job = JobBuilder::new("job")
            .file(
                FileSpecBuilder::new("ghost", "/no/such/file.csv")
                    .rule(RuleSpecBuilder::new("EmptyFileCheck").build())
                    .rule(RuleSpecBuilder::new("BlankRecordCheck").severity(Severity::Warning).build())
                    .build(),
            )
            .build();

        let report = run(&job, "ghost");
        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(|r| !r.passed));
        assert!(report.results[0].message.starts_with("File could not be read"));
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let data = csv(PEOPLE);
        let job = JobBuilder::new("job")
            .file(
                FileSpecBuilder::new("people", data.path().to_string_lossy())
                    .rule(RuleSpecBuilder::new("EmptyFileCheck").enabled(false).build())
                    .rule(RuleSpecBuilder::new("NoSuchCheck").enabled(false).build())
                    .build(),
            )
            .build();
        let report = run(&job, "people");
        assert!(report.results.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_samples_capped() {
        let mut contents = String::from("v\n");
        for _ in 0..50 {
            contents.push_str("x\n");
        }
        let data = csv(&contents);
        let job = JobBuilder::new("job")
            .chunk_size(7)
            .max_sample_failures(3)
            .file(
                FileSpecBuilder::new("f", data.path().to_string_lossy())
                    .rule(RuleSpecBuilder::new("RangeCheck").param("field", "v").param("min_value", 0).build())
                    .rule(RuleSpecBuilder::new("DuplicateRowCheck").build())
                    .build(),
            )
            .build();

        let report = run(&job, "f");
        assert_eq!(report.results[0].failed_count, 50);
        assert_eq!(report.results[0].samples.len(), 3);
        assert_eq!(report.results[1].failed_count, 49);
        assert_eq!(report.results[1].samples.len(), 3);
    }

    #[test]
    fn test_cancelled_before_streaming() {
        let data = csv(PEOPLE);
        let job = JobBuilder::new("job")
            .file(
                FileSpecBuilder::new("people", data.path().to_string_lossy())
                    .rule(RuleSpecBuilder::new("EmptyFileCheck").build())
                    .build(),
            )
            .build();
        let registry = RuleRegistry::with_builtins();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = PipelineContext {
            job: &job,
            registry: &registry,
            executor: &NoopExecutor,
            cancel: &cancel,
        };
        let report = run_file(&ctx, &job.files[0]);
        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert_eq!(report.rows_processed, 0);
    }
}
