//! Job orchestration.
//!
//! The engine validates the job shape, orders files so every referenced
//! file is reported before the files that reference it, and runs file
//! pipelines on blocking worker tasks, at most `workers` at a time.

use crate::pipeline::{PipelineContext, build_rule, run_file};
use crate::query::{QueryExecutor, default_executor};
use crate::registry::{self, RuleRegistry};
use crate::{EngineError, RuleConfigError};
use quality_core::{FileSpec, FileValidationReport, ValidationJob, ValidationReport};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A rule that failed to build during [`ValidationEngine::check`].
#[derive(Debug, Clone, PartialEq)]
pub struct RuleIssue {
    pub file: String,
    pub rule: String,
    pub error: RuleConfigError,
}

/// Runs validation jobs.
pub struct ValidationEngine {
    registry: Arc<RuleRegistry>,
    executor: Arc<dyn QueryExecutor>,
    cancel: CancellationToken,
    workers: Option<usize>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationEngine {
    /// Creates an engine over a snapshot of the global registry.
    pub fn new() -> Self {
        Self {
            registry: registry::global(),
            executor: default_executor(),
            cancel: CancellationToken::new(),
            workers: None,
        }
    }

    /// Uses a specific registry instead of the global one.
    pub fn with_registry(mut self, registry: Arc<RuleRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Uses a specific SQL executor.
    pub fn with_executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Overrides the job's worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels runs of this engine.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Checks a job without reading any data.
    ///
    /// Job-level problems are errors; per-rule problems are returned.
    pub fn check(&self, job: &ValidationJob) -> Result<Vec<RuleIssue>, EngineError> {
        job.validate()?;
        execution_order(job, &self.registry)?;

        let mut issues = Vec::new();
        for file in &job.files {
            for (_, rule) in file.enabled_rules() {
                if let Err(error) = build_rule(
                    &self.registry,
                    rule,
                    file.columns.as_deref(),
                    job.settings.max_sample_failures,
                ) {
                    issues.push(RuleIssue {
                        file: file.name.clone(),
                        rule: rule.display_name().to_string(),
                        error,
                    });
                }
            }
        }
        Ok(issues)
    }

    /// Runs a job.
    ///
    /// # Errors
    ///
    /// Only for problems that make the whole job meaningless: a malformed
    /// job, a reference cycle, or a worker that could not be joined. Every
    /// other failure is recorded in the report.
    pub async fn run(&self, job: ValidationJob) -> Result<ValidationReport, EngineError> {
        let started = Instant::now();
        job.validate()?;
        let order = execution_order(&job, &self.registry)?;
        let workers = self.workers.unwrap_or(job.settings.workers).max(1);

        info!(job = %job.name, files = job.files.len(), workers, "starting validation");

        let job = Arc::new(job);
        let dependents = dependents(&job, &self.registry);
        let mut pending: Vec<usize> = job
            .files
            .iter()
            .map(|f| references(&self.registry, f).len())
            .collect();
        let mut ready: VecDeque<usize> = order.iter().copied().filter(|&i| pending[i] == 0).collect();
        let mut reports: Vec<Option<FileValidationReport>> = vec![None; job.files.len()];
        let mut tasks = JoinSet::new();

        while !ready.is_empty() || !tasks.is_empty() {
            while tasks.len() < workers {
                let Some(index) = ready.pop_front() else { break };
                if self.cancel.is_cancelled() {
                    let file = &job.files[index];
                    let mut report = FileValidationReport::new(&file.name, &file.path);
                    report.cancelled = true;
                    complete(index, report, &mut reports, &dependents, &mut pending, &mut ready);
                    continue;
                }

                debug!(file = %job.files[index].name, "scheduling file");
                let job = Arc::clone(&job);
                let registry = Arc::clone(&self.registry);
                let executor = Arc::clone(&self.executor);
                let cancel = self.cancel.clone();
                tasks.spawn_blocking(move || {
                    let ctx = PipelineContext {
                        job: &job,
                        registry: &registry,
                        executor: executor.as_ref(),
                        cancel: &cancel,
                    };
                    (index, run_file(&ctx, &job.files[index]))
                });
            }

            let Some(joined) = tasks.join_next().await else {
                continue;
            };
            let (index, report) = joined.map_err(|e| EngineError::Scheduler(e.to_string()))?;
            complete(index, report, &mut reports, &dependents, &mut pending, &mut ready);
        }

        let files: Vec<FileValidationReport> = reports.into_iter().flatten().collect();
        if files.len() != job.files.len() {
            return Err(EngineError::Scheduler(format!(
                "{} of {} files were never scheduled",
                job.files.len() - files.len(),
                job.files.len()
            )));
        }

        let mut report = ValidationReport::new(&job.name, files);
        report.duration_ms = started.elapsed().as_millis() as u64;
        if self.cancel.is_cancelled() {
            warn!(job = %job.name, "validation cancelled");
        }
        info!(
            job = %job.name,
            status = %report.status(),
            errors = report.error_count(),
            warnings = report.warning_count(),
            duration_ms = report.duration_ms,
            "validation finished"
        );
        Ok(report)
    }
}

/// Records a finished file and releases the files waiting on it.
fn complete(
    index: usize,
    report: FileValidationReport,
    reports: &mut [Option<FileValidationReport>],
    dependents: &[Vec<usize>],
    pending: &mut [usize],
    ready: &mut VecDeque<usize>,
) {
    reports[index] = Some(report);
    for &dependent in &dependents[index] {
        pending[dependent] -= 1;
        if pending[dependent] == 0 {
            ready.push_back(dependent);
        }
    }
}

/// Files this file's enabled rules actually read. A `reference_file` on a
/// rule type that never reads one adds no ordering edge.
fn references<'a>(registry: &RuleRegistry, file: &'a FileSpec) -> Vec<&'a str> {
    let mut names: Vec<&str> = Vec::new();
    for (_, rule) in file.enabled_rules() {
        if !registry.reads_reference(&rule.rule_type) {
            continue;
        }
        if let Some(reference) = rule.reference_file().filter(|r| !names.contains(r)) {
            names.push(reference);
        }
    }
    names
}

/// For each file, the files that reference it.
fn dependents(job: &ValidationJob, registry: &RuleRegistry) -> Vec<Vec<usize>> {
    let mut dependents = vec![Vec::new(); job.files.len()];
    for (index, file) in job.files.iter().enumerate() {
        for reference in references(registry, file) {
            if let Some(target) = job.file_index(reference) {
                dependents[target].push(index);
            }
        }
    }
    dependents
}

/// Orders files so references come first, keeping declaration order
/// otherwise.
///
/// # Errors
///
/// `CircularReference` naming the files of the first cycle found.
pub fn execution_order(job: &ValidationJob, registry: &RuleRegistry) -> Result<Vec<usize>, EngineError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(
        job: &ValidationJob,
        registry: &RuleRegistry,
        index: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), EngineError> {
        match marks[index] {
            Mark::Done => return Ok(()),
            Mark::Active => {
                let start = path.iter().position(|&i| i == index).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|&i| job.files[i].name.clone()).collect();
                cycle.push(job.files[index].name.clone());
                return Err(EngineError::CircularReference { cycle });
            }
            Mark::New => {}
        }
        marks[index] = Mark::Active;
        path.push(index);
        for reference in references(registry, &job.files[index]) {
            if let Some(target) = job.file_index(reference) {
                visit(job, registry, target, marks, path, order)?;
            }
        }
        path.pop();
        marks[index] = Mark::Done;
        order.push(index);
        Ok(())
    }

    let mut marks = vec![Mark::New; job.files.len()];
    let mut order = Vec::with_capacity(job.files.len());
    for index in 0..job.files.len() {
        visit(job, registry, index, &mut marks, &mut Vec::new(), &mut order)?;
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quality_core::{FileSpec, FileSpecBuilder, JobBuilder, RuleSpecBuilder};

    fn referencing(name: &str, targets: &[&str]) -> FileSpec {
        let mut builder = FileSpecBuilder::new(name, format!("{}.csv", name));
        for target in targets {
            builder = builder.rule(
                RuleSpecBuilder::new("ReferentialIntegrityCheck")
                    .param("field", "id")
                    .param("reference_file", *target)
                    .build(),
            );
        }
        builder.build()
    }

    fn order(job: &ValidationJob) -> Result<Vec<usize>, EngineError> {
        execution_order(job, &RuleRegistry::with_builtins())
    }

    #[test]
    fn test_order_puts_references_first() {
        let job = JobBuilder::new("j")
            .file(referencing("orders", &["customers", "products"]))
            .file(referencing("customers", &[]))
            .file(referencing("products", &["customers"]))
            .file(referencing("standalone", &[]))
            .build();
        let names: Vec<&str> = order(&job)
            .unwrap()
            .into_iter()
            .map(|i| job.files[i].name.as_str())
            .collect();
        assert_eq!(names, vec!["customers", "products", "orders", "standalone"]);
    }

    #[test]
    fn test_cycle_is_named() {
        let job = JobBuilder::new("j")
            .file(referencing("a", &["b"]))
            .file(referencing("b", &["c"]))
            .file(referencing("c", &["a"]))
            .build();
        match order(&job) {
            Err(EngineError::CircularReference { cycle }) => assert_eq!(cycle, vec!["a", "b", "c", "a"]),
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let job = JobBuilder::new("j").file(referencing("a", &["a"])).build();
        assert!(matches!(order(&job), Err(EngineError::CircularReference { .. })));
    }

    #[test]
    fn test_disabled_reference_is_ignored() {
        let mut a = referencing("a", &["b"]);
        a.validations[0].enabled = false;
        let job = JobBuilder::new("j").file(a).file(referencing("b", &["a"])).build();
        assert_eq!(order(&job).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_reference_on_non_cross_source_rule_is_not_an_edge() {
        let stray = FileSpecBuilder::new("a", "a.csv")
            .rule(
                RuleSpecBuilder::new("RangeCheck")
                    .param("field", "id")
                    .param("min_value", 0)
                    .param("reference_file", "b")
                    .build(),
            )
            .build();
        let job = JobBuilder::new("j").file(stray).file(referencing("b", &["a"])).build();
        assert_eq!(order(&job).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_baseline_and_custom_rules_follow_their_reference() {
        let mut registry = RuleRegistry::with_builtins();
        registry.register("LookupCheck", |_| Err(RuleConfigError::missing("LookupCheck", "field")));
        let baseline = FileSpecBuilder::new("today", "today.csv")
            .rule(
                RuleSpecBuilder::new("BaselineComparisonCheck")
                    .param("aggregation", "count")
                    .param("reference_file", "yesterday")
                    .build(),
            )
            .build();
        let custom = FileSpecBuilder::new("orders", "orders.csv")
            .rule(RuleSpecBuilder::new("LookupCheck").param("reference_file", "today").build())
            .build();
        let job = JobBuilder::new("j")
            .file(custom)
            .file(baseline)
            .file(referencing("yesterday", &[]))
            .build();
        assert_eq!(execution_order(&job, &registry).unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_check_reports_rule_issues() {
        let job = JobBuilder::new("j")
            .file(
                FileSpecBuilder::new("f", "f.csv")
                    .columns(["id", "amount"])
                    .rule(RuleSpecBuilder::new("RangeCheck").param("field", "amount").build())
                    .rule(
                        RuleSpecBuilder::new("RangeCheck")
                            .name("conditioned")
                            .param("field", "amount")
                            .param("min_value", 0)
                            .condition("region == 'eu'")
                            .build(),
                    )
                    .rule(RuleSpecBuilder::new("EmptyFileCheck").build())
                    .build(),
            )
            .build();
        let issues = ValidationEngine::new().check(&job).unwrap();
        assert_eq!(issues.len(), 2);
        assert!(matches!(issues[0].error, RuleConfigError::MissingParameter { .. }));
        assert_eq!(issues[1].rule, "conditioned");
        assert!(matches!(issues[1].error, RuleConfigError::Condition(_)));
    }
}
