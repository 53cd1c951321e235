//! Properties of the streaming pipeline.
//!
//! Results must not depend on how a file is cut into batches: row rules
//! report the same failing rows and aggregate rules the same verdicts for
//! every chunk size.

use proptest::prelude::*;
use quality_core::{FileSpecBuilder, FileValidationReport, JobBuilder, RuleSpec, RuleSpecBuilder, ValidationJob};
use quality_engine::pipeline::{PipelineContext, run_file};
use quality_engine::{NoopExecutor, RuleRegistry};
use serde_json::json;
use std::io::Write;
use tokio_util::sync::CancellationToken;

fn rules() -> Vec<RuleSpec> {
    vec![
        RuleSpecBuilder::new("RangeCheck")
            .param("field", "amount")
            .param("min_value", -50)
            .param("max_value", 50)
            .build(),
        RuleSpecBuilder::new("MandatoryFieldCheck").param("fields", json!(["code"])).build(),
        RuleSpecBuilder::new("RegexCheck")
            .param("field", "code")
            .param("pattern", "^[a-c]+$")
            .condition("amount >= 0")
            .build(),
        RuleSpecBuilder::new("UniqueKeyCheck").param("fields", json!(["code"])).build(),
        RuleSpecBuilder::new("DuplicateRowCheck").build(),
        RuleSpecBuilder::new("CompletenessCheck")
            .param("field", "code")
            .param("min_completeness", 0.9)
            .build(),
        RuleSpecBuilder::new("ColumnStatisticsCheck")
            .param("field", "amount")
            .param("statistic", "stddev")
            .param("max_value", 40)
            .build(),
        RuleSpecBuilder::new("PercentileRangeCheck")
            .param("field", "amount")
            .param("percentile", 0.9)
            .param("max_value", 80)
            .build(),
        RuleSpecBuilder::new("StatisticalOutlierCheck")
            .param("field", "amount")
            .param("method", "iqr")
            .build(),
        RuleSpecBuilder::new("DistinctCountCheck")
            .param("field", "code")
            .param("min_distinct", 3)
            .build(),
    ]
}

fn job(path: &str, chunk_size: usize) -> ValidationJob {
    let mut file = FileSpecBuilder::new("data", path);
    for rule in rules() {
        file = file.rule(rule);
    }
    JobBuilder::new("props")
        .chunk_size(chunk_size)
        .max_sample_failures(1_000)
        .file(file.build())
        .build()
}

fn run(job: &ValidationJob) -> FileValidationReport {
    let registry = RuleRegistry::with_builtins();
    let cancel = CancellationToken::new();
    let ctx = PipelineContext {
        job,
        registry: &registry,
        executor: &NoopExecutor,
        cancel: &cancel,
    };
    run_file(&ctx, &job.files[0])
}

fn records() -> impl Strategy<Value = Vec<(Option<String>, i64)>> {
    prop::collection::vec((prop::option::weighted(0.9, "[a-e]{1,3}"), -100i64..100), 0..120)
}

fn write_csv(records: &[(Option<String>, i64)]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "code,amount").unwrap();
    for (code, amount) in records {
        writeln!(file, "{},{}", code.as_deref().unwrap_or(""), amount).unwrap();
    }
    file
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_results_independent_of_chunk_size(records in records(), chunk_size in 1usize..40) {
        let data = write_csv(&records);
        let path = data.path().to_string_lossy().into_owned();

        let whole = run(&job(&path, 10_000));
        let chunked = run(&job(&path, chunk_size));

        prop_assert_eq!(whole.rows_processed, records.len() as u64);
        prop_assert_eq!(chunked.rows_processed, records.len() as u64);
        prop_assert_eq!(&whole.results, &chunked.results);
    }

    #[test]
    fn prop_samples_never_exceed_cap(records in records(), cap in 1usize..5) {
        let data = write_csv(&records);
        let path = data.path().to_string_lossy().into_owned();
        let mut job = job(&path, 7);
        job.settings.max_sample_failures = cap;

        let report = run(&job);
        for result in &report.results {
            prop_assert!(result.samples.len() <= cap, "{} kept {} samples", result.rule_name, result.samples.len());
            prop_assert!(result.failed_count <= result.total_count || result.total_count == 0);
        }
    }
}

#[test]
fn test_running_statistics_match_full_pass() {
    let values: Vec<i64> = (0..1_000).map(|i| (i * 37 % 201) - 100).collect();
    let records: Vec<(Option<String>, i64)> = values.iter().map(|v| (Some("a".to_string()), *v)).collect();
    let data = write_csv(&records);
    let path = data.path().to_string_lossy().into_owned();

    let n = values.len() as f64;
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
    let variance = values.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / (n - 1.0);

    let rule = |statistic: &str, bound: f64| {
        RuleSpecBuilder::new("ColumnStatisticsCheck")
            .name(statistic)
            .param("field", "amount")
            .param("statistic", statistic)
            .param("min_value", bound - 1e-9)
            .param("max_value", bound + 1e-9)
            .build()
    };

    for chunk_size in [1, 13, 1_000] {
        let job = JobBuilder::new("stats")
            .chunk_size(chunk_size)
            .file(
                FileSpecBuilder::new("data", path.clone())
                    .rule(rule("mean", mean))
                    .rule(rule("stddev", variance.sqrt()))
                    .build(),
            )
            .build();
        let report = run(&job);
        for result in &report.results {
            assert!(result.passed, "chunk {}: {}", chunk_size, result.message);
        }
    }
}
