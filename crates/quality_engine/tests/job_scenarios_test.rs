//! End-to-end job scenarios.
//!
//! Each test writes small data files to a temporary directory, builds a job
//! around them and checks the report and exit code that come back.

use pretty_assertions::assert_eq;
use quality_core::{
    EXIT_ERROR, EXIT_FAILED, EXIT_PASSED, FileSpecBuilder, JobBuilder, RuleSpecBuilder, Severity, Status,
    ValidationJob,
};
use quality_engine::{EngineError, ValidationEngine};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

const CUSTOMERS: &str = "id,email,country\n1,a@x.io,IT\n2,,IT\n3,c@x.io,FR\n4,d@x.io,DE\n5,e@x.io,IT\n";

#[tokio::test]
async fn test_mandatory_field_on_five_records() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "customers.csv", CUSTOMERS);
    let job = JobBuilder::new("customers")
        .file(
            FileSpecBuilder::new("customers", path)
                .rule(
                    RuleSpecBuilder::new("MandatoryFieldCheck")
                        .param("fields", json!(["email"]))
                        .build(),
                )
                .build(),
        )
        .build();

    let report = ValidationEngine::new().run(job).await.unwrap();
    let result = &report.files[0].results[0];
    assert!(!result.passed);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.total_count, 5);
    assert_eq!(result.samples[0].row, 2);
    assert_eq!(report.status(), Status::Failed);
    assert_eq!(report.exit_code(), EXIT_FAILED);
}

#[tokio::test]
async fn test_zero_record_file_passes_row_rules() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "empty.csv", "id,email,amount\n");
    let job = JobBuilder::new("empty")
        .file(
            FileSpecBuilder::new("empty", path)
                .rule(RuleSpecBuilder::new("MandatoryFieldCheck").param("fields", json!(["email"])).build())
                .rule(RuleSpecBuilder::new("RangeCheck").param("field", "amount").param("min_value", 0).build())
                .rule(RuleSpecBuilder::new("RegexCheck").param("field", "email").param("pattern", "@").build())
                .rule(RuleSpecBuilder::new("EmailFormatCheck").param("field", "email").build())
                .build(),
        )
        .build();

    let report = ValidationEngine::new().run(job).await.unwrap();
    let file = &report.files[0];
    assert_eq!(file.rows_processed, 0);
    assert_eq!(file.results.len(), 4);
    for result in &file.results {
        assert!(result.passed, "{} failed: {}", result.rule_name, result.message);
        assert_eq!((result.failed_count, result.total_count), (0, 0));
    }
    assert_eq!(report.exit_code(), EXIT_PASSED);
}

#[tokio::test]
async fn test_error_and_warning_failures_fail_the_job() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "customers.csv", CUSTOMERS);
    let job = JobBuilder::new("mixed")
        .file(
            FileSpecBuilder::new("customers", path)
                .rule(RuleSpecBuilder::new("MandatoryFieldCheck").param("fields", json!(["email"])).build())
                .rule(
                    RuleSpecBuilder::new("ValidValuesCheck")
                        .param("field", "country")
                        .param("valid_values", json!(["IT", "FR"]))
                        .severity(Severity::Warning)
                        .build(),
                )
                .build(),
        )
        .build();

    let report = ValidationEngine::new().run(job).await.unwrap();
    assert_eq!(report.error_count(), 1);
    assert_eq!(report.warning_count(), 1);
    assert_eq!(report.status(), Status::Failed);
    assert_eq!(report.exit_code(), EXIT_FAILED);
}

#[tokio::test]
async fn test_warning_only_failures_exit_zero() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "customers.csv", CUSTOMERS);
    let job = JobBuilder::new("warnings")
        .file(
            FileSpecBuilder::new("customers", path)
                .rule(
                    RuleSpecBuilder::new("MandatoryFieldCheck")
                        .param("fields", json!(["email"]))
                        .severity(Severity::Warning)
                        .build(),
                )
                .rule(RuleSpecBuilder::new("UniqueKeyCheck").param("fields", json!(["id"])).build())
                .build(),
        )
        .build();

    let report = ValidationEngine::new().run(job).await.unwrap();
    assert_eq!(report.status(), Status::Warning);
    assert_eq!(report.exit_code(), EXIT_PASSED);
}

#[tokio::test]
async fn test_circular_reference_aborts_before_reading() {
    // Paths do not exist: the cycle must be reported before any file is opened.
    let job = JobBuilder::new("cycle")
        .file(
            FileSpecBuilder::new("a", "/nonexistent/a.csv")
                .rule(
                    RuleSpecBuilder::new("CrossFileDuplicateCheck")
                        .param("fields", json!(["id"]))
                        .param("reference_file", "b")
                        .build(),
                )
                .build(),
        )
        .file(
            FileSpecBuilder::new("b", "/nonexistent/b.csv")
                .rule(
                    RuleSpecBuilder::new("ReferentialIntegrityCheck")
                        .param("field", "id")
                        .param("reference_file", "a")
                        .build(),
                )
                .build(),
        )
        .build();

    let err = ValidationEngine::new().run(job).await.unwrap_err();
    match &err {
        EngineError::CircularReference { cycle } => assert_eq!(cycle, &vec!["a", "b", "a"]),
        other => panic!("expected a circular reference, got {:?}", other),
    }
    assert_eq!(err.exit_code(), EXIT_ERROR);
}

#[tokio::test]
async fn test_unavailable_reference_fails_only_the_cross_rule() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "a.csv", CUSTOMERS);
    let job = JobBuilder::new("refs")
        .file(
            FileSpecBuilder::new("a", path)
                .rule(
                    RuleSpecBuilder::new("CrossFileDuplicateCheck")
                        .name("no overlap with b")
                        .param("fields", json!(["id"]))
                        .param("reference_file", "b")
                        .build(),
                )
                .rule(RuleSpecBuilder::new("MandatoryFieldCheck").param("fields", json!(["email"])).build())
                .rule(RuleSpecBuilder::new("RowCountRangeCheck").param("min_rows", 1).build())
                .build(),
        )
        .file(FileSpecBuilder::new("b", dir.path().join("missing.csv").to_string_lossy()).build())
        .build();

    let report = ValidationEngine::new().run(job).await.unwrap();
    let a = report.file("a").unwrap();
    let cross = a.result("no overlap with b").unwrap();
    assert!(!cross.passed);
    assert!(cross.message.contains("Reference file 'b' unavailable"), "{}", cross.message);

    let mandatory = a.result("MandatoryFieldCheck").unwrap();
    assert_eq!((mandatory.failed_count, mandatory.total_count), (1, 5));
    assert!(a.result("RowCountRangeCheck").unwrap().passed);
    assert_eq!(a.rows_processed, 5);
}

#[tokio::test]
async fn test_references_resolve_across_files() {
    let dir = TempDir::new().unwrap();
    let customers = write(&dir, "customers.csv", CUSTOMERS);
    let orders = write(&dir, "orders.csv", "order_id,customer_id,amount\n10,1,5.0\n11,2,7.5\n12,9,1.0\n");
    let job = JobBuilder::new("orders")
        .workers(4)
        .file(
            FileSpecBuilder::new("orders", orders)
                .rule(
                    RuleSpecBuilder::new("ReferentialIntegrityCheck")
                        .param("field", "customer_id")
                        .param("reference_field", "id")
                        .param("reference_file", "customers")
                        .build(),
                )
                .build(),
        )
        .file(FileSpecBuilder::new("customers", customers).build())
        .build();

    let report = ValidationEngine::new().run(job).await.unwrap();
    let names: Vec<&str> = report.files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["orders", "customers"]);

    let result = &report.files[0].results[0];
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.samples[0].value.as_deref(), Some("9"));
}

#[tokio::test]
async fn test_disabled_rules_are_absent() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "customers.csv", CUSTOMERS);
    let job = JobBuilder::new("disabled")
        .file(
            FileSpecBuilder::new("customers", path)
                .rule(
                    RuleSpecBuilder::new("MandatoryFieldCheck")
                        .name("off")
                        .param("fields", json!(["email"]))
                        .enabled(false)
                        .build(),
                )
                .rule(RuleSpecBuilder::new("EmptyFileCheck").name("on").build())
                .build(),
        )
        .build();

    let report = ValidationEngine::new().run(job).await.unwrap();
    let names: Vec<&str> = report.files[0].results.iter().map(|r| r.rule_name.as_str()).collect();
    assert_eq!(names, vec!["on"]);
}

#[tokio::test]
async fn test_condition_on_absent_column_masks_everything() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "customers.csv", CUSTOMERS);
    let job = JobBuilder::new("absent")
        .file(
            FileSpecBuilder::new("customers", path)
                .rule(
                    RuleSpecBuilder::new("MandatoryFieldCheck")
                        .param("fields", json!(["email"]))
                        .condition("segment == 'vip'")
                        .build(),
                )
                .rule(
                    RuleSpecBuilder::new("MandatoryFieldCheck")
                        .param("fields", json!(["email"]))
                        .condition("NOT segment == 'vip'")
                        .build(),
                )
                .rule(
                    RuleSpecBuilder::new("MandatoryFieldCheck")
                        .param("fields", json!(["email"]))
                        .condition("NOT (segment == 'vip' AND country == 'FR')")
                        .build(),
                )
                .build(),
        )
        .build();

    let report = ValidationEngine::new().run(job).await.unwrap();
    let results = &report.files[0].results;
    for result in &results[..2] {
        assert!(result.passed);
        assert_eq!((result.failed_count, result.total_count), (0, 0));
    }
    // Only the FR record stays unknown; the rest are known to be selected.
    assert_eq!((results[2].failed_count, results[2].total_count), (1, 4));
    assert!(report.files[0].errors.is_empty());
}

#[tokio::test]
async fn test_misspelled_row_rule_field_fails_the_job() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "customers.csv", CUSTOMERS);
    let job = JobBuilder::new("typo")
        .file(
            FileSpecBuilder::new("customers", path)
                .rule(
                    RuleSpecBuilder::new("ValidValuesCheck")
                        .param("field", "contry")
                        .param("valid_values", json!(["IT", "FR", "DE"]))
                        .build(),
                )
                .build(),
        )
        .build();

    let report = ValidationEngine::new().run(job).await.unwrap();
    let result = &report.files[0].results[0];
    assert!(!result.passed);
    assert_eq!(result.message, "Column 'contry' not found in file");
    assert_eq!(report.exit_code(), EXIT_FAILED);
}

#[tokio::test]
async fn test_samples_are_capped() {
    let dir = TempDir::new().unwrap();
    let mut contents = String::from("id,amount\n");
    for i in 0..500 {
        contents.push_str(&format!("{},-{}\n", i, i + 1));
    }
    let path = write(&dir, "amounts.csv", &contents);
    let job = JobBuilder::new("capped")
        .chunk_size(64)
        .max_sample_failures(7)
        .file(
            FileSpecBuilder::new("amounts", path)
                .rule(RuleSpecBuilder::new("RangeCheck").param("field", "amount").param("min_value", 0).build())
                .rule(RuleSpecBuilder::new("UniqueKeyCheck").param("fields", json!(["amount"])).build())
                .build(),
        )
        .build();

    let report = ValidationEngine::new().run(job).await.unwrap();
    let range = &report.files[0].results[0];
    assert_eq!(range.failed_count, 500);
    assert_eq!(range.samples.len(), 7);
    assert_eq!(range.samples[0].row, 1);
    assert!(report.files[0].results.iter().all(|r| r.samples.len() <= 7));
}

#[tokio::test]
async fn test_invalid_job_is_a_config_error() {
    let job = JobBuilder::new("bad")
        .chunk_size(0)
        .file(FileSpecBuilder::new("f", "f.csv").build())
        .build();
    let err = ValidationEngine::new().run(job).await.unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    assert_eq!(err.exit_code(), EXIT_ERROR);
}

#[tokio::test]
async fn test_cancelled_run_reports_cancelled() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "customers.csv", CUSTOMERS);
    let job: ValidationJob = JobBuilder::new("cancel")
        .file(
            FileSpecBuilder::new("customers", path)
                .rule(RuleSpecBuilder::new("EmptyFileCheck").build())
                .build(),
        )
        .build();

    let engine = ValidationEngine::new();
    engine.cancellation_token().cancel();
    let report = engine.run(job).await.unwrap();
    assert!(report.files[0].cancelled);
    assert!(report.files[0].results.is_empty());
    assert_eq!(report.status(), Status::Cancelled);
    assert_eq!(report.exit_code(), EXIT_ERROR);
}

#[tokio::test]
async fn test_formats_agree() {
    let dir = TempDir::new().unwrap();
    let csv = write(&dir, "people.csv", "id,age\n1,30\n2,\n3,15\n");
    let jsonl = write(
        &dir,
        "people.jsonl",
        "{\"id\": 1, \"age\": 30}\n{\"id\": 2, \"age\": null}\n{\"id\": 3, \"age\": 15}\n",
    );
    let json = write(&dir, "people.json", "[{\"id\": 1, \"age\": 30}, {\"id\": 2}, {\"id\": 3, \"age\": 15}]");

    let rule = || {
        RuleSpecBuilder::new("RangeCheck")
            .param("field", "age")
            .param("min_value", 18)
            .build()
    };
    let mandatory = || RuleSpecBuilder::new("MandatoryFieldCheck").param("fields", json!(["age"])).build();

    let mut builder = JobBuilder::new("formats");
    for path in [&csv, &jsonl, &json] {
        let name = Path::new(path).extension().unwrap().to_string_lossy().into_owned();
        builder = builder.file(FileSpecBuilder::new(name, path.clone()).rule(rule()).rule(mandatory()).build());
    }

    let report = ValidationEngine::new().run(builder.build()).await.unwrap();
    for file in &report.files {
        assert_eq!(file.rows_processed, 3, "{}", file.file_name);
        assert_eq!(file.results[0].failed_count, 1, "{}", file.file_name);
        assert_eq!(file.results[1].failed_count, 1, "{}", file.file_name);
        assert_eq!(file.results[1].samples[0].row, 2, "{}", file.file_name);
    }
}
