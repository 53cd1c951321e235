//! Checks against another file of the same job.
//!
//! The engine resolves each check's [`ReferenceRequest`] and calls `bind`
//! before the first batch. A check that was never bound fails at finalize.

use super::aggregate::{aggregation_params, deviation_pct, judge_baseline};
use super::{CrossSourceCheck, FinalizeContext, Outcome, Rule, row_values};
use crate::reference::{Aggregator, ReferenceData, ReferenceRequest};
use crate::stats::{SampleBuffer, key_string};
use crate::{Batch, RuleConfigError, RuleFamily, RuleParams, RuleRegistry};
use quality_core::{FailedRecord, REFERENCE_FILE_PARAM};
use std::collections::HashSet;

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.register_family("ReferentialIntegrityCheck", RuleFamily::CrossSource, |p| {
        Ok(Rule::cross_source(ReferentialIntegrityCheck::new(p)?))
    });
    registry.register_family("CrossFileDuplicateCheck", RuleFamily::CrossSource, |p| {
        Ok(Rule::cross_source(CrossFileDuplicateCheck::new(p)?))
    });
    registry.register_family("CrossFileComparisonCheck", RuleFamily::CrossSource, |p| {
        Ok(Rule::cross_source(CrossFileComparisonCheck::new(p)?))
    });
}

fn not_bound(file: &str, total: u64) -> Outcome {
    Outcome::fail(format!("Reference file '{}' was not loaded", file), 0, total)
}

/// Key-membership state shared by integrity and cross-file duplicate checks.
struct KeyLookup {
    file: String,
    fields: Vec<String>,
    reference_fields: Vec<String>,
    keys: Option<HashSet<String>>,
    considered: u64,
    missing_columns: bool,
    failures: SampleBuffer,
}

impl KeyLookup {
    fn new(params: &RuleParams, fields: Vec<String>, reference_fields: Vec<String>) -> Result<Self, RuleConfigError> {
        if fields.len() != reference_fields.len() {
            return Err(params.error(
                "reference_fields",
                format!(
                    "expected {} reference field(s) to match {:?}, got {}",
                    fields.len(),
                    fields,
                    reference_fields.len()
                ),
            ));
        }
        Ok(Self {
            file: params.str(REFERENCE_FILE_PARAM)?,
            fields,
            reference_fields,
            keys: None,
            considered: 0,
            missing_columns: false,
            failures: SampleBuffer::new(params.max_samples()),
        })
    }

    fn request(&self) -> ReferenceRequest {
        ReferenceRequest::Keys {
            file: self.file.clone(),
            fields: self.reference_fields.clone(),
        }
    }

    fn bind(&mut self, reference: ReferenceData) {
        if let ReferenceData::Keys(keys) = reference {
            self.keys = Some(keys);
        }
    }

    /// Feeds a batch; `judge` gets the rendered key (`None` for a null part)
    /// and whether the reference holds it, and returns a failure message.
    fn consume<F>(&mut self, batch: &Batch, judge: F)
    where
        F: Fn(Option<&str>, bool) -> Option<String>,
    {
        self.considered += batch.len() as u64;
        let Some(keys) = &self.keys else {
            return;
        };
        let field_label = self.fields.join(",");
        for row in batch.rows() {
            let Some(values) = row_values(&row, &self.fields) else {
                self.missing_columns = true;
                return;
            };
            let key = key_string(values.iter().copied());
            let found = key.as_ref().is_some_and(|k| keys.contains(k));
            if let Some(message) = judge(key.as_deref(), found) {
                let shown = key.map(|k| k.replace(crate::stats::KEY_SEPARATOR, ", "));
                self.failures.record_with(|| FailedRecord {
                    row: row.row_number(),
                    field: Some(field_label.clone()),
                    value: shown,
                    message,
                });
            }
        }
    }

    fn finalize(&mut self, pass: String, fail: String) -> Outcome {
        if self.keys.is_none() {
            return not_bound(&self.file, self.considered);
        }
        if self.missing_columns {
            return Outcome::fail(
                format!("Column(s) [{}] not found", self.fields.join(", ")),
                0,
                self.considered,
            );
        }
        let failed = self.failures.failed();
        let outcome = if failed == 0 {
            Outcome::pass(pass, self.considered)
        } else {
            Outcome::fail(fail.replace("{n}", &failed.to_string()), failed, self.considered)
        };
        outcome.with_samples(self.failures.take_samples())
    }
}

/// Every value must exist in the reference file's key column.
pub struct ReferentialIntegrityCheck {
    lookup: KeyLookup,
    allow_null: bool,
}

impl ReferentialIntegrityCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let field = params.str("field")?;
        let reference_field = params.opt_str("reference_field")?.unwrap_or_else(|| field.clone());
        Ok(Self {
            lookup: KeyLookup::new(params, vec![field], vec![reference_field])?,
            allow_null: params.bool_or("allow_null", true)?,
        })
    }
}

impl CrossSourceCheck for ReferentialIntegrityCheck {
    fn reference(&self) -> ReferenceRequest {
        self.lookup.request()
    }

    fn bind(&mut self, reference: ReferenceData) {
        self.lookup.bind(reference);
    }

    fn consume(&mut self, batch: &Batch) {
        let allow_null = self.allow_null;
        let file = self.lookup.file.clone();
        self.lookup.consume(batch, |key, found| match key {
            None if allow_null => None,
            None => Some("Null value is not allowed".to_string()),
            Some(key) if !found => Some(format!("Value '{}' not found in '{}'", key, file)),
            Some(_) => None,
        });
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        let target = format!("{}.{}", self.lookup.file, self.lookup.reference_fields.join(","));
        self.lookup.finalize(
            format!("All values of '{}' exist in {}", self.lookup.fields.join(","), target),
            format!("{{n}} value(s) of '{}' missing from {}", self.lookup.fields.join(","), target),
        )
    }
}

/// Keys must not also appear in the reference file.
pub struct CrossFileDuplicateCheck {
    lookup: KeyLookup,
}

impl CrossFileDuplicateCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let fields = params.str_list("fields")?;
        let reference_fields = params.opt_str_list("reference_fields")?.unwrap_or_else(|| fields.clone());
        Ok(Self {
            lookup: KeyLookup::new(params, fields, reference_fields)?,
        })
    }
}

impl CrossSourceCheck for CrossFileDuplicateCheck {
    fn reference(&self) -> ReferenceRequest {
        self.lookup.request()
    }

    fn bind(&mut self, reference: ReferenceData) {
        self.lookup.bind(reference);
    }

    fn consume(&mut self, batch: &Batch) {
        let file = self.lookup.file.clone();
        self.lookup.consume(batch, |key, found| {
            key.filter(|_| found)
                .map(|key| format!("Key '{}' also present in '{}'", key.replace(crate::stats::KEY_SEPARATOR, ", "), file))
        });
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        let fields = self.lookup.fields.join(", ");
        self.lookup.finalize(
            format!("No keys [{}] shared with '{}'", fields, self.lookup.file),
            format!("{{n}} key(s) [{}] also present in '{}'", fields, self.lookup.file),
        )
    }
}

/// Tolerances for comparing two aggregates.
///
/// Passing either tolerance is enough; with neither, values must be equal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tolerance {
    pub absolute: Option<f64>,
    pub percent: Option<f64>,
}

impl Tolerance {
    pub fn accepts(&self, actual: f64, expected: f64) -> bool {
        match (self.absolute, self.percent) {
            (None, None) => actual == expected,
            (absolute, percent) => {
                absolute.is_some_and(|tol| (actual - expected).abs() <= tol)
                    || percent.is_some_and(|tol| deviation_pct(actual, expected) <= tol)
            }
        }
    }

    fn describe(&self) -> String {
        match (self.absolute, self.percent) {
            (None, None) => "exact match".to_string(),
            (Some(abs), None) => format!("tolerance ±{}", abs),
            (None, Some(pct)) => format!("tolerance {}%", pct),
            (Some(abs), Some(pct)) => format!("tolerance ±{} or {}%", abs, pct),
        }
    }
}

/// An aggregate of this file compared to the same aggregate of another.
pub struct CrossFileComparisonCheck {
    aggregator: Aggregator,
    request: ReferenceRequest,
    tolerance: Tolerance,
    expected: Option<Option<f64>>,
    considered: u64,
}

impl CrossFileComparisonCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let (aggregation, field) = aggregation_params(params)?;
        let reference_field = params.opt_str("reference_field")?.or_else(|| field.clone());
        let tolerance = Tolerance {
            absolute: params.opt_f64("tolerance")?,
            percent: params.opt_f64("tolerance_pct")?,
        };
        if tolerance.absolute.is_some_and(|t| t < 0.0) || tolerance.percent.is_some_and(|t| t < 0.0) {
            return Err(params.error("tolerance", "tolerances must not be negative"));
        }
        Ok(Self {
            aggregator: Aggregator::new(aggregation, field),
            request: ReferenceRequest::Aggregate {
                file: params.str(REFERENCE_FILE_PARAM)?,
                aggregation,
                field: reference_field,
            },
            tolerance,
            expected: None,
            considered: 0,
        })
    }
}

impl CrossSourceCheck for CrossFileComparisonCheck {
    fn reference(&self) -> ReferenceRequest {
        self.request.clone()
    }

    fn bind(&mut self, reference: ReferenceData) {
        if let ReferenceData::Aggregate(value) = reference {
            self.expected = Some(value);
        }
    }

    fn consume(&mut self, batch: &Batch) {
        self.considered += batch.len() as u64;
        self.aggregator.consume(batch);
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        let Some(expected) = self.expected else {
            return not_bound(self.request.file(), self.considered);
        };
        let label = self.aggregator.label();
        let (Some(actual), Some(expected)) = (self.aggregator.value(), expected) else {
            return Outcome::fail(format!("Cannot compare {}: value undefined", label), 0, self.considered);
        };
        Outcome::judge(
            self.tolerance.accepts(actual, expected),
            format!(
                "{} is {} here and {} in '{}' ({})",
                label,
                actual,
                expected,
                self.request.file(),
                self.tolerance.describe()
            ),
            0,
            self.considered,
        )
    }
}

/// `BaselineComparisonCheck` with the baseline computed from another file.
pub struct BaselineReferenceCheck {
    aggregator: Aggregator,
    request: ReferenceRequest,
    max_deviation_pct: f64,
    baseline: Option<Option<f64>>,
    considered: u64,
}

impl BaselineReferenceCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let (aggregation, field) = aggregation_params(params)?;
        let reference_field = params.opt_str("reference_field")?.or_else(|| field.clone());
        Ok(Self {
            aggregator: Aggregator::new(aggregation, field),
            request: ReferenceRequest::Aggregate {
                file: params.str(REFERENCE_FILE_PARAM)?,
                aggregation,
                field: reference_field,
            },
            max_deviation_pct: params.f64("max_deviation_pct")?,
            baseline: None,
            considered: 0,
        })
    }
}

impl CrossSourceCheck for BaselineReferenceCheck {
    fn reference(&self) -> ReferenceRequest {
        self.request.clone()
    }

    fn bind(&mut self, reference: ReferenceData) {
        if let ReferenceData::Aggregate(value) = reference {
            self.baseline = Some(value);
        }
    }

    fn consume(&mut self, batch: &Batch) {
        self.considered += batch.len() as u64;
        self.aggregator.consume(batch);
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        match self.baseline {
            None => not_bound(self.request.file(), self.considered),
            Some(baseline) => judge_baseline(&self.aggregator, baseline, self.max_deviation_pct, self.considered),
        }
    }
}
