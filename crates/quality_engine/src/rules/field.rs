//! Per-record field checks.
//!
//! Null values are skipped by every check here except the mandatory and
//! blank-record checks; missing values are their concern.

use super::{Rule, RowCheck, RowFailure};
use crate::condition::{CompareOp, CompiledPredicate, compare_values, compile};
use crate::stats::SampleBuffer;
use crate::{Batch, DataValue, RowView, RuleConfigError, RuleFamily, RuleParams, RuleRegistry};
use quality_core::FailedRecord;
use regex::Regex;
use std::collections::HashSet;

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.register_family("MandatoryFieldCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(MandatoryFieldCheck::new(p)?))
    });
    registry.register_family("RegexCheck", RuleFamily::Row, |p| Ok(Rule::row(RegexCheck::new(p)?)));
    registry.register_family("ValidValuesCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(ValueSetCheck::new(p, true)?))
    });
    registry.register_family("InvalidValuesCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(ValueSetCheck::new(p, false)?))
    });
    registry.register_family("RangeCheck", RuleFamily::Row, |p| Ok(Rule::row(RangeCheck::new(p)?)));
    registry.register_family("StringLengthCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(StringLengthCheck::new(p)?))
    });
    registry.register_family("NumericPrecisionCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(NumericPrecisionCheck::new(p)?))
    });
    registry.register_family("DataTypeCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(DataTypeCheck::new(p)?))
    });
    registry.register_family("EmailFormatCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(RegexCheck::email(p)?))
    });
    registry.register_family("CrossFieldComparisonCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(CrossFieldComparisonCheck::new(p)?))
    });
    registry.register_family("InlineBusinessRuleCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(InlineBusinessRuleCheck::new(p)?))
    });
    registry.register_family("BlankRecordCheck", RuleFamily::Row, |_| Ok(Rule::row(BlankRecordCheck)));
}

/// Non-null value of `field`, if any.
fn present<'a>(row: &RowView<'a>, field: &str) -> Option<&'a DataValue> {
    row.get(field).filter(|v| !v.is_null())
}

/// Every listed field must hold a non-blank value.
pub struct MandatoryFieldCheck {
    fields: Vec<String>,
}

impl MandatoryFieldCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let fields = if params.contains("fields") {
            params.str_list("fields")?
        } else {
            vec![params.str("field").map_err(|_| RuleConfigError::missing(params.rule_type(), "fields"))?]
        };
        Ok(Self { fields })
    }
}

impl RowCheck for MandatoryFieldCheck {
    fn describe(&self) -> String {
        format!("mandatory fields [{}]", self.fields.join(", "))
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| row.get(f).is_none_or(DataValue::is_blank))
            .map(String::as_str)
            .collect();
        let first = *missing.first()?;
        Some(RowFailure {
            field: Some(first.to_string()),
            value: None,
            message: format!("Missing mandatory value for: {}", missing.join(", ")),
        })
    }
}

/// Text must (or must not, with `invert`) match a pattern.
pub struct RegexCheck {
    field: String,
    pattern: Regex,
    invert: bool,
    label: String,
}

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$";

impl RegexCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let source = params.str("pattern")?;
        let pattern = Regex::new(&source).map_err(|e| params.error("pattern", e.to_string()))?;
        Ok(Self {
            field: params.str("field")?,
            pattern,
            invert: params.bool_or("invert", false)?,
            label: format!("pattern '{}'", source),
        })
    }

    /// The email-address shape check.
    pub fn email(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let pattern = Regex::new(EMAIL_PATTERN).map_err(|e| params.error("pattern", e.to_string()))?;
        Ok(Self {
            field: params.str("field")?,
            pattern,
            invert: false,
            label: "a valid email address".to_string(),
        })
    }
}

impl RowCheck for RegexCheck {
    fn fields(&self) -> Vec<&str> {
        vec![self.field.as_str()]
    }

    fn describe(&self) -> String {
        if self.invert {
            format!("{} must not match {}", self.field, self.label)
        } else {
            format!("{} must match {}", self.field, self.label)
        }
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let value = present(row, &self.field)?;
        let text = value.to_string();
        let matched = self.pattern.is_match(&text);
        if matched == self.invert {
            let message = if self.invert {
                format!("Value '{}' matches forbidden {}", text, self.label)
            } else if self.label.starts_with("pattern") {
                format!("Value '{}' does not match {}", text, self.label)
            } else {
                format!("Value '{}' is not {}", text, self.label)
            };
            return Some(RowFailure::on(&self.field, value, message));
        }
        None
    }
}

/// Value must be inside (allow list) or outside (deny list) a set.
pub struct ValueSetCheck {
    field: String,
    values: HashSet<String>,
    allowed: bool,
    case_sensitive: bool,
}

impl ValueSetCheck {
    pub fn new(params: &RuleParams, allowed: bool) -> Result<Self, RuleConfigError> {
        let key = if allowed { "valid_values" } else { "invalid_values" };
        let case_sensitive = params.bool_or("case_sensitive", true)?;
        let values = params
            .value_list(key)?
            .iter()
            .filter_map(DataValue::render)
            .map(|v| if case_sensitive { v } else { v.to_lowercase() })
            .collect();
        Ok(Self {
            field: params.str("field")?,
            values,
            allowed,
            case_sensitive,
        })
    }
}

impl RowCheck for ValueSetCheck {
    fn fields(&self) -> Vec<&str> {
        vec![self.field.as_str()]
    }

    fn describe(&self) -> String {
        let mut listed: Vec<&str> = self.values.iter().map(String::as_str).collect();
        listed.sort_unstable();
        if self.allowed {
            format!("{} in [{}]", self.field, listed.join(", "))
        } else {
            format!("{} not in [{}]", self.field, listed.join(", "))
        }
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let value = present(row, &self.field)?;
        let text = value.to_string();
        let key = if self.case_sensitive { text.clone() } else { text.to_lowercase() };
        if self.values.contains(&key) == self.allowed {
            return None;
        }
        let message = if self.allowed {
            format!("Value '{}' is not an allowed value", text)
        } else {
            format!("Value '{}' is a forbidden value", text)
        };
        Some(RowFailure::on(&self.field, value, message))
    }
}

/// Numeric value within inclusive bounds.
pub struct RangeCheck {
    field: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl RangeCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let min = params.opt_f64("min_value")?;
        let max = params.opt_f64("max_value")?;
        if min.is_none() && max.is_none() {
            return Err(RuleConfigError::missing(params.rule_type(), "min_value or max_value"));
        }
        params.ordered("min_value", min, max)?;
        Ok(Self {
            field: params.str("field")?,
            min,
            max,
        })
    }
}

pub(crate) fn bounds_label(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("[{}, {}]", lo, hi),
        (Some(lo), None) => format!(">= {}", lo),
        (None, Some(hi)) => format!("<= {}", hi),
        (None, None) => "any".to_string(),
    }
}

pub(crate) fn within(x: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.is_none_or(|lo| x >= lo) && max.is_none_or(|hi| x <= hi)
}

impl RowCheck for RangeCheck {
    fn fields(&self) -> Vec<&str> {
        vec![self.field.as_str()]
    }

    fn describe(&self) -> String {
        format!("{} in {}", self.field, bounds_label(self.min, self.max))
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let value = present(row, &self.field)?;
        match value.as_f64() {
            None => Some(RowFailure::on(&self.field, value, format!("Value '{}' is not numeric", value))),
            Some(x) if !within(x, self.min, self.max) => Some(RowFailure::on(
                &self.field,
                value,
                format!("Value {} is outside {}", value, bounds_label(self.min, self.max)),
            )),
            Some(_) => None,
        }
    }
}

/// Text length (in characters) within bounds.
pub struct StringLengthCheck {
    field: String,
    min: Option<u64>,
    max: Option<u64>,
}

impl StringLengthCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let min = params.opt_u64("min_length")?;
        let max = params.opt_u64("max_length")?;
        if min.is_none() && max.is_none() {
            return Err(RuleConfigError::missing(params.rule_type(), "min_length or max_length"));
        }
        params.ordered("min_length", min.map(|v| v as f64), max.map(|v| v as f64))?;
        Ok(Self {
            field: params.str("field")?,
            min,
            max,
        })
    }
}

impl RowCheck for StringLengthCheck {
    fn fields(&self) -> Vec<&str> {
        vec![self.field.as_str()]
    }

    fn describe(&self) -> String {
        format!(
            "length of {} in {}",
            self.field,
            bounds_label(self.min.map(|v| v as f64), self.max.map(|v| v as f64))
        )
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let value = present(row, &self.field)?;
        let length = value.to_string().chars().count() as u64;
        if let Some(min) = self.min.filter(|&min| length < min) {
            return Some(RowFailure::on(
                &self.field,
                value,
                format!("Length {} is below minimum {}", length, min),
            ));
        }
        if let Some(max) = self.max.filter(|&max| length > max) {
            return Some(RowFailure::on(
                &self.field,
                value,
                format!("Length {} exceeds maximum {}", length, max),
            ));
        }
        None
    }
}

/// At most `max_decimal_places` digits after the decimal point.
pub struct NumericPrecisionCheck {
    field: String,
    max_places: u64,
}

impl NumericPrecisionCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let max_places = params
            .opt_u64("max_decimal_places")?
            .ok_or_else(|| RuleConfigError::missing(params.rule_type(), "max_decimal_places"))?;
        Ok(Self {
            field: params.str("field")?,
            max_places,
        })
    }
}

fn decimal_places(text: &str) -> u64 {
    let mantissa = text.trim().split(['e', 'E']).next().unwrap_or_default();
    mantissa
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.chars().filter(char::is_ascii_digit).count() as u64)
}

impl RowCheck for NumericPrecisionCheck {
    fn fields(&self) -> Vec<&str> {
        vec![self.field.as_str()]
    }

    fn describe(&self) -> String {
        format!("{} with at most {} decimal places", self.field, self.max_places)
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let value = present(row, &self.field)?;
        if value.as_f64().is_none() {
            return Some(RowFailure::on(&self.field, value, format!("Value '{}' is not numeric", value)));
        }
        let places = decimal_places(&value.to_string());
        (places > self.max_places).then(|| {
            RowFailure::on(
                &self.field,
                value,
                format!("Value {} has {} decimal places, maximum is {}", value, places, self.max_places),
            )
        })
    }
}

/// Expected logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedType {
    Integer,
    Float,
    String,
    Boolean,
    Date,
}

impl ExpectedType {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "int" | "integer" | "int32" | "int64" | "long" => Some(Self::Integer),
            "float" | "double" | "number" | "numeric" | "decimal" | "float64" => Some(Self::Float),
            "str" | "string" | "text" => Some(Self::String),
            "bool" | "boolean" => Some(Self::Boolean),
            "date" | "datetime" | "timestamp" => Some(Self::Date),
            _ => None,
        }
    }

    fn accepts(&self, value: &DataValue) -> bool {
        match self {
            Self::Integer => match value {
                DataValue::Float(f) => f.fract() == 0.0,
                other => other.as_int().is_some(),
            },
            Self::Float => value.as_f64().is_some(),
            Self::String => true,
            Self::Boolean => value.as_bool().is_some(),
            Self::Date => match value {
                DataValue::Timestamp(_) => true,
                DataValue::String(s) => super::temporal::parse_timestamp(s).is_some(),
                _ => false,
            },
        }
    }
}

/// Values must be coercible to an expected type.
pub struct DataTypeCheck {
    field: String,
    expected: ExpectedType,
    label: String,
}

impl DataTypeCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let label = params.str("expected_type")?;
        let expected = ExpectedType::parse(&label).ok_or_else(|| {
            params.error(
                "expected_type",
                format!("unknown type '{}' (use integer, float, string, boolean or date)", label),
            )
        })?;
        Ok(Self {
            field: params.str("field")?,
            expected,
            label,
        })
    }
}

impl RowCheck for DataTypeCheck {
    fn fields(&self) -> Vec<&str> {
        vec![self.field.as_str()]
    }

    fn describe(&self) -> String {
        format!("{} of type {}", self.field, self.label)
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let value = present(row, &self.field)?;
        (!self.expected.accepts(value)).then(|| {
            RowFailure::on(
                &self.field,
                value,
                format!("Value '{}' is not of type {}", value, self.label),
            )
        })
    }
}

/// Compares two fields of the same record.
pub struct CrossFieldComparisonCheck {
    field_a: String,
    op: CompareOp,
    field_b: String,
}

impl CrossFieldComparisonCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let symbol = params.str("operator")?;
        let op = CompareOp::parse(&symbol).ok_or_else(|| {
            params.error(
                "operator",
                format!("unknown operator '{}' (use ==, !=, <, <=, >, >=)", symbol),
            )
        })?;
        Ok(Self {
            field_a: params.str("field_a")?,
            op,
            field_b: params.str("field_b")?,
        })
    }
}

impl RowCheck for CrossFieldComparisonCheck {
    fn fields(&self) -> Vec<&str> {
        vec![self.field_a.as_str(), self.field_b.as_str()]
    }

    fn describe(&self) -> String {
        format!("{} {} {}", self.field_a, self.op, self.field_b)
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let a = present(row, &self.field_a)?;
        let b = present(row, &self.field_b)?;
        let holds = match compare_values(a, b) {
            Some(ordering) => match self.op {
                CompareOp::Eq => ordering.is_eq(),
                CompareOp::Ne => ordering.is_ne(),
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Ge => ordering.is_ge(),
            },
            None => false,
        };
        (!holds).then(|| {
            RowFailure::on(
                &self.field_a,
                a,
                format!("{} ({}) {} {} ({}) does not hold", self.field_a, a, self.op, self.field_b, b),
            )
        })
    }
}

/// Records for which the predicate is false fail.
pub struct InlineBusinessRuleCheck {
    predicate: CompiledPredicate,
}

impl InlineBusinessRuleCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let rule = params.str("rule")?;
        Ok(Self {
            predicate: compile(&rule)?,
        })
    }
}

impl RowCheck for InlineBusinessRuleCheck {
    fn describe(&self) -> String {
        format!("rule '{}'", self.predicate)
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let holds = self.predicate.evaluate(&row.to_batch()).first().copied().unwrap_or(false);
        (!holds).then(|| RowFailure::new(format!("Business rule '{}' is false", self.predicate)))
    }

    fn check_batch(&self, batch: &Batch, failures: &mut SampleBuffer) {
        let mask = self.predicate.evaluate(batch);
        for (i, _) in mask.iter().enumerate().filter(|(_, holds)| !**holds) {
            failures.record_with(|| FailedRecord {
                row: batch.row_number(i),
                field: None,
                value: None,
                message: format!("Business rule '{}' is false", self.predicate),
            });
        }
    }
}

/// A record whose every field is blank fails.
pub struct BlankRecordCheck;

impl RowCheck for BlankRecordCheck {
    fn describe(&self) -> String {
        "no blank records".to_string()
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        row.values()
            .all(|(_, value)| value.is_blank())
            .then(|| RowFailure::new("Record is blank"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use serde_json::json;

    fn customers() -> Batch {
        text_batch(
            &["id", "email", "age", "status", "start", "end"],
            &[
                &["1", "a@example.com", "34", "active", "2024-01-01", "2024-02-01"],
                &["2", "", "17", "ACTIVE", "2024-03-01", "2024-02-01"],
                &["3", "not-an-email", "200", "closed", "2024-01-05", "2024-01-05"],
                &["4", "d@example.org", "abc", "deleted", "", "2024-01-01"],
                &["5", "e@example.net", "41.25", "active", "2024-01-01", "2024-12-31"],
            ],
        )
    }

    #[test]
    fn test_mandatory_field_scenario() {
        let rule = build("MandatoryFieldCheck", json!({"fields": ["email"]}));
        let run = run_row(&rule, &customers());
        assert_eq!(run.failed, 1);
        assert_eq!(run.samples[0].row, 2);
        assert_eq!(run.samples[0].field.as_deref(), Some("email"));
    }

    #[test]
    fn test_mandatory_missing_column_fails_every_record() {
        let rule = build("MandatoryFieldCheck", json!({"fields": ["phone", "id"]}));
        assert_eq!(run_row(&rule, &customers()).failed, 5);
    }

    #[test]
    fn test_regex_and_email() {
        let rule = build("RegexCheck", json!({"field": "status", "pattern": "^[a-z]+$"}));
        let run = run_row(&rule, &customers());
        assert_eq!(run.failed, 1);
        assert!(run.samples[0].message.contains("does not match pattern"));

        let rule = build("RegexCheck", json!({"field": "status", "pattern": "deleted", "invert": true}));
        assert_eq!(run_row(&rule, &customers()).failed, 1);

        let rule = build("EmailFormatCheck", json!({"field": "email"}));
        let run = run_row(&rule, &customers());
        assert_eq!(run.failed, 1);
        assert_eq!(run.samples[0].value.as_deref(), Some("not-an-email"));
    }

    #[test]
    fn test_bad_regex_is_config_error() {
        let err = RuleRegistry::with_builtins()
            .create("RegexCheck", &params("RegexCheck", json!({"field": "a", "pattern": "(["})))
            .unwrap_err();
        assert!(matches!(err, RuleConfigError::InvalidParameter { ref param, .. } if param == "pattern"));
    }

    #[test]
    fn test_value_sets() {
        let rule = build("ValidValuesCheck", json!({"field": "status", "valid_values": ["active", "closed"]}));
        assert_eq!(run_row(&rule, &customers()).failed, 2);

        let rule = build(
            "ValidValuesCheck",
            json!({"field": "status", "valid_values": ["active", "closed"], "case_sensitive": false}),
        );
        assert_eq!(run_row(&rule, &customers()).failed, 1);

        let rule = build("InvalidValuesCheck", json!({"field": "status", "invalid_values": ["deleted"]}));
        assert_eq!(run_row(&rule, &customers()).failed, 1);

        let rule = build("ValidValuesCheck", json!({"field": "id", "valid_values": [1, 2, 3]}));
        assert_eq!(run_row(&rule, &customers()).failed, 2);
    }

    #[test]
    fn test_range() {
        let rule = build("RangeCheck", json!({"field": "age", "min_value": 18, "max_value": 120}));
        let run = run_row(&rule, &customers());
        assert_eq!(run.failed, 3);
        let rows: Vec<u64> = run.samples.iter().map(|s| s.row).collect();
        assert_eq!(rows, vec![2, 3, 4]);
        assert!(run.samples[2].message.contains("not numeric"));
    }

    #[test]
    fn test_range_requires_a_bound() {
        let err = RuleRegistry::with_builtins()
            .create("RangeCheck", &params("RangeCheck", json!({"field": "age"})))
            .unwrap_err();
        assert!(matches!(err, RuleConfigError::MissingParameter { .. }));

        let err = RuleRegistry::with_builtins()
            .create(
                "RangeCheck",
                &params("RangeCheck", json!({"field": "age", "min_value": 5, "max_value": 1})),
            )
            .unwrap_err();
        assert!(matches!(err, RuleConfigError::InvalidParameter { .. }));
    }

    #[test]
    fn test_string_length() {
        let rule = build("StringLengthCheck", json!({"field": "status", "min_length": 6, "max_length": 6}));
        let run = run_row(&rule, &customers());
        assert_eq!(run.failed, 1);
        assert!(run.samples[0].message.contains("exceeds maximum 6"));
    }

    #[test]
    fn test_numeric_precision() {
        assert_eq!(decimal_places("41.25"), 2);
        assert_eq!(decimal_places("7"), 0);
        assert_eq!(decimal_places("1.5e3"), 1);

        let rule = build("NumericPrecisionCheck", json!({"field": "age", "max_decimal_places": 1}));
        let run = run_row(&rule, &customers());
        assert_eq!(run.failed, 2);
    }

    #[test]
    fn test_data_type() {
        let rule = build("DataTypeCheck", json!({"field": "age", "expected_type": "integer"}));
        assert_eq!(run_row(&rule, &customers()).failed, 2);

        let rule = build("DataTypeCheck", json!({"field": "start", "expected_type": "date"}));
        assert_eq!(run_row(&rule, &customers()).failed, 0);

        assert!(
            RuleRegistry::with_builtins()
                .create(
                    "DataTypeCheck",
                    &params("DataTypeCheck", json!({"field": "a", "expected_type": "blob"}))
                )
                .is_err()
        );
    }

    #[test]
    fn test_cross_field_comparison() {
        let rule = build(
            "CrossFieldComparisonCheck",
            json!({"field_a": "start", "operator": "<=", "field_b": "end"}),
        );
        let run = run_row(&rule, &customers());
        assert_eq!(run.failed, 1);
        assert_eq!(run.samples[0].row, 2);
    }

    #[test]
    fn test_inline_business_rule_vectorized() {
        let rule = build("InlineBusinessRuleCheck", json!({"rule": "status != 'closed' OR age < 100"}));
        let run = run_row(&rule, &customers());
        assert_eq!(run.failed, 1);
        assert_eq!(run.samples[0].row, 3);

        let Rule::Row(check) = &rule else { unreachable!() };
        let batch = customers();
        assert!(check.check(&batch.row(2)).is_some());
        assert!(check.check(&batch.row(0)).is_none());
    }

    #[test]
    fn test_blank_record() {
        let batch = text_batch(&["a", "b"], &[&["x", ""], &["", ""], &["", " "]]);
        let rule = build("BlankRecordCheck", json!({}));
        assert_eq!(run_row(&rule, &batch).failed, 2);
    }

    #[test]
    fn test_empty_batch_passes_vacuously() {
        let empty = text_batch(&["email"], &[]);
        for (rule_type, params) in [
            ("MandatoryFieldCheck", json!({"fields": ["email"]})),
            ("EmailFormatCheck", json!({"field": "email"})),
            ("BlankRecordCheck", json!({})),
        ] {
            assert_eq!(run_row(&build(rule_type, params), &empty).failed, 0);
        }
    }
}
