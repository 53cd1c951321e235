//! Typed access to rule parameters.

use crate::{DataValue, RuleConfigError};
use quality_core::DEFAULT_MAX_SAMPLE_FAILURES;
use serde_json::{Map, Value};

/// Parameters handed to a rule constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleParams {
    rule_type: String,
    values: Map<String, Value>,
    max_samples: usize,
}

impl RuleParams {
    /// Wraps a parameter map for the given rule type.
    pub fn new(rule_type: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            rule_type: rule_type.into(),
            values,
            max_samples: DEFAULT_MAX_SAMPLE_FAILURES,
        }
    }

    /// Sets the sample cap rules should honor.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Rule type, used in error messages.
    pub fn rule_type(&self) -> &str {
        &self.rule_type
    }

    /// Maximum failing records a rule keeps.
    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Raw parameter value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// Whether the parameter is present and not null.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn missing(&self, key: &str) -> RuleConfigError {
        RuleConfigError::missing(&self.rule_type, key)
    }

    fn invalid(&self, key: &str, message: impl Into<String>) -> RuleConfigError {
        RuleConfigError::invalid(&self.rule_type, key, message)
    }

    /// Required string parameter.
    pub fn str(&self, key: &str) -> Result<String, RuleConfigError> {
        self.opt_str(key)?.ok_or_else(|| self.missing(key))
    }

    /// Optional string parameter; numbers and booleans are accepted as text.
    pub fn opt_str(&self, key: &str) -> Result<Option<String>, RuleConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Err(self.invalid(key, "must not be empty")),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(self.invalid(key, format!("expected a string, got {}", other))),
        }
    }

    /// Required number.
    pub fn f64(&self, key: &str) -> Result<f64, RuleConfigError> {
        self.opt_f64(key)?.ok_or_else(|| self.missing(key))
    }

    /// Optional number; numeric strings are accepted.
    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, RuleConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(key, "number out of range")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Some)
                .ok_or_else(|| self.invalid(key, format!("expected a number, got '{}'", s))),
            Some(other) => Err(self.invalid(key, format!("expected a number, got {}", other))),
        }
    }

    /// Optional non-negative integer.
    pub fn opt_u64(&self, key: &str) -> Result<Option<u64>, RuleConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(key, format!("expected a non-negative integer, got {}", n))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| self.invalid(key, format!("expected a non-negative integer, got '{}'", s))),
            Some(other) => Err(self.invalid(
                key,
                format!("expected a non-negative integer, got {}", other),
            )),
        }
    }

    /// Optional boolean, `default` when absent.
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, RuleConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => DataValue::from(s.as_str())
                .as_bool()
                .ok_or_else(|| self.invalid(key, format!("expected a boolean, got '{}'", s))),
            Some(other) => Err(self.invalid(key, format!("expected a boolean, got {}", other))),
        }
    }

    /// Required list of strings. A single string is a one-element list.
    pub fn str_list(&self, key: &str) -> Result<Vec<String>, RuleConfigError> {
        let list = self.opt_str_list(key)?.ok_or_else(|| self.missing(key))?;
        if list.is_empty() {
            return Err(self.invalid(key, "must not be empty"));
        }
        Ok(list)
    }

    /// Optional list of strings.
    pub fn opt_str_list(&self, key: &str) -> Result<Option<Vec<String>>, RuleConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(self.invalid(key, format!("expected a list of strings, found {}", other))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(self.invalid(key, format!("expected a list of strings, got {}", other))),
        }
    }

    /// Required list of scalar values.
    pub fn value_list(&self, key: &str) -> Result<Vec<DataValue>, RuleConfigError> {
        match self.get(key) {
            None => Err(self.missing(key)),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Array(_) | Value::Object(_) => {
                        Err(self.invalid(key, format!("expected scalar values, found {}", item)))
                    }
                    scalar => Ok(DataValue::from(scalar)),
                })
                .collect(),
            Some(scalar @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => {
                Ok(vec![DataValue::from(scalar)])
            }
            Some(other) => Err(self.invalid(key, format!("expected a list, got {}", other))),
        }
    }

    /// Rejects a parameter value outside `allowed`.
    pub fn choice(&self, key: &str, value: &str, allowed: &[&str]) -> Result<(), RuleConfigError> {
        if allowed.contains(&value) {
            Ok(())
        } else {
            Err(self.invalid(
                key,
                format!("'{}' is not one of: {}", value, allowed.join(", ")),
            ))
        }
    }

    /// Fails unless `min <= max` when both are given.
    pub fn ordered(&self, min_key: &str, min: Option<f64>, max: Option<f64>) -> Result<(), RuleConfigError> {
        match (min, max) {
            (Some(lo), Some(hi)) if lo > hi => Err(self.invalid(
                min_key,
                format!("minimum {} is greater than maximum {}", lo, hi),
            )),
            _ => Ok(()),
        }
    }

    /// Creates a parameter error for this rule.
    pub fn error(&self, key: &str, message: impl Into<String>) -> RuleConfigError {
        self.invalid(key, message)
    }
}
