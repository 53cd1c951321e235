//! Date and time checks.

use super::{AggregateCheck, FinalizeContext, Outcome, Rule, RowCheck, RowFailure};
use crate::{Batch, DataValue, RowView, RuleConfigError, RuleFamily, RuleParams, RuleRegistry};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.register_family("DateFormatCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(DateFormatCheck::new(p)?))
    });
    registry.register_family("DateRangeCheck", RuleFamily::Row, |p| {
        Ok(Rule::row(DateRangeCheck::new(p)?))
    });
    registry.register_family("FreshnessCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(FreshnessCheck::new(p)?))
    });
}

/// Parses a duration string like "1h", "30m", "1d".
///
/// A bare number is seconds.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    let split = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(text.len(), |(i, _)| i);
    let (number, unit) = text.split_at(split);
    let n: i64 = number.parse().ok()?;

    let duration = match unit.trim().to_lowercase().as_str() {
        "" | "s" | "sec" | "second" | "seconds" => Duration::try_seconds(n)?,
        "m" | "min" | "minute" | "minutes" => Duration::try_minutes(n)?,
        "h" | "hr" | "hour" | "hours" => Duration::try_hours(n)?,
        "d" | "day" | "days" => Duration::try_days(n)?,
        "w" | "week" | "weeks" => Duration::try_weeks(n)?,
        _ => return None,
    };
    Some(duration)
}

/// Parses a timestamp in one of the common formats.
///
/// Supports:
/// - RFC 3339 (`2024-01-15T10:30:00Z`)
/// - Unix epoch seconds, or milliseconds for large values
/// - `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DDTHH:MM:SS` (taken as UTC)
/// - `YYYY-MM-DD` (start of day UTC)
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(epoch) = text.parse::<i64>() {
        return if epoch > 10_000_000_000 {
            DateTime::from_timestamp_millis(epoch)
        } else {
            DateTime::from_timestamp(epoch, 0)
        };
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Formats a duration for display.
pub fn format_duration(duration: Duration) -> String {
    if duration.num_days() > 0 {
        format!("{}d", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m", duration.num_minutes())
    } else {
        format!("{}s", duration.num_seconds())
    }
}

fn value_timestamp(value: &DataValue) -> Option<DateTime<Utc>> {
    match value {
        DataValue::Int(epoch) => parse_timestamp(&epoch.to_string()),
        other => other.as_str().and_then(parse_timestamp),
    }
}

/// Turns `YYYY-MM-DD`-style patterns into strftime; strftime passes through.
fn strftime_pattern(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }
    [
        ("YYYY", "%Y"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
    ]
    .iter()
    .fold(format.to_string(), |acc, (token, spec)| acc.replace(token, spec))
}

/// Text must parse with a date/time format.
pub struct DateFormatCheck {
    field: String,
    format: String,
    pattern: String,
}

impl DateFormatCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let format = params.str("format")?;
        Ok(Self {
            field: params.str("field")?,
            pattern: strftime_pattern(&format),
            format,
        })
    }

    fn matches(&self, text: &str) -> bool {
        let text = text.trim();
        NaiveDateTime::parse_from_str(text, &self.pattern).is_ok()
            || NaiveDate::parse_from_str(text, &self.pattern).is_ok()
    }
}

impl RowCheck for DateFormatCheck {
    fn fields(&self) -> Vec<&str> {
        vec![self.field.as_str()]
    }

    fn describe(&self) -> String {
        format!("{} formatted as {}", self.field, self.format)
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let value = row.get(&self.field).filter(|v| !v.is_null())?;
        let text = value.to_string();
        (!self.matches(&text)).then(|| {
            RowFailure::on(
                &self.field,
                value,
                format!("Value '{}' does not match date format '{}'", text, self.format),
            )
        })
    }
}

/// Dates within inclusive bounds.
pub struct DateRangeCheck {
    field: String,
    min: Option<DateTime<Utc>>,
    max: Option<DateTime<Utc>>,
}

impl DateRangeCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let bound = |key: &str| -> Result<Option<DateTime<Utc>>, RuleConfigError> {
            params
                .opt_str(key)?
                .map(|text| parse_timestamp(&text).ok_or_else(|| params.error(key, format!("invalid date '{}'", text))))
                .transpose()
        };
        let min = bound("min_date")?;
        let max = bound("max_date")?;
        match (min, max) {
            (None, None) => return Err(RuleConfigError::missing(params.rule_type(), "min_date or max_date")),
            (Some(lo), Some(hi)) if lo > hi => {
                return Err(params.error("min_date", "minimum date is after maximum date"));
            }
            _ => {}
        }
        Ok(Self {
            field: params.str("field")?,
            min,
            max,
        })
    }
}

impl RowCheck for DateRangeCheck {
    fn fields(&self) -> Vec<&str> {
        vec![self.field.as_str()]
    }

    fn describe(&self) -> String {
        let show = |d: Option<DateTime<Utc>>| d.map_or_else(|| "-".to_string(), |d| d.to_rfc3339());
        format!("{} between {} and {}", self.field, show(self.min), show(self.max))
    }

    fn check(&self, row: &RowView<'_>) -> Option<RowFailure> {
        let value = row.get(&self.field).filter(|v| !v.is_null())?;
        let Some(ts) = value_timestamp(value) else {
            return Some(RowFailure::on(&self.field, value, format!("Value '{}' is not a date", value)));
        };
        if self.min.is_some_and(|lo| ts < lo) || self.max.is_some_and(|hi| ts > hi) {
            return Some(RowFailure::on(
                &self.field,
                value,
                format!("Date {} is outside the allowed range", value),
            ));
        }
        None
    }
}

/// The newest timestamp in a column must be recent enough.
pub struct FreshnessCheck {
    field: String,
    max_age: Duration,
    max_age_label: String,
    newest: Option<DateTime<Utc>>,
    considered: u64,
}

impl FreshnessCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let label = params.str("max_age")?;
        let max_age = parse_duration(&label).ok_or_else(|| {
            params.error("max_age", format!("invalid duration '{}' (use e.g. 30m, 1h, 2d, 1w)", label))
        })?;
        Ok(Self {
            field: params.str("field")?,
            max_age,
            max_age_label: label,
            newest: None,
            considered: 0,
        })
    }
}

impl AggregateCheck for FreshnessCheck {
    fn consume(&mut self, batch: &Batch) {
        self.considered += batch.len() as u64;
        let Some(values) = batch.column(&self.field) else {
            return;
        };
        for ts in values.iter().filter_map(value_timestamp) {
            if self.newest.is_none_or(|newest| ts > newest) {
                self.newest = Some(ts);
            }
        }
    }

    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> Outcome {
        let Some(newest) = self.newest else {
            return Outcome::fail(
                format!("No valid timestamps found in field '{}'", self.field),
                0,
                self.considered,
            );
        };
        let age = ctx.now.signed_duration_since(newest);
        if age > self.max_age {
            Outcome::fail(
                format!(
                    "Data is stale: newest {} is {} old, maximum is {}",
                    newest.to_rfc3339(),
                    format_duration(age),
                    self.max_age_label
                ),
                0,
                self.considered,
            )
        } else {
            Outcome::pass(
                format!("Newest {} is within {}", newest.to_rfc3339(), self.max_age_label),
                self.considered,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1h"), Some(Duration::hours(1)));
        assert_eq!(parse_duration("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_duration("2d"), Some(Duration::days(2)));
        assert_eq!(parse_duration("1w"), Some(Duration::weeks(1)));
        assert_eq!(parse_duration("90"), Some(Duration::seconds(90)));
        assert_eq!(parse_duration("5minutes"), Some(Duration::minutes(5)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("1x"), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
            .and_utc();
        assert_eq!(parse_timestamp("2024-01-15T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("1705314600"), Some(expected));
        assert_eq!(parse_timestamp("1705314600000"), Some(expected));
        assert!(parse_timestamp("2024-01-15").is_some());
        assert!(parse_timestamp("15/01/2024").is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::days(3)), "3d");
        assert_eq!(format_duration(Duration::minutes(90)), "1h");
        assert_eq!(format_duration(Duration::seconds(5)), "5s");
    }

    #[test]
    fn test_date_format() {
        let batch = text_batch(&["d"], &[&["2024-01-31"], &["31/01/2024"], &[""], &["2024-02-30"]]);
        let rule = build("DateFormatCheck", json!({"field": "d", "format": "%Y-%m-%d"}));
        let run = run_row(&rule, &batch);
        assert_eq!(run.failed, 2);

        let rule = build("DateFormatCheck", json!({"field": "d", "format": "DD/MM/YYYY"}));
        assert_eq!(run_row(&rule, &batch).failed, 2);
    }

    #[test]
    fn test_date_range() {
        let batch = text_batch(&["d"], &[&["2024-01-31"], &["2023-12-31"], &["soon"], &["2024-06-01T00:00:00Z"]]);
        let rule = build(
            "DateRangeCheck",
            json!({"field": "d", "min_date": "2024-01-01", "max_date": "2024-12-31"}),
        );
        let run = run_row(&rule, &batch);
        assert_eq!(run.failed, 2);
        assert_eq!(run.samples[0].row, 2);
        assert!(run.samples[1].message.contains("not a date"));
    }

    #[test]
    fn test_freshness() {
        let now = Utc::now();
        let recent = (now - Duration::minutes(10)).to_rfc3339();
        let old = (now - Duration::days(3)).to_rfc3339();

        let batch = text_batch(&["ts"], &[&[old.as_str()], &[recent.as_str()]]);
        let mut rule = build("FreshnessCheck", json!({"field": "ts", "max_age": "1h"}));
        assert!(run_aggregate(&mut rule, &[batch]).passed);

        let batch = text_batch(&["ts"], &[&[old.as_str()], &["garbage"]]);
        let mut rule = build("FreshnessCheck", json!({"field": "ts", "max_age": "1d"}));
        let outcome = run_aggregate(&mut rule, &[batch]);
        assert!(!outcome.passed);
        assert!(outcome.message.contains("stale"));

        let mut rule = build("FreshnessCheck", json!({"field": "ts", "max_age": "1d"}));
        let outcome = run_aggregate(&mut rule, &[]);
        assert!(!outcome.passed);
        assert!(outcome.message.contains("No valid timestamps"));
    }

    #[test]
    fn test_freshness_rejects_bad_duration() {
        let err = RuleRegistry::with_builtins()
            .create("FreshnessCheck", &params("FreshnessCheck", json!({"field": "ts", "max_age": "soon"})))
            .unwrap_err();
        assert!(matches!(err, RuleConfigError::InvalidParameter { .. }));
    }
}
