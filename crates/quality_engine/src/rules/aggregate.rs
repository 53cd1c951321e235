//! Whole-file checks.
//!
//! Every check here keeps bounded state (or state that grows with distinct
//! keys only) and reaches the same verdict however the file was batched.

use super::field::{bounds_label, within};
use super::{AggregateCheck, FinalizeContext, Outcome, Rule, row_values};
use crate::reference::{Aggregation, Aggregator};
use crate::stats::{DistinctCounter, KeyTracker, Reservoir, RunningStats, SampleBuffer, key_string};
use crate::{Batch, DataValue, RuleConfigError, RuleFamily, RuleParams, RuleRegistry};
use quality_core::FailedRecord;

/// Reservoir size used by quantile-based checks unless configured.
pub const DEFAULT_RESERVOIR_SIZE: usize = 10_000;

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.register_family("UniqueKeyCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(DuplicateCheck::unique_key(p)?))
    });
    registry.register_family("DuplicateRowCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(DuplicateCheck::duplicate_rows(p)?))
    });
    registry.register_family("CompletenessCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(CompletenessCheck::new(p)?))
    });
    registry.register_family("RowCountRangeCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(RowCountRangeCheck::new(p)?))
    });
    registry.register_family("FileSizeCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(FileSizeCheck::new(p)?))
    });
    registry.register_family("EmptyFileCheck", RuleFamily::Aggregate, |_| {
        Ok(Rule::aggregate(EmptyFileCheck::default()))
    });
    registry.register_family("ColumnPresenceCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(ColumnPresenceCheck::new(p)?))
    });
    registry.register_family("StatisticalOutlierCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(StatisticalOutlierCheck::new(p)?))
    });
    registry.register_family("ColumnStatisticsCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(ColumnStatisticsCheck::new(p)?))
    });
    registry.register_family("PercentileRangeCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(PercentileRangeCheck::new(p)?))
    });
    registry.register_family("DistinctCountCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(DistinctCountCheck::new(p)?))
    });
    registry.register_family("BaselineComparisonCheck", RuleFamily::Aggregate, |p| {
        if p.contains(quality_core::REFERENCE_FILE_PARAM) {
            Ok(Rule::cross_source(super::cross::BaselineReferenceCheck::new(p)?))
        } else {
            Ok(Rule::aggregate(BaselineComparisonCheck::new(p)?))
        }
    });
    registry.accept_reference("BaselineComparisonCheck");
}

/// Columns of `wanted` missing from the file.
fn missing_columns<'a>(wanted: &'a [String], columns: &[String]) -> Vec<&'a str> {
    wanted
        .iter()
        .filter(|w| !columns.contains(*w))
        .map(String::as_str)
        .collect()
}

/// Reads the `min_key`/`max_key` pair, requiring at least one.
fn bounds(params: &RuleParams, min_key: &str, max_key: &str) -> Result<(Option<f64>, Option<f64>), RuleConfigError> {
    let min = params.opt_f64(min_key)?;
    let max = params.opt_f64(max_key)?;
    if min.is_none() && max.is_none() {
        return Err(RuleConfigError::missing(
            params.rule_type(),
            format!("{} or {}", min_key, max_key),
        ));
    }
    params.ordered(min_key, min, max)?;
    Ok((min, max))
}

fn reservoir_size(params: &RuleParams) -> Result<usize, RuleConfigError> {
    match params.opt_u64("reservoir_size")? {
        None => Ok(DEFAULT_RESERVOIR_SIZE),
        Some(0) => Err(params.error("reservoir_size", "must be at least 1")),
        Some(n) => Ok(n as usize),
    }
}

/// Repeated keys, either on declared key columns or on whole records.
///
/// `UniqueKeyCheck` skips records with a null key part; `DuplicateRowCheck`
/// treats nulls as equal to each other.
pub struct DuplicateCheck {
    fields: Option<Vec<String>>,
    skip_null_keys: bool,
    keys: KeyTracker,
    considered: u64,
    failures: SampleBuffer,
}

/// Stand-in for null inside whole-record keys.
const NULL_MARKER: &str = "\u{0}";

impl DuplicateCheck {
    pub fn unique_key(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let fields = if params.contains("fields") {
            params.str_list("fields")?
        } else {
            vec![params.str("field").map_err(|_| RuleConfigError::missing(params.rule_type(), "fields"))?]
        };
        Ok(Self::build(Some(fields), true, params))
    }

    pub fn duplicate_rows(params: &RuleParams) -> Result<Self, RuleConfigError> {
        Ok(Self::build(params.opt_str_list("key_fields")?, false, params))
    }

    fn build(fields: Option<Vec<String>>, skip_null_keys: bool, params: &RuleParams) -> Self {
        Self {
            fields,
            skip_null_keys,
            keys: KeyTracker::new(),
            considered: 0,
            failures: SampleBuffer::new(params.max_samples()),
        }
    }

    fn key<'a, I>(&self, values: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a DataValue>,
    {
        if self.skip_null_keys {
            return key_string(values);
        }
        let parts: Vec<String> = values
            .into_iter()
            .map(|v| v.render().unwrap_or_else(|| NULL_MARKER.to_string()))
            .collect();
        Some(parts.join(&crate::stats::KEY_SEPARATOR.to_string()))
    }

    fn label(&self) -> String {
        match &self.fields {
            Some(fields) => format!("[{}]", fields.join(", ")),
            None => "all columns".to_string(),
        }
    }
}

impl AggregateCheck for DuplicateCheck {
    fn consume(&mut self, batch: &Batch) {
        self.considered += batch.len() as u64;
        let label = self.label();
        let field = self.fields.as_ref().map(|f| f.join(","));
        for row in batch.rows() {
            let key = match &self.fields {
                Some(fields) => match row_values(&row, fields) {
                    Some(values) => self.key(values),
                    None => None,
                },
                None => self.key(row.values().map(|(_, v)| v)),
            };
            let Some(key) = key else { continue };

            if let Some(first) = self.keys.observe(&key, row.row_number()) {
                let shown = key.replace(crate::stats::KEY_SEPARATOR, ", ").replace(NULL_MARKER, "NULL");
                self.failures.record_with(|| FailedRecord {
                    row: row.row_number(),
                    field: field.clone(),
                    value: Some(shown),
                    message: format!("Duplicate of row {} on {}", first, label),
                });
            }
        }
    }

    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> Outcome {
        if let Some(fields) = &self.fields {
            let missing = missing_columns(fields, ctx.columns);
            if !missing.is_empty() {
                return Outcome::fail(
                    format!("Key column(s) not found: {}", missing.join(", ")),
                    0,
                    self.considered,
                );
            }
        }
        let duplicates = self.failures.failed();
        let outcome = if duplicates == 0 {
            Outcome::pass(format!("No duplicates on {}", self.label()), self.considered)
        } else {
            Outcome::fail(
                format!(
                    "Found {} duplicate record(s) on {} ({} distinct keys)",
                    duplicates,
                    self.label(),
                    self.keys.len()
                ),
                duplicates,
                self.considered,
            )
        };
        outcome.with_samples(self.failures.take_samples())
    }
}

/// Share of non-blank values in a column.
pub struct CompletenessCheck {
    field: String,
    min_ratio: f64,
    present: u64,
    considered: u64,
}

impl CompletenessCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let raw = params.f64("min_completeness")?;
        // Values above 1 are percentages.
        let min_ratio = if raw > 1.0 { raw / 100.0 } else { raw };
        if !(0.0..=1.0).contains(&min_ratio) {
            return Err(params.error("min_completeness", format!("{} is not a ratio or percentage", raw)));
        }
        Ok(Self {
            field: params.str("field")?,
            min_ratio,
            present: 0,
            considered: 0,
        })
    }
}

impl AggregateCheck for CompletenessCheck {
    fn consume(&mut self, batch: &Batch) {
        self.considered += batch.len() as u64;
        if let Some(values) = batch.column(&self.field) {
            self.present += values.iter().filter(|v| !v.is_blank()).count() as u64;
        }
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        let missing = self.considered - self.present;
        if self.considered == 0 {
            return Outcome::pass(format!("No records to measure completeness of '{}'", self.field), 0);
        }
        let ratio = self.present as f64 / self.considered as f64;
        Outcome::judge(
            ratio >= self.min_ratio,
            format!(
                "Completeness of '{}' is {:.2}% (minimum {:.2}%)",
                self.field,
                ratio * 100.0,
                self.min_ratio * 100.0
            ),
            missing,
            self.considered,
        )
    }
}

/// Record count within bounds.
pub struct RowCountRangeCheck {
    min: Option<f64>,
    max: Option<f64>,
    rows: u64,
}

impl RowCountRangeCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let (min, max) = bounds(params, "min_rows", "max_rows")?;
        Ok(Self { min, max, rows: 0 })
    }
}

impl AggregateCheck for RowCountRangeCheck {
    fn consume(&mut self, batch: &Batch) {
        self.rows += batch.len() as u64;
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        let ok = within(self.rows as f64, self.min, self.max);
        let message = format!(
            "Row count {} {} {}",
            self.rows,
            if ok { "is within" } else { "is outside" },
            bounds_label(self.min, self.max)
        );
        if ok {
            Outcome::pass(message, self.rows)
        } else {
            Outcome::fail(message, 0, self.rows)
        }
    }
}

/// File size on disk within bounds, in megabytes.
pub struct FileSizeCheck {
    min_mb: Option<f64>,
    max_mb: Option<f64>,
    rows: u64,
}

impl FileSizeCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let (min_mb, max_mb) = bounds(params, "min_size_mb", "max_size_mb")?;
        Ok(Self { min_mb, max_mb, rows: 0 })
    }
}

impl AggregateCheck for FileSizeCheck {
    fn consume(&mut self, batch: &Batch) {
        self.rows += batch.len() as u64;
    }

    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> Outcome {
        let Some(bytes) = ctx.file_size else {
            return Outcome::fail("File size is unavailable", 0, self.rows);
        };
        let mb = bytes as f64 / (1024.0 * 1024.0);
        let ok = within(mb, self.min_mb, self.max_mb);
        let message = format!("File size {:.3} MB (allowed {} MB)", mb, bounds_label(self.min_mb, self.max_mb));
        if ok {
            Outcome::pass(message, self.rows)
        } else {
            Outcome::fail(message, 0, self.rows)
        }
    }
}

/// Fails when no records were read.
#[derive(Default)]
pub struct EmptyFileCheck {
    rows: u64,
}

impl AggregateCheck for EmptyFileCheck {
    fn consume(&mut self, batch: &Batch) {
        self.rows += batch.len() as u64;
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        if self.rows == 0 {
            Outcome::fail("File contains no records", 0, 0)
        } else {
            Outcome::pass(format!("File contains {} records", self.rows), self.rows)
        }
    }
}

/// Required columns are present.
pub struct ColumnPresenceCheck {
    columns: Vec<String>,
    rows: u64,
}

impl ColumnPresenceCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        Ok(Self {
            columns: params.str_list("columns")?,
            rows: 0,
        })
    }
}

impl AggregateCheck for ColumnPresenceCheck {
    fn consume(&mut self, batch: &Batch) {
        self.rows += batch.len() as u64;
    }

    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> Outcome {
        let missing = missing_columns(&self.columns, ctx.columns);
        if missing.is_empty() {
            Outcome::pass(format!("All {} required columns present", self.columns.len()), self.rows)
        } else {
            Outcome::fail(format!("Missing column(s): {}", missing.join(", ")), 0, self.rows)
        }
    }
}

/// Running statistics plus a reservoir over one numeric column.
///
/// Non-numeric values are counted but otherwise ignored.
struct NumericColumn {
    field: String,
    stats: RunningStats,
    reservoir: Reservoir,
    non_numeric: u64,
    considered: u64,
}

impl NumericColumn {
    fn new(field: String, reservoir: usize) -> Self {
        Self {
            field,
            stats: RunningStats::new(),
            reservoir: Reservoir::new(reservoir),
            non_numeric: 0,
            considered: 0,
        }
    }

    fn consume(&mut self, batch: &Batch, keep_sample: bool) {
        self.considered += batch.len() as u64;
        let Some(values) = batch.column(&self.field) else {
            return;
        };
        for value in values.iter().filter(|v| !v.is_null()) {
            match value.as_f64() {
                Some(x) => {
                    self.stats.push(x);
                    if keep_sample {
                        self.reservoir.push(x);
                    }
                }
                None => self.non_numeric += 1,
            }
        }
    }

    fn note(&self) -> String {
        if self.non_numeric > 0 {
            format!(" ({} non-numeric value(s) ignored)", self.non_numeric)
        } else {
            String::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutlierMethod {
    ZScore,
    Iqr,
}

/// Values far from the bulk of a numeric column.
///
/// `zscore` uses the exact running mean and standard deviation; `iqr` uses
/// quartiles of the reservoir. Outliers are counted over the reservoir,
/// which is exact while the column fits and extrapolated beyond that.
pub struct StatisticalOutlierCheck {
    column: NumericColumn,
    method: OutlierMethod,
    threshold: f64,
    max_outlier_pct: f64,
}

impl StatisticalOutlierCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let method_name = params.opt_str("method")?.unwrap_or_else(|| "zscore".to_string()).to_lowercase();
        params.choice("method", &method_name, &["zscore", "iqr"])?;
        let method = if method_name == "iqr" { OutlierMethod::Iqr } else { OutlierMethod::ZScore };
        let threshold = params.opt_f64("threshold")?.unwrap_or(match method {
            OutlierMethod::ZScore => 3.0,
            OutlierMethod::Iqr => 1.5,
        });
        if threshold <= 0.0 {
            return Err(params.error("threshold", "must be positive"));
        }
        let max_outlier_pct = params.opt_f64("max_outlier_pct")?.unwrap_or(0.0);
        Ok(Self {
            column: NumericColumn::new(params.str("field")?, reservoir_size(params)?),
            method,
            threshold,
            max_outlier_pct,
        })
    }

    fn fences(&self) -> Option<(f64, f64)> {
        match self.method {
            OutlierMethod::ZScore => {
                let mean = self.column.stats.mean()?;
                let sd = self.column.stats.stddev()?;
                Some((mean - self.threshold * sd, mean + self.threshold * sd))
            }
            OutlierMethod::Iqr => {
                let sorted = self.column.reservoir.sorted();
                let q1 = crate::stats::quantile_sorted(&sorted, 0.25)?;
                let q3 = crate::stats::quantile_sorted(&sorted, 0.75)?;
                let iqr = q3 - q1;
                Some((q1 - self.threshold * iqr, q3 + self.threshold * iqr))
            }
        }
    }
}

impl AggregateCheck for StatisticalOutlierCheck {
    fn consume(&mut self, batch: &Batch) {
        self.column.consume(batch, true);
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        let numeric = self.column.stats.count();
        let Some((low, high)) = self.fences() else {
            return Outcome::pass(
                format!(
                    "Too few numeric values in '{}' to detect outliers{}",
                    self.column.field,
                    self.column.note()
                ),
                numeric,
            );
        };

        let reservoir = &self.column.reservoir;
        let sampled = reservoir.values().iter().filter(|&&x| x < low || x > high).count() as u64;
        let (outliers, qualifier) = if reservoir.is_exact() {
            (sampled, "")
        } else {
            let scale = reservoir.seen() as f64 / reservoir.values().len() as f64;
            ((sampled as f64 * scale).round() as u64, "an estimated ")
        };
        let pct = outliers as f64 / numeric as f64 * 100.0;
        Outcome::judge(
            pct <= self.max_outlier_pct,
            format!(
                "Found {}{} outlier(s) in '{}' outside [{:.4}, {:.4}] ({:.2}%, maximum {:.2}%){}",
                qualifier,
                outliers,
                self.column.field,
                low,
                high,
                pct,
                self.max_outlier_pct,
                self.column.note()
            ),
            outliers,
            numeric,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statistic {
    Mean,
    Min,
    Max,
    Sum,
    Stddev,
}

/// A summary statistic of a column within bounds.
pub struct ColumnStatisticsCheck {
    column: NumericColumn,
    statistic: Statistic,
    name: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl ColumnStatisticsCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let name = params.str("statistic")?.to_lowercase();
        let statistic = match name.as_str() {
            "mean" | "avg" => Statistic::Mean,
            "min" => Statistic::Min,
            "max" => Statistic::Max,
            "sum" => Statistic::Sum,
            "stddev" | "std" => Statistic::Stddev,
            _ => {
                return Err(params.error(
                    "statistic",
                    format!("'{}' is not one of: mean, min, max, sum, stddev", name),
                ));
            }
        };
        let (min, max) = bounds(params, "min_value", "max_value")?;
        Ok(Self {
            column: NumericColumn::new(params.str("field")?, 1),
            statistic,
            name,
            min,
            max,
        })
    }

    fn value(&self) -> Option<f64> {
        let stats = &self.column.stats;
        match self.statistic {
            Statistic::Mean => stats.mean(),
            Statistic::Min => stats.min(),
            Statistic::Max => stats.max(),
            Statistic::Sum => (stats.count() > 0).then(|| stats.sum()),
            Statistic::Stddev => stats.stddev(),
        }
    }
}

impl AggregateCheck for ColumnStatisticsCheck {
    fn consume(&mut self, batch: &Batch) {
        self.column.consume(batch, false);
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        let total = self.column.considered;
        let Some(value) = self.value() else {
            return Outcome::fail(
                format!("Cannot compute {} of '{}': not enough numeric values", self.name, self.column.field),
                0,
                total,
            );
        };
        Outcome::judge(
            within(value, self.min, self.max),
            format!(
                "{} of '{}' is {:.4} (expected {}){}",
                self.name,
                self.column.field,
                value,
                bounds_label(self.min, self.max),
                self.column.note()
            ),
            0,
            total,
        )
    }
}

/// A percentile of a column within bounds.
pub struct PercentileRangeCheck {
    column: NumericColumn,
    quantile: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl PercentileRangeCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let raw = params.f64("percentile")?;
        // Accept both 0.95 and 95.
        let quantile = if raw > 1.0 { raw / 100.0 } else { raw };
        if !(0.0..=1.0).contains(&quantile) {
            return Err(params.error("percentile", format!("{} is outside 0-100", raw)));
        }
        let (min, max) = bounds(params, "min_value", "max_value")?;
        Ok(Self {
            column: NumericColumn::new(params.str("field")?, reservoir_size(params)?),
            quantile,
            min,
            max,
        })
    }
}

impl AggregateCheck for PercentileRangeCheck {
    fn consume(&mut self, batch: &Batch) {
        self.column.consume(batch, true);
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        let total = self.column.considered;
        let label = format!("p{}", (self.quantile * 100.0 * 100.0).round() / 100.0);
        let Some(value) = self.column.reservoir.quantile(self.quantile) else {
            return Outcome::fail(
                format!("Cannot compute {} of '{}': no numeric values", label, self.column.field),
                0,
                total,
            );
        };
        let qualifier = if self.column.reservoir.is_exact() { "" } else { " (estimated)" };
        Outcome::judge(
            within(value, self.min, self.max),
            format!(
                "{} of '{}' is {:.4}{} (expected {})",
                label,
                self.column.field,
                value,
                qualifier,
                bounds_label(self.min, self.max)
            ),
            0,
            total,
        )
    }
}

/// Number of distinct non-null values within bounds.
pub struct DistinctCountCheck {
    field: String,
    min: Option<f64>,
    max: Option<f64>,
    distinct: DistinctCounter,
    considered: u64,
}

impl DistinctCountCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let (min, max) = bounds(params, "min_distinct", "max_distinct")?;
        Ok(Self {
            field: params.str("field")?,
            min,
            max,
            distinct: DistinctCounter::new(),
            considered: 0,
        })
    }
}

impl AggregateCheck for DistinctCountCheck {
    fn consume(&mut self, batch: &Batch) {
        self.considered += batch.len() as u64;
        if let Some(values) = batch.column(&self.field) {
            for text in values.iter().filter_map(DataValue::render) {
                self.distinct.observe(&text);
            }
        }
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        let count = self.distinct.count();
        Outcome::judge(
            within(count as f64, self.min, self.max),
            format!(
                "'{}' has {} distinct value(s) (expected {})",
                self.field,
                count,
                bounds_label(self.min, self.max)
            ),
            0,
            self.considered,
        )
    }
}

/// Reads `aggregation` and `field` shared by baseline and comparison checks.
pub(crate) fn aggregation_params(params: &RuleParams) -> Result<(Aggregation, Option<String>), RuleConfigError> {
    let name = params.str("aggregation")?;
    let aggregation = Aggregation::parse(&name).ok_or_else(|| {
        params.error(
            "aggregation",
            format!("'{}' is not one of: {}", name, Aggregation::NAMES.join(", ")),
        )
    })?;
    let field = params.opt_str("field")?;
    if aggregation.needs_field() && field.is_none() {
        return Err(RuleConfigError::missing(params.rule_type(), "field"));
    }
    Ok((aggregation, field))
}

/// Relative deviation of `actual` from `baseline`, in percent.
pub(crate) fn deviation_pct(actual: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        if actual == 0.0 { 0.0 } else { f64::INFINITY }
    } else {
        (actual - baseline).abs() / baseline.abs() * 100.0
    }
}

/// Verdict shared by both baseline variants.
pub(crate) fn judge_baseline(
    aggregator: &Aggregator,
    baseline: Option<f64>,
    max_deviation_pct: f64,
    total: u64,
) -> Outcome {
    let label = aggregator.label();
    let (Some(actual), Some(baseline)) = (aggregator.value(), baseline) else {
        return Outcome::fail(format!("Cannot compare {}: value undefined", label), 0, total);
    };
    let deviation = deviation_pct(actual, baseline);
    Outcome::judge(
        deviation <= max_deviation_pct,
        format!(
            "{} is {} against baseline {} ({:.2}% deviation, maximum {:.2}%)",
            label, actual, baseline, deviation, max_deviation_pct
        ),
        0,
        total,
    )
}

/// An aggregate compared to a fixed baseline value.
pub struct BaselineComparisonCheck {
    aggregator: Aggregator,
    baseline: f64,
    max_deviation_pct: f64,
    considered: u64,
}

impl BaselineComparisonCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let (aggregation, field) = aggregation_params(params)?;
        Ok(Self {
            aggregator: Aggregator::new(aggregation, field),
            baseline: params.f64("baseline_value")?,
            max_deviation_pct: params.f64("max_deviation_pct")?,
            considered: 0,
        })
    }
}

impl AggregateCheck for BaselineComparisonCheck {
    fn consume(&mut self, batch: &Batch) {
        self.considered += batch.len() as u64;
        self.aggregator.consume(batch);
    }

    fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Outcome {
        judge_baseline(&self.aggregator, Some(self.baseline), self.max_deviation_pct, self.considered)
    }
}
