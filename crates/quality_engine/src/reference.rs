//! Materialized data from reference files.
//!
//! Cross-source rules name another file of the job and ask for either its
//! key set or one scalar aggregate. The engine computes that before the
//! dependent file starts streaming, reading only the columns involved.

use crate::source::open_source;
use crate::stats::{DistinctCounter, RunningStats, key_string};
use crate::{Batch, SourceError};
use quality_core::FileSpec;
use std::collections::HashSet;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Scalar aggregations over one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    /// Records, or non-null values when a field is given
    Count,
    Sum,
    Mean,
    Min,
    Max,
    Stddev,
    /// Distinct non-null values
    Distinct,
    /// Null values
    Nulls,
}

impl Aggregation {
    pub const NAMES: [&'static str; 8] = ["count", "sum", "mean", "min", "max", "stddev", "distinct", "nulls"];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "count" | "row_count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "mean" | "avg" | "average" => Some(Self::Mean),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "stddev" | "std" => Some(Self::Stddev),
            "distinct" | "distinct_count" => Some(Self::Distinct),
            "nulls" | "null_count" => Some(Self::Nulls),
            _ => None,
        }
    }

    /// Whether the aggregation needs a column.
    pub fn needs_field(&self) -> bool {
        !matches!(self, Self::Count)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Stddev => "stddev",
            Self::Distinct => "distinct",
            Self::Nulls => "nulls",
        };
        f.write_str(name)
    }
}

/// Single-pass accumulator for an [`Aggregation`].
#[derive(Debug, Clone)]
pub struct Aggregator {
    aggregation: Aggregation,
    field: Option<String>,
    rows: u64,
    nulls: u64,
    stats: RunningStats,
    distinct: DistinctCounter,
}

impl Aggregator {
    pub fn new(aggregation: Aggregation, field: Option<String>) -> Self {
        Self {
            aggregation,
            field,
            rows: 0,
            nulls: 0,
            stats: RunningStats::new(),
            distinct: DistinctCounter::new(),
        }
    }

    pub fn consume(&mut self, batch: &Batch) {
        self.rows += batch.len() as u64;
        let Some(field) = &self.field else {
            return;
        };
        let Some(values) = batch.column(field) else {
            self.nulls += batch.len() as u64;
            return;
        };
        for value in values {
            if value.is_null() {
                self.nulls += 1;
                continue;
            }
            if let Some(x) = value.as_f64() {
                self.stats.push(x);
            }
            if let Some(text) = value.render() {
                self.distinct.observe(&text);
            }
        }
    }

    /// The aggregate, `None` when it is undefined (e.g. the mean of nothing).
    pub fn value(&self) -> Option<f64> {
        match self.aggregation {
            Aggregation::Count => Some(match self.field {
                Some(_) => (self.rows - self.nulls) as f64,
                None => self.rows as f64,
            }),
            Aggregation::Sum => (self.stats.count() > 0).then(|| self.stats.sum()),
            Aggregation::Mean => self.stats.mean(),
            Aggregation::Min => self.stats.min(),
            Aggregation::Max => self.stats.max(),
            Aggregation::Stddev => self.stats.stddev(),
            Aggregation::Distinct => Some(self.distinct.count() as f64),
            Aggregation::Nulls => Some(self.nulls as f64),
        }
    }

    /// Human-readable name, e.g. `mean(amount)`.
    pub fn label(&self) -> String {
        match &self.field {
            Some(field) => format!("{}({})", self.aggregation, field),
            None => self.aggregation.to_string(),
        }
    }
}

/// What a cross-source rule needs from its reference file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceRequest {
    /// Composite keys rendered from `fields`
    Keys { file: String, fields: Vec<String> },
    /// One aggregate of the reference file
    Aggregate {
        file: String,
        aggregation: Aggregation,
        field: Option<String>,
    },
}

impl ReferenceRequest {
    /// Name of the referenced file.
    pub fn file(&self) -> &str {
        match self {
            Self::Keys { file, .. } | Self::Aggregate { file, .. } => file,
        }
    }

    /// Columns to read, `None` when the whole file is needed.
    fn projection(&self) -> Option<Vec<String>> {
        match self {
            Self::Keys { fields, .. } => Some(fields.clone()),
            Self::Aggregate { field, .. } => field.as_ref().map(|f| vec![f.clone()]),
        }
    }
}

/// Materialized reference data.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceData {
    Keys(HashSet<String>),
    Aggregate(Option<f64>),
}

/// Reads a reference file and computes what `request` asks for.
///
/// Only the requested columns are read. Cancellation is checked between
/// batches; a cancelled read yields whatever was gathered so far, and the
/// caller is expected to discard it.
pub fn resolve_reference(
    spec: &FileSpec,
    request: &ReferenceRequest,
    chunk_size: usize,
    cancel: &CancellationToken,
) -> Result<ReferenceData, SourceError> {
    let mut projected = spec.clone();
    if let Some(columns) = request.projection() {
        projected.columns = Some(columns);
    }
    let mut source = open_source(&projected, chunk_size)?;
    debug!(file = %spec.name, ?request, "resolving reference");

    let data = match request {
        ReferenceRequest::Keys { fields, .. } => {
            let mut keys = HashSet::new();
            while let Some(batch) = source.next_batch()? {
                for row in batch.rows() {
                    let values = fields.iter().map(|f| row.get(f).unwrap_or(&crate::DataValue::Null));
                    if let Some(key) = key_string(values) {
                        keys.insert(key);
                    }
                }
                if cancel.is_cancelled() {
                    break;
                }
            }
            info!(file = %spec.name, keys = keys.len(), "reference keys loaded");
            ReferenceData::Keys(keys)
        }
        ReferenceRequest::Aggregate { aggregation, field, .. } => {
            let mut aggregator = Aggregator::new(*aggregation, field.clone());
            while let Some(batch) = source.next_batch()? {
                aggregator.consume(&batch);
                if cancel.is_cancelled() {
                    break;
                }
            }
            let value = aggregator.value();
            info!(file = %spec.name, aggregate = %aggregator.label(), ?value, "reference aggregate computed");
            ReferenceData::Aggregate(value)
        }
    };

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::text_batch;
    use std::io::Write;

    #[test]
    fn test_aggregator_values() {
        let batch = text_batch(&["x"], &[&["1"], &["3"], &[""], &["3"], &["n/a"]]);
        let value = |aggregation, field: Option<&str>| {
            let mut agg = Aggregator::new(aggregation, field.map(String::from));
            agg.consume(&batch);
            agg.value()
        };
        assert_eq!(value(Aggregation::Count, None), Some(5.0));
        assert_eq!(value(Aggregation::Count, Some("x")), Some(4.0));
        assert_eq!(value(Aggregation::Sum, Some("x")), Some(7.0));
        assert_eq!(value(Aggregation::Max, Some("x")), Some(3.0));
        assert_eq!(value(Aggregation::Distinct, Some("x")), Some(3.0));
        assert_eq!(value(Aggregation::Nulls, Some("x")), Some(1.0));
        assert_eq!(value(Aggregation::Nulls, Some("missing")), Some(5.0));
        assert_eq!(value(Aggregation::Mean, Some("missing")), None);
    }

    #[test]
    fn test_aggregation_names() {
        for name in Aggregation::NAMES {
            let parsed = Aggregation::parse(name).unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert_eq!(Aggregation::parse("AVG"), Some(Aggregation::Mean));
        assert_eq!(Aggregation::parse("median"), None);
    }

    #[test]
    fn test_resolve_keys_and_aggregate() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,region,amount\n1,eu,10\n2,us,20\n3,eu,\n2,us,5").unwrap();
        let spec = FileSpec::new("customers", file.path().to_string_lossy());
        let cancel = CancellationToken::new();

        let keys = resolve_reference(
            &spec,
            &ReferenceRequest::Keys {
                file: "customers".into(),
                fields: vec!["id".into()],
            },
            2,
            &cancel,
        )
        .unwrap();
        let ReferenceData::Keys(keys) = keys else { panic!("expected keys") };
        assert_eq!(keys.len(), 3);
        assert!(keys.contains("2"));

        let total = resolve_reference(
            &spec,
            &ReferenceRequest::Aggregate {
                file: "customers".into(),
                aggregation: Aggregation::Sum,
                field: Some("amount".into()),
            },
            3,
            &cancel,
        )
        .unwrap();
        assert_eq!(total, ReferenceData::Aggregate(Some(35.0)));
    }

    #[test]
    fn test_resolve_missing_column_is_source_error() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id\n1").unwrap();
        let spec = FileSpec::new("ref", file.path().to_string_lossy());
        let request = ReferenceRequest::Keys {
            file: "ref".into(),
            fields: vec!["code".into()],
        };
        let err = resolve_reference(&spec, &request, 10, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
