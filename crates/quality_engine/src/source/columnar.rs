//! Parquet adapter.

use super::{ChunkSource, ReadOptions, open_file, project};
use crate::{Batch, Columns, DataValue, SourceError};
use arrow_array::array::*;
use arrow_array::RecordBatch;
use arrow_schema::{DataType, TimeUnit};
use chrono::SecondsFormat;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::sync::Arc;
use tracing::warn;

/// Streams record batches from a Parquet file.
///
/// Only the projected root columns are decoded.
pub struct ParquetSource {
    path: String,
    reader: ParquetRecordBatchReader,
    columns: Arc<Columns>,
    next_row: u64,
}

impl ParquetSource {
    /// Opens a Parquet file.
    pub fn open(path: &str, options: &ReadOptions) -> Result<Self, SourceError> {
        let file = open_file(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| SourceError::malformed(path, "parquet", e.to_string()))?;

        let available: Vec<String> = builder
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect();
        let (positions, columns) =
            project(path, "parquet", &available, options.projection.as_deref())?;

        let mut roots = positions.clone();
        roots.sort_unstable();
        let mask = ProjectionMask::roots(builder.parquet_schema(), roots);

        let reader = builder
            .with_projection(mask)
            .with_batch_size(options.chunk_size)
            .build()
            .map_err(|e| SourceError::malformed(path, "parquet", e.to_string()))?;

        Ok(Self {
            path: path.to_string(),
            reader,
            columns,
            next_row: 1,
        })
    }

    fn convert(&self, record_batch: &RecordBatch) -> Result<Batch, SourceError> {
        let num_rows = record_batch.num_rows();
        let data = self
            .columns
            .names()
            .iter()
            .map(|name| {
                let array = record_batch.column_by_name(name).ok_or_else(|| {
                    SourceError::malformed(
                        &self.path,
                        "parquet",
                        format!("column '{}' missing from row group", name),
                    )
                })?;
                convert_array(array)
                    .map_err(|message| SourceError::malformed(&self.path, "parquet", message))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Batch::from_columns(
            Arc::clone(&self.columns),
            data,
            num_rows,
            self.next_row,
        ))
    }
}

impl ChunkSource for ParquetSource {
    fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, SourceError> {
        loop {
            let Some(result) = self.reader.next() else {
                return Ok(None);
            };
            let record_batch =
                result.map_err(|e| SourceError::malformed(&self.path, "parquet", e.to_string()))?;
            if record_batch.num_rows() == 0 {
                continue;
            }
            let batch = self.convert(&record_batch)?;
            self.next_row += batch.len() as u64;
            return Ok(Some(batch));
        }
    }
}

macro_rules! downcast {
    ($array:expr, $ty:ty) => {
        $array
            .as_any()
            .downcast_ref::<$ty>()
            .ok_or_else(|| format!("Failed to downcast to {}", stringify!($ty)))?
    };
}

fn collect<F>(array: &ArrayRef, value: F) -> Vec<DataValue>
where
    F: Fn(usize) -> DataValue,
{
    (0..array.len())
        .map(|i| {
            if array.is_null(i) {
                DataValue::Null
            } else {
                value(i)
            }
        })
        .collect()
}

fn timestamp(value: Option<chrono::NaiveDateTime>) -> DataValue {
    value.map_or(DataValue::Null, |dt| {
        DataValue::Timestamp(dt.and_utc().to_rfc3339_opts(SecondsFormat::AutoSi, true))
    })
}

/// Converts a whole Arrow column to values.
pub(crate) fn convert_array(array: &ArrayRef) -> Result<Vec<DataValue>, String> {
    let values = match array.data_type() {
        DataType::Null => vec![DataValue::Null; array.len()],
        DataType::Boolean => {
            let a = downcast!(array, BooleanArray);
            collect(array, |i| DataValue::Bool(a.value(i)))
        }
        DataType::Int8 => {
            let a = downcast!(array, Int8Array);
            collect(array, |i| DataValue::Int(a.value(i) as i64))
        }
        DataType::Int16 => {
            let a = downcast!(array, Int16Array);
            collect(array, |i| DataValue::Int(a.value(i) as i64))
        }
        DataType::Int32 => {
            let a = downcast!(array, Int32Array);
            collect(array, |i| DataValue::Int(a.value(i) as i64))
        }
        DataType::Int64 => {
            let a = downcast!(array, Int64Array);
            collect(array, |i| DataValue::Int(a.value(i)))
        }
        DataType::UInt8 => {
            let a = downcast!(array, UInt8Array);
            collect(array, |i| DataValue::Int(a.value(i) as i64))
        }
        DataType::UInt16 => {
            let a = downcast!(array, UInt16Array);
            collect(array, |i| DataValue::Int(a.value(i) as i64))
        }
        DataType::UInt32 => {
            let a = downcast!(array, UInt32Array);
            collect(array, |i| DataValue::Int(a.value(i) as i64))
        }
        DataType::UInt64 => {
            let a = downcast!(array, UInt64Array);
            collect(array, |i| match i64::try_from(a.value(i)) {
                Ok(v) => DataValue::Int(v),
                Err(_) => DataValue::Float(a.value(i) as f64),
            })
        }
        DataType::Float32 => {
            let a = downcast!(array, Float32Array);
            collect(array, |i| DataValue::Float(a.value(i) as f64))
        }
        DataType::Float64 => {
            let a = downcast!(array, Float64Array);
            collect(array, |i| DataValue::Float(a.value(i)))
        }
        DataType::Utf8 => {
            let a = downcast!(array, StringArray);
            collect(array, |i| DataValue::String(a.value(i).to_string()))
        }
        DataType::LargeUtf8 => {
            let a = downcast!(array, LargeStringArray);
            collect(array, |i| DataValue::String(a.value(i).to_string()))
        }
        DataType::Timestamp(TimeUnit::Second, _) => {
            let a = downcast!(array, TimestampSecondArray);
            collect(array, |i| timestamp(a.value_as_datetime(i)))
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            let a = downcast!(array, TimestampMillisecondArray);
            collect(array, |i| timestamp(a.value_as_datetime(i)))
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let a = downcast!(array, TimestampMicrosecondArray);
            collect(array, |i| timestamp(a.value_as_datetime(i)))
        }
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            let a = downcast!(array, TimestampNanosecondArray);
            collect(array, |i| timestamp(a.value_as_datetime(i)))
        }
        DataType::Date32 => {
            let a = downcast!(array, Date32Array);
            collect(array, |i| {
                a.value_as_date(i)
                    .map_or(DataValue::Null, |d| DataValue::String(d.to_string()))
            })
        }
        DataType::Date64 => {
            let a = downcast!(array, Date64Array);
            collect(array, |i| {
                a.value_as_date(i)
                    .map_or(DataValue::Null, |d| DataValue::String(d.to_string()))
            })
        }
        DataType::Decimal128(_, _) => {
            let a = downcast!(array, Decimal128Array);
            collect(array, |i| {
                let text = a.value_as_string(i);
                text.parse::<f64>()
                    .map_or(DataValue::String(text), DataValue::Float)
            })
        }
        other => {
            warn!("Unsupported Arrow type for conversion: {:?}", other);
            vec![DataValue::Null; array.len()]
        }
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::drain;
    use arrow_schema::{Field, Schema};
    use parquet::arrow::ArrowWriter;
    use parquet::file::properties::WriterProperties;

    fn write_parquet(rows: usize) -> tempfile::NamedTempFile {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
        ]));
        let ids: Vec<i64> = (1..=rows as i64).collect();
        let names: Vec<Option<String>> = (1..=rows)
            .map(|i| (i % 3 != 0).then(|| format!("n{}", i)))
            .collect();
        let scores: Vec<f64> = (1..=rows).map(|i| i as f64 / 2.0).collect();
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(StringArray::from(names)),
                Arc::new(Float64Array::from(scores)),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let props = WriterProperties::builder().set_max_row_group_size(4).build();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, Some(props)).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        file
    }

    #[test]
    fn test_reads_all_rows_in_bounded_batches() {
        let file = write_parquet(10);
        let options = ReadOptions {
            chunk_size: 3,
            projection: None,
        };
        let mut source = ParquetSource::open(&file.path().to_string_lossy(), &options).unwrap();
        let batches = drain(&mut source).unwrap();

        assert!(batches.iter().all(|b| b.len() <= 3));
        assert_eq!(batches.iter().map(Batch::len).sum::<usize>(), 10);
        let last = batches.last().unwrap();
        assert_eq!(last.row_number(last.len() - 1), 10);
        assert_eq!(batches[0].row(0).get("id"), Some(&DataValue::Int(1)));
        assert_eq!(batches[0].row(2).get("name"), Some(&DataValue::Null));
    }

    #[test]
    fn test_projection_skips_columns() {
        let file = write_parquet(5);
        let options = ReadOptions {
            chunk_size: 100,
            projection: Some(vec!["score".to_string(), "id".to_string()]),
        };
        let mut source = ParquetSource::open(&file.path().to_string_lossy(), &options).unwrap();
        let batch = source.next_batch().unwrap().unwrap();
        assert_eq!(batch.columns().names(), ["score", "id"]);
        assert_eq!(batch.row(1).get("score"), Some(&DataValue::Float(1.0)));
        assert!(batch.column("name").is_none());
    }

    #[test]
    fn test_not_parquet_is_malformed() {
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        std::fs::write(file.path(), b"not parquet at all").unwrap();
        let options = ReadOptions {
            chunk_size: 10,
            projection: None,
        };
        let err = ParquetSource::open(&file.path().to_string_lossy(), &options).err().unwrap();
        assert!(matches!(err, SourceError::Malformed { .. }), "{:?}", err);
    }

    #[test]
    fn test_arrow_null_conversion() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![Some(42), None]));
        let values = convert_array(&array).unwrap();
        assert_eq!(values, vec![DataValue::Int(42), DataValue::Null]);
    }

    #[test]
    fn test_arrow_timestamp_conversion() {
        let array: ArrayRef = Arc::new(TimestampMicrosecondArray::from(vec![1_700_000_000_000_000]));
        let values = convert_array(&array).unwrap();
        assert_eq!(values, vec![DataValue::Timestamp("2023-11-14T22:13:20Z".to_string())]);
    }
}
