//! Avro object container adapter.

use super::{ChunkSource, ReadOptions, open_file, project};
use crate::{Batch, BatchBuilder, Columns, DataValue, SourceError};
use apache_avro::Reader;
use apache_avro::schema::Schema;
use apache_avro::types::Value;
use chrono::{DateTime, SecondsFormat};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

/// Streams records from an Avro container file.
pub struct AvroSource {
    path: String,
    reader: Reader<'static, BufReader<File>>,
    available: Vec<String>,
    positions: Vec<usize>,
    columns: Arc<Columns>,
    chunk_size: usize,
    next_row: u64,
}

impl AvroSource {
    /// Opens a container file; its writer schema must be a record.
    pub fn open(path: &str, options: &ReadOptions) -> Result<Self, SourceError> {
        let file = open_file(path)?;
        let reader = Reader::new(BufReader::new(file))
            .map_err(|e| SourceError::malformed(path, "avro", e.to_string()))?;

        let available: Vec<String> = match reader.writer_schema() {
            Schema::Record(record) => record.fields.iter().map(|f| f.name.clone()).collect(),
            other => {
                return Err(SourceError::malformed(
                    path,
                    "avro",
                    format!("top-level schema must be a record, found {:?}", other),
                ));
            }
        };
        let (positions, columns) = project(path, "avro", &available, options.projection.as_deref())?;

        Ok(Self {
            path: path.to_string(),
            reader,
            available,
            positions,
            columns,
            chunk_size: options.chunk_size,
            next_row: 1,
        })
    }
}

impl ChunkSource for AvroSource {
    fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, SourceError> {
        let mut builder = BatchBuilder::new(Arc::clone(&self.columns), self.next_row, self.chunk_size);
        while builder.len() < self.chunk_size {
            let Some(item) = self.reader.next() else {
                break;
            };
            let value = item.map_err(|e| SourceError::malformed(&self.path, "avro", e.to_string()))?;
            let Value::Record(mut fields) = value else {
                return Err(SourceError::malformed(
                    &self.path,
                    "avro",
                    format!("record {} is not a record", builder.next_row()),
                ));
            };
            if fields.len() != self.available.len() {
                return Err(SourceError::malformed(
                    &self.path,
                    "avro",
                    format!(
                        "record {} has {} fields, expected {}",
                        builder.next_row(),
                        fields.len(),
                        self.available.len()
                    ),
                ));
            }
            builder.push_row(
                self.positions
                    .iter()
                    .map(|&i| avro_value(std::mem::replace(&mut fields[i].1, Value::Null))),
            );
        }

        self.next_row = builder.next_row();
        if builder.is_empty() {
            Ok(None)
        } else {
            Ok(Some(builder.finish()))
        }
    }
}

fn timestamp(seconds: i64, nanos: u32) -> DataValue {
    DateTime::from_timestamp(seconds, nanos).map_or(DataValue::Null, |dt| {
        DataValue::Timestamp(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    })
}

pub(crate) fn avro_value(value: Value) -> DataValue {
    match value {
        Value::Null => DataValue::Null,
        Value::Boolean(b) => DataValue::Bool(b),
        Value::Int(i) => DataValue::Int(i as i64),
        Value::Long(i) => DataValue::Int(i),
        Value::Float(f) => DataValue::Float(f as f64),
        Value::Double(f) => DataValue::Float(f),
        Value::String(s) | Value::Enum(_, s) => DataValue::String(s),
        Value::Union(_, inner) => avro_value(*inner),
        Value::Array(items) => DataValue::List(items.into_iter().map(avro_value).collect()),
        Value::Map(map) => DataValue::Map(map.into_iter().map(|(k, v)| (k, avro_value(v))).collect()),
        Value::Record(fields) => {
            DataValue::Map(fields.into_iter().map(|(k, v)| (k, avro_value(v))).collect())
        }
        Value::Date(days) => chrono::NaiveDate::from_num_days_from_ce_opt(days + 719_163)
            .map_or(DataValue::Null, |d| DataValue::String(d.to_string())),
        Value::TimestampMillis(ms) | Value::LocalTimestampMillis(ms) => {
            timestamp(ms.div_euclid(1_000), (ms.rem_euclid(1_000) * 1_000_000) as u32)
        }
        Value::TimestampMicros(us) | Value::LocalTimestampMicros(us) => {
            timestamp(us.div_euclid(1_000_000), (us.rem_euclid(1_000_000) * 1_000) as u32)
        }
        Value::Uuid(uuid) => DataValue::String(uuid.to_string()),
        other => DataValue::String(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::drain;
    use apache_avro::Writer;
    use apache_avro::types::Record;

    const SCHEMA: &str = r#"{
        "type": "record",
        "name": "customer",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "email", "type": ["null", "string"]}
        ]
    }"#;

    fn write_avro(rows: i64) -> tempfile::NamedTempFile {
        let schema = Schema::parse_str(SCHEMA).unwrap();
        let mut writer = Writer::new(&schema, Vec::new());
        for id in 1..=rows {
            let mut record = Record::new(writer.schema()).unwrap();
            record.put("id", id);
            let email = if id % 2 == 0 {
                Value::Union(0, Box::new(Value::Null))
            } else {
                Value::Union(1, Box::new(Value::String(format!("u{}@x.io", id))))
            };
            record.put("email", email);
            writer.append(record).unwrap();
        }
        let bytes = writer.into_inner().unwrap();

        let file = tempfile::Builder::new().suffix(".avro").tempfile().unwrap();
        std::fs::write(file.path(), bytes).unwrap();
        file
    }

    #[test]
    fn test_reads_records_in_chunks() {
        let file = write_avro(5);
        let options = ReadOptions {
            chunk_size: 2,
            projection: None,
        };
        let mut source = AvroSource::open(&file.path().to_string_lossy(), &options).unwrap();
        let batches = drain(&mut source).unwrap();

        assert_eq!(batches.iter().map(Batch::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert_eq!(batches[0].row(0).get("email"), Some(&DataValue::from("u1@x.io")));
        assert_eq!(batches[0].row(1).get("email"), Some(&DataValue::Null));
        assert_eq!(batches[2].row(0).get("id"), Some(&DataValue::Int(5)));
    }

    #[test]
    fn test_projection() {
        let file = write_avro(1);
        let options = ReadOptions {
            chunk_size: 2,
            projection: Some(vec!["email".to_string()]),
        };
        let mut source = AvroSource::open(&file.path().to_string_lossy(), &options).unwrap();
        let batch = source.next_batch().unwrap().unwrap();
        assert_eq!(batch.columns().names(), ["email"]);
    }

    #[test]
    fn test_timestamp_values() {
        assert_eq!(
            avro_value(Value::TimestampMillis(1_700_000_000_000)),
            DataValue::Timestamp("2023-11-14T22:13:20Z".to_string())
        );
        assert_eq!(avro_value(Value::Date(0)), DataValue::from("1970-01-01"));
    }
}
