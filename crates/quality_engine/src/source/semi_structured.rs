//! JSON and JSON Lines adapter.
//!
//! JSON Lines is read with a streaming deserializer. A top-level JSON array is
//! walked element by element on a producer thread that hands records over a
//! bounded channel, so only `chunk_size` records are ever in flight.

use super::{ChunkSource, ReadOptions, open_file};
use crate::{Batch, BatchBuilder, Columns, DataValue, SourceError};
use serde::{Deserialize, Deserializer as _};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;

type Lines = serde_json::StreamDeserializer<'static, serde_json::de::IoRead<BufReader<File>>, Value>;

enum Records {
    Lines(Lines),
    Array(Receiver<Result<Value, String>>),
}

/// Streams objects from a JSON document or a JSON Lines file.
pub struct JsonSource {
    path: String,
    records: Records,
    projection: Option<Vec<String>>,
    seen: Vec<String>,
    columns: Arc<Columns>,
    chunk_size: usize,
    next_row: u64,
    done: bool,
}

impl JsonSource {
    /// Opens a JSON file; `lines` selects JSON Lines.
    pub fn open(path: &str, lines: bool, options: &ReadOptions) -> Result<Self, SourceError> {
        let file = open_file(path)?;
        let reader = BufReader::new(file);

        let records = if lines {
            Records::Lines(serde_json::Deserializer::from_reader(reader).into_iter::<Value>())
        } else {
            let (tx, rx) = sync_channel(options.chunk_size);
            thread::Builder::new()
                .name("json-array-reader".to_string())
                .spawn(move || produce_elements(reader, tx))
                .map_err(|e| SourceError::Io {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            Records::Array(rx)
        };

        let seen = options.projection.clone().unwrap_or_default();
        Ok(Self {
            path: path.to_string(),
            records,
            columns: Arc::new(Columns::new(seen.iter().cloned())),
            projection: options.projection.clone(),
            seen,
            chunk_size: options.chunk_size,
            next_row: 1,
            done: false,
        })
    }

    fn next_value(&mut self) -> Result<Option<Value>, SourceError> {
        match &mut self.records {
            Records::Lines(stream) => match stream.next() {
                None => Ok(None),
                Some(Ok(value)) => Ok(Some(value)),
                Some(Err(e)) if e.is_io() => Err(SourceError::Io {
                    path: self.path.clone(),
                    message: e.to_string(),
                }),
                Some(Err(e)) => Err(SourceError::malformed(&self.path, "jsonl", e.to_string())),
            },
            Records::Array(rx) => match rx.recv() {
                Err(_) => Ok(None),
                Ok(Ok(value)) => Ok(Some(value)),
                Ok(Err(message)) => Err(SourceError::malformed(&self.path, "json", message)),
            },
        }
    }

    fn learn_columns(&mut self, objects: &[Map<String, Value>]) {
        if self.projection.is_some() {
            return;
        }
        let before = self.seen.len();
        for object in objects {
            for key in object.keys() {
                if !self.columns.contains(key) && !self.seen[before..].contains(key) {
                    self.seen.push(key.clone());
                }
            }
        }
        if self.seen.len() != before {
            self.columns = Arc::new(Columns::new(self.seen.iter().cloned()));
        }
    }
}

impl ChunkSource for JsonSource {
    fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, SourceError> {
        if self.done {
            return Ok(None);
        }

        let mut objects = Vec::with_capacity(self.chunk_size.min(4096));
        while objects.len() < self.chunk_size {
            let Some(value) = self.next_value()? else {
                self.done = true;
                break;
            };
            match value {
                Value::Object(object) => objects.push(object),
                other => {
                    let row = self.next_row + objects.len() as u64;
                    return Err(SourceError::malformed(
                        &self.path,
                        "json",
                        format!("record {} is not an object (found {})", row, kind(&other)),
                    ));
                }
            }
        }

        if objects.is_empty() {
            return Ok(None);
        }

        self.learn_columns(&objects);
        let mut builder = BatchBuilder::new(Arc::clone(&self.columns), self.next_row, objects.len());
        for object in &objects {
            builder.push_row(
                self.columns
                    .names()
                    .iter()
                    .map(|name| object.get(name).map_or(DataValue::Null, DataValue::from)),
            );
        }
        self.next_row = builder.next_row();
        Ok(Some(builder.finish()))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn produce_elements(reader: BufReader<File>, tx: SyncSender<Result<Value, String>>) {
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let result = deserializer
        .deserialize_any(ElementVisitor { tx: tx.clone() })
        .and_then(|_| deserializer.end());
    if let Err(e) = result {
        let _ = tx.send(Err(e.to_string()));
    }
}

/// Forwards each element of the top-level array; a lone object is one record.
struct ElementVisitor {
    tx: SyncSender<Result<Value, String>>,
}

impl<'de> Visitor<'de> for ElementVisitor {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON array of objects or a single object")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(value) = seq.next_element::<Value>()? {
            if self.tx.send(Ok(value)).is_err() {
                // Reader went away; stop without draining the rest.
                return Err(de::Error::custom("reader closed"));
            }
        }
        Ok(())
    }

    fn visit_map<A>(self, map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let object = Map::deserialize(de::value::MapAccessDeserializer::new(map))?;
        let _ = self.tx.send(Ok(Value::Object(object)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::drain;
    use std::io::Write;

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn options(chunk_size: usize) -> ReadOptions {
        ReadOptions {
            chunk_size,
            projection: None,
        }
    }

    #[test]
    fn test_json_lines_union_columns() {
        let file = write_file(
            ".jsonl",
            "{\"id\": 1, \"name\": \"a\"}\n{\"id\": 2}\n{\"id\": 3, \"email\": \"x@y.z\"}\n",
        );
        let mut source = JsonSource::open(&file.path().to_string_lossy(), true, &options(2)).unwrap();
        let batches = drain(&mut source).unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].columns().names(), ["id", "name"]);
        assert_eq!(batches[0].row(1).get("name"), Some(&DataValue::Null));
        assert_eq!(batches[1].columns().names(), ["id", "name", "email"]);
        assert_eq!(batches[1].row(0).get("email"), Some(&DataValue::from("x@y.z")));
        assert_eq!(batches[1].row_number(0), 3);
    }

    #[test]
    fn test_json_array_streamed() {
        let records: Vec<String> = (1..=7).map(|i| format!("{{\"n\": {}}}", i)).collect();
        let file = write_file(".json", &format!("[{}]", records.join(",")));
        let mut source = JsonSource::open(&file.path().to_string_lossy(), false, &options(3)).unwrap();
        let batches = drain(&mut source).unwrap();

        assert_eq!(batches.iter().map(Batch::len).collect::<Vec<_>>(), vec![3, 3, 1]);
        assert_eq!(batches[2].row(0).get("n"), Some(&DataValue::Int(7)));
    }

    #[test]
    fn test_single_object_is_one_record() {
        let file = write_file(".json", "{\"a\": {\"b\": [1, 2]}}");
        let mut source = JsonSource::open(&file.path().to_string_lossy(), false, &options(3)).unwrap();
        let batch = source.next_batch().unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.row(0).get("a").unwrap().to_string(), "{b: [1, 2]}");
        assert!(source.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_projection_fixes_columns() {
        let file = write_file(".jsonl", "{\"a\": 1, \"b\": 2}\n{\"c\": 3}\n");
        let opts = ReadOptions {
            chunk_size: 10,
            projection: Some(vec!["b".to_string()]),
        };
        let mut source = JsonSource::open(&file.path().to_string_lossy(), true, &opts).unwrap();
        let batch = source.next_batch().unwrap().unwrap();
        assert_eq!(batch.columns().names(), ["b"]);
        assert_eq!(batch.row(1).get("b"), Some(&DataValue::Null));
    }

    #[test]
    fn test_truncated_array_is_malformed() {
        let file = write_file(".json", "[{\"a\": 1}, {\"a\": ");
        let mut source = JsonSource::open(&file.path().to_string_lossy(), false, &options(10)).unwrap();
        let err = drain(&mut source).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }), "{:?}", err);
    }

    #[test]
    fn test_scalar_record_is_malformed() {
        let file = write_file(".jsonl", "{\"a\": 1}\n42\n");
        let mut source = JsonSource::open(&file.path().to_string_lossy(), true, &options(10)).unwrap();
        let err = source.next_batch().unwrap_err();
        assert!(err.to_string().contains("record 2 is not an object"), "{}", err);
    }
}
