//! Delimited text adapter (CSV, TSV, custom separators).

use super::{ChunkSource, ReadOptions, open_file, project};
use crate::{Batch, BatchBuilder, Columns, DataValue, SourceError};
use csv::{ByteRecord, ErrorKind, ReaderBuilder};
use quality_core::FileSpec;
use std::fs::File;
use std::sync::Arc;

/// Text encodings understood by the delimited adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8 (default)
    Utf8,
    /// ISO-8859-1; every byte maps to the code point of the same value
    Latin1,
}

impl TextEncoding {
    /// Parses an encoding label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Some(Self::Latin1),
            _ => None,
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|e| e.to_string()),
            Self::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// Streams records from a delimited text file.
pub struct DelimitedSource {
    path: String,
    reader: csv::Reader<File>,
    encoding: TextEncoding,
    positions: Vec<usize>,
    columns: Arc<Columns>,
    chunk_size: usize,
    pending: Option<ByteRecord>,
    record: ByteRecord,
    next_row: u64,
    done: bool,
}

impl DelimitedSource {
    /// Opens a delimited file and reads its header.
    pub fn open(spec: &FileSpec, delimiter: char, options: &ReadOptions) -> Result<Self, SourceError> {
        let path = spec.path.clone();
        let encoding = match spec.encoding.as_deref() {
            None => TextEncoding::Utf8,
            Some(label) => TextEncoding::from_label(label).ok_or_else(|| {
                SourceError::encoding(&path, format!("unsupported encoding '{}'", label))
            })?,
        };
        if !delimiter.is_ascii() {
            return Err(SourceError::UnsupportedFormat {
                path,
                message: format!("delimiter '{}' must be a single ASCII character", delimiter),
            });
        }

        let file = open_file(&path)?;
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .has_headers(spec.has_header)
            .flexible(false)
            .from_reader(file);

        let mut pending = None;
        let available: Vec<String> = if spec.has_header {
            let headers = reader
                .byte_headers()
                .map_err(|e| csv_error(&path, e))?
                .clone();
            headers
                .iter()
                .map(|field| {
                    encoding
                        .decode(field)
                        .map(|name| name.trim().to_string())
                        .map_err(|e| SourceError::encoding(&path, format!("header: {}", e)))
                })
                .collect::<Result<_, _>>()?
        } else {
            let mut first = ByteRecord::new();
            let has_record = reader
                .read_byte_record(&mut first)
                .map_err(|e| csv_error(&path, e))?;
            let width = if has_record { first.len() } else { 0 };
            if has_record {
                pending = Some(first);
            }
            (1..=width).map(|i| format!("column_{}", i)).collect()
        };

        let (positions, columns) = project(&path, "csv", &available, options.projection.as_deref())?;

        Ok(Self {
            path,
            reader,
            encoding,
            positions,
            columns,
            chunk_size: options.chunk_size,
            pending,
            record: ByteRecord::new(),
            next_row: 1,
            done: false,
        })
    }

    fn decode_record(&self, record: &ByteRecord, row: u64) -> Result<Vec<DataValue>, SourceError> {
        self.positions
            .iter()
            .map(|&i| {
                let bytes = record.get(i).unwrap_or_default();
                if bytes.is_empty() {
                    return Ok(DataValue::Null);
                }
                self.encoding
                    .decode(bytes)
                    .map(DataValue::String)
                    .map_err(|e| SourceError::encoding(&self.path, format!("record {}: {}", row, e)))
            })
            .collect()
    }
}

impl ChunkSource for DelimitedSource {
    fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, SourceError> {
        if self.done {
            return Ok(None);
        }

        let mut builder = BatchBuilder::new(Arc::clone(&self.columns), self.next_row, self.chunk_size);
        while builder.len() < self.chunk_size {
            let record = match self.pending.take() {
                Some(record) => record,
                None => {
                    let mut record = std::mem::take(&mut self.record);
                    let more = self
                        .reader
                        .read_byte_record(&mut record)
                        .map_err(|e| csv_error(&self.path, e))?;
                    if !more {
                        self.record = record;
                        self.done = true;
                        break;
                    }
                    record
                }
            };
            let values = self.decode_record(&record, builder.next_row())?;
            builder.push_row(values);
            self.record = record;
        }

        self.next_row = builder.next_row();
        if builder.is_empty() {
            Ok(None)
        } else {
            Ok(Some(builder.finish()))
        }
    }
}

fn csv_error(path: &str, err: csv::Error) -> SourceError {
    match err.kind() {
        ErrorKind::Io(io) => SourceError::from_io(path, io),
        ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => {
            let line = pos.as_ref().map(|p| p.line()).unwrap_or_default();
            SourceError::malformed(
                path,
                "csv",
                format!(
                    "line {} has {} fields, expected {}",
                    line, len, expected_len
                ),
            )
        }
        ErrorKind::Utf8 { err, .. } => SourceError::encoding(path, err.to_string()),
        _ => SourceError::malformed(path, "csv", err.to_string()),
    }
}
