//! Spreadsheet adapter (xlsx, xls, xlsm, ods).
//!
//! The workbook reader decodes a whole worksheet at once, so the sheet is
//! held in memory; batches are still handed out `chunk_size` rows at a time.

use super::{ChunkSource, ReadOptions, open_file, project};
use crate::{Batch, BatchBuilder, Columns, DataValue, SourceError};
use calamine::{Data, Range, Reader, open_workbook_auto};
use chrono::SecondsFormat;
use quality_core::FileSpec;
use std::sync::Arc;

/// Streams rows from one worksheet. The first row is the header.
pub struct SheetSource {
    range: Range<Data>,
    positions: Vec<usize>,
    columns: Arc<Columns>,
    chunk_size: usize,
    cursor: usize,
}

impl SheetSource {
    /// Opens the sheet named by `spec.sheet` (name or 0-based index), or the first sheet.
    pub fn open(spec: &FileSpec, options: &ReadOptions) -> Result<Self, SourceError> {
        let path = spec.path.as_str();
        drop(open_file(path)?);

        let mut workbook = open_workbook_auto(path)
            .map_err(|e| SourceError::malformed(path, "excel", e.to_string()))?;
        let names = workbook.sheet_names();
        let sheet = select_sheet(&names, spec.sheet.as_deref()).ok_or_else(|| {
            SourceError::malformed(
                path,
                "excel",
                match &spec.sheet {
                    Some(wanted) => format!("sheet '{}' not found (available: {})", wanted, names.join(", ")),
                    None => "workbook has no sheets".to_string(),
                },
            )
        })?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| SourceError::malformed(path, "excel", e.to_string()))?;

        let width = range.width();
        let available: Vec<String> = (0..width)
            .map(|col| match range.get((0, col)) {
                Some(cell) if !matches!(cell, Data::Empty) => cell.to_string().trim().to_string(),
                _ => format!("column_{}", col + 1),
            })
            .collect();
        let (positions, columns) = project(path, "excel", &available, options.projection.as_deref())?;

        Ok(Self {
            range,
            positions,
            columns,
            chunk_size: options.chunk_size,
            cursor: 1,
        })
    }
}

impl ChunkSource for SheetSource {
    fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, SourceError> {
        let height = self.range.height();
        if self.cursor >= height {
            return Ok(None);
        }

        let end = (self.cursor + self.chunk_size).min(height);
        // Row 1 of the sheet is the header, so data row numbers start at 1 below it.
        let mut builder = BatchBuilder::new(Arc::clone(&self.columns), self.cursor as u64, end - self.cursor);
        for row in self.cursor..end {
            builder.push_row(
                self.positions
                    .iter()
                    .map(|&col| self.range.get((row, col)).map_or(DataValue::Null, cell_value)),
            );
        }
        self.cursor = end;
        Ok(Some(builder.finish()))
    }
}

fn select_sheet(names: &[String], wanted: Option<&str>) -> Option<String> {
    match wanted {
        None => names.first().cloned(),
        Some(wanted) => names
            .iter()
            .find(|name| name.as_str() == wanted)
            .cloned()
            .or_else(|| wanted.parse::<usize>().ok().and_then(|i| names.get(i).cloned())),
    }
}

pub(crate) fn cell_value(cell: &Data) -> DataValue {
    match cell {
        Data::Empty => DataValue::Null,
        Data::Int(i) => DataValue::Int(*i),
        Data::Float(f) => DataValue::Float(*f),
        Data::Bool(b) => DataValue::Bool(*b),
        Data::String(s) if s.is_empty() => DataValue::Null,
        Data::String(s) => DataValue::String(s.clone()),
        Data::DateTime(dt) => dt.as_datetime().map_or(DataValue::Null, |dt| {
            DataValue::Timestamp(dt.and_utc().to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }),
        Data::DateTimeIso(s) => DataValue::Timestamp(s.clone()),
        Data::DurationIso(s) => DataValue::String(s.clone()),
        Data::Error(e) => DataValue::String(format!("#{:?}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_sheet() {
        let names = vec!["Summary".to_string(), "Data".to_string()];
        assert_eq!(select_sheet(&names, None), Some("Summary".to_string()));
        assert_eq!(select_sheet(&names, Some("Data")), Some("Data".to_string()));
        assert_eq!(select_sheet(&names, Some("1")), Some("Data".to_string()));
        assert_eq!(select_sheet(&names, Some("Other")), None);
    }

    #[test]
    fn test_cell_values() {
        assert_eq!(cell_value(&Data::Empty), DataValue::Null);
        assert_eq!(cell_value(&Data::String(String::new())), DataValue::Null);
        assert_eq!(cell_value(&Data::Float(2.5)), DataValue::Float(2.5));
        assert_eq!(cell_value(&Data::String("x".into())), DataValue::from("x"));
    }

    #[test]
    fn test_not_a_workbook_is_malformed() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        std::fs::write(file.path(), b"plain text").unwrap();
        let spec = FileSpec::new("sheet", file.path().to_string_lossy());
        let options = ReadOptions {
            chunk_size: 10,
            projection: None,
        };
        let err = SheetSource::open(&spec, &options).err().unwrap();
        assert!(matches!(err, SourceError::Malformed { .. }), "{:?}", err);
    }
}
