//! Chunked readers for data files.
//!
//! Every format adapter implements [`ChunkSource`]: a lazy, finite,
//! non-restartable stream of batches of at most `chunk_size` records.
//! Column projection is pushed into the adapter so wide files never
//! materialize unused columns.

mod columnar;
mod delimited;
mod semi_structured;
#[cfg(feature = "excel")]
mod sheet;
#[cfg(feature = "avro")]
mod row_binary;

pub use columnar::ParquetSource;
pub use delimited::{DelimitedSource, TextEncoding};
pub use semi_structured::JsonSource;
#[cfg(feature = "excel")]
pub use sheet::SheetSource;
#[cfg(feature = "avro")]
pub use row_binary::AvroSource;

use crate::{Batch, Columns, SourceError};
use quality_core::{FileFormat, FileSpec};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A stream of batches from one file.
pub trait ChunkSource {
    /// Columns known so far (after projection).
    fn columns(&self) -> &Arc<Columns>;

    /// Reads the next batch; `None` once the file is exhausted.
    fn next_batch(&mut self) -> Result<Option<Batch>, SourceError>;
}

/// Options shared by all adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// Maximum records per batch
    pub chunk_size: usize,
    /// Columns to keep, in this order
    pub projection: Option<Vec<String>>,
}

impl ReadOptions {
    /// Options for a file spec at the given batch size.
    pub fn for_file(spec: &FileSpec, chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            projection: spec.columns.clone(),
        }
    }
}

/// Opens the adapter matching the file's declared or inferred format.
pub fn open_source(spec: &FileSpec, chunk_size: usize) -> Result<Box<dyn ChunkSource>, SourceError> {
    let format = spec
        .resolved_format()
        .ok_or_else(|| SourceError::UnsupportedFormat {
            path: spec.path.clone(),
            message: "cannot infer format from extension; set 'format' explicitly".to_string(),
        })?;
    let options = ReadOptions::for_file(spec, chunk_size);

    debug!(file = %spec.name, path = %spec.path, %format, chunk_size, "opening source");

    let source: Box<dyn ChunkSource> = match format {
        FileFormat::Csv => Box::new(DelimitedSource::open(spec, spec.delimiter.unwrap_or(','), &options)?),
        FileFormat::Tsv => Box::new(DelimitedSource::open(spec, spec.delimiter.unwrap_or('\t'), &options)?),
        FileFormat::Json => Box::new(JsonSource::open(&spec.path, false, &options)?),
        FileFormat::Jsonl => Box::new(JsonSource::open(&spec.path, true, &options)?),
        FileFormat::Parquet => Box::new(ParquetSource::open(&spec.path, &options)?),
        #[cfg(feature = "excel")]
        FileFormat::Excel => Box::new(SheetSource::open(spec, &options)?),
        #[cfg(feature = "avro")]
        FileFormat::Avro => Box::new(AvroSource::open(&spec.path, &options)?),
        #[allow(unreachable_patterns)]
        other => {
            return Err(SourceError::UnsupportedFormat {
                path: spec.path.clone(),
                message: format!("support for '{}' is not compiled in", other),
            });
        }
    };

    Ok(source)
}

/// Size of the file in bytes, if it can be read.
pub fn file_size(path: &str) -> Option<u64> {
    std::fs::metadata(path).ok().map(|meta| meta.len())
}

pub(crate) fn open_file(path: &str) -> Result<File, SourceError> {
    let file = File::open(Path::new(path)).map_err(|e| SourceError::from_io(path, &e))?;
    if file.metadata().map(|meta| meta.is_dir()).unwrap_or(false) {
        return Err(SourceError::Io {
            path: path.to_string(),
            message: "is a directory".to_string(),
        });
    }
    Ok(file)
}

/// Resolves a projection against the file's columns.
///
/// Returns the positions of the projected columns in file order and the
/// resulting column set (in projection order when one is given).
pub(crate) fn project(
    path: &str,
    format: &str,
    available: &[String],
    projection: Option<&[String]>,
) -> Result<(Vec<usize>, Arc<Columns>), SourceError> {
    match projection {
        None => Ok((
            (0..available.len()).collect(),
            Arc::new(Columns::new(available.iter().cloned())),
        )),
        Some(wanted) => {
            let mut positions = Vec::with_capacity(wanted.len());
            for name in wanted {
                let position = available.iter().position(|c| c == name).ok_or_else(|| {
                    SourceError::malformed(
                        path,
                        format,
                        format!("projected column '{}' not found", name),
                    )
                })?;
                positions.push(position);
            }
            Ok((positions, Arc::new(Columns::new(wanted.iter().cloned()))))
        }
    }
}

/// Collects every batch of a source. Test helper.
#[cfg(test)]
pub(crate) fn drain(source: &mut dyn ChunkSource) -> Result<Vec<Batch>, SourceError> {
    let mut batches = Vec::new();
    while let Some(batch) = source.next_batch()? {
        batches.push(batch);
    }
    Ok(batches)
}
