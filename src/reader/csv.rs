// src/reader/csv.rs

use std::{io::Cursor, sync::Arc};

use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use tracing::{debug, instrument};

use super::{decode, FileReader, Source};
use crate::error::Result;
use crate::spec::FileSpecification;

const BATCH_SIZE: usize = 8_192;

/// Delimited text with a header row. Every column is read as text; typing happens in cleanup.
/// Honours `DELIMITER`, `COMMENTS` and `SKIP_ROWS` (lines before the header).
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReader;

impl FileReader for CsvReader {
    #[instrument(level = "debug", skip_all, fields(source = %source))]
    fn load_file(&self, spec: &FileSpecification, source: &Source) -> Result<RecordBatch> {
        let config = spec.config();
        let bytes = source.read()?;
        let text = decode(&bytes, &config.encoding)?;

        let mut body = String::with_capacity(text.len());
        for line in text.split_inclusive('\n').skip(config.skip_rows) {
            if let Some(prefix) = &config.comments {
                if line.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            body.push_str(line);
        }

        let format = Format::default()
            .with_header(true)
            .with_delimiter(config.delimiter);
        let (inferred, _) = format.infer_schema(Cursor::new(body.as_bytes()), Some(1))?;
        let schema = Arc::new(Schema::new(
            inferred
                .fields()
                .iter()
                .map(|f| Field::new(f.name().trim(), DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));

        let reader = ReaderBuilder::new(schema.clone())
            .with_format(format)
            .with_batch_size(BATCH_SIZE)
            .build(Cursor::new(body.as_bytes()))?;
        let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
        debug!(batches = batches.len(), "csv parsed");

        Ok(concat_batches(&schema, &batches)?)
    }
}
