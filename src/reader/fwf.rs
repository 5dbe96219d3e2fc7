// src/reader/fwf.rs

use std::sync::Arc;

use arrow::{
    array::{ArrayRef, StringBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use tracing::{debug, instrument};

use super::{decode, FileReader, Source};
use crate::error::{Error, Result};
use crate::process::utils::{char_slice, non_blank};
use crate::spec::FileSpecification;

/// Fixed-width text files. Every field needs a slice; values are trimmed and blanks become
/// missing values. Honours `NEWLINE`, `COMMENTS`, `SKIP_ROWS` and `ENCODING`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FwfReader;

/// Split on whichever separator occurs first. Without separators lines end at `\n` and a
/// trailing `\r` is dropped.
fn split_lines<'a>(text: &'a str, newline: Option<&[String]>) -> Vec<&'a str> {
    let Some(seps) = newline else {
        return text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();
    };

    let mut lines = Vec::new();
    let mut rest = text;
    loop {
        let next = seps
            .iter()
            .filter_map(|sep| rest.find(sep.as_str()).map(|pos| (pos, sep.len())))
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
        match next {
            Some((pos, len)) => {
                lines.push(&rest[..pos]);
                rest = &rest[pos + len..];
            }
            None => {
                lines.push(rest);
                break;
            }
        }
    }
    lines
}

impl FileReader for FwfReader {
    #[instrument(level = "debug", skip_all, fields(source = %source))]
    fn load_file(&self, spec: &FileSpecification, source: &Source) -> Result<RecordBatch> {
        let fields = spec.fields();
        if !fields.is_positional() {
            return Err(Error::config(
                "FIELDSPECS",
                "fixed width files need 'width' or 'slice' on every field",
            ));
        }
        let config = spec.config();

        let bytes = source.read()?;
        let text = decode(&bytes, &config.encoding)?;

        let mut builders: Vec<StringBuilder> =
            fields.iter().map(|_| StringBuilder::new()).collect();
        let mut skipped = 0usize;
        for line in split_lines(&text, config.newline.as_deref())
            .into_iter()
            .skip(config.skip_rows)
        {
            if line.is_empty() {
                continue;
            }
            if let Some(prefix) = &config.comments {
                if line.starts_with(prefix.as_str()) {
                    skipped += 1;
                    continue;
                }
            }
            for (field, builder) in fields.iter().zip(builders.iter_mut()) {
                let value = field
                    .slice
                    .as_ref()
                    .and_then(|r| non_blank(char_slice(line, r.start, r.end)));
                builder.append_option(value);
            }
        }
        debug!(comments = skipped, "comment lines skipped");

        let schema = Schema::new(
            fields
                .iter()
                .map(|f| Field::new(&f.name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        );
        let columns: Vec<ArrayRef> = builders
            .iter_mut()
            .map(|b| Arc::new(b.finish()) as ArrayRef)
            .collect();
        Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
    }
}
