// src/reader/excel.rs

use std::{io::Cursor, sync::Arc};

use arrow::{
    array::{
        ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
        TimestampMicrosecondBuilder,
    },
    datatypes::{Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, instrument};

use super::{FileReader, Source};
use crate::error::{Error, Result};
use crate::process::{convert, trimming};
use crate::spec::{FileSpecification, Sheet};

/// Spreadsheets (xlsx, xlsm, xlsb, xls, ods). The first row after `SKIP_ROWS` holds the
/// column names; `SHEET` selects the worksheet by index or name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcelReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Empty,
    Int,
    Float,
    Bool,
    DateTime,
    Text,
}

fn iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

fn datetime(cell: &Data) -> Option<NaiveDateTime> {
    match cell {
        Data::DateTime(dt) => dt.as_datetime(),
        Data::DateTimeIso(s) => iso_datetime(s),
        _ => None,
    }
}

fn kind(cell: &Data) -> Kind {
    match cell {
        Data::Empty => Kind::Empty,
        Data::String(s) if s.trim().is_empty() => Kind::Empty,
        Data::Int(_) => Kind::Int,
        Data::Float(_) => Kind::Float,
        Data::Bool(_) => Kind::Bool,
        c if datetime(c).is_some() => Kind::DateTime,
        _ => Kind::Text,
    }
}

/// The narrowest kind every cell of a column fits into.
fn unify(a: Kind, b: Kind) -> Kind {
    match (a, b) {
        (Kind::Empty, k) | (k, Kind::Empty) => k,
        (a, b) if a == b => a,
        (Kind::Int, Kind::Float) | (Kind::Float, Kind::Int) => Kind::Float,
        _ => Kind::Text,
    }
}

fn text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn column(cells: &[&Data], kind: Kind) -> ArrayRef {
    match kind {
        Kind::Int => {
            let mut b = Int64Builder::with_capacity(cells.len());
            for c in cells {
                b.append_option(match c {
                    Data::Int(v) => Some(*v),
                    _ => None,
                });
            }
            Arc::new(b.finish())
        }
        Kind::Float => {
            let mut b = Float64Builder::with_capacity(cells.len());
            for c in cells {
                b.append_option(match c {
                    Data::Int(v) => Some(*v as f64),
                    Data::Float(v) => Some(*v),
                    _ => None,
                });
            }
            Arc::new(b.finish())
        }
        Kind::Bool => {
            let mut b = BooleanBuilder::with_capacity(cells.len());
            for c in cells {
                b.append_option(match c {
                    Data::Bool(v) => Some(*v),
                    _ => None,
                });
            }
            Arc::new(b.finish())
        }
        Kind::DateTime => {
            let mut b = TimestampMicrosecondBuilder::with_capacity(cells.len());
            for c in cells {
                b.append_option(datetime(c).map(|d| d.and_utc().timestamp_micros()));
            }
            Arc::new(b.finish())
        }
        Kind::Empty | Kind::Text => {
            let mut b = StringBuilder::new();
            for c in cells {
                b.append_option(text(c));
            }
            Arc::new(b.finish())
        }
    }
}

/// Build a typed table from worksheet rows: the first row names the columns, the rest is data.
fn table_from_rows<'a>(mut rows: impl Iterator<Item = &'a [Data]>) -> Result<RecordBatch> {
    let Some(header) = rows.next() else {
        return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
    };
    let names: Vec<String> = header
        .iter()
        .map(|c| text(c).map(|s| s.trim().to_string()).unwrap_or_default())
        .collect();
    let data: Vec<&[Data]> = rows.collect();

    let mut fields = Vec::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let cells: Vec<&Data> = data
            .iter()
            .map(|row| row.get(i).unwrap_or(&Data::Empty))
            .collect();
        let kind = cells.iter().map(|c| kind(c)).fold(Kind::Empty, unify);
        let col = column(&cells, kind);
        fields.push(Field::new(name, col.data_type().clone(), true));
        columns.push(col);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(data.len()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        columns,
        &options,
    )?)
}

impl FileReader for ExcelReader {
    #[instrument(level = "debug", skip_all, fields(source = %source))]
    fn load_file(&self, spec: &FileSpecification, source: &Source) -> Result<RecordBatch> {
        let config = spec.config();
        let bytes = source.read()?.into_owned();
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

        let range = match &config.sheet {
            Sheet::Index(i) => workbook
                .worksheet_range_at(*i)
                .ok_or_else(|| Error::config("SHEET", format!("no worksheet at index {}", i)))??,
            Sheet::Name(name) => workbook.worksheet_range(name)?,
        };
        debug!(rows = range.height(), cols = range.width(), "worksheet loaded");

        table_from_rows(range.rows().skip(config.skip_rows))
    }

    fn cleanup(
        &self,
        spec: &FileSpecification,
        batch: RecordBatch,
        source: &Source,
    ) -> Result<RecordBatch> {
        let batch = trimming::collapse_text_columns(&batch)?;
        convert::cleanup(&batch, spec.fields(), &source.name())
    }
}
