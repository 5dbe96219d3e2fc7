use std::{fmt::Write, sync::Arc};

use arrow::{
    array::{
        Array, ArrayRef, AsArray, Int64Array, Scalar, StringArray, TimestampMicrosecondArray,
    },
    compute::{cast_with_options, kernels::zip::zip, is_null, CastOptions},
    datatypes::{DataType, Field, Float64Type, Int64Type, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::NaiveDateTime;
use serde_yaml::Value;

use crate::error::{Error, Result};
use crate::spec::{FieldDescriptor, FieldSpecTable};
use crate::temporal::{date_parser, to_datetime};

const STRICT: CastOptions<'static> = CastOptions {
    safe: false,
    format_options: arrow::util::display::FormatOptions::new(),
};

fn is_temporal(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _)
    )
}

fn micros(v: NaiveDateTime) -> i64 {
    v.and_utc().timestamp_micros()
}

fn render(value: NaiveDateTime, strftime: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", value.format(strftime))
        .map_err(|_| Error::config("strftime", format!("invalid format '{}'", strftime)))?;
    Ok(out)
}

/// Encode `value` as a one element scalar of exactly `column_type`, so it can be compared
/// with the raw column without decoding every row.
///
/// Text and integer columns receive the value rendered through `strftime`, temporal columns
/// the value itself.
pub fn encode_bound(
    column_type: &DataType,
    value: NaiveDateTime,
    strftime: &str,
) -> Result<Scalar<ArrayRef>> {
    let canonical: ArrayRef = match column_type {
        dt if is_temporal(dt) => Arc::new(TimestampMicrosecondArray::from(vec![micros(value)])),
        dt if dt.is_integer() => {
            let text = render(value, strftime)?;
            let n: i64 = text
                .parse()
                .map_err(|_| Error::InvalidDate(format!("'{}' rendered as '{}'", value, text)))?;
            Arc::new(Int64Array::from(vec![n]))
        }
        _ => Arc::new(StringArray::from(vec![render(value, strftime)?])),
    };
    let array = cast_with_options(&canonical, column_type, &STRICT)?;
    Ok(Scalar::new(array))
}

/// Convert `array` into `target`. Text and integer columns headed for a temporal type go
/// through the date parser (with `strftime` when given) instead of arrow's casts.
pub fn to_type(array: &ArrayRef, target: &DataType, strftime: Option<&str>) -> Result<ArrayRef> {
    if array.data_type() == target {
        return Ok(array.clone());
    }
    if is_temporal(target) {
        let parsed: Option<TimestampMicrosecondArray> = match array.data_type() {
            DataType::Utf8 => Some(
                array
                    .as_string::<i32>()
                    .iter()
                    .map(|v| v.map(|s| parse_text(s, strftime)).transpose())
                    .collect::<Result<_>>()?,
            ),
            DataType::Int64 => Some(
                array
                    .as_primitive::<Int64Type>()
                    .iter()
                    .map(|v| v.map(|n| to_datetime(n).map(micros)).transpose())
                    .collect::<Result<_>>()?,
            ),
            DataType::Float64 => Some(
                array
                    .as_primitive::<Float64Type>()
                    .iter()
                    .map(|v| v.map(|n| to_datetime(n as i64).map(micros)).transpose())
                    .collect::<Result<_>>()?,
            ),
            _ => None,
        };
        if let Some(parsed) = parsed {
            let parsed: ArrayRef = Arc::new(parsed);
            return Ok(cast_with_options(&parsed, target, &STRICT)?);
        }
    }
    Ok(cast_with_options(array, target, &STRICT)?)
}

fn parse_text(s: &str, strftime: Option<&str>) -> Result<i64> {
    let parsed = match strftime {
        Some(fmt) => date_parser::parse_with_format(s, fmt)
            .ok_or_else(|| Error::InvalidDate(s.to_string())),
        None => to_datetime(s),
    };
    parsed.map(micros)
}

/// A configured default as text, the common denominator every column type casts from.
fn default_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        other => Some(format!("{:?}", other)),
    }
}

/// Replace missing values in `array` with the field's default.
pub fn fill_default(array: &ArrayRef, field: &FieldDescriptor) -> Result<ArrayRef> {
    let Some(text) = field.default.as_ref().and_then(default_text) else {
        return Ok(array.clone());
    };
    if array.null_count() == 0 {
        return Ok(array.clone());
    }
    let raw: ArrayRef = Arc::new(StringArray::from(vec![text]));
    let default = Scalar::new(to_type(&raw, array.data_type(), field.strftime.as_deref())?);
    let mask = is_null(array.as_ref())?;
    Ok(zip(&mask, &default, array)?)
}

/// Bring a raw table into the declared layout: defaults filled, declared types applied and
/// columns in declaration order. Tables without declared fields pass through.
pub fn cleanup(batch: &RecordBatch, fields: &FieldSpecTable, file: &str) -> Result<RecordBatch> {
    if fields.is_empty() {
        return Ok(batch.clone());
    }

    let mut out_fields = Vec::with_capacity(fields.len());
    let mut columns = Vec::with_capacity(fields.len());
    for field in fields {
        let raw = batch
            .column_by_name(&field.name)
            .ok_or_else(|| Error::ColumnNotFound(field.name.clone()))?;
        let mut column = fill_default(raw, field)?;

        if let Some(dtype) = field.dtype {
            if !dtype.is_temporal() && column.null_count() > 0 {
                return Err(Error::FieldMissingValue {
                    field: field.name.clone(),
                    file: file.to_string(),
                });
            }
            column = to_type(&column, &dtype.to_arrow(), field.strftime.as_deref())?;
        }

        out_fields.push(Field::new(&field.name, column.data_type().clone(), true));
        columns.push(column);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(out_fields)), columns)?)
}

/// Arrow type of `name` in `batch`.
pub fn column_type(batch: &RecordBatch, name: &str) -> Result<DataType> {
    batch
        .schema()
        .field_with_name(name)
        .map(|f| f.data_type().clone())
        .map_err(|_| Error::ColumnNotFound(name.to_string()))
}

/// Microsecond timestamps, the representation temporal dtypes are canonicalized to.
pub fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, None)
}
