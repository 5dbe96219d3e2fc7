//! Set-at-a-time row selection over whole columns: effective date snapshot, validity period
//! overlap and latest revision per key.

use std::{collections::HashMap, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, BooleanArray, Datum, UInt32Array},
    compute::{
        and, filter_record_batch, is_not_null, is_null,
        kernels::{
            cmp::{gt, gt_eq, lt_eq},
            zip::zip,
        },
        lexsort_to_indices, take_record_batch, SortColumn, SortOptions,
    },
    record_batch::RecordBatch,
    row::{RowConverter, SortField},
};
use tracing::trace;

use crate::error::{Error, Result};

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
}

/// Missing values replaced by `fill`. Only used for comparisons; output rows keep their
/// original values.
fn filled(col: &ArrayRef, fill: &dyn Datum) -> Result<ArrayRef> {
    if col.null_count() == 0 {
        return Ok(col.clone());
    }
    Ok(zip(&is_null(col.as_ref())?, fill, col)?)
}

fn apply(batch: &RecordBatch, mask: &BooleanArray, step: &str) -> Result<RecordBatch> {
    let out = filter_record_batch(batch, mask)?;
    trace!(step, before = batch.num_rows(), after = out.num_rows(), "rows filtered");
    Ok(out)
}

/// Keep rows whose `field` is present and `<= bound`.
pub fn effective_date(batch: &RecordBatch, field: &str, bound: &dyn Datum) -> Result<RecordBatch> {
    let col = column(batch, field)?;
    let mask = and(&is_not_null(col.as_ref())?, &lt_eq(col, bound)?)?;
    apply(batch, &mask, "effective_date")
}

/// Keep rows whose validity started on or before `bound`. Missing starts count as `fill`.
pub fn started_by(
    batch: &RecordBatch,
    field: &str,
    bound: &dyn Datum,
    fill: &dyn Datum,
) -> Result<RecordBatch> {
    let col = filled(column(batch, field)?, fill)?;
    let mask = lt_eq(&col, bound)?;
    apply(batch, &mask, "period_from")
}

/// Keep rows still valid at `bound`. Missing ends count as `fill`. With `inclusive` the
/// stored end is the last valid day, otherwise the first day no longer valid.
pub fn valid_until(
    batch: &RecordBatch,
    field: &str,
    bound: &dyn Datum,
    fill: &dyn Datum,
    inclusive: bool,
) -> Result<RecordBatch> {
    let col = filled(column(batch, field)?, fill)?;
    let mask = if inclusive {
        gt_eq(&col, bound)?
    } else {
        gt(&col, bound)?
    };
    apply(batch, &mask, "period_until")
}

/// One row per distinct `key`: the last one after a stable ascending sort on `order_by`
/// (input order when `None`). Rows with a missing key are dropped. Winners keep their sorted
/// relative order.
pub fn latest_by_key(
    batch: &RecordBatch,
    key: &str,
    order_by: Option<&str>,
) -> Result<RecordBatch> {
    let n = batch.num_rows();
    if n == 0 {
        column(batch, key)?;
        return Ok(batch.clone());
    }

    let sorted = match order_by {
        Some(field) => {
            let row_numbers: ArrayRef = Arc::new(UInt32Array::from_iter_values(0..n as u32));
            let indices = lexsort_to_indices(
                &[
                    SortColumn {
                        values: column(batch, field)?.clone(),
                        options: Some(SortOptions {
                            descending: false,
                            nulls_first: true,
                        }),
                    },
                    SortColumn {
                        values: row_numbers,
                        options: None,
                    },
                ],
                None,
            )?;
            take_record_batch(batch, &indices)?
        }
        None => batch.clone(),
    };

    let keys = column(&sorted, key)?;
    let converter = RowConverter::new(vec![SortField::new(keys.data_type().clone())])?;
    let rows = converter.convert_columns(&[keys.clone()])?;

    let mut last = HashMap::with_capacity(n);
    for i in 0..n {
        if keys.is_valid(i) {
            last.insert(rows.row(i), i as u32);
        }
    }
    let mut winners: Vec<u32> = last.into_values().collect();
    winners.sort_unstable();

    let out = take_record_batch(&sorted, &UInt32Array::from(winners))?;
    trace!(key, before = n, after = out.num_rows(), "latest revision per key");
    Ok(out)
}
