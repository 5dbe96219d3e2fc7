use crate::error::Result;
use crate::process::utils::collapse_whitespace;
use arrow::{
    array::{ArrayRef, AsArray, StringArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use std::sync::Arc;

/// Collapse whitespace runs in every text column. Spreadsheet cells often carry line breaks
/// and padding that should not take part in comparisons.
pub fn collapse_text_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut cols = Vec::with_capacity(batch.num_columns());
    for arr in batch.columns() {
        if arr.data_type() == &DataType::Utf8 {
            let cleaned: StringArray = arr
                .as_string::<i32>()
                .iter()
                .map(|opt| opt.map(collapse_whitespace))
                .collect();
            cols.push(Arc::new(cleaned) as ArrayRef);
            continue;
        }
        cols.push(arr.clone());
    }

    RecordBatch::try_new(batch.schema(), cols).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int32Array};

    #[test]
    fn only_text_columns_change() {
        let batch = RecordBatch::try_from_iter(vec![
            ("name", Arc::new(StringArray::from(vec![Some("a\n b"), None])) as ArrayRef),
            ("n", Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef),
        ])
        .unwrap();
        let out = collapse_text_columns(&batch).unwrap();
        let names = out.column(0).as_string::<i32>();
        assert_eq!(names.value(0), "a b");
        assert!(names.is_null(1));
        assert_eq!(out.column(1), batch.column(1));
    }
}
