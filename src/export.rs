// src/export.rs

//! Persisting loaded tables.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use arrow::record_batch::RecordBatch;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use tracing::{debug, instrument};

use crate::error::Result;

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_to(batch: &RecordBatch, path: &Path, props: WriterProperties) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Write `batch` to `path` as a snappy compressed Parquet file and return the file size.
///
/// The data goes to `<path>.tmp` first and is renamed into place once the writer is closed, so
/// readers never observe a partial file.
#[instrument(
    level = "debug",
    skip(batch),
    fields(rows = batch.num_rows(), path = %path.as_ref().display())
)]
pub fn write_parquet(batch: &RecordBatch, path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    if let Err(e) = write_to(batch, &tmp, props) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    let size = fs::metadata(&tmp)?.len();
    fs::rename(&tmp, path)?;
    debug!(bytes = size, "parquet written");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int32Array, StringArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::sync::Arc;

    #[test]
    fn round_trips_through_a_temp_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out/people.parquet");
        let batch = RecordBatch::try_from_iter(vec![
            ("id", Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef),
            ("name", Arc::new(StringArray::from(vec![Some("a"), None])) as ArrayRef),
        ])?;

        let size = write_parquet(&batch, &path)?;
        assert!(size > 0);
        assert!(!tmp_path(&path).exists());

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 2);
        assert_eq!(batches[0].columns(), batch.columns());
        Ok(())
    }
}
