#![allow(dead_code)]

use std::{collections::BTreeSet, fs, path::Path};

use arrow::{
    array::{Array, AsArray},
    datatypes::Int32Type,
    record_batch::RecordBatch,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,filespec=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn write(dir: &Path, name: &str, content: &str) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    Ok(path)
}

/// Values of an int32 column as a set.
pub fn ids(batch: &RecordBatch, column: &str) -> BTreeSet<i32> {
    batch
        .column_by_name(column)
        .map(|c| c.as_primitive::<Int32Type>().iter().flatten().collect())
        .unwrap_or_default()
}

/// Values of a text column in row order, missing values as `None`.
pub fn texts(batch: &RecordBatch, column: &str) -> Vec<Option<String>> {
    batch
        .column_by_name(column)
        .map(|c| {
            let c = c.as_string::<i32>();
            (0..c.len())
                .map(|i| (!c.is_null(i)).then(|| c.value(i).to_string()))
                .collect()
        })
        .unwrap_or_default()
}
