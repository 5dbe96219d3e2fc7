// src/reader/mod.rs

//! Reader dispatch: named loaders and the filtering pipeline every loaded table goes through.

pub mod csv;
pub mod excel;
pub mod fwf;

use std::{
    borrow::Cow,
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{ArrayRef, Scalar},
    compute::concat_batches,
    record_batch::RecordBatch,
};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::process::{convert, filter};
use crate::spec::FileSpecification;
use crate::temporal::{DateFilter, Period, END_OF_ALL_TIMES, START_OF_ALL_TIMES};

pub use self::csv::CsvReader;
pub use self::excel::ExcelReader;
pub use self::fwf::FwfReader;

/// Where the raw bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    /// In-memory content; `name` identifies it in errors and logs.
    Bytes { name: String, data: Vec<u8> },
}

impl Source {
    pub fn bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Source::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Source::Path(p) => p.to_string_lossy(),
            Source::Bytes { name, .. } => Cow::Borrowed(name),
        }
    }

    /// The whole content. Files are read in one go and closed before this returns.
    pub fn read(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            Source::Path(p) => Ok(Cow::Owned(fs::read(p)?)),
            Source::Bytes { data, .. } => Ok(Cow::Borrowed(data)),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<PathBuf> for Source {
    fn from(p: PathBuf) -> Self {
        Source::Path(p)
    }
}

impl From<&Path> for Source {
    fn from(p: &Path) -> Self {
        Source::Path(p.to_path_buf())
    }
}

impl From<&str> for Source {
    fn from(p: &str) -> Self {
        Source::Path(PathBuf::from(p))
    }
}

/// Text content of `bytes` in the configured `ENCODING`.
pub(crate) fn decode<'a>(bytes: &'a [u8], encoding: &str) -> Result<Cow<'a, str>> {
    match encoding.to_ascii_lowercase().replace('_', "-").as_str() {
        "utf-8" | "utf8" => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| Error::config("ENCODING", format!("data is not valid utf-8: {}", e))),
        "latin-1" | "latin1" | "iso-8859-1" => {
            Ok(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
        }
        "ascii" | "us-ascii" => match bytes.is_ascii() {
            true => Ok(Cow::Borrowed(
                std::str::from_utf8(bytes).map_err(|e| Error::config("ENCODING", e.to_string()))?,
            )),
            false => Err(Error::config("ENCODING", "data contains non-ascii bytes")),
        },
        other => Err(Error::config(
            "ENCODING",
            format!("unsupported encoding '{}'", other),
        )),
    }
}

/// A loader for one file format.
///
/// Only `load_file` is format specific. The remaining steps have shared defaults and are
/// always run in the same order by [`ReaderRegistry::load`]; override them only to adapt
/// how bounds are represented for a format.
pub trait FileReader: Send + Sync {
    /// The raw table as found in the source.
    fn load_file(&self, spec: &FileSpecification, source: &Source) -> Result<RecordBatch>;

    fn cleanup(
        &self,
        spec: &FileSpecification,
        batch: RecordBatch,
        source: &Source,
    ) -> Result<RecordBatch> {
        convert::cleanup(&batch, spec.fields(), &source.name())
    }

    /// `value` in the representation `field` has in `batch`.
    fn encode_bound(
        &self,
        spec: &FileSpecification,
        batch: &RecordBatch,
        field: &str,
        value: NaiveDateTime,
    ) -> Result<Scalar<ArrayRef>> {
        let column_type = convert::column_type(batch, field)?;
        convert::encode_bound(&column_type, value, spec.fields().strftime(field))
    }

    fn apply_effective_date_filter(
        &self,
        spec: &FileSpecification,
        batch: RecordBatch,
        field: &str,
        effective_date: NaiveDateTime,
    ) -> Result<RecordBatch> {
        let bound = self.encode_bound(spec, &batch, field, effective_date)?;
        filter::effective_date(&batch, field, &bound)
    }

    fn apply_period_filter(
        &self,
        spec: &FileSpecification,
        batch: RecordBatch,
        period: &Period,
        date_filter: &DateFilter,
    ) -> Result<RecordBatch> {
        let mut batch = batch;
        if let (Some(field), Some(from)) = (&period.field_from, date_filter.period_from) {
            let bound = self.encode_bound(spec, &batch, field, from)?;
            let fill = self.encode_bound(spec, &batch, field, *START_OF_ALL_TIMES)?;
            batch = filter::started_by(&batch, field, &bound, &fill)?;
        }
        if let (Some(field), Some(until)) = (&period.field_to, date_filter.period_until) {
            let bound = self.encode_bound(spec, &batch, field, until)?;
            let fill = self.encode_bound(spec, &batch, field, *END_OF_ALL_TIMES)?;
            batch = filter::valid_until(&batch, field, &bound, &fill, period.inclusive)?;
        }
        Ok(batch)
    }
}

/// Name to reader mapping.
#[derive(Clone, Default)]
pub struct ReaderRegistry {
    readers: HashMap<String, Arc<dyn FileReader>>,
}

impl fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderRegistry")
            .field("readers", &self.names())
            .finish()
    }
}

static DEFAULT_READERS: Lazy<ReaderRegistry> = Lazy::new(ReaderRegistry::with_defaults);

/// The registry with the built-in `fwf`, `csv` and `excel` readers.
pub fn default_registry() -> &'static ReaderRegistry {
    &DEFAULT_READERS
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("fwf", FwfReader);
        registry.register("csv", CsvReader);
        registry.register("excel", ExcelReader);
        registry
    }

    /// Add or replace a reader. Returns the replaced one.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        reader: impl FileReader + 'static,
    ) -> Option<Arc<dyn FileReader>> {
        self.readers.insert(name.into(), Arc::new(reader))
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn FileReader>> {
        self.readers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownReader(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.readers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn reader_for(
        &self,
        spec: &FileSpecification,
        date_filter: &DateFilter,
    ) -> Result<Arc<dyn FileReader>> {
        let name = spec
            .reader()
            .ok_or_else(|| Error::config("READER", "missing READER configuration"))?;
        if !spec.is_active(Some(date_filter.effective_date)) {
            return Err(Error::Inactive {
                spec: spec.name().to_string(),
                date: date_filter.effective_date.to_string(),
            });
        }
        self.resolve(name)
    }

    /// Raw load followed by cleanup, so every table already has the declared layout.
    fn load_clean(
        reader: &dyn FileReader,
        spec: &FileSpecification,
        source: &Source,
    ) -> Result<RecordBatch> {
        let raw = reader.load_file(spec, source)?;
        debug!(source = %source, rows = raw.num_rows(), "raw data loaded");
        reader.cleanup(spec, raw, source)
    }

    /// Effective date filter, period filter and latest revision per `INDEX_COL`, in that order.
    fn select(
        reader: &dyn FileReader,
        spec: &FileSpecification,
        mut batch: RecordBatch,
        date_filter: &DateFilter,
    ) -> Result<RecordBatch> {
        let config = spec.config();
        if let Some(field) = &config.effective_date_field {
            batch = reader.apply_effective_date_filter(
                spec,
                batch,
                field,
                date_filter.effective_date,
            )?;
        }
        if let Some(period) = &config.period_date_fields {
            batch = reader.apply_period_filter(spec, batch, period, date_filter)?;
        }
        if let Some(key) = &config.index_col {
            batch = filter::latest_by_key(&batch, key, config.effective_date_field.as_deref())?;
        }
        Ok(batch)
    }

    /// Load `source` with the reader `spec` names: raw load, cleanup, effective date filter,
    /// period filter, latest revision per `INDEX_COL`.
    #[instrument(level = "debug", skip_all, fields(spec = spec.name(), source = %source))]
    pub fn load(
        &self,
        spec: &FileSpecification,
        source: &Source,
        date_filter: &DateFilter,
    ) -> Result<RecordBatch> {
        let reader = self.reader_for(spec, date_filter)?;
        let batch = Self::load_clean(reader.as_ref(), spec, source)?;
        let batch = Self::select(reader.as_ref(), spec, batch, date_filter)?;
        info!(rows = batch.num_rows(), "file loaded");
        Ok(batch)
    }

    /// Load several files of the same specification as one table, typically a full file
    /// and the delta files following it. The cleaned tables are concatenated in the given
    /// order before filtering, so latest revision selection sees every revision of a key.
    #[instrument(level = "debug", skip_all, fields(spec = spec.name(), files = sources.len()))]
    pub fn load_many(
        &self,
        spec: &FileSpecification,
        sources: &[Source],
        date_filter: &DateFilter,
    ) -> Result<RecordBatch> {
        let reader = self.reader_for(spec, date_filter)?;
        if sources.is_empty() {
            return Err(Error::config("sources", "at least one file is required"));
        }

        let batches = sources
            .par_iter()
            .map(|source| Self::load_clean(reader.as_ref(), spec, source))
            .collect::<Result<Vec<_>>>()?;
        let schema = batches[0].schema();
        let merged = concat_batches(&schema, &batches)?;
        debug!(rows = merged.num_rows(), "files merged");

        let batch = Self::select(reader.as_ref(), spec, merged, date_filter)?;
        info!(rows = batch.num_rows(), "files loaded");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{AsArray, StringArray};

    struct Fixed;

    impl FileReader for Fixed {
        fn load_file(&self, _: &FileSpecification, _: &Source) -> Result<RecordBatch> {
            Ok(RecordBatch::try_from_iter(vec![(
                "id",
                Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef,
            )])?)
        }
    }

    fn spec(yaml: &str) -> FileSpecification {
        FileSpecification::from_yaml_str("test", yaml).unwrap()
    }

    #[test]
    fn default_readers_are_registered() {
        assert_eq!(default_registry().names(), vec!["csv", "excel", "fwf"]);
        assert!(matches!(
            default_registry().resolve("parquet"),
            Err(Error::UnknownReader(name)) if name == "parquet"
        ));
    }

    #[test]
    fn custom_readers_plug_in() {
        let mut registry = ReaderRegistry::with_defaults();
        assert!(registry.register("fixed", Fixed).is_none());
        assert!(registry.register("csv", Fixed).is_some());

        let out = registry
            .load(&spec("READER: fixed"), &Source::bytes("x", ""), &DateFilter::new())
            .unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.column(0).as_string::<i32>().value(1), "b");
    }

    #[test]
    fn load_checks_reader_and_activation() {
        let registry = ReaderRegistry::new();
        let src = Source::bytes("x", "");
        assert!(matches!(
            registry.load(&spec("{}"), &src, &DateFilter::new()),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            registry.load(&spec("READER: fixed"), &src, &DateFilter::new()),
            Err(Error::UnknownReader(_))
        ));
        assert!(matches!(
            registry.load(&spec("{READER: fixed, ENABLED: false}"), &src, &DateFilter::new()),
            Err(Error::Inactive { .. })
        ));
    }

    #[test]
    fn load_many_merges_in_order() {
        let mut registry = ReaderRegistry::new();
        registry.register("fixed", Fixed);
        let spec = spec("{READER: fixed, INDEX_COL: id}");
        let files = [Source::bytes("full", ""), Source::bytes("delta", "")];

        let out = registry.load_many(&spec, &files, &DateFilter::new()).unwrap();
        assert_eq!(out.num_rows(), 2);

        assert!(matches!(
            registry.load_many(&spec, &[], &DateFilter::new()),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            registry.load_many(&self::spec("READER: other"), &files, &DateFilter::new()),
            Err(Error::UnknownReader(_))
        ));
    }

    #[test]
    fn encodings() {
        assert_eq!(decode(b"abc", "utf-8").unwrap(), "abc");
        assert_eq!(decode(&[0x61, 0xe4], "latin-1").unwrap(), "aä");
        assert!(decode(&[0x61, 0xe4], "utf-8").is_err());
        assert!(decode(&[0x61, 0xe4], "ascii").is_err());
        assert!(decode(b"abc", "ebcdic").is_err());
    }

    #[test]
    fn sources() {
        let s = Source::from("data/in.dat");
        assert_eq!(s.name(), "data/in.dat");
        assert!(s.read().is_err());
        let s = Source::bytes("mem", b"abc".to_vec());
        assert_eq!(s.read().unwrap().as_ref(), b"abc");
        assert_eq!(s.to_string(), "mem");
    }
}
