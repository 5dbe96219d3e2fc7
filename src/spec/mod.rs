// src/spec/mod.rs

//! File specifications: a validated, declarative description of one family of input files.

pub mod fields;
pub mod pattern;
pub mod registry;
pub mod validate;

use std::{collections::BTreeMap, fmt, fs, path::Path, sync::Arc};

use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::reader::{self, Source};
use crate::temporal::{to_datetime, DateFilter};

pub use fields::{DType, FieldDescriptor, FieldSpecTable};
pub use pattern::{FilePattern, PatternSet};
pub use registry::SpecRegistry;
pub use validate::{Config, Enabled, Sheet};

/// Validator for a caller defined configuration key. Returns the normalized value.
pub type CustomValidator =
    Arc<dyn Fn(&Value) -> std::result::Result<Value, String> + Send + Sync>;

fn is_config_key(key: &str) -> bool {
    key.starts_with(|c: char| c.is_ascii_uppercase())
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// A validated file specification.
///
/// Every configuration key went through its validator exactly once before it was stored. The
/// field table is derived from `FIELDSPECS` and `FIELDSPEC_DEFAULTS` and rebuilt whenever one
/// of them changes.
#[derive(Clone)]
pub struct FileSpecification {
    name: String,
    source: String,
    config: Config,
    fields: FieldSpecTable,
    validators: BTreeMap<String, CustomValidator>,
}

impl fmt::Debug for FileSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSpecification")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("config", &self.config)
            .field("custom_keys", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects configuration values and custom validators, validating everything at `build`.
pub struct FileSpecBuilder {
    name: String,
    source: Option<String>,
    values: Vec<(String, Value)>,
    validators: BTreeMap<String, CustomValidator>,
}

impl FileSpecBuilder {
    /// Defining file (or module) name; registries order specifications by it.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((key.into(), value.into()));
        self
    }

    pub fn validator<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.validators.insert(key.into(), Arc::new(f));
        self
    }

    pub fn build(self) -> Result<FileSpecification> {
        for key in self.validators.keys() {
            if !is_config_key(key) {
                return Err(Error::config(key, "configuration keys must be upper case"));
            }
            if validate::builtin(key).is_some() {
                return Err(Error::config(key, "a built-in validator already exists"));
            }
            if !self.values.iter().any(|(k, _)| k == key) {
                return Err(Error::config(key, "validator has no configured value"));
            }
        }

        let mut config = Config::default();
        for (key, value) in &self.values {
            if !is_config_key(key) {
                return Err(Error::config(key, "configuration keys must be upper case"));
            }
            apply(&mut config, &self.validators, key, value)?;
        }

        let fields = FieldSpecTable::new(&config.fieldspecs, &config.fieldspec_defaults)?;
        debug!(spec = %self.name, fields = fields.len(), "file specification validated");

        Ok(FileSpecification {
            source: self.source.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            config,
            fields,
            validators: self.validators,
        })
    }
}

fn apply(
    config: &mut Config,
    custom: &BTreeMap<String, CustomValidator>,
    key: &str,
    value: &Value,
) -> Result<bool> {
    if let Some(validator) = validate::builtin(key) {
        return validator(config, value).map_err(|reason| Error::config(key, reason));
    }
    let validator = custom
        .get(key)
        .ok_or_else(|| Error::config(key, "no validator registered for this key"))?;
    let normalized = validator(value).map_err(|reason| Error::config(key, reason))?;
    if config.custom.get(key) == Some(&normalized) {
        return Ok(false);
    }
    config.custom.insert(key.to_string(), normalized);
    Ok(true)
}

impl FileSpecification {
    pub fn builder(name: impl Into<String>) -> FileSpecBuilder {
        FileSpecBuilder {
            name: name.into(),
            source: None,
            values: Vec::new(),
            validators: BTreeMap::new(),
        }
    }

    /// Parse a YAML mapping of configuration keys.
    pub fn from_yaml_str(name: &str, text: &str) -> Result<Self> {
        Self::yaml_builder(name, text)?.build()
    }

    /// Like [`from_yaml_str`](Self::from_yaml_str), taking name and ordering source from the
    /// file name.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        Self::yaml_builder(&name, &text)?.source(source).build()
    }

    /// A builder pre-filled from YAML, for adding custom validators.
    pub fn yaml_builder(name: &str, text: &str) -> Result<FileSpecBuilder> {
        let doc: Mapping = match serde_yaml::from_str::<Value>(text)? {
            Value::Null => Mapping::new(),
            Value::Mapping(m) => m,
            other => {
                return Err(Error::config(name, format!("expected a mapping, got {:?}", other)))
            }
        };
        let mut builder = Self::builder(name);
        for (key, value) in doc {
            match key {
                Value::String(key) => builder = builder.value(key, value),
                other => return Err(Error::config(name, format!("invalid key {:?}", other))),
            }
        }
        Ok(builder)
    }

    /// Re-validate and assign one key. Returns `false` when the normalized value equals the
    /// current one; nothing is rebuilt in that case. A rejected value leaves the
    /// specification unchanged.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let mut config = self.config.clone();
        if !apply(&mut config, &self.validators, key, &value)? {
            return Ok(false);
        }
        if key == "FIELDSPECS" || key == "FIELDSPEC_DEFAULTS" {
            self.fields = FieldSpecTable::new(&config.fieldspecs, &config.fieldspec_defaults)?;
        }
        self.config = config;
        Ok(true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fields(&self) -> &FieldSpecTable {
        &self.fields
    }

    /// Value of a caller registered key.
    pub fn custom(&self, key: &str) -> Option<&Value> {
        self.config.custom.get(key)
    }

    pub fn reader(&self) -> Option<&str> {
        self.config.reader.as_deref()
    }

    /// `None` places no restriction at all, `ENABLED: false` included.
    pub fn is_active(&self, effective_date: Option<NaiveDateTime>) -> bool {
        let Some(date) = effective_date else {
            return true;
        };
        match &self.config.enabled {
            Enabled::Always(enabled) => *enabled,
            Enabled::Between(from, to) => {
                from.map_or(true, |from| from <= date) && to.map_or(true, |to| date < to)
            }
        }
    }

    /// Whether `file` matches any `FILE_PATTERN`.
    pub fn matches_file(&self, file: &str) -> bool {
        self.config.file_pattern.matches(file)
    }

    pub fn is_eligible(&self, file: &str, effective_date: NaiveDateTime) -> bool {
        self.is_active(Some(effective_date))
            && self.matches_file(file)
            && self.file_filter(file, effective_date)
    }

    /// Files stamped after `effective_date` are out of scope. Files without a timestamp pass.
    pub fn file_filter(&self, file: &str, effective_date: NaiveDateTime) -> bool {
        let Some(token) = self.extract_datetime_from_filename(file) else {
            return true;
        };
        match to_datetime(token) {
            Ok(stamp) => stamp <= effective_date,
            Err(e) => {
                warn!(spec = %self.name, file, error = %e, "unusable timestamp in file name");
                false
            }
        }
    }

    pub fn is_full(&self, file: &str) -> bool {
        self.config
            .full_files
            .as_ref()
            .is_some_and(|p| p.matches(file))
    }

    /// The first capture group of `DATE_FROM_FILENAME_REGEX`.
    pub fn extract_datetime_from_filename<'a>(&self, file: &'a str) -> Option<&'a str> {
        let re = &self.config.date_from_filename_regex.as_ref()?.0;
        re.captures(file)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Timestamp of `file`. Fails when a regex is configured but the name carries no token.
    pub fn datetime_from_filename(&self, file: &str) -> Result<Option<NaiveDateTime>> {
        let Some(re) = &self.config.date_from_filename_regex else {
            return Ok(None);
        };
        match self.extract_datetime_from_filename(file) {
            Some(token) => to_datetime(token).map(Some),
            None => Err(Error::config(
                "DATE_FROM_FILENAME_REGEX",
                format!(
                    "expected file name to contain a timestamp: file={}, regex='{}'",
                    file,
                    re.0.as_str()
                ),
            )),
        }
    }

    /// Load `source` with the configured reader from the default registry.
    pub fn load_file(&self, source: impl Into<Source>, filter: &DateFilter) -> Result<RecordBatch> {
        reader::default_registry().load(self, &source.into(), filter)
    }
}
