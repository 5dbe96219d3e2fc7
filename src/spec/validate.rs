// src/spec/validate.rs

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use regex::Regex;
use serde_yaml::{Mapping, Value};

use super::pattern::PatternSet;
use crate::temporal::{date_parser, Period};

/// Default token extractor for file name timestamps, e.g. `abc.20180601.A901`.
pub const DEFAULT_DATE_FROM_FILENAME_REGEX: &str = r"\.(\d{8,14})\.";

/// Whether a specification may be used at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enabled {
    Always(bool),
    /// Inclusive start, exclusive end. `None` is unbounded.
    Between(Option<NaiveDateTime>, Option<NaiveDateTime>),
}

/// Worksheet selector for spreadsheet readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sheet {
    Index(usize),
    Name(String),
}

/// Regex wrapper comparing by source text.
#[derive(Debug, Clone)]
pub struct FilenameRegex(pub Regex);

impl PartialEq for FilenameRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

/// Normalized configuration values of a specification, one field per built-in key.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub enabled: Enabled,
    pub fieldspec_defaults: Mapping,
    pub fieldspecs: Vec<Mapping>,
    pub file_pattern: PatternSet,
    pub full_files: Option<PatternSet>,
    pub newline: Option<Vec<String>>,
    pub encoding: String,
    pub comments: Option<String>,
    pub skip_rows: usize,
    pub sheet: Sheet,
    pub delimiter: u8,
    pub index_col: Option<String>,
    pub effective_date_field: Option<String>,
    pub period_date_fields: Option<Period>,
    pub date_from_filename_regex: Option<FilenameRegex>,
    pub reader: Option<String>,
    /// Values of caller registered keys, after their validator ran.
    pub custom: BTreeMap<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: Enabled::Always(true),
            fieldspec_defaults: Mapping::new(),
            fieldspecs: Vec::new(),
            file_pattern: PatternSet::default(),
            full_files: None,
            newline: None,
            encoding: "utf-8".to_string(),
            comments: None,
            skip_rows: 0,
            sheet: Sheet::Index(0),
            delimiter: b',',
            index_col: None,
            effective_date_field: None,
            period_date_fields: None,
            date_from_filename_regex: Regex::new(DEFAULT_DATE_FROM_FILENAME_REGEX)
                .ok()
                .map(FilenameRegex),
            reader: None,
            custom: BTreeMap::new(),
        }
    }
}

/// Validates `value`, writes the normalized result into the config and reports whether it
/// differed from what was there.
pub(crate) type Validator = fn(&mut Config, &Value) -> Result<bool, String>;

pub(crate) const BUILTIN_VALIDATORS: &[(&str, Validator)] = &[
    ("ENABLED", enabled),
    ("FIELDSPEC_DEFAULTS", fieldspec_defaults),
    ("FIELDSPECS", fieldspecs),
    ("FILE_PATTERN", file_pattern),
    ("FULL_FILES", full_files),
    ("NEWLINE", newline),
    ("ENCODING", encoding),
    ("COMMENTS", comments),
    ("SKIP_ROWS", skip_rows),
    ("SHEET", sheet),
    ("DELIMITER", delimiter),
    ("INDEX_COL", index_col),
    ("EFFECTIVE_DATE_FIELD", effective_date_field),
    ("PERIOD_DATE_FIELDS", period_date_fields),
    ("DATE_FROM_FILENAME_REGEX", date_from_filename_regex),
    ("READER", reader),
];

pub(crate) fn builtin(key: &str) -> Option<Validator> {
    BUILTIN_VALIDATORS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

fn assign<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn unexpected(what: &str, value: &Value) -> String {
    format!("expected {}, got {:?}", what, value)
}

fn opt_string(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(unexpected("a string or null", other)),
    }
}

fn string_keyed(value: &Value) -> Result<Mapping, String> {
    match value {
        Value::Mapping(m) if m.keys().all(Value::is_string) => Ok(m.clone()),
        other => Err(unexpected("a mapping with string keys", other)),
    }
}

fn string_list(value: &Value) -> Result<Vec<String>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Sequence(seq) => seq
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                other => Err(unexpected("a string", other)),
            })
            .collect(),
        other => Err(unexpected("a string or a list of strings", other)),
    }
}

fn patterns(value: &Value) -> Result<PatternSet, String> {
    let list = string_list(value)?;
    PatternSet::new(&list).map_err(|e| format!("invalid pattern: {}", e))
}

fn enabled(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = match value {
        Value::Bool(b) => Enabled::Always(*b),
        Value::Sequence(seq) if seq.len() == 2 => {
            let from = date_parser::from_yaml(&seq[0]).map_err(|e| e.to_string())?;
            let to = date_parser::from_yaml(&seq[1]).map_err(|e| e.to_string())?;
            Enabled::Between(from, to)
        }
        other => return Err(unexpected("a bool or a list with 2 dates", other)),
    };
    Ok(assign(&mut cfg.enabled, new))
}

fn fieldspec_defaults(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = match value {
        Value::Null => Mapping::new(),
        other => string_keyed(other)?,
    };
    Ok(assign(&mut cfg.fieldspec_defaults, new))
}

fn fieldspecs(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = match value {
        Value::Null => Vec::new(),
        Value::Sequence(seq) => seq.iter().map(string_keyed).collect::<Result<_, _>>()?,
        other => return Err(unexpected("a list of mappings", other)),
    };
    Ok(assign(&mut cfg.fieldspecs, new))
}

fn file_pattern(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = patterns(value)?;
    Ok(assign(&mut cfg.file_pattern, new))
}

fn full_files(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = match value {
        Value::Null => None,
        other => Some(patterns(other)?),
    };
    Ok(assign(&mut cfg.full_files, new))
}

fn newline(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    fn one(v: &Value) -> Result<String, String> {
        match v {
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            Value::Number(n) => n
                .as_u64()
                .and_then(|b| u8::try_from(b).ok())
                .map(|b| char::from(b).to_string())
                .ok_or_else(|| unexpected("a byte value", v)),
            other => Err(unexpected("a non-empty string or a byte", other)),
        }
    }

    let new = match value {
        Value::Null => None,
        Value::Sequence(seq) => Some(seq.iter().map(one).collect::<Result<_, _>>()?),
        other => Some(vec![one(other)?]),
    };
    Ok(assign(&mut cfg.newline, new))
}

fn encoding(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = opt_string(value)?.unwrap_or_else(|| "utf-8".to_string());
    Ok(assign(&mut cfg.encoding, new))
}

fn comments(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = opt_string(value)?.filter(|s| !s.is_empty());
    Ok(assign(&mut cfg.comments, new))
}

fn skip_rows(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = match value {
        Value::Null => 0,
        Value::Number(n) => n
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| unexpected("a non-negative integer", value))?,
        other => return Err(unexpected("a non-negative integer", other)),
    };
    Ok(assign(&mut cfg.skip_rows, new))
}

fn sheet(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = match value {
        Value::Null => Sheet::Index(0),
        Value::Number(n) => Sheet::Index(
            n.as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| unexpected("a sheet index", value))?,
        ),
        Value::String(s) => Sheet::Name(s.clone()),
        other => return Err(unexpected("a sheet index or name", other)),
    };
    Ok(assign(&mut cfg.sheet, new))
}

fn delimiter(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = match value {
        Value::Null => b',',
        Value::String(s) if s.len() == 1 && s.is_ascii() => s.as_bytes()[0],
        other => return Err(unexpected("a single ASCII character", other)),
    };
    Ok(assign(&mut cfg.delimiter, new))
}

fn index_col(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = opt_string(value)?;
    Ok(assign(&mut cfg.index_col, new))
}

fn effective_date_field(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = opt_string(value)?;
    Ok(assign(&mut cfg.effective_date_field, new))
}

fn period_date_fields(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = match value {
        Value::Null => None,
        other => Some(Period::from_yaml(other)?),
    };
    Ok(assign(&mut cfg.period_date_fields, new))
}

fn date_from_filename_regex(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = match opt_string(value)? {
        None => None,
        Some(s) => {
            let re = Regex::new(&s).map_err(|e| e.to_string())?;
            if re.captures_len() < 2 {
                return Err(format!("regex '{}' needs a capture group", s));
            }
            Some(FilenameRegex(re))
        }
    };
    Ok(assign(&mut cfg.date_from_filename_regex, new))
}

fn reader(cfg: &mut Config, value: &Value) -> Result<bool, String> {
    let new = opt_string(value)?;
    Ok(assign(&mut cfg.reader, new))
}
