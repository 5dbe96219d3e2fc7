// src/spec/fields.rs

use std::{collections::HashMap, ops::Range, str::FromStr};

use arrow::datatypes::{DataType, TimeUnit};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Upper bound for a single field width.
pub const MAX_FIELD_WIDTH: i64 = 10_000;

/// Semantic type tag of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Utf8,
    Int32,
    Int64,
    Float64,
    Boolean,
    Date,
    DateTime,
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "str" | "string" | "utf8" | "text" | "object" => Ok(DType::Utf8),
            "int32" => Ok(DType::Int32),
            "int" | "int64" | "integer" => Ok(DType::Int64),
            "float" | "float64" | "double" => Ok(DType::Float64),
            "bool" | "boolean" => Ok(DType::Boolean),
            "date" => Ok(DType::Date),
            "datetime" | "timestamp" => Ok(DType::DateTime),
            _ if lower.starts_with("datetime64") => Ok(DType::DateTime),
            _ => Err(format!("unsupported dtype '{}'", s)),
        }
    }
}

impl DType {
    /// Arrow type a column of this dtype is cast into during cleanup.
    pub fn to_arrow(&self) -> DataType {
        match self {
            DType::Utf8 => DataType::Utf8,
            DType::Int32 => DataType::Int32,
            DType::Int64 => DataType::Int64,
            DType::Float64 => DataType::Float64,
            DType::Boolean => DataType::Boolean,
            DType::Date => DataType::Date32,
            DType::DateTime => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DType::Date | DType::DateTime)
    }
}

/// One column of a record layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub width: Option<usize>,
    /// Half-open character range within a fixed-width line.
    pub slice: Option<Range<usize>>,
    pub dtype: Option<DType>,
    /// Fallback for missing raw values.
    pub default: Option<Value>,
    /// How date values are rendered in the raw data.
    pub strftime: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    name: String,
    #[serde(default, alias = "len")]
    width: Option<i64>,
    #[serde(default)]
    slice: Option<(usize, usize)>,
    #[serde(default)]
    dtype: Option<String>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    strftime: Option<String>,
}

/// Ordered, name-indexed field descriptors. Declaration order is preserved and drives both
/// slice offsets and output column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSpecTable {
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
}

impl FieldSpecTable {
    /// Merge `defaults` into every descriptor (keys already present win), then derive slices.
    ///
    /// A layout is positional once any field declares a width or slice; from then on every
    /// field must declare one. Layouts without any are header-based (Excel, CSV).
    pub fn new(fieldspecs: &[Mapping], defaults: &Mapping) -> Result<Self> {
        let mut raw = Vec::with_capacity(fieldspecs.len());
        for spec in fieldspecs {
            let mut merged = spec.clone();
            for (k, v) in defaults {
                if !merged.contains_key(k) {
                    merged.insert(k.clone(), v.clone());
                }
            }
            let field: RawField = serde_yaml::from_value(Value::Mapping(merged))
                .map_err(|e| Error::config("FIELDSPECS", format!("{}: {:?}", e, spec)))?;
            raw.push(field);
        }

        let positional = raw.iter().any(|f| f.width.is_some() || f.slice.is_some());

        let mut fields = Vec::with_capacity(raw.len());
        let mut start = 0usize;
        for f in raw {
            let width = match f.width {
                Some(w) if !(1..=MAX_FIELD_WIDTH).contains(&w) => {
                    return Err(Error::config(
                        "FIELDSPECS",
                        format!("invalid width {} for field '{}'", w, f.name),
                    ));
                }
                Some(w) => Some(w as usize),
                None => None,
            };

            if let Some((a, b)) = f.slice {
                if b < a {
                    return Err(Error::config(
                        "FIELDSPECS",
                        format!("invalid slice {}..{} for field '{}'", a, b, f.name),
                    ));
                }
            }

            let slice = match (width, f.slice) {
                // an explicit slice wins and does not move the cursor
                (Some(_), Some((a, b))) => Some(a..b),
                (Some(w), None) => {
                    let s = start..start + w;
                    start += w;
                    Some(s)
                }
                (None, Some((a, b))) => {
                    start = b;
                    Some(a..b)
                }
                (None, None) if positional => {
                    return Err(Error::config(
                        "FIELDSPECS",
                        format!("field '{}' is missing either 'width' or 'slice'", f.name),
                    ));
                }
                (None, None) => None,
            };

            let dtype = f
                .dtype
                .as_deref()
                .map(DType::from_str)
                .transpose()
                .map_err(|e| Error::config("FIELDSPECS", format!("field '{}': {}", f.name, e)))?;

            fields.push(FieldDescriptor {
                name: f.name,
                width,
                slice,
                dtype,
                default: f.default,
                strftime: f.strftime,
            });
        }

        let mut by_name = HashMap::with_capacity(fields.len());
        let mut duplicates = Vec::new();
        for (i, f) in fields.iter().enumerate() {
            if by_name.insert(f.name.clone(), i).is_some() && !duplicates.contains(&f.name) {
                duplicates.push(f.name.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(Error::config(
                "FIELDSPECS",
                format!("attribute 'name' must be unique: {:?}", duplicates),
            ));
        }

        Ok(Self { fields, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn get_index(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.get(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_positional(&self) -> bool {
        self.fields.iter().any(|f| f.slice.is_some())
    }

    /// Strftime format for `name`, `%Y%m%d` when none is declared.
    pub fn strftime(&self, name: &str) -> &str {
        self.get(name)
            .and_then(|f| f.strftime.as_deref())
            .unwrap_or("%Y%m%d")
    }
}

impl<'a> IntoIterator for &'a FieldSpecTable {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
