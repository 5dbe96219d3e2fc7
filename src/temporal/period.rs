use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use serde_yaml::Value;

use super::date_parser::{self, DateValue};
use crate::error::{Error, Result};

/// Stand-in for a missing validity start.
pub static START_OF_ALL_TIMES: Lazy<NaiveDateTime> = Lazy::new(|| midnight(1970, 1, 1));

/// Stand-in for a missing validity end.
pub static END_OF_ALL_TIMES: Lazy<NaiveDateTime> = Lazy::new(|| midnight(2249, 12, 31));

fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .unwrap_or(NaiveDateTime::MIN)
}

/// The two columns bounding a record's validity window.
///
/// `inclusive` says whether the value in `field_to` is the last valid day (inclusive) or the
/// first day no longer valid (exclusive).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Period {
    pub field_from: Option<String>,
    pub field_to: Option<String>,
    pub inclusive: bool,
}

impl Period {
    pub fn new(field_from: Option<&str>, field_to: Option<&str>, inclusive: bool) -> Self {
        Self {
            field_from: field_from.map(str::to_string),
            field_to: field_to.map(str::to_string),
            inclusive,
        }
    }

    /// Accepts `[from, to]` or `{from: .., to: .., inclusive: ..}`.
    pub(crate) fn from_yaml(value: &Value) -> std::result::Result<Self, String> {
        fn name(v: &Value) -> std::result::Result<Option<String>, String> {
            match v {
                Value::Null => Ok(None),
                Value::String(s) => Ok(Some(s.clone())),
                other => Err(format!("expected a field name or null, got {:?}", other)),
            }
        }

        match value {
            Value::Sequence(seq) if seq.len() == 2 => Ok(Period {
                field_from: name(&seq[0])?,
                field_to: name(&seq[1])?,
                inclusive: false,
            }),
            Value::Mapping(map) => {
                for key in map.keys() {
                    match key.as_str() {
                        Some("from") | Some("to") | Some("inclusive") => {}
                        _ => return Err(format!("unexpected key {:?}", key)),
                    }
                }
                let inclusive = match map.get("inclusive") {
                    None | Some(Value::Null) => false,
                    Some(Value::Bool(b)) => *b,
                    Some(other) => return Err(format!("'inclusive' must be a bool: {:?}", other)),
                };
                Ok(Period {
                    field_from: name(map.get("from").unwrap_or(&Value::Null))?,
                    field_to: name(map.get("to").unwrap_or(&Value::Null))?,
                    inclusive,
                })
            }
            other => Err(format!(
                "expected a list with 2 elements or a mapping: {:?}",
                other
            )),
        }
    }
}

/// Calendar ranges a reporting period can be derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKind {
    Month,
    Quarter,
    Year,
}

impl FromStr for PeriodKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "M" | "month" => Ok(PeriodKind::Month),
            "Q" | "quarter" => Ok(PeriodKind::Quarter),
            "Y" | "year" => Ok(PeriodKind::Year),
            other => Err(Error::config("range", format!("invalid period range '{}'", other))),
        }
    }
}

impl PeriodKind {
    /// First and last day of the month, quarter or year containing `date`.
    pub fn bounds(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let (first_month, months) = match self {
            PeriodKind::Month => (date.month(), 1),
            PeriodKind::Quarter => ((date.month0() / 3) * 3 + 1, 3),
            PeriodKind::Year => (1, 12),
        };
        let from = NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date);
        let until = from
            .checked_add_months(chrono::Months::new(months))
            .and_then(|d| d.pred_opt())
            .unwrap_or(from);
        (from, until)
    }
}

/// One filtering request: the point-in-time snapshot plus an optional period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFilter {
    pub effective_date: NaiveDateTime,
    pub period_from: Option<NaiveDateTime>,
    pub period_until: Option<NaiveDateTime>,
}

impl Default for DateFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl DateFilter {
    /// Effective now, no period restriction.
    pub fn new() -> Self {
        Self {
            effective_date: date_parser::now(),
            period_from: None,
            period_until: None,
        }
    }

    /// Normalize all three bounds. A missing effective date means "now".
    pub fn try_new(
        effective_date: Option<DateValue<'_>>,
        period_from: Option<DateValue<'_>>,
        period_until: Option<DateValue<'_>>,
    ) -> Result<Self> {
        let effective_date = match effective_date {
            Some(v) => date_parser::to_datetime(v)?,
            None => date_parser::now(),
        };
        Ok(Self {
            effective_date,
            period_from: date_parser::to_datetime_or(period_from, None)?,
            period_until: date_parser::to_datetime_or(period_until, None)?,
        })
    }

    /// Snapshot at `effective_date`, no period.
    pub fn at<'a>(effective_date: impl Into<DateValue<'a>>) -> Result<Self> {
        Ok(Self {
            effective_date: date_parser::to_datetime(effective_date)?,
            period_from: None,
            period_until: None,
        })
    }

    pub fn with_period<'a, 'b>(
        mut self,
        from: impl Into<DateValue<'a>>,
        until: impl Into<DateValue<'b>>,
    ) -> Result<Self> {
        self.period_from = Some(date_parser::to_datetime(from)?);
        self.period_until = Some(date_parser::to_datetime(until)?);
        Ok(self)
    }

    /// Period bounds covering the month, quarter or year of `date`.
    pub fn for_period(self, date: NaiveDate, kind: PeriodKind) -> Result<Self> {
        let (from, until) = kind.bounds(date);
        self.with_period(from, until)
    }
}
