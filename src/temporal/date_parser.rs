use std::borrow::Cow;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde_yaml::Value;

use crate::error::{Error, Result};

/// The shapes a date may arrive in: configuration values, CLI arguments, file name tokens,
/// raw fixed-width bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum DateValue<'a> {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    /// `YYYYMMDD`, or `YYYYMMDDHHMMSS` when it has exactly 14 digits.
    Int(i64),
    Text(Cow<'a, str>),
    Bytes(&'a [u8]),
}

impl From<NaiveDateTime> for DateValue<'_> {
    fn from(v: NaiveDateTime) -> Self {
        DateValue::DateTime(v)
    }
}

impl From<NaiveDate> for DateValue<'_> {
    fn from(v: NaiveDate) -> Self {
        DateValue::Date(v)
    }
}

impl From<i64> for DateValue<'_> {
    fn from(v: i64) -> Self {
        DateValue::Int(v)
    }
}

impl From<i32> for DateValue<'_> {
    fn from(v: i32) -> Self {
        DateValue::Int(v as i64)
    }
}

impl<'a> From<&'a str> for DateValue<'a> {
    fn from(v: &'a str) -> Self {
        DateValue::Text(Cow::Borrowed(v))
    }
}

impl From<String> for DateValue<'_> {
    fn from(v: String) -> Self {
        DateValue::Text(Cow::Owned(v))
    }
}

impl<'a> From<&'a [u8]> for DateValue<'a> {
    fn from(v: &'a [u8]) -> Self {
        DateValue::Bytes(v)
    }
}

impl std::fmt::Display for DateValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateValue::DateTime(v) => write!(f, "{}", v),
            DateValue::Date(v) => write!(f, "{}", v),
            DateValue::Int(v) => write!(f, "{}", v),
            DateValue::Text(v) => write!(f, "{}", v),
            DateValue::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
        }
    }
}

/// "Now" in the local wall clock, the default effective date.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Convert any supported date shape into the canonical `NaiveDateTime`.
pub fn to_datetime<'a>(value: impl Into<DateValue<'a>>) -> Result<NaiveDateTime> {
    let value = value.into();
    match &value {
        DateValue::DateTime(v) => Ok(*v),
        DateValue::Date(v) => Ok(v.and_time(chrono::NaiveTime::MIN)),
        DateValue::Int(v) => from_int(*v).ok_or_else(|| Error::InvalidDate(value.to_string())),
        DateValue::Text(v) => from_text(v).ok_or_else(|| Error::InvalidDate(value.to_string())),
        DateValue::Bytes(v) => std::str::from_utf8(v)
            .ok()
            .and_then(from_text)
            .ok_or_else(|| Error::InvalidDate(value.to_string())),
    }
}

/// Like [`to_datetime`], but a missing value resolves to `default`, which may itself be `None`
/// ("no bound").
pub fn to_datetime_or<'a>(
    value: Option<DateValue<'a>>,
    default: Option<NaiveDateTime>,
) -> Result<Option<NaiveDateTime>> {
    match value {
        Some(v) => to_datetime(v).map(Some),
        None => Ok(default),
    }
}

/// Read a date out of a YAML configuration value. `null` maps to `None`.
pub fn from_yaml(value: &Value) -> Result<Option<NaiveDateTime>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_i64() {
            Some(i) => to_datetime(i).map(Some),
            None => Err(Error::InvalidDate(n.to_string())),
        },
        Value::String(s) => to_datetime(s.as_str()).map(Some),
        other => Err(Error::InvalidDate(format!("{:?}", other))),
    }
}

/// Place-value decomposition: lowest 2 digits day, next 2 month, the rest year.
fn from_int(v: i64) -> Option<NaiveDateTime> {
    if v < 0 {
        return None;
    }
    let (date, time) = if digits(v) == 14 {
        (v / 1_000_000, v % 1_000_000)
    } else {
        (v, 0)
    };

    let (rest, day) = (date / 100, date % 100);
    let (year, month) = (rest / 100, rest % 100);
    let year = i32::try_from(year).ok()?;
    let (hh, mm, ss) = (time / 10_000, (time / 100) % 100, time % 100);

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)?.and_hms_opt(
        hh as u32,
        mm as u32,
        ss as u32,
    )
}

fn from_text(s: &str) -> Option<NaiveDateTime> {
    let s: String = s.trim().chars().filter(|c| *c != '-').collect();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() == 14 {
        return NaiveDateTime::parse_from_str(&s, "%Y%m%d%H%M%S").ok();
    }
    from_int(s.parse().ok()?)
}

fn digits(mut v: i64) -> usize {
    let mut n = 1;
    while v >= 10 {
        v /= 10;
        n += 1;
    }
    n
}

/// Parse `s` with an explicit strftime format. Formats without a time part yield midnight.
pub fn parse_with_format(s: &str, fmt: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, fmt)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, fmt)
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn integers_decompose_by_place_value() {
        assert_eq!(to_datetime(20190101).unwrap(), ymd(2019, 1, 1));
        assert_eq!(to_datetime(21991231i64).unwrap(), ymd(2199, 12, 31));
        assert_eq!(
            to_datetime(20190101235959i64).unwrap(),
            ymd(2019, 1, 1).date().and_hms_opt(23, 59, 59).unwrap()
        );
        // five digit year
        assert_eq!(to_datetime(100000101i64).unwrap(), ymd(10000, 1, 1));
    }

    #[test]
    fn nonsense_day_or_month_is_rejected() {
        assert!(matches!(to_datetime(20191301), Err(Error::InvalidDate(_))));
        assert!(matches!(to_datetime(20190132), Err(Error::InvalidDate(_))));
        assert!(matches!(to_datetime(12345678), Err(Error::InvalidDate(_))));
        assert!(matches!(to_datetime(-1), Err(Error::InvalidDate(_))));
    }

    #[test]
    fn strings_with_and_without_separators() {
        assert_eq!(to_datetime("2019-01-01").unwrap(), ymd(2019, 1, 1));
        assert_eq!(to_datetime("20190101").unwrap(), ymd(2019, 1, 1));
        assert_eq!(
            to_datetime("20190101235959").unwrap(),
            ymd(2019, 1, 1).date().and_hms_opt(23, 59, 59).unwrap()
        );
        assert_eq!(to_datetime(&b"2018-06-01"[..]).unwrap(), ymd(2018, 6, 1));
    }

    #[test]
    fn malformed_strings_carry_the_original_value() {
        match to_datetime("2019/01/01") {
            Err(Error::InvalidDate(v)) => assert_eq!(v, "2019/01/01"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(to_datetime("").is_err());
        assert!(to_datetime("199912").is_err());
        assert!(to_datetime("09:20:11").is_err());
    }

    #[test]
    fn native_values_pass_through() {
        let d = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        assert_eq!(to_datetime(d).unwrap(), ymd(2020, 2, 29));
        assert_eq!(to_datetime(ymd(2020, 2, 29)).unwrap(), ymd(2020, 2, 29));
    }

    #[test]
    fn missing_values_use_the_supplied_default() {
        assert_eq!(to_datetime_or(None, None).unwrap(), None);
        let d = ymd(2000, 1, 1);
        assert_eq!(to_datetime_or(None, Some(d)).unwrap(), Some(d));
        assert_eq!(
            to_datetime_or(Some(20180101.into()), Some(d)).unwrap(),
            Some(ymd(2018, 1, 1))
        );
    }

    #[test]
    fn yaml_values() {
        assert_eq!(from_yaml(&Value::Null).unwrap(), None);
        assert_eq!(
            from_yaml(&Value::from(20190101)).unwrap(),
            Some(ymd(2019, 1, 1))
        );
        assert_eq!(
            from_yaml(&Value::from("2019-01-01")).unwrap(),
            Some(ymd(2019, 1, 1))
        );
        assert!(from_yaml(&Value::from(true)).is_err());
    }

    #[test]
    fn explicit_formats() {
        assert_eq!(parse_with_format("20180601", "%Y%m%d"), Some(ymd(2018, 6, 1)));
        assert_eq!(parse_with_format("01.06.2018", "%d.%m.%Y"), Some(ymd(2018, 6, 1)));
        assert_eq!(parse_with_format("xx", "%Y%m%d"), None);
    }
}
