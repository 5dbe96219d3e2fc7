//! Canonical dates and the bitemporal filtering request.

pub mod date_parser;
pub mod period;

pub use date_parser::{to_datetime, to_datetime_or, DateValue};
pub use period::{DateFilter, Period, PeriodKind, END_OF_ALL_TIMES, START_OF_ALL_TIMES};
