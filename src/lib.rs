// src/lib.rs

//! Declarative file specifications for tabular input files.
//!
//! A [`FileSpecification`] describes one family of files: which names it applies to, when it
//! is active, how the file is laid out and which reader loads it. Loaded tables can be narrowed
//! to what was valid at an effective date and within a reporting period.

pub mod error;
pub mod export;
pub mod process;
pub mod reader;
pub mod spec;
pub mod temporal;

pub use error::{Error, Result};
pub use export::write_parquet;
pub use reader::{default_registry, FileReader, ReaderRegistry, Source};
pub use spec::{FileSpecBuilder, FileSpecification, SpecRegistry};
pub use temporal::{to_datetime, DateFilter, Period, PeriodKind};
