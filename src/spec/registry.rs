// src/spec/registry.rs

use std::path::Path;

use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::{debug, instrument};

use super::FileSpecification;
use crate::error::{Error, Result};
use crate::reader::{ReaderRegistry, Source};
use crate::temporal::DateFilter;

/// An ordered collection of specifications, searched front to back.
///
/// Construction sorts by `source` (stable), so operators control precedence through file
/// naming. Specifications added later are searched last.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    specs: Vec<FileSpecification>,
}

impl SpecRegistry {
    pub fn new(specs: impl IntoIterator<Item = FileSpecification>) -> Self {
        let mut specs: Vec<_> = specs.into_iter().collect();
        specs.sort_by(|a, b| a.source().cmp(b.source()));
        Self { specs }
    }

    pub fn add(&mut self, spec: FileSpecification) {
        self.specs.push(spec);
    }

    pub fn get(&self, name: &str) -> Option<&FileSpecification> {
        self.specs.iter().find(|s| s.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileSpecification> {
        self.specs.iter()
    }

    /// Specifications in search order that are eligible for `file` and/or active at
    /// `effective_date`. Without either argument every specification is returned, disabled
    /// ones included.
    pub fn filter<'a>(
        &'a self,
        file: Option<&'a str>,
        effective_date: Option<NaiveDateTime>,
    ) -> impl Iterator<Item = &'a FileSpecification> + 'a {
        self.specs.iter().filter(move |spec| match (file, effective_date) {
            (Some(file), Some(date)) => spec.is_eligible(file, date),
            (Some(file), None) => spec.matches_file(file),
            (None, Some(date)) => spec.is_active(Some(date)),
            (None, None) => true,
        })
    }

    /// The first specification eligible for `file` at `effective_date`.
    #[instrument(level = "debug", skip(self))]
    pub fn find_first(
        &self,
        file: &str,
        effective_date: NaiveDateTime,
    ) -> Result<&FileSpecification> {
        let spec = self
            .specs
            .iter()
            .find(|spec| spec.is_eligible(file, effective_date))
            .ok_or_else(|| Error::NoMatchingSpecification {
                file: file.to_string(),
            })?;
        debug!(spec = spec.name(), file, "file type resolved");
        Ok(spec)
    }

    /// Resolve and load every file in parallel. Results keep the order of `files`.
    pub fn load_all<P>(
        &self,
        files: &[P],
        filter: &DateFilter,
        readers: &ReaderRegistry,
    ) -> Vec<Result<RecordBatch>>
    where
        P: AsRef<Path> + Sync,
    {
        files
            .par_iter()
            .map(|path| {
                let path = path.as_ref();
                let spec = self.find_first(&path.to_string_lossy(), filter.effective_date)?;
                readers.load(spec, &Source::from(path), filter)
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a SpecRegistry {
    type Item = &'a FileSpecification;
    type IntoIter = std::slice::Iter<'a, FileSpecification>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}
