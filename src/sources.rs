// 🗂️ Source datasets - Crawler output, one file per source
//
// Two sources observe the same people:
// - NPL (National Parliamentary Library): every term since the first,
//   the authoritative source for coverage
// - LY (Legislative Yuan site): recent terms only, but authoritative for
//   end-of-term and contact details

use crate::committee::sanitize_committees;
use crate::model::RawTermRecord;
use crate::normalize::{normalize, normalize_all};
use crate::report::Reporter;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// SOURCE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Npl,
    Ly,
}

impl Source {
    /// Short code, also the key of this source in a record's `links`
    pub fn code(&self) -> &'static str {
        match self {
            Source::Npl => "npl",
            Source::Ly => "ly",
        }
    }
}

// ============================================================================
// SOURCE DATASET
// ============================================================================

/// All records one crawler produced, in crawl order
#[derive(Debug, Clone)]
pub struct SourceDataset {
    pub source: Source,
    pub records: Vec<RawTermRecord>,
}

impl SourceDataset {
    pub fn new(source: Source, records: Vec<RawTermRecord>) -> Self {
        SourceDataset { source, records }
    }

    /// Load a crawler output file (JSON array of records)
    pub fn from_file<P: AsRef<Path>>(source: Source, path: P) -> Result<Self> {
        let records: Vec<RawTermRecord> = read_json(path.as_ref())
            .with_context(|| format!("Failed to load {} records", source.code()))?;
        Ok(SourceDataset::new(source, records))
    }

    /// Normalize names and parse committee text in place.
    ///
    /// Returns the number of committee entries dropped.
    pub fn sanitize(&mut self, reporter: &mut dyn Reporter) -> usize {
        let mut dropped = 0;
        for record in &mut self.records {
            record.name = normalize(&record.name);
            record.aliases = normalize_all(&record.aliases);
            dropped += sanitize_committees(record, self.source, reporter);
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// JSON FILES
// ============================================================================

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {:?}", path))?;

    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON: {:?}", path))
}

// ============================================================================
// TESTS
// ============================================================================
