// ⚙️ Pipeline configuration - Where every input and output lives
//
// Defaults follow the data directory layout the crawlers write to:
//
//   data/npl_ly.json                          primary source (NPL)
//   data/ly_info.json                         secondary source (LY)
//   data/legislators_uid.json                 registry snapshot
//   data/merged.json                          merged dataset
//   original_data/merged.json                 registry primary input
//   original_data/merged_uid_by_ourself.json  supplemental identities
//   additional/additionals.json               identity patches

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Previous merged dataset, the registry's primary input
    pub registry_primary: PathBuf,
    pub registry_supplemental: PathBuf,
    pub registry_patches: PathBuf,

    /// Registry snapshot written by the builder and read by the linker
    pub registry_snapshot: PathBuf,

    pub primary_source: PathBuf,
    pub secondary_source: PathBuf,

    pub merged_output: PathBuf,

    /// Directory for per-term projections (mly-<term>.json / .csv)
    pub projection_dir: PathBuf,

    /// SQLite run log; no audit trail when unset
    pub audit_db: Option<PathBuf>,

    /// Recorded as the actor of every audit event
    pub actor: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            registry_primary: PathBuf::from("original_data/merged.json"),
            registry_supplemental: PathBuf::from("original_data/merged_uid_by_ourself.json"),
            registry_patches: PathBuf::from("additional/additionals.json"),
            registry_snapshot: PathBuf::from("data/legislators_uid.json"),
            primary_source: PathBuf::from("data/npl_ly.json"),
            secondary_source: PathBuf::from("data/ly_info.json"),
            merged_output: PathBuf::from("data/merged.json"),
            projection_dir: PathBuf::from("data"),
            audit_db: None,
            actor: "legislator-merge".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Resolve every relative path against `root`
    pub fn with_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };

        resolve(&mut self.registry_primary);
        resolve(&mut self.registry_supplemental);
        resolve(&mut self.registry_patches);
        resolve(&mut self.registry_snapshot);
        resolve(&mut self.primary_source);
        resolve(&mut self.secondary_source);
        resolve(&mut self.merged_output);
        resolve(&mut self.projection_dir);
        if let Some(db) = self.audit_db.as_mut() {
            resolve(db);
        }
        self
    }

    pub fn projection_json(&self, term: u32) -> PathBuf {
        self.projection_dir.join(format!("mly-{}.json", term))
    }

    pub fn projection_csv(&self, term: u32) -> PathBuf {
        self.projection_dir.join(format!("mly-{}.csv", term))
    }
}
