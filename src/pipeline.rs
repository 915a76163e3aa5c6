// 🚚 Pipeline - Registry build, link & merge, projection
//
// Stages are plain functions over the config; `run` wraps them with
// diagnostics collection and the optional audit log. Outputs are written
// only after a stage has fully succeeded, through a temp file + rename,
// so a failed run never leaves a partial file behind.

use crate::audit::{AuditLog, Event};
use crate::config::PipelineConfig;
use crate::linker::link_and_merge;
use crate::model::{CanonicalLegislator, IdentityRecord, TermNumber};
use crate::projector::{project_term, write_roster_csv};
use crate::registry::{build_registry, IdentityRegistry};
use crate::report::{count_by_kind, Diagnostic, DiagnosticKind, Reporter, TracingReporter};
use crate::sources::{read_json, Source, SourceDataset};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ============================================================================
// STAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Build the registry and write its snapshot
    Registry,
    /// Read the snapshot, link and merge the sources, write the merged dataset
    Merge,
    /// Both, in memory; nothing is written unless the merge succeeds
    Full,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Registry => "registry",
            Stage::Merge => "merge",
            Stage::Full => "run",
        }
    }
}

/// What a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub identities: usize,
    pub legislators: usize,
    pub terms: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunSummary {
    pub fn counts_by_kind(&self) -> BTreeMap<DiagnosticKind, usize> {
        count_by_kind(&self.diagnostics)
    }
}

#[derive(Debug, Default)]
struct StageCounts {
    identities: usize,
    legislators: usize,
    terms: usize,
}

// ============================================================================
// LOADERS
// ============================================================================

/// Load the three registry inputs; supplemental and patch files are optional
pub fn load_registry_inputs(
    config: &PipelineConfig,
) -> Result<(Vec<CanonicalLegislator>, Vec<IdentityRecord>, Vec<IdentityRecord>)> {
    let primary: Vec<CanonicalLegislator> = read_json(&config.registry_primary)
        .context("Failed to load registry primary input")?;
    let supplemental = read_optional(&config.registry_supplemental)?;
    let patches = read_optional(&config.registry_patches)?;

    tracing::info!(
        primary = primary.len(),
        supplemental = supplemental.len(),
        patches = patches.len(),
        "registry inputs loaded"
    );
    Ok((primary, supplemental, patches))
}

fn read_optional(path: &Path) -> Result<Vec<IdentityRecord>> {
    if !path.exists() {
        tracing::info!(path = ?path, "optional identity file not found, skipping");
        return Ok(Vec::new());
    }
    read_json(path)
}

/// Load and sanitize both sources
pub fn load_sources(
    config: &PipelineConfig,
    reporter: &mut dyn Reporter,
) -> Result<(SourceDataset, SourceDataset)> {
    let mut primary = SourceDataset::from_file(Source::Npl, &config.primary_source)?;
    let mut secondary = SourceDataset::from_file(Source::Ly, &config.secondary_source)?;

    let dropped = primary.sanitize(reporter) + secondary.sanitize(reporter);
    tracing::info!(
        primary = primary.len(),
        secondary = secondary.len(),
        dropped_committees = dropped,
        "sources loaded"
    );

    Ok((primary, secondary))
}

/// Load a merged dataset written by a previous run
pub fn load_merged(path: &Path) -> Result<Vec<CanonicalLegislator>> {
    read_json(path).context("Failed to load merged dataset")
}

// ============================================================================
// STAGE FUNCTIONS
// ============================================================================

pub fn build_stage(config: &PipelineConfig, reporter: &mut dyn Reporter) -> Result<IdentityRegistry> {
    let (primary, supplemental, patches) = load_registry_inputs(config)?;
    Ok(build_registry(&primary, &supplemental, &patches, reporter))
}

/// Link and merge; a coverage failure comes back as `LinkError` inside
/// the anyhow error (use `downcast_ref` to inspect the gaps)
pub fn merge_stage(
    config: &PipelineConfig,
    registry: &IdentityRegistry,
    reporter: &mut dyn Reporter,
) -> Result<Vec<CanonicalLegislator>> {
    let (primary, secondary) = load_sources(config, reporter)?;
    let legislators = link_and_merge(registry, &primary, &secondary, reporter)?;
    Ok(legislators)
}

fn execute(config: &PipelineConfig, stage: Stage, reporter: &mut dyn Reporter) -> Result<StageCounts> {
    match stage {
        Stage::Registry => {
            let registry = build_stage(config, reporter)?;
            write_json_atomic(&config.registry_snapshot, registry.all())?;
            Ok(StageCounts {
                identities: registry.count(),
                ..StageCounts::default()
            })
        }
        Stage::Merge => {
            let registry = IdentityRegistry::from_snapshot_file(&config.registry_snapshot)?;
            let legislators = merge_stage(config, &registry, reporter)?;
            write_json_atomic(&config.merged_output, &legislators)?;
            Ok(counts(&registry, &legislators))
        }
        Stage::Full => {
            let registry = build_stage(config, reporter)?;
            let legislators = merge_stage(config, &registry, reporter)?;
            // Both staged before either is moved into place
            let snapshot = stage_json(&config.registry_snapshot, registry.all())?;
            let merged = stage_json(&config.merged_output, &legislators)?;
            commit_all(vec![snapshot, merged])?;
            Ok(counts(&registry, &legislators))
        }
    }
}

fn counts(registry: &IdentityRegistry, legislators: &[CanonicalLegislator]) -> StageCounts {
    StageCounts {
        identities: registry.count(),
        legislators: legislators.len(),
        terms: legislators.iter().map(|l| l.terms.len()).sum(),
    }
}

// ============================================================================
// RUN
// ============================================================================

/// Run a stage with tracing diagnostics and, when configured, an audit trail
pub fn run(config: &PipelineConfig, stage: Stage) -> Result<RunSummary> {
    let run_id = Uuid::new_v4().to_string();
    let mut audit = match &config.audit_db {
        Some(path) => Some(AuditLog::open(path)?),
        None => None,
    };

    if let Some(log) = &audit {
        log.insert_event(&Event::new(
            "run_started",
            "run",
            &run_id,
            serde_json::json!({ "stage": stage.as_str() }),
            &config.actor,
        ))?;
    }

    let mut reporter = TracingReporter::new();
    let outcome = execute(config, stage, &mut reporter);
    let diagnostics = reporter.into_diagnostics();

    if let Some(log) = audit.as_mut() {
        log.record_diagnostics(&run_id, &diagnostics, &config.actor)?;

        let (event_type, data) = match &outcome {
            Ok(c) => (
                "run_completed",
                serde_json::json!({
                    "stage": stage.as_str(),
                    "identities": c.identities,
                    "legislators": c.legislators,
                    "terms": c.terms,
                    "diagnostics": diagnostics.len(),
                }),
            ),
            Err(e) => (
                "run_failed",
                serde_json::json!({ "stage": stage.as_str(), "error": format!("{:#}", e) }),
            ),
        };
        log.insert_event(&Event::new(event_type, "run", &run_id, data, &config.actor))?;
    }

    let c = outcome?;
    Ok(RunSummary {
        run_id,
        identities: c.identities,
        legislators: c.legislators,
        terms: c.terms,
        diagnostics,
    })
}

/// Project one term of the merged dataset; returns the number of rows
pub fn project(config: &PipelineConfig, term: TermNumber, with_csv: bool) -> Result<usize> {
    let legislators = load_merged(&config.merged_output)?;
    let projected = project_term(&legislators, term);

    let mut outputs = vec![stage_json(&config.projection_json(term), &projected)?];
    if with_csv {
        outputs.push(stage(&config.projection_csv(term), |writer| {
            write_roster_csv(&projected, writer)
        })?);
    }
    commit_all(outputs)?;

    tracing::info!(term, rows = projected.len(), "term projected");
    Ok(projected.len())
}

// ============================================================================
// OUTPUT
// ============================================================================

/// An output written next to its target, moved into place by `commit_all`.
///
/// Dropping an uncommitted file removes the temp file.
pub struct StagedFile {
    temp_path: PathBuf,
    target: PathBuf,
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        // Already renamed when committed
        let _ = fs::remove_file(&self.temp_path);
    }
}

/// Write an output to a temp file beside `path` and fsync it
pub fn stage<F>(path: &Path, write: F) -> Result<StagedFile>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("out");
    let staged = StagedFile {
        temp_path: path.with_extension(format!("{}.tmp.{}", extension, Uuid::new_v4())),
        target: path.to_path_buf(),
    };

    let file = File::create(&staged.temp_path)
        .with_context(|| format!("Failed to create temp file: {:?}", staged.temp_path))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).with_context(|| format!("Failed to write {:?}", path))?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    Ok(staged)
}

/// Stage `value` as pretty-printed JSON
pub fn stage_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<StagedFile> {
    stage(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        Ok(())
    })
}

/// Move every staged file into place
pub fn commit_all(staged: Vec<StagedFile>) -> Result<()> {
    for file in &staged {
        fs::rename(&file.temp_path, &file.target)
            .with_context(|| format!("Failed to move output into place: {:?}", file.target))?;
    }
    Ok(())
}

/// Pretty-print `value` to `path` via a temp file and rename
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    commit_all(vec![stage_json(path, value)?])
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_json_atomic_creates_dirs_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let value: Vec<u32> = serde_json::from_str(&content).unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_write_json_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, "old").unwrap();

        write_json_atomic(&path, &serde_json::json!({"new": true})).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["new"], true);
    }

    #[test]
    fn test_failed_stage_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("legislators_uid.json");
        let merged = dir.path().join("merged.json");

        let first = stage_json(&snapshot, &vec![1, 2]).unwrap();
        let second = stage(&merged, |_| anyhow::bail!("disk full"));
        assert!(second.is_err());
        drop(first);

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_commit_all_moves_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("mly-9.json");
        let csv = dir.path().join("mly-9.csv");

        let staged = vec![
            stage_json(&json, &serde_json::json!([])).unwrap(),
            stage(&csv, |writer| {
                writer.write_all(b"id,name\n")?;
                Ok(())
            })
            .unwrap(),
        ];
        assert!(!json.exists());
        commit_all(staged).unwrap();

        assert_eq!(fs::read_to_string(&csv).unwrap(), "id,name\n");
        assert!(json.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_optional_identity_file_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = read_optional(&dir.path().join("absent.json")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Registry.as_str(), "registry");
        assert_eq!(Stage::Full.as_str(), "run");
    }
}
