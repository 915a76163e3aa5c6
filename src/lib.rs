// Legislator Merge - Core Library
// Exposes all modules for use in the CLI and tests

pub mod normalize;  // Name Normalizer
pub mod dates;
pub mod model;
pub mod committee;
pub mod sources;
pub mod report;     // Diagnostics instead of a shared log stream
pub mod error;
pub mod registry;   // Identity Registry Builder
pub mod linker;     // Cross-Source Linker & Merger
pub mod projector;  // Per-term code projection
pub mod config;
pub mod audit;      // SQLite run log
pub mod pipeline;

// Re-export commonly used types
pub use normalize::{normalize, normalize_all, NAME_SEPARATOR};
pub use model::{
    CanonicalLegislator, Committee, CommitteeEntry, Contact, Gender,
    Identity, IdentityId, IdentityRecord, MergedTermRecord, RawTermRecord,
    TermEnd, TermNumber,
};
pub use sources::{Source, SourceDataset};
pub use report::{
    CollectingReporter, Diagnostic, DiagnosticKind, Reporter, Severity, TracingReporter,
};
pub use error::{CoverageGap, GapReason, LinkError, LinkResult};
pub use registry::{build_registry, IdentityRegistry};
pub use linker::{check_coverage, link_and_merge, merge_term, SourceIndex};
pub use projector::{project_term, write_roster_csv, ConstituencyCode, ProjectedTerm};
pub use config::PipelineConfig;
pub use audit::{AuditLog, Event};
pub use pipeline::{run, RunSummary, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
