// 📣 Diagnostics - Structured events instead of a shared log stream
//
// Every component that can hit a recoverable data problem takes a
// `&mut dyn Reporter` and reports a `Diagnostic`. The CLI forwards them
// to tracing (and optionally the audit log); tests collect them.

use crate::model::{IdentityId, TermNumber};
use crate::sources::Source;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// DIAGNOSTIC KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A primary-source record has no identity (fatal, reported before abort)
    CoverageGap,

    /// More than one record matched an (identity, term) pair
    AmbiguousMatch,

    /// The secondary source has no record for a served term
    MissingSecondary,

    /// A served term is only attested outside the primary source
    TermWithoutPrimary,

    /// A committee fragment did not match the expected pattern
    MalformedCommitteeEntry,

    /// The same id appeared twice in the primary dataset
    DuplicateIdentity,

    /// An identity ended up with no usable name
    InvalidIdentity,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::CoverageGap => "coverage_gap",
            DiagnosticKind::AmbiguousMatch => "ambiguous_match",
            DiagnosticKind::MissingSecondary => "missing_secondary",
            DiagnosticKind::TermWithoutPrimary => "term_without_primary",
            DiagnosticKind::MalformedCommitteeEntry => "malformed_committee_entry",
            DiagnosticKind::DuplicateIdentity => "duplicate_identity",
            DiagnosticKind::InvalidIdentity => "invalid_identity",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::CoverageGap => Severity::Critical,
            DiagnosticKind::AmbiguousMatch
            | DiagnosticKind::MalformedCommitteeEntry
            | DiagnosticKind::DuplicateIdentity
            | DiagnosticKind::InvalidIdentity => Severity::Warning,
            DiagnosticKind::MissingSecondary | DiagnosticKind::TermWithoutPrimary => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // The run cannot produce trustworthy output
    Warning,  // Output produced, but a human should look at the data
    Info,     // Expected gaps in the sources
}

// ============================================================================
// DIAGNOSTIC
// ============================================================================

/// One reported data problem, with enough context to find it again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<IdentityId>,

    /// Identity name, or the raw record name when no identity is known
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<TermNumber>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, name: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            identity_id: None,
            name: name.to_string(),
            term: None,
            source: None,
            message: message.into(),
        }
    }

    pub fn with_identity(mut self, id: IdentityId) -> Self {
        self.identity_id = Some(id);
        self
    }

    pub fn with_term(mut self, term: TermNumber) -> Self {
        self.term = Some(term);
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(source) = self.source {
            write!(f, " {}", source.code())?;
        }
        if let Some(id) = self.identity_id {
            write!(f, " #{}", id)?;
        }
        write!(f, " {}", self.name)?;
        if let Some(term) = self.term {
            write!(f, " (term {})", term)?;
        }
        write!(f, ": {}", self.message)
    }
}

// ============================================================================
// REPORTERS
// ============================================================================

pub trait Reporter {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default)]
pub struct CollectingReporter {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind == kind).collect()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Logs through tracing and keeps a copy for the run summary
#[derive(Debug, Default)]
pub struct TracingReporter {
    inner: CollectingReporter,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.inner.diagnostics()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.inner.into_diagnostics()
    }
}

impl Reporter for TracingReporter {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.kind.severity() {
            Severity::Critical => tracing::error!(kind = %diagnostic.kind, "{}", diagnostic),
            Severity::Warning => tracing::warn!(kind = %diagnostic.kind, "{}", diagnostic),
            Severity::Info => tracing::debug!(kind = %diagnostic.kind, "{}", diagnostic),
        }
        self.inner.report(diagnostic);
    }
}

/// Count diagnostics per kind (for run summaries)
pub fn count_by_kind(diagnostics: &[Diagnostic]) -> BTreeMap<DiagnosticKind, usize> {
    let mut counts = BTreeMap::new();
    for d in diagnostics {
        *counts.entry(d.kind).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display_includes_context() {
        let d = Diagnostic::new(DiagnosticKind::AmbiguousMatch, "陳三", "2 candidates, using the first")
            .with_identity(42)
            .with_term(5)
            .with_source(Source::Ly);

        assert_eq!(
            d.to_string(),
            "[ambiguous_match] ly #42 陳三 (term 5): 2 candidates, using the first"
        );
    }

    #[test]
    fn test_collecting_reporter_filters_by_kind() {
        let mut reporter = CollectingReporter::new();
        reporter.report(Diagnostic::new(DiagnosticKind::MissingSecondary, "a", "x"));
        reporter.report(Diagnostic::new(DiagnosticKind::AmbiguousMatch, "b", "y"));
        reporter.report(Diagnostic::new(DiagnosticKind::MissingSecondary, "c", "z"));

        assert_eq!(reporter.diagnostics().len(), 3);
        assert_eq!(reporter.of_kind(DiagnosticKind::MissingSecondary).len(), 2);

        let counts = count_by_kind(reporter.diagnostics());
        assert_eq!(counts[&DiagnosticKind::MissingSecondary], 2);
        assert_eq!(counts[&DiagnosticKind::AmbiguousMatch], 1);
    }

    #[test]
    fn test_tracing_reporter_keeps_copy() {
        let mut reporter = TracingReporter::new();
        reporter.report(Diagnostic::new(DiagnosticKind::CoverageGap, "a", "x"));
        assert_eq!(reporter.diagnostics().len(), 1);
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(DiagnosticKind::CoverageGap.severity(), Severity::Critical);
        assert_eq!(DiagnosticKind::AmbiguousMatch.severity(), Severity::Warning);
        assert_eq!(DiagnosticKind::MissingSecondary.severity(), Severity::Info);
    }
}
