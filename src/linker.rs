// 🔗 Cross-Source Linker & Merger
//
// For every (identity, term) pair in the registry:
// 1. find the matching record in the primary source (NPL)
// 2. find the matching record in the secondary source (LY)
// 3. enrich the primary record with the secondary one's end-of-term,
//    caucus, contact and link fields
//
// Matching is exact on normalized names. The only fatal condition is a
// primary record that does not resolve to exactly one identity; that is
// checked for the whole source before anything is merged.

use crate::error::{CoverageGap, GapReason, LinkError, LinkResult};
use crate::model::{CanonicalLegislator, Identity, IdentityId, MergedTermRecord, RawTermRecord, TermNumber};
use crate::normalize::normalize;
use crate::registry::IdentityRegistry;
use crate::report::{Diagnostic, DiagnosticKind, Reporter};
use crate::sources::{Source, SourceDataset};
use std::collections::HashMap;

// ============================================================================
// SOURCE INDEX
// ============================================================================

/// Lookup tables over one source, every list kept in source order
pub struct SourceIndex<'a> {
    dataset: &'a SourceDataset,

    /// (normalized name, term) → positions
    by_name: HashMap<(String, TermNumber), Vec<usize>>,

    /// (normalized alias, term) → positions
    by_alias: HashMap<(String, TermNumber), Vec<usize>>,

    /// (override id, term) → positions
    by_override: HashMap<(IdentityId, TermNumber), Vec<usize>>,
}

impl<'a> SourceIndex<'a> {
    pub fn new(dataset: &'a SourceDataset) -> Self {
        let mut by_name: HashMap<(String, TermNumber), Vec<usize>> = HashMap::new();
        let mut by_alias: HashMap<(String, TermNumber), Vec<usize>> = HashMap::new();
        let mut by_override: HashMap<(IdentityId, TermNumber), Vec<usize>> = HashMap::new();

        for (position, record) in dataset.records.iter().enumerate() {
            let term = record.term_number;

            by_name
                .entry((normalize(&record.name), term))
                .or_default()
                .push(position);

            let mut seen: Vec<String> = Vec::new();
            for alias in &record.aliases {
                let alias = normalize(alias);
                if alias.is_empty() || seen.contains(&alias) {
                    continue;
                }
                by_alias.entry((alias.clone(), term)).or_default().push(position);
                seen.push(alias);
            }

            if let Some(id) = record.identity_id_override {
                by_override.entry((id, term)).or_default().push(position);
            }
        }

        SourceIndex {
            dataset,
            by_name,
            by_alias,
            by_override,
        }
    }

    pub fn source(&self) -> Source {
        self.dataset.source
    }

    pub fn record(&self, position: usize) -> &'a RawTermRecord {
        &self.dataset.records[position]
    }

    /// Candidate positions for one identity in one term, in source order.
    ///
    /// - records tagged with this identity's id bypass name matching
    /// - otherwise: name ∈ identifiers, or more than one shared alias
    /// - records tagged with a different id are never candidates
    pub fn candidates(&self, identity: &Identity, term: TermNumber) -> Vec<usize> {
        if let Some(tagged) = self.by_override.get(&(identity.id, term)) {
            return tagged.clone();
        }

        let mut positions: Vec<usize> = Vec::new();

        for identifier in &identity.identifiers {
            if let Some(found) = self.by_name.get(&(identifier.clone(), term)) {
                positions.extend(found);
            }
        }

        let mut shared_aliases: HashMap<usize, usize> = HashMap::new();
        for alias in &identity.aliases {
            if let Some(found) = self.by_alias.get(&(alias.clone(), term)) {
                for &position in found {
                    *shared_aliases.entry(position).or_insert(0) += 1;
                }
            }
        }
        positions.extend(
            shared_aliases
                .into_iter()
                .filter(|&(_, shared)| shared > 1)
                .map(|(position, _)| position),
        );

        positions.retain(|&p| match self.record(p).identity_id_override {
            Some(id) => id == identity.id,
            None => true,
        });
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    /// The one record for (identity, term), or the first of several.
    ///
    /// Ambiguity is reported, never silently resolved: the first
    /// candidate in source order is used and the pipeline continues.
    pub fn find_match(
        &self,
        identity: &Identity,
        term: TermNumber,
        reporter: &mut dyn Reporter,
    ) -> Option<&'a RawTermRecord> {
        let candidates = self.candidates(identity, term);

        match candidates.as_slice() {
            [] => None,
            [only] => Some(self.record(*only)),
            [first, ..] => {
                reporter.report(
                    Diagnostic::new(
                        DiagnosticKind::AmbiguousMatch,
                        &identity.name,
                        format!(
                            "{} candidate records, using the first in source order",
                            candidates.len()
                        ),
                    )
                    .with_identity(identity.id)
                    .with_term(term)
                    .with_source(self.source()),
                );
                Some(self.record(*first))
            }
        }
    }
}

// ============================================================================
// COVERAGE CHECK
// ============================================================================

/// Every primary record must resolve to exactly one identity serving its term
pub fn check_coverage(registry: &IdentityRegistry, primary: &SourceDataset) -> Vec<CoverageGap> {
    let mut gaps = Vec::new();

    for record in &primary.records {
        let term = record.term_number;

        let reason = match record.identity_id_override {
            Some(id) => match registry.find_by_id(id) {
                Some(identity) if identity.serves(term) => None,
                _ => Some(GapReason::UnknownOverride(id)),
            },
            None => {
                let claimants: Vec<IdentityId> = registry
                    .find_by_identifier(&normalize(&record.name))
                    .into_iter()
                    .filter(|identity| identity.serves(term))
                    .map(|identity| identity.id)
                    .collect();

                match claimants.len() {
                    0 => Some(GapReason::Unmatched),
                    1 => None,
                    _ => Some(GapReason::Homonym(claimants)),
                }
            }
        };

        if let Some(reason) = reason {
            gaps.push(CoverageGap {
                name: record.name.clone(),
                term,
                term_start: record.term_start,
                link: record.link(primary.source.code()).map(str::to_string),
                reason,
            });
        }
    }

    gaps
}

// ============================================================================
// MERGE
// ============================================================================

/// Enrich a primary record with its secondary match.
///
/// The secondary source wins for its own link, `term_end`, `caucus` and
/// `contacts`, and only where it has a value. Every other field stays as
/// the primary source recorded it. Aliases from either record move up to
/// the legislator.
pub fn merge_term(
    primary: &RawTermRecord,
    secondary: Option<&RawTermRecord>,
    secondary_source: Source,
    legislator: &mut CanonicalLegislator,
) -> MergedTermRecord {
    let mut merged = primary.clone();

    if let Some(other) = secondary {
        let key = secondary_source.code();
        if let Some(link) = other.links.get(key) {
            merged.links.insert(key.to_string(), link.clone());
        }
        if other.term_end.is_some() {
            merged.term_end = other.term_end.clone();
        }
        if other.caucus.is_some() {
            merged.caucus = other.caucus.clone();
        }
        if other.contacts.is_some() {
            merged.contacts = other.contacts.clone();
        }
        for alias in &other.aliases {
            legislator.add_alias(alias);
        }
    }

    for alias in &merged.aliases {
        legislator.add_alias(alias);
    }
    merged.aliases.clear();

    merged
}

// ============================================================================
// LINK AND MERGE
// ============================================================================

/// Link both sources onto the registry and merge them per term.
///
/// Fails with `LinkError::Coverage` (and produces nothing) when any
/// primary record does not resolve to exactly one identity.
pub fn link_and_merge(
    registry: &IdentityRegistry,
    primary: &SourceDataset,
    secondary: &SourceDataset,
    reporter: &mut dyn Reporter,
) -> LinkResult<Vec<CanonicalLegislator>> {
    let gaps = check_coverage(registry, primary);
    if !gaps.is_empty() {
        for gap in &gaps {
            reporter.report(
                Diagnostic::new(DiagnosticKind::CoverageGap, &gap.name, gap.to_string())
                    .with_term(gap.term)
                    .with_source(primary.source),
            );
        }
        return Err(LinkError::Coverage { gaps });
    }

    let primary_index = SourceIndex::new(primary);
    let secondary_index = SourceIndex::new(secondary);

    let mut legislators = Vec::with_capacity(registry.count());

    for identity in registry.all() {
        let mut legislator = CanonicalLegislator::from_identity(identity);

        // terms_served is sorted, so merged terms come out in order
        for &term in &identity.terms_served {
            let Some(base) = primary_index.find_match(identity, term, reporter) else {
                reporter.report(
                    Diagnostic::new(
                        DiagnosticKind::TermWithoutPrimary,
                        &identity.name,
                        "no primary record for this term, term not materialized",
                    )
                    .with_identity(identity.id)
                    .with_term(term)
                    .with_source(primary.source),
                );
                continue;
            };

            let enrichment = secondary_index.find_match(identity, term, reporter);
            if enrichment.is_none() {
                reporter.report(
                    Diagnostic::new(
                        DiagnosticKind::MissingSecondary,
                        &identity.name,
                        "no secondary record, term kept without enrichment",
                    )
                    .with_identity(identity.id)
                    .with_term(term)
                    .with_source(secondary.source),
                );
            }

            let merged = merge_term(base, enrichment, secondary.source, &mut legislator);
            legislator.terms.push(merged);
        }

        legislators.push(legislator);
    }

    tracing::info!(
        legislators = legislators.len(),
        terms = legislators.iter().map(|l| l.terms.len()).sum::<usize>(),
        "sources linked and merged"
    );

    Ok(legislators)
}

// ============================================================================
// TESTS
// ============================================================================
