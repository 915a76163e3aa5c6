// 🪪 Identity Registry - Stable ids for every legislator
//
// "The uid is IDENTITY, the name is a VALUE"
//
// Built once per run from three inputs, in this order:
// 1. primary: the previous merged dataset (each person already has an id
//    and a list of per-term observations)
// 2. supplemental: hand-assigned ids for people the primary missed
// 3. patches: hand corrections of term coverage, or whole new identities
//
// The builder never fails. A registry that is missing someone shows up
// later as a coverage gap in the linker.

use crate::model::{CanonicalLegislator, Identity, IdentityId, IdentityRecord, TermNumber};
use crate::report::{Diagnostic, DiagnosticKind, Reporter};
use crate::sources::read_json;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

// ============================================================================
// IDENTITY REGISTRY
// ============================================================================

/// Registry of all known identities, in insertion order
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    identities: Vec<Identity>,

    /// id → position
    by_id: HashMap<IdentityId, usize>,

    /// identifier → positions (a name can belong to several people)
    by_identifier: HashMap<String, Vec<usize>>,
}

impl IdentityRegistry {
    /// Create new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of identities; later duplicates of an id are skipped
    pub fn from_identities(identities: Vec<Identity>) -> Self {
        let mut registry = IdentityRegistry::new();
        for identity in identities {
            registry.register(identity);
        }
        registry
    }

    /// Load a registry snapshot written by a previous run
    pub fn from_snapshot_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let identities: Vec<Identity> = read_json(path.as_ref())
            .with_context(|| format!("Failed to load registry snapshot: {:?}", path.as_ref()))?;

        Ok(IdentityRegistry::from_identities(
            identities.into_iter().map(Identity::renormalized).collect(),
        ))
    }

    /// Register a new identity (append-only). Returns false if the id is taken.
    pub fn register(&mut self, identity: Identity) -> bool {
        if self.by_id.contains_key(&identity.id) {
            return false;
        }

        let position = self.identities.len();
        self.by_id.insert(identity.id, position);
        for identifier in &identity.identifiers {
            self.by_identifier
                .entry(identifier.clone())
                .or_default()
                .push(position);
        }
        self.identities.push(identity);
        true
    }

    /// Find identity by id
    pub fn find_by_id(&self, id: IdentityId) -> Option<&Identity> {
        self.by_id.get(&id).map(|&i| &self.identities[i])
    }

    /// Union extra terms into an existing identity
    pub fn add_terms(&mut self, id: IdentityId, terms: &[TermNumber]) -> bool {
        match self.by_id.get(&id) {
            Some(&i) => {
                self.identities[i].add_terms(terms);
                true
            }
            None => false,
        }
    }

    /// Every identity a (normalized) name refers to, in registry order
    pub fn find_by_identifier(&self, normalized_name: &str) -> Vec<&Identity> {
        self.by_identifier
            .get(normalized_name)
            .map(|positions| positions.iter().map(|&i| &self.identities[i]).collect())
            .unwrap_or_default()
    }

    /// All identities, in registry order
    pub fn all(&self) -> &[Identity] {
        &self.identities
    }

    pub fn count(&self) -> usize {
        self.identities.len()
    }

    pub fn into_identities(self) -> Vec<Identity> {
        self.identities
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Build the canonical registry from primary, supplemental and patch inputs.
///
/// Output order: primary identities, then new supplemental identities,
/// then new patch identities, each in input order.
pub fn build_registry(
    primary: &[CanonicalLegislator],
    supplemental: &[IdentityRecord],
    patches: &[IdentityRecord],
    reporter: &mut dyn Reporter,
) -> IdentityRegistry {
    let mut registry = IdentityRegistry::new();

    // 1. Primary - terms and gender come from the per-term observations
    for person in primary {
        let identity = identity_from_legislator(person);

        if registry.find_by_id(identity.id).is_some() {
            reporter.report(
                Diagnostic::new(
                    DiagnosticKind::DuplicateIdentity,
                    &identity.name,
                    "id appears twice in the primary dataset; terms folded into the first",
                )
                .with_identity(identity.id),
            );
            registry.add_terms(identity.id, &identity.terms_served);
            continue;
        }

        register_checked(&mut registry, identity, "primary", reporter);
    }

    // 2. Supplemental - only ids the primary did not assign
    for record in supplemental {
        if registry.find_by_id(record.id).is_none() {
            register_checked(&mut registry, record.to_identity(), "supplemental", reporter);
        }
    }

    // 3. Patches - widen term coverage, or add whole identities
    for patch in patches {
        if !registry.add_terms(patch.id, &patch.terms_served) {
            register_checked(&mut registry, patch.to_identity(), "patch", reporter);
        }
    }

    tracing::info!(identities = registry.count(), "identity registry built");
    registry
}

fn identity_from_legislator(person: &CanonicalLegislator) -> Identity {
    let mut terms: Vec<TermNumber> = person.terms.iter().map(|t| t.term_number).collect();
    if terms.is_empty() {
        terms = person.terms_served.clone();
    }

    let gender = person
        .terms
        .iter()
        .rev()
        .find_map(|t| t.gender)
        .or(person.gender);

    Identity::new(person.id, &person.name, &person.aliases, &terms, gender)
}

fn register_checked(
    registry: &mut IdentityRegistry,
    identity: Identity,
    origin: &str,
    reporter: &mut dyn Reporter,
) {
    if !identity.is_valid() {
        reporter.report(
            Diagnostic::new(
                DiagnosticKind::InvalidIdentity,
                &identity.name,
                format!("{} identity has no usable name and can never be matched", origin),
            )
            .with_identity(identity.id),
        );
    }
    registry.register(identity);
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gender, RawTermRecord};
    use crate::report::CollectingReporter;
    use std::collections::HashSet;

    fn legislator(id: IdentityId, name: &str, aliases: &[&str], terms: &[TermNumber]) -> CanonicalLegislator {
        CanonicalLegislator {
            id,
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            terms_served: Vec::new(),
            gender: None,
            terms: terms.iter().map(|&t| RawTermRecord::new(name, t)).collect(),
        }
    }

    fn record(id: IdentityId, name: &str, terms: &[TermNumber]) -> IdentityRecord {
        IdentityRecord {
            id,
            name: name.to_string(),
            aliases: Vec::new(),
            terms_served: terms.to_vec(),
            gender: None,
        }
    }

    #[test]
    fn test_primary_fold_derives_terms_and_identifiers() {
        let primary = vec![legislator(7, "李小華 ", &["李曉華", ""], &[4, 3])];
        let mut reporter = CollectingReporter::new();

        let registry = build_registry(&primary, &[], &[], &mut reporter);

        let identity = registry.find_by_id(7).unwrap();
        assert_eq!(identity.name, "李小華");
        assert_eq!(identity.aliases, vec!["李曉華"]);
        assert_eq!(identity.identifiers, vec!["李小華", "李曉華"]);
        assert_eq!(identity.terms_served, vec![3, 4]);
        assert!(reporter.diagnostics().is_empty());
    }

    #[test]
    fn test_primary_gender_from_last_observation() {
        let mut person = legislator(1, "王大明", &[], &[1, 2]);
        person.terms[0].gender = Some(Gender::Female);
        person.terms[1].gender = Some(Gender::Male);

        let registry = build_registry(&[person], &[], &[], &mut CollectingReporter::new());
        assert_eq!(registry.find_by_id(1).unwrap().gender, Some(Gender::Male));
    }

    #[test]
    fn test_primary_without_observations_uses_terms_served() {
        let mut person = legislator(1, "王大明", &[], &[]);
        person.terms_served = vec![2, 1];

        let registry = build_registry(&[person], &[], &[], &mut CollectingReporter::new());
        assert_eq!(registry.find_by_id(1).unwrap().terms_served, vec![1, 2]);
    }

    #[test]
    fn test_supplemental_only_adds_missing_ids() {
        let primary = vec![legislator(1, "王大明", &[], &[1])];
        let supplemental = vec![record(1, "王小明", &[9]), record(2, "張三", &[2])];

        let registry = build_registry(&primary, &supplemental, &[], &mut CollectingReporter::new());

        assert_eq!(registry.count(), 2);
        // Primary wins
        assert_eq!(registry.find_by_id(1).unwrap().name, "王大明");
        assert_eq!(registry.find_by_id(1).unwrap().terms_served, vec![1]);
        assert_eq!(registry.find_by_id(2).unwrap().terms_served, vec![2]);
    }

    #[test]
    fn test_patch_unions_terms_never_removes() {
        let primary = vec![legislator(1, "王大明", &[], &[1, 5])];
        let patches = vec![record(1, "", &[3, 1])];

        let registry = build_registry(&primary, &[], &patches, &mut CollectingReporter::new());

        let identity = registry.find_by_id(1).unwrap();
        assert_eq!(identity.terms_served, vec![1, 3, 5]);
        // Name untouched by a terms-only patch
        assert_eq!(identity.name, "王大明");
    }

    #[test]
    fn test_patch_appends_unknown_identity() {
        let primary = vec![legislator(1, "王大明", &[], &[1])];
        let patches = vec![record(3000, "趙六", &[8])];

        let registry = build_registry(&primary, &[], &patches, &mut CollectingReporter::new());

        assert_eq!(registry.count(), 2);
        assert_eq!(registry.all()[1].id, 3000);
        assert!(registry.find_by_identifier("趙六").iter().any(|i| i.serves(8)));
    }

    #[test]
    fn test_output_order() {
        let primary = vec![legislator(5, "甲", &[], &[1]), legislator(2, "乙", &[], &[1])];
        let supplemental = vec![record(9, "丙", &[1]), record(5, "甲", &[1])];
        let patches = vec![record(4, "丁", &[1])];

        let registry = build_registry(&primary, &supplemental, &patches, &mut CollectingReporter::new());
        let ids: Vec<IdentityId> = registry.all().iter().map(|i| i.id).collect();

        assert_eq!(ids, vec![5, 2, 9, 4]);
    }

    #[test]
    fn test_ids_unique_with_duplicate_primary() {
        let primary = vec![
            legislator(1, "王大明", &[], &[1]),
            legislator(1, "王大明", &[], &[2]),
            legislator(2, "張三", &[], &[1]),
        ];
        let mut reporter = CollectingReporter::new();

        let registry = build_registry(&primary, &[record(2, "張三", &[])], &[record(1, "", &[])], &mut reporter);

        let ids: HashSet<IdentityId> = registry.all().iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), registry.count());
        assert_eq!(registry.find_by_id(1).unwrap().terms_served, vec![1, 2]);
        assert_eq!(reporter.of_kind(DiagnosticKind::DuplicateIdentity).len(), 1);
    }

    #[test]
    fn test_invalid_identity_reported() {
        let patches = vec![record(10, "", &[1])];
        let mut reporter = CollectingReporter::new();

        let registry = build_registry(&[], &[], &patches, &mut reporter);

        assert_eq!(registry.count(), 1);
        assert_eq!(reporter.of_kind(DiagnosticKind::InvalidIdentity).len(), 1);
    }

    #[test]
    fn test_find_by_identifier_keeps_homonyms_apart() {
        let registry = IdentityRegistry::from_identities(vec![
            Identity::new(413, "陳錦濤", &[], &[1], None),
            Identity::new(1768, "陳錦濤", &[], &[1], None),
            Identity::new(20, "林一", &["林壹".to_string()], &[2, 3], None),
        ]);

        assert_eq!(registry.find_by_identifier("陳錦濤").len(), 2);
        let ids: Vec<IdentityId> = registry.find_by_identifier("陳錦濤").iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![413, 1768]);
        assert_eq!(registry.find_by_identifier("林壹")[0].id, 20);
        assert!(registry.find_by_identifier("無名").is_empty());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legislators_uid.json");
        let identities = vec![Identity::new(7, "李小華", &["李曉華".to_string()], &[3, 4], Some(Gender::Female))];
        std::fs::write(&path, serde_json::to_string_pretty(&identities).unwrap()).unwrap();

        let registry = IdentityRegistry::from_snapshot_file(&path).unwrap();

        assert_eq!(registry.all(), identities.as_slice());
    }

    #[test]
    fn test_snapshot_roundtrip_split_transliteration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legislators_uid.json");
        let identities = vec![Identity::new(12, "Walis 瓦歷斯‧Perin", &["A 王‧B".to_string()], &[5], None)];
        std::fs::write(&path, serde_json::to_string_pretty(&identities).unwrap()).unwrap();

        let registry = IdentityRegistry::from_snapshot_file(&path).unwrap();

        assert_eq!(registry.all(), identities.as_slice());
        // A source record sanitized once still finds the reloaded identity
        let key = crate::normalize::normalize("Walis 瓦歷斯‧Perin");
        assert_eq!(registry.find_by_identifier(&key).len(), 1);
        assert_eq!(registry.find_by_identifier(&crate::normalize::normalize("A 王‧B")).len(), 1);
    }
}
