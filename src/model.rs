// 🧑‍⚖️ Data Model - Identities, raw term records, merged legislators
//
// "The uid is IDENTITY (never changes), names and terms are VALUES"
//
// Inputs come from two crawlers and from hand-curated files, so every
// struct here accepts the legacy key names those files use
// (uid, former_names, ads, ad, each_term, ...) while writing the
// canonical names back out.

use crate::dates;
use crate::normalize::{normalize, normalize_all};
use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Stable cross-source person identifier
pub type IdentityId = u32;

/// Ordinal number of a legislative term
pub type TermNumber = u32;

// ============================================================================
// GENDER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "男", alias = "male", alias = "M")]
    Male,

    #[serde(rename = "女", alias = "female", alias = "F")]
    Female,
}

// ============================================================================
// IDENTITY
// ============================================================================

/// Identity - one real person in the registry
///
/// `identifiers` is derived from `name` and `aliases` and is the only
/// key set used for linking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identity - NEVER changes, never reused
    #[serde(alias = "uid", deserialize_with = "de_id")]
    pub id: IdentityId,

    /// Current canonical name (normalized)
    pub name: String,

    /// Former / alternate names (normalized)
    #[serde(default, alias = "former_names", deserialize_with = "de_names")]
    pub aliases: Vec<String>,

    /// {name} ∪ aliases
    #[serde(default)]
    pub identifiers: Vec<String>,

    /// Sorted, deduplicated term numbers
    #[serde(default, alias = "ads")]
    pub terms_served: Vec<TermNumber>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

impl Identity {
    /// Build an identity from raw parts, normalizing every name
    pub fn new(
        id: IdentityId,
        name: &str,
        aliases: &[String],
        terms_served: &[TermNumber],
        gender: Option<Gender>,
    ) -> Self {
        let mut identity = Identity {
            id,
            name: normalize(name),
            aliases: normalize_all(aliases),
            identifiers: Vec::new(),
            terms_served: Vec::new(),
            gender,
        };
        identity.add_terms(terms_served);
        identity.refresh_identifiers();
        identity
    }

    /// Re-derive `identifiers` from `name` and `aliases`
    fn refresh_identifiers(&mut self) {
        let mut identifiers = Vec::new();
        if !self.name.is_empty() {
            identifiers.push(self.name.clone());
        }
        for alias in &self.aliases {
            if !alias.is_empty() && !identifiers.contains(alias) {
                identifiers.push(alias.clone());
            }
        }
        self.identifiers = identifiers;
    }

    /// Re-normalize a snapshot read back from disk
    pub fn renormalized(self) -> Self {
        Identity::new(self.id, &self.name, &self.aliases, &self.terms_served, self.gender)
    }

    /// Union term numbers in (never removes any)
    pub fn add_terms(&mut self, terms: &[TermNumber]) {
        self.terms_served.extend_from_slice(terms);
        self.terms_served.sort_unstable();
        self.terms_served.dedup();
    }

    pub fn serves(&self, term: TermNumber) -> bool {
        self.terms_served.binary_search(&term).is_ok()
    }

    /// A valid identity has at least one identifier
    pub fn is_valid(&self) -> bool {
        !self.identifiers.is_empty()
    }
}

/// IdentityRecord - hand-curated identity input (supplemental or patch)
///
/// Supplemental records carry a full identity; patches may carry only
/// `id` and `terms_served`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    #[serde(alias = "uid", deserialize_with = "de_id")]
    pub id: IdentityId,

    #[serde(default)]
    pub name: String,

    #[serde(default, alias = "former_names", deserialize_with = "de_names")]
    pub aliases: Vec<String>,

    #[serde(default, alias = "ads")]
    pub terms_served: Vec<TermNumber>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

impl IdentityRecord {
    pub fn to_identity(&self) -> Identity {
        Identity::new(self.id, &self.name, &self.aliases, &self.terms_served, self.gender)
    }
}

// ============================================================================
// RAW TERM RECORD
// ============================================================================

/// Committee membership during one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    #[serde(alias = "ad", deserialize_with = "de_number")]
    pub term_number: TermNumber,

    #[serde(alias = "session", deserialize_with = "de_number")]
    pub session_number: u32,

    #[serde(default, alias = "chair")]
    pub is_chair: bool,

    pub name: String,
}

/// Committee entry as it arrives from a crawler
///
/// Crawlers emit structured entries, but fragments they failed to parse
/// arrive as raw text or null. Sanitation turns everything into `Parsed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommitteeEntry {
    Parsed(Committee),
    Text(String),
    Missing,
}

/// How and when a term ended early (or simply its end date)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermEnd {
    pub date: NaiveDate,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Member who took over the seat
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl TermEnd {
    pub fn on(date: NaiveDate) -> Self {
        TermEnd {
            date,
            reason: None,
            replacement: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TermEndRepr {
    Bare(String),
    Detailed {
        date: String,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        replacement: Option<String>,
    },
}

impl<'de> Deserialize<'de> for TermEnd {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (date, reason, replacement) = match TermEndRepr::deserialize(deserializer)? {
            TermEndRepr::Bare(date) => (date, None, None),
            TermEndRepr::Detailed {
                date,
                reason,
                replacement,
            } => (date, reason, replacement),
        };
        let date = dates::parse_date(&date)
            .ok_or_else(|| de::Error::custom(format!("unrecognized term_end date: {}", date)))?;
        Ok(TermEnd {
            date,
            reason,
            replacement,
        })
    }
}

/// Office contact details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fax: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// RawTermRecord - one source's observation of one person in one term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTermRecord {
    // ========================================================================
    // MATCHING FIELDS
    // ========================================================================
    pub name: String,

    #[serde(
        default,
        alias = "former_names",
        deserialize_with = "de_names",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub aliases: Vec<String>,

    #[serde(alias = "ad", deserialize_with = "de_number")]
    pub term_number: TermNumber,

    /// Set only for the documented homonym case, short-circuits name matching
    #[serde(
        default,
        alias = "uid",
        deserialize_with = "de_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub identity_id_override: Option<IdentityId>,

    // ========================================================================
    // TERM FIELDS
    // ========================================================================
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elected_party: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caucus: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constituency: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub committees: Vec<CommitteeEntry>,

    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub term_start: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_end: Option<TermEnd>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<Contact>>,

    /// Source key ("npl", "ly") → profile URL
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,

    #[serde(default = "default_in_office")]
    pub in_office: bool,

    // ========================================================================
    // EXTENSIBLE METADATA (carried through untouched)
    // ========================================================================
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_in_office() -> bool {
    true
}

impl RawTermRecord {
    /// Create a record with only the matching fields set
    pub fn new(name: &str, term_number: TermNumber) -> Self {
        RawTermRecord {
            name: name.to_string(),
            aliases: Vec::new(),
            term_number,
            identity_id_override: None,
            gender: None,
            party: None,
            elected_party: None,
            caucus: None,
            constituency: None,
            committees: Vec::new(),
            term_start: None,
            term_end: None,
            contacts: None,
            links: BTreeMap::new(),
            in_office: true,
            extra: BTreeMap::new(),
        }
    }

    /// Parsed committees (entries still in raw form are skipped)
    pub fn parsed_committees(&self) -> impl Iterator<Item = &Committee> {
        self.committees.iter().filter_map(|c| match c {
            CommitteeEntry::Parsed(committee) => Some(committee),
            _ => None,
        })
    }

    /// Link for a given source key, used in diagnostics
    pub fn link(&self, key: &str) -> Option<&str> {
        self.links.get(key).map(String::as_str)
    }
}

/// MergedTermRecord - a primary record enriched by its secondary match
pub type MergedTermRecord = RawTermRecord;

// ============================================================================
// CANONICAL LEGISLATOR
// ============================================================================

/// CanonicalLegislator - one per identity, the merged output unit
///
/// This is also the schema of the registry builder's primary input, so
/// the pipeline can be re-run on its own output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalLegislator {
    #[serde(alias = "uid", deserialize_with = "de_id")]
    pub id: IdentityId,

    pub name: String,

    #[serde(default, alias = "former_names", deserialize_with = "de_names")]
    pub aliases: Vec<String>,

    #[serde(default, alias = "ads")]
    pub terms_served: Vec<TermNumber>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,

    /// Ordered by term number ascending
    #[serde(default, alias = "each_term")]
    pub terms: Vec<MergedTermRecord>,
}

impl CanonicalLegislator {
    /// Start an empty legislator from its identity
    pub fn from_identity(identity: &Identity) -> Self {
        CanonicalLegislator {
            id: identity.id,
            name: identity.name.clone(),
            aliases: identity.aliases.clone(),
            terms_served: identity.terms_served.clone(),
            gender: identity.gender,
            terms: Vec::new(),
        }
    }

    /// {name} ∪ aliases
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids = vec![self.name.clone()];
        for alias in &self.aliases {
            if !ids.contains(alias) {
                ids.push(alias.clone());
            }
        }
        ids
    }

    pub fn add_alias(&mut self, alias: &str) {
        let alias = normalize(alias);
        if !alias.is_empty() && alias != self.name && !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
    }

    /// The merged record for one term, if any
    pub fn term(&self, term: TermNumber) -> Option<&MergedTermRecord> {
        self.terms.iter().find(|t| t.term_number == term)
    }
}

// ============================================================================
// SERDE HELPERS
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberRepr {
    Int(u64),
    Text(String),
}

impl NumberRepr {
    fn into_u32<E: de::Error>(self) -> Result<u32, E> {
        match self {
            NumberRepr::Int(n) => u32::try_from(n)
                .map_err(|_| E::custom(format!("number out of range: {}", n))),
            NumberRepr::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("expected a number, got {:?}", s))),
        }
    }
}

/// Number or numeric string (the crawlers are not consistent)
fn de_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    NumberRepr::deserialize(deserializer)?.into_u32()
}

fn de_id<'de, D>(deserializer: D) -> Result<IdentityId, D::Error>
where
    D: Deserializer<'de>,
{
    de_number(deserializer)
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<IdentityId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberRepr>::deserialize(deserializer)? {
        Some(n) => n.into_u32().map(Some),
        None => Ok(None),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NamesRepr {
    One(String),
    Many(Vec<Option<String>>),
}

/// null, a single name, or a list of names; empty names are dropped
fn de_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = match Option::<NamesRepr>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(NamesRepr::One(name)) => vec![name],
        Some(NamesRepr::Many(names)) => names.into_iter().flatten().collect(),
    };
    Ok(names.into_iter().filter(|n| !n.trim().is_empty()).collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_new_normalizes_and_derives_identifiers() {
        let identity = Identity::new(
            7,
            " 李小華 ",
            &["".to_string(), "李曉華".to_string(), "李小華".to_string()],
            &[4, 3, 4],
            Some(Gender::Female),
        );

        assert_eq!(identity.name, "李小華");
        assert_eq!(identity.aliases, vec!["李曉華", "李小華"]);
        assert_eq!(identity.identifiers, vec!["李小華", "李曉華"]);
        assert_eq!(identity.terms_served, vec![3, 4]);
        assert!(identity.serves(3));
        assert!(!identity.serves(5));
        assert!(identity.is_valid());
    }

    #[test]
    fn test_identity_add_terms_never_removes() {
        let mut identity = Identity::new(1, "王大明", &[], &[1, 5], None);
        identity.add_terms(&[3]);
        identity.add_terms(&[]);
        assert_eq!(identity.terms_served, vec![1, 3, 5]);
    }

    #[test]
    fn test_identity_reads_legacy_keys() {
        let json = r#"{"uid": "413", "name": "陳錦濤", "former_names": ["陳錦濤", null, ""], "ads": [1], "gender": "男"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();

        assert_eq!(identity.id, 413);
        assert_eq!(identity.aliases, vec!["陳錦濤"]);
        assert_eq!(identity.terms_served, vec![1]);
        assert_eq!(identity.gender, Some(Gender::Male));
    }

    #[test]
    fn test_identity_record_single_former_name() {
        let json = r#"{"uid": 2001, "name": "張三", "former_names": "張叄", "ads": [2]}"#;
        let record: IdentityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.aliases, vec!["張叄"]);

        let identity = record.to_identity();
        assert_eq!(identity.identifiers, vec!["張三", "張叄"]);
    }

    #[test]
    fn test_raw_record_from_crawler_json() {
        let json = r#"{
            "in_office": false,
            "links": {"ly": "https://www.ly.gov.tw/x"},
            "name": "李小華",
            "english_name": "Li Hsiao-hua",
            "ad": 3,
            "gender": "女",
            "party": "中國國民黨",
            "committees": [
                {"ad": "3", "session": "1", "chair": true, "name": "內政委員會"},
                "第3屆第2會期：外交及國防委員會",
                null
            ],
            "term_start": "85年2月1日",
            "term_end": {"reason": "辭職", "date": "2015-01-20", "replacement": "王五"},
            "contacts": [{"name": "國會研究室", "phone": "02-1234"}]
        }"#;
        let record: RawTermRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.term_number, 3);
        assert!(!record.in_office);
        assert_eq!(record.committees.len(), 3);
        assert_eq!(record.parsed_committees().count(), 1);
        assert_eq!(record.committees[2], CommitteeEntry::Missing);
        assert_eq!(record.term_start, NaiveDate::from_ymd_opt(1996, 2, 1));
        let end = record.term_end.as_ref().unwrap();
        assert_eq!(end.date, NaiveDate::from_ymd_opt(2015, 1, 20).unwrap());
        assert_eq!(end.replacement.as_deref(), Some("王五"));
        assert_eq!(record.link("ly"), Some("https://www.ly.gov.tw/x"));
        assert_eq!(
            record.extra.get("english_name"),
            Some(&serde_json::json!("Li Hsiao-hua"))
        );
    }

    #[test]
    fn test_raw_record_bare_term_end_and_override() {
        let json = r#"{"name": "陳錦濤", "ad": 1, "uid": 1768, "term_end": "19911231"}"#;
        let record: RawTermRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.identity_id_override, Some(1768));
        assert_eq!(
            record.term_end,
            Some(TermEnd::on(NaiveDate::from_ymd_opt(1991, 12, 31).unwrap()))
        );
        assert!(record.in_office);
    }

    #[test]
    fn test_raw_record_serializes_canonical_keys() {
        let mut record = RawTermRecord::new("李小華", 3);
        record.extra.insert("title".to_string(), serde_json::json!("立法委員"));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["term_number"], 3);
        assert_eq!(value["title"], "立法委員");
        assert!(value.get("aliases").is_none());
        assert!(value.get("term_end").is_none());
    }

    #[test]
    fn test_canonical_legislator_legacy_roundtrip_keys() {
        let json = r#"{"uid": 7, "name": "李小華", "former_names": [], "ads": [3],
                       "each_term": [{"name": "李小華", "ad": 3, "gender": "女"}]}"#;
        let legislator: CanonicalLegislator = serde_json::from_str(json).unwrap();

        assert_eq!(legislator.id, 7);
        assert_eq!(legislator.terms.len(), 1);
        assert!(legislator.term(3).is_some());
        assert!(legislator.term(4).is_none());
        assert_eq!(legislator.identifiers(), vec!["李小華"]);
    }
}
