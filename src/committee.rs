// 🏛️ Committee entries - "第3屆第2會期：內政委員會(召集委員)"
//
// Both crawlers describe committee membership with the same phrase; the
// LY site puts a full-width colon after the session. Fragments that do
// not match are dropped and reported, the rest of the record is kept.

use crate::model::{Committee, CommitteeEntry, RawTermRecord};
use crate::report::{Diagnostic, DiagnosticKind, Reporter};
use crate::sources::Source;
use regex::Regex;
use std::sync::OnceLock;

fn committee_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"第(\d{1,2})屆第(\d{1,2})會期[：:]?\s*([^\s()（）]+)\s*(\(召集委員\)|（召集委員）)?")
            .expect("committee pattern is valid")
    })
}

/// Parse one committee fragment
pub fn parse_committee(text: &str) -> Option<Committee> {
    let caps = committee_pattern().captures(text)?;

    Some(Committee {
        term_number: caps[1].parse().ok()?,
        session_number: caps[2].parse().ok()?,
        is_chair: caps.get(4).is_some(),
        name: caps[3].to_string(),
    })
}

/// Replace raw committee entries with parsed ones.
///
/// Returns the number of entries dropped.
pub fn sanitize_committees(
    record: &mut RawTermRecord,
    source: Source,
    reporter: &mut dyn Reporter,
) -> usize {
    let entries = std::mem::take(&mut record.committees);
    let mut dropped = 0;

    for entry in entries {
        let problem = match entry {
            CommitteeEntry::Parsed(committee) => {
                record.committees.push(CommitteeEntry::Parsed(committee));
                continue;
            }
            CommitteeEntry::Text(text) => match parse_committee(&text) {
                Some(committee) => {
                    record.committees.push(CommitteeEntry::Parsed(committee));
                    continue;
                }
                None => format!("unparseable committee entry {:?}", text),
            },
            CommitteeEntry::Missing => "empty committee entry".to_string(),
        };

        dropped += 1;
        reporter.report(
            Diagnostic::new(DiagnosticKind::MalformedCommitteeEntry, &record.name, problem)
                .with_term(record.term_number)
                .with_source(source),
        );
    }

    dropped
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingReporter;

    #[test]
    fn test_parse_npl_format() {
        let c = parse_committee("第3屆第2會期 內政委員會").unwrap();
        assert_eq!(c.term_number, 3);
        assert_eq!(c.session_number, 2);
        assert_eq!(c.name, "內政委員會");
        assert!(!c.is_chair);
    }

    #[test]
    fn test_parse_ly_format_with_chair() {
        let c = parse_committee("第9屆第1會期：外交及國防委員會 (召集委員)").unwrap();
        assert_eq!(c.term_number, 9);
        assert_eq!(c.session_number, 1);
        assert_eq!(c.name, "外交及國防委員會");
        assert!(c.is_chair);
    }

    #[test]
    fn test_parse_two_digit_numbers() {
        let c = parse_committee("第10屆第12會期：財政委員會(召集委員)").unwrap();
        assert_eq!(c.term_number, 10);
        assert_eq!(c.session_number, 12);
        assert!(c.is_chair);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_committee("內政委員會").is_none());
        assert!(parse_committee("").is_none());
    }

    #[test]
    fn test_sanitize_drops_and_reports_malformed() {
        let mut record = RawTermRecord::new("李小華", 3);
        record.committees = vec![
            CommitteeEntry::Parsed(Committee {
                term_number: 3,
                session_number: 1,
                is_chair: false,
                name: "內政委員會".to_string(),
            }),
            CommitteeEntry::Text("第3屆第2會期：教育委員會".to_string()),
            CommitteeEntry::Text("召集委員".to_string()),
            CommitteeEntry::Missing,
        ];

        let mut reporter = CollectingReporter::new();
        let dropped = sanitize_committees(&mut record, Source::Ly, &mut reporter);

        assert_eq!(dropped, 2);
        assert_eq!(record.committees.len(), 2);
        assert_eq!(record.parsed_committees().count(), 2);

        let reported = reporter.of_kind(DiagnosticKind::MalformedCommitteeEntry);
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0].term, Some(3));
        assert_eq!(reported[0].source, Some(Source::Ly));
        assert!(reported[0].message.contains("召集委員"));
    }
}
