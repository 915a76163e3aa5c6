// ⚠️ Link Errors - The one fatal condition of a merge
//
// A primary-source record that does not resolve to exactly one identity
// stops the merge. Everything else is a `Diagnostic` (see `report`).

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::model::{IdentityId, TermNumber};

// ============================================================================
// COVERAGE GAPS
// ============================================================================

/// Why a primary record is not covered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GapReason {
    /// No identity carries this name for this term
    Unmatched,

    /// The record's override id is unknown or does not serve the term
    UnknownOverride(IdentityId),

    /// Several identities claim the record; it needs an override id
    Homonym(Vec<IdentityId>),
}

/// A primary-source record that does not resolve to exactly one identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageGap {
    pub name: String,
    pub term: TermNumber,
    pub term_start: Option<NaiveDate>,
    pub link: Option<String>,
    pub reason: GapReason,
}

impl fmt::Display for CoverageGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "term {} member {}", self.term, self.name)?;
        match &self.reason {
            GapReason::Unmatched => write!(f, " has no identity")?,
            GapReason::UnknownOverride(id) => {
                write!(f, " has override id {} which does not serve this term", id)?
            }
            GapReason::Homonym(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, " is claimed by identities {}", ids.join(", "))?
            }
        }
        if let Some(start) = self.term_start {
            write!(f, ", took office {}", start)?;
        }
        if let Some(link) = &self.link {
            write!(f, ", {}", link)?;
        }
        Ok(())
    }
}

// ============================================================================
// LINK ERROR
// ============================================================================

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{} primary record(s) do not resolve to exactly one identity; fix the registry inputs first", gaps.len())]
    Coverage { gaps: Vec<CoverageGap> },
}

impl LinkError {
    pub fn gaps(&self) -> &[CoverageGap] {
        match self {
            LinkError::Coverage { gaps } => gaps,
        }
    }
}

pub type LinkResult<T> = Result<T, LinkError>;

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn gap(reason: GapReason) -> CoverageGap {
        CoverageGap {
            name: "李小華".to_string(),
            term: 3,
            term_start: NaiveDate::from_ymd_opt(1996, 2, 1),
            link: Some("https://lis.ly.gov.tw/x".to_string()),
            reason,
        }
    }

    #[test]
    fn test_coverage_gap_display() {
        assert_eq!(
            gap(GapReason::Unmatched).to_string(),
            "term 3 member 李小華 has no identity, took office 1996-02-01, https://lis.ly.gov.tw/x"
        );
        assert!(gap(GapReason::Homonym(vec![1, 2]))
            .to_string()
            .contains("claimed by identities 1, 2"));
        assert!(gap(GapReason::UnknownOverride(9)).to_string().contains("override id 9"));
    }

    #[test]
    fn test_link_error_carries_gaps() {
        let err = LinkError::Coverage {
            gaps: vec![gap(GapReason::Unmatched)],
        };
        assert_eq!(err.gaps().len(), 1);
        assert!(err.to_string().starts_with("1 primary record(s)"));
    }
}
