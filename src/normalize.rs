// 🔤 Name Normalizer - One matching key per display name
//
// Both crawlers scrape names with different punctuation, spacing and
// transliteration placement. "王小明 John", "John 王小明" and
// "王小明（John）" must all compare equal, so every name goes through
// `normalize` before it is stored or matched.

use regex::Regex;
use std::sync::OnceLock;

/// Canonical separator used inside compound names (U+2027 HYPHENATION POINT)
pub const NAME_SEPARATOR: char = '‧';

/// Punctuation marks that the sources use interchangeably as separators
const SEPARATOR_MARKS: [char; 7] = ['。', '˙', '・', '･', '•', '．', '.'];

/// Parenthesis characters, ASCII and full-width
const PARENTHESES: [char; 4] = ['(', ')', '（', '）'];

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

fn latin_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z]+(?:[‧ ][A-Za-z]+)*").expect("latin run pattern is valid")
    })
}

/// Normalize a raw display name into its matching key.
///
/// Total, deterministic and idempotent. Steps:
/// 1. trim (full-width space included)
/// 2. fold separator marks into `‧`
/// 3. drop parenthesis characters, keeping the enclosed text
/// 4. collapse whitespace runs into one ASCII space
/// 5. move the Latin runs (a transliteration) to the end, in order
///
/// Example:
/// ```
/// use legislator_merge::normalize;
///
/// assert_eq!(normalize("John 王小明"), "王小明 John");
/// assert_eq!(normalize("王小明（John）"), "王小明 John");
/// ```
pub fn normalize(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .chars()
        .filter(|c| !PARENTHESES.contains(c))
        .map(|c| if SEPARATOR_MARKS.contains(&c) { NAME_SEPARATOR } else { c })
        .collect();

    let collapsed = collapse(&folded);

    let runs: Vec<&str> = latin_run().find_iter(&collapsed).map(|m| m.as_str()).collect();
    if runs.is_empty() {
        return collapsed;
    }

    // Separators left dangling by a removed run go with it
    let rest = collapse(&latin_run().replace_all(&collapsed, " "));
    let rest = rest.trim_matches(|c: char| c == ' ' || c == NAME_SEPARATOR);
    let latin = runs.join(" ");

    if rest.is_empty() {
        latin
    } else {
        format!("{} {}", rest, latin)
    }
}

/// Collapse whitespace runs to a single space and trim the ends
fn collapse(s: &str) -> String {
    whitespace_run().replace_all(s, " ").trim().to_string()
}

/// Normalize every name, dropping the ones that normalize to nothing
pub fn normalize_all<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let n = normalize(name);
        if !n.is_empty() && !out.contains(&n) {
            out.push(n);
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
