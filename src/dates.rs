// 📅 Date parsing for crawler output
//
// The two sources publish dates differently: ISO dates, compact
// YYYYMMDD strings, and ROC era dates ("104年1月20日", year + 1911).
// Everything is stored as a NaiveDate and written back out as ISO.

use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer};

/// Offset between the ROC calendar and the Gregorian year
pub const ROC_YEAR_OFFSET: i32 = 1911;

/// Parse a date in any of the formats the sources use
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let s = date_str.trim();

    // Try YYYY-MM-DD
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }

    // Try YYYYMMDD
    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y%m%d") {
            return Some(date);
        }
    }

    // Try YYYY/MM/DD
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return Some(date);
    }

    parse_roc_date(s)
}

/// Parse an ROC era date such as "104年1月20日"
pub fn parse_roc_date(date_str: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = date_str
        .trim()
        .split(['年', '月', '日'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.len() != 3 {
        return None;
    }

    let year: i32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let day: u32 = parts[2].parse().ok()?;

    NaiveDate::from_ymd_opt(year.checked_add(ROC_YEAR_OFFSET)?, month, day)
}

/// serde helper: optional date in any supported format
pub fn deserialize_opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("unrecognized date: {}", s))),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(parse_date("2015-01-20"), Some(ymd(2015, 1, 20)));
        assert_eq!(parse_date(" 2015-01-20 "), Some(ymd(2015, 1, 20)));
    }

    #[test]
    fn test_parse_compact_date() {
        assert_eq!(parse_date("20150120"), Some(ymd(2015, 1, 20)));
    }

    #[test]
    fn test_parse_slash_date() {
        assert_eq!(parse_date("2015/01/20"), Some(ymd(2015, 1, 20)));
    }

    #[test]
    fn test_parse_roc_date() {
        assert_eq!(parse_date("104年1月20日"), Some(ymd(2015, 1, 20)));
        assert_eq!(parse_roc_date("81年12月31日"), Some(ymd(1992, 12, 31)));
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("104年13月1日"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_roc_year_out_of_range() {
        assert_eq!(parse_roc_date("2147483647年1月1日"), None);
        assert_eq!(parse_date("99999999999年1月1日"), None);
    }

    #[test]
    fn test_deserialize_opt_date() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "deserialize_opt_date")]
            date: Option<NaiveDate>,
        }

        let h: Holder = serde_json::from_str(r#"{"date": "20150120"}"#).unwrap();
        assert_eq!(h.date, Some(ymd(2015, 1, 20)));

        let h: Holder = serde_json::from_str(r#"{"date": null}"#).unwrap();
        assert_eq!(h.date, None);

        let h: Holder = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(h.date, None);

        assert!(serde_json::from_str::<Holder>(r#"{"date": "garbage"}"#).is_err());
    }
}
