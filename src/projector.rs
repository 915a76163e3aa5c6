// 🗳️ Term Projector - One term's roster in code form
//
// Downstream consumers want one flat list per term with parties and
// constituencies as codes instead of free text:
// - party names → short party codes (KMT, DPP, ...)
// - constituency → [ISO-3166-2:TW city code, district number] or a
//   category (aborigine / proportional / foreign)

use crate::model::{CanonicalLegislator, IdentityId, MergedTermRecord, TermNumber};
use anyhow::{Context, Result};
use md5::{Digest, Md5};
use regex::Regex;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::io::Write;
use std::sync::OnceLock;

// ============================================================================
// PARTY CODES
// ============================================================================

/// Short code for a party name; independents and unknown parties have none
pub fn party_code(party: &str) -> Option<&'static str> {
    let code = match party.trim() {
        "中國國民黨" => "KMT",
        "民主進步黨" => "DPP",
        "台灣團結聯盟" => "TSU",
        "無黨團結聯盟" => "NSU",
        "親民黨" => "PFP",
        "新黨" => "NP",
        "建國黨" => "TIP",
        "超黨派問政聯盟" => "CPU",
        "民主聯盟" => "DU",
        "時代力量" => "NPP",
        "民國黨" => "MKT",
        "台灣基進" => "TSP",
        "台灣民眾黨" => "TPP",
        _ => return None,
    };
    Some(code)
}

// ============================================================================
// CITY CODES (ISO-3166-2:TW)
// ============================================================================

pub fn city_code(city: &str) -> Option<&'static str> {
    let city = city.trim().replace('台', "臺");

    let code = match city.as_str() {
        "新北市" => "NWT",
        "臺北市" => "TPE",
        "臺中市" => "TXG",
        "臺南市" => "TNN",
        "高雄市" => "KHH",
        "基隆市" => "KEE",
        "新竹市" => "HSZ",
        "嘉義市" => "CYI",
        "桃園縣" | "桃園市" => "TAO",
        "新竹縣" => "HSQ",
        "苗栗縣" => "MIA",
        "彰化縣" => "CHA",
        "南投縣" => "NAN",
        "雲林縣" => "YUN",
        "嘉義縣" => "CYQ",
        "屏東縣" => "PIF",
        "宜蘭縣" => "ILA",
        "花蓮縣" => "HUA",
        "臺東縣" => "TTT",
        "澎湖縣" => "PEN",
        // Pre-2010 counties, merged into special municipalities since
        "高雄縣" => "KHQ",
        "臺南縣" => "TNQ",
        "臺北縣" => "TPQ",
        "臺中縣" => "TXQ",
        "金門縣" => "KIN",
        "連江縣" => "LIE",
        _ => return None,
    };
    Some(code)
}

/// "12", "三", "十二", "二十", "二十三" → number (hundreds are not used)
pub fn zh_num_to_u32(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse().ok();
    }

    let digit = |c: char| "零一二三四五六七八九".chars().position(|d| d == c).map(|p| p as u32);

    match text.split_once('十') {
        None => {
            let mut value: u32 = 0;
            for c in text.chars() {
                value = value.checked_mul(10)?.checked_add(digit(c)?)?;
            }
            Some(value)
        }
        Some((tens, ones)) => {
            let tens = match tens {
                "" => 1,
                t if t.chars().count() == 1 => digit(t.chars().next()?)?,
                _ => return None,
            };
            let ones = match ones {
                "" => 0,
                o if o.chars().count() == 1 => digit(o.chars().next()?)?,
                _ => return None,
            };
            Some(tens * 10 + ones)
        }
    }
}

// ============================================================================
// CONSTITUENCY CODES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AborigineSeat {
    Lowland,
    Highland,
}

/// Coded constituency, serialized as a short array:
/// `["TPE", 3]`, `["aborigine", "lowland"]`, `["proportional"]`, `["foreign"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstituencyCode {
    /// Area 0 means the whole city or county; `city` is None when unknown
    District { city: Option<&'static str>, area: u32 },
    Aborigine(AborigineSeat),
    Proportional,
    Foreign,
}

impl Serialize for ConstituencyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConstituencyCode::District { city, area } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(city)?;
                seq.serialize_element(area)?;
                seq.end()
            }
            ConstituencyCode::Aborigine(seat) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element("aborigine")?;
                seq.serialize_element(match seat {
                    AborigineSeat::Lowland => "lowland",
                    AborigineSeat::Highland => "highland",
                })?;
                seq.end()
            }
            ConstituencyCode::Proportional => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element("proportional")?;
                seq.end()
            }
            ConstituencyCode::Foreign => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element("foreign")?;
                seq.end()
            }
        }
    }
}

fn district_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(.*[市縣])(?:第(\S+))?選舉區").expect("district pattern is valid")
    })
}

/// Parse constituency text such as "臺北市第三選舉區" or "全國不分區"
pub fn parse_constituency(text: &str) -> Option<ConstituencyCode> {
    let text = text.replace("(增額)", "").replace("（增額）", "");
    let text = text.trim();

    if text.ends_with('市') || text.ends_with('縣') {
        return Some(ConstituencyCode::District {
            city: city_code(text),
            area: 0,
        });
    }

    if let Some(caps) = district_pattern().captures(text) {
        let area = match caps.get(2) {
            Some(area) => zh_num_to_u32(area.as_str())?,
            None => 0,
        };
        return Some(ConstituencyCode::District {
            city: city_code(&caps[1]),
            area,
        });
    }

    match text {
        "平地原住民" => Some(ConstituencyCode::Aborigine(AborigineSeat::Lowland)),
        "山地原住民" => Some(ConstituencyCode::Aborigine(AborigineSeat::Highland)),
        "全國不分區" => Some(ConstituencyCode::Proportional),
        t if t.contains("僑居國外國民") || t.contains("僑選") => Some(ConstituencyCode::Foreign),
        _ => None,
    }
}

// ============================================================================
// PROJECTION
// ============================================================================

/// One legislator's record for one term, with identity fields attached
#[derive(Debug, Clone, Serialize)]
pub struct ProjectedTerm {
    pub id: IdentityId,
    pub identifiers: Vec<String>,
    pub terms_served: Vec<TermNumber>,
    pub aliases: Vec<String>,

    /// The merged record with party fields recoded; its free-text
    /// constituency is replaced by `constituency` below
    #[serde(flatten)]
    pub record: MergedTermRecord,

    pub constituency: Option<ConstituencyCode>,

    /// Stable per-person key for avatar lookups
    pub avatar_key: String,
    pub avatar: String,
}

/// Avatar service prefix; the key is appended as the last path segment
pub const AVATAR_BASE_URL: &str = "http://avatars.io/50a65bb26e293122b0000073/";

/// MD5 hex of "MLY/<name>"
pub fn avatar_key(name: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!("MLY/{}", name));
    format!("{:x}", hasher.finalize())
}

fn recode_party(party: &mut Option<String>) {
    *party = party
        .as_deref()
        .and_then(party_code)
        .map(str::to_string);
}

/// Every legislator who has a merged record for `term`, in input order
pub fn project_term(legislators: &[CanonicalLegislator], term: TermNumber) -> Vec<ProjectedTerm> {
    let mut projected = Vec::new();

    for legislator in legislators {
        for merged in legislator.terms.iter().filter(|t| t.term_number == term) {
            let mut record = merged.clone();
            recode_party(&mut record.party);
            recode_party(&mut record.elected_party);
            recode_party(&mut record.caucus);

            let constituency = record
                .constituency
                .take()
                .and_then(|text| parse_constituency(&text));
            let key = avatar_key(&legislator.name);

            projected.push(ProjectedTerm {
                id: legislator.id,
                identifiers: legislator.identifiers(),
                terms_served: legislator.terms_served.clone(),
                aliases: legislator.aliases.clone(),
                record,
                constituency,
                avatar: format!("{}{}", AVATAR_BASE_URL, key),
                avatar_key: key,
            });
        }
    }

    projected
}

/// Write `id,name` rows for a projected term
pub fn write_roster_csv<W: Write>(projected: &[ProjectedTerm], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(["id", "name"])
        .context("Failed to write roster header")?;
    for term in projected {
        wtr.write_record([term.id.to_string(), term.record.name.clone()])
            .context("Failed to write roster row")?;
    }
    wtr.flush().context("Failed to flush roster")?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
