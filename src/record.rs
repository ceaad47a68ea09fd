//! The canonical publication record every source is normalized into.

use crate::sanitize::{self, MAX_ABSTRACT_LEN, MAX_AUTHORS_LEN, MAX_SOURCE_LEN, MAX_TITLE_LEN, MAX_VENUE_LEN};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Closed set of publication types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublicationType {
    Journal,
    Conference,
    Book,
    Report,
    WorkingPaper,
}

impl PublicationType {
    pub const ALL: [PublicationType; 5] = [
        PublicationType::Journal,
        PublicationType::Conference,
        PublicationType::Book,
        PublicationType::Report,
        PublicationType::WorkingPaper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationType::Journal => "journal",
            PublicationType::Conference => "conference",
            PublicationType::Book => "book",
            PublicationType::Report => "report",
            PublicationType::WorkingPaper => "working-paper",
        }
    }

    /// Fixed contribution to the relevance score.
    pub fn score_weight(&self) -> f64 {
        match self {
            PublicationType::Journal => 20.0,
            PublicationType::Report => 18.0,
            PublicationType::Book => 16.0,
            PublicationType::Conference => 15.0,
            PublicationType::WorkingPaper => 12.0,
        }
    }
}

impl fmt::Display for PublicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublicationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown publication type: {}", s))
    }
}

/// A single publication entry.
///
/// Deserialization is lenient: a malformed field degrades to its empty value
/// instead of rejecting the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Empty for records submitted without one; the collection assigns it.
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub authors: String,
    #[serde(default, deserialize_with = "lenient::year")]
    pub year: Option<i32>,
    #[serde(default, rename = "abstract", deserialize_with = "lenient::opt_string")]
    pub abstract_text: Option<String>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub citations: u64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub doi: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub venue: Option<String>,
    /// `None` for records without a recognized type; scored as unknown.
    #[serde(default, rename = "type", deserialize_with = "lenient::pub_type")]
    pub pub_type: Option<PublicationType>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub source: String,
    #[serde(default = "Utc::now", deserialize_with = "lenient::timestamp")]
    pub added_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::categories")]
    pub categories: BTreeSet<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_gray_lit: Option<bool>,
    #[serde(default, deserialize_with = "lenient::score")]
    pub relevance_score: u8,
}

/// Raw, unsanitized fields a normalizer has pulled out of a payload.
#[derive(Debug, Clone, Default)]
pub struct RecordDraft {
    pub id: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub abstract_text: Option<String>,
    pub citations: i64,
    pub url: Option<String>,
    pub doi: Option<String>,
    pub venue: Option<String>,
    pub pub_type: Option<PublicationType>,
    pub source: String,
}

impl RecordDraft {
    /// Apply the shared sanitization rules. Returns `None` when no usable
    /// title survives.
    pub fn into_record(self) -> Option<Record> {
        let title = sanitize::clean_field(&self.title, MAX_TITLE_LEN);
        if title.is_empty() {
            return None;
        }

        let names: Vec<String> = self
            .authors
            .iter()
            .map(|a| sanitize::truncate(a.trim(), sanitize::MAX_AUTHOR_NAME_LEN))
            .filter(|a| !a.is_empty())
            .collect();
        let authors = if names.is_empty() {
            "Unknown".to_string()
        } else {
            sanitize::clean_field(&names.join(", "), MAX_AUTHORS_LEN)
        };

        let abstract_text = self
            .abstract_text
            .map(|a| sanitize::clean_field(&a, MAX_ABSTRACT_LEN))
            .filter(|a| !a.is_empty());
        let venue = self
            .venue
            .map(|v| sanitize::clean_field(&v, MAX_VENUE_LEN))
            .filter(|v| !v.is_empty());
        let doi = sanitize::sanitize_doi(self.doi.as_deref());
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| doi.clone())
            .unwrap_or_else(generate_id);

        Some(Record {
            id,
            title,
            authors,
            year: sanitize::sanitize_year(self.year),
            abstract_text,
            citations: self.citations.max(0) as u64,
            url: sanitize::sanitize_url(self.url.as_deref()),
            doi,
            venue,
            pub_type: self.pub_type,
            source: sanitize::clean_field(&self.source, MAX_SOURCE_LEN),
            added_date: Utc::now(),
            categories: BTreeSet::new(),
            is_gray_lit: None,
            relevance_score: 0,
        })
    }
}

impl Record {
    /// Dedup key: case-folded, punctuation-stripped, whitespace-collapsed title.
    pub fn title_key(&self) -> String {
        title_key(&self.title)
    }

    /// Title and abstract joined for phrase matching, with HTML escaping undone.
    pub fn text(&self) -> String {
        sanitize::unescape_html(&format!("{} {}", self.title, self.abstract_str()))
    }

    pub fn abstract_str(&self) -> &str {
        self.abstract_text.as_deref().unwrap_or("")
    }
}

/// Dedup key of a title, escaped or not.
pub fn title_key(title: &str) -> String {
    normalize_text(&sanitize::unescape_html(title))
}

/// Decode each element as a [`Record`], skipping the ones that are not
/// objects. `origin` names the batch in the log.
pub fn records_from_values(values: Vec<Value>, origin: &str) -> Vec<Record> {
    let total = values.len();
    let records: Vec<Record> = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(origin = origin, index = index, error = %e, "Skipping unreadable record");
                None
            }
        })
        .collect();
    if records.len() < total {
        warn!(origin = origin, skipped = total - records.len(), "Some records were skipped");
    }
    records
}

/// Field decoders that fall back to the empty value on a type mismatch.
mod lenient {
    use super::PublicationType;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeSet;

    fn text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn integer(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text(Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(text(Value::deserialize(d)?).filter(|s| !s.trim().is_empty()))
    }

    pub fn year<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
        Ok(integer(&Value::deserialize(d)?).and_then(|y| i32::try_from(y).ok()))
    }

    /// Negative counts clamp to zero.
    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let value = Value::deserialize(d)?;
        if let Some(u) = value.as_u64() {
            return Ok(u);
        }
        Ok(integer(&value).map_or(0, |n| n.max(0) as u64))
    }

    pub fn score<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        Ok(integer(&Value::deserialize(d)?).map_or(0, |n| n.clamp(0, 100) as u8))
    }

    pub fn pub_type<'de, D: Deserializer<'de>>(d: D) -> Result<Option<PublicationType>, D::Error> {
        Ok(Value::deserialize(d)?.as_str().and_then(|s| s.parse().ok()))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(Value::deserialize(d)?.as_bool())
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        Ok(Value::deserialize(d)?
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or_else(Utc::now, |t| t.with_timezone(&Utc)))
    }

    pub fn categories<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(text)
                .filter(|c| !c.trim().is_empty())
                .collect(),
            _ => BTreeSet::new(),
        })
    }
}

/// Case-fold, drop everything but letters/digits/underscore/whitespace, and
/// collapse whitespace runs.
pub fn normalize_text(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Random 9-character identifier for records without a native one.
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> RecordDraft {
        RecordDraft {
            title: title.to_string(),
            source: "CrossRef".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  AI, and the Labor-Market!  "), "ai and the labormarket");
        assert_eq!(normalize_text("AI   and\tjobs"), "ai and jobs");
        assert_eq!(normalize_text("..."), "");
    }

    #[test]
    fn test_title_required() {
        assert!(draft("   ").into_record().is_none());
        assert!(draft("").into_record().is_none());
        assert!(draft("A title").into_record().is_some());
    }

    #[test]
    fn test_draft_sanitization() {
        let record = RecordDraft {
            id: None,
            title: "<i>Jobs</i> & AI".to_string(),
            authors: vec!["Ada Lovelace".to_string(), " ".to_string(), "Alan Turing".to_string()],
            year: Some(1850),
            abstract_text: Some("   ".to_string()),
            citations: -4,
            url: Some("javascript:void(0)".to_string()),
            doi: Some("10.5555/12345".to_string()),
            venue: Some("Journal of Work".to_string()),
            pub_type: Some(PublicationType::Journal),
            source: "CrossRef".to_string(),
        }
        .into_record()
        .expect("record");

        assert_eq!(record.title, "&lt;i&gt;Jobs&lt;/i&gt; &amp; AI");
        assert_eq!(record.authors, "Ada Lovelace, Alan Turing");
        assert_eq!(record.year, None);
        assert_eq!(record.abstract_text, None);
        assert_eq!(record.citations, 0);
        assert_eq!(record.url, None);
        assert_eq!(record.id, "10.5555/12345");
        assert_eq!(record.is_gray_lit, None);
    }

    #[test]
    fn test_unknown_authors_and_generated_id() {
        let record = draft("Automation and wages").into_record().expect("record");
        assert_eq!(record.authors, "Unknown");
        assert_eq!(record.id.len(), 9);
    }

    #[test]
    fn test_publication_type_roundtrip_names() {
        assert_eq!("working-paper".parse::<PublicationType>(), Ok(PublicationType::WorkingPaper));
        assert_eq!(" Journal ".parse::<PublicationType>(), Ok(PublicationType::Journal));
        assert!("thesis".parse::<PublicationType>().is_err());
        let json = serde_json::to_string(&PublicationType::WorkingPaper).expect("json");
        assert_eq!(json, "\"working-paper\"");
    }

    #[test]
    fn test_title_key_ignores_escaping() {
        let fetched = draft("AI & Jobs").into_record().expect("record");
        assert_eq!(fetched.title, "AI &amp; Jobs");
        assert_eq!(fetched.title_key(), "ai jobs");
        assert_eq!(title_key("AI & Jobs"), fetched.title_key());
    }

    #[test]
    fn test_malformed_fields_degrade() {
        let json = r#"{
            "title": "Automation at the desk",
            "authors": null,
            "year": "2023",
            "citations": -12,
            "type": "thesis",
            "addedDate": "yesterday",
            "categories": ["Labor Economics", 7, ""],
            "isGrayLit": "no",
            "relevanceScore": 250,
            "doi": 42
        }"#;
        let record: Record = serde_json::from_str(json).expect("lenient record");
        assert_eq!(record.title, "Automation at the desk");
        assert_eq!(record.authors, "");
        assert_eq!(record.year, Some(2023));
        assert_eq!(record.citations, 0);
        assert_eq!(record.pub_type, None);
        assert_eq!(record.is_gray_lit, None);
        assert_eq!(record.relevance_score, 100);
        assert_eq!(record.doi.as_deref(), Some("42"));
        assert_eq!(record.categories.len(), 2);

        let record: Record = serde_json::from_str(r#"{"type": "working-paper", "citations": 3.0}"#)
            .expect("lenient record");
        assert_eq!(record.title, "");
        assert_eq!(record.pub_type, Some(PublicationType::WorkingPaper));
        assert_eq!(record.citations, 3);
    }

    #[test]
    fn test_records_from_values_skips_non_objects() {
        let values: Vec<Value> = serde_json::from_str(
            r#"[{"title": "Kept", "type": "thesis"}, "not a record", 12, {"title": "Also kept"}]"#,
        )
        .expect("json");
        let records = records_from_values(values, "test");
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Kept", "Also kept"]);
    }

    #[test]
    fn test_record_json_uses_camel_case() {
        let record = draft("Automation and wages").into_record().expect("record");
        let value = serde_json::to_value(&record).expect("json");
        assert!(value.get("addedDate").is_some());
        assert!(value.get("relevanceScore").is_some());
        assert!(value.get("isGrayLit").is_some());
        assert!(value.get("abstract").is_some());
    }
}
