//! CrossRef works search.
//!
//! CrossRef is the fallback-tolerant source: it often has no abstract but
//! always carries a registered DOI, which counts as a credibility signal.

use crate::error::{OptionExt, ReviewError, Result};
use crate::record::{PublicationType, Record, RecordDraft};
use crate::sanitize;
use crate::sources::{fetch_text, SourceKind, SourceQuery};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

/// CrossRef API base URL
const CROSSREF_API_URL: &str = "https://api.crossref.org/works";

// === CrossRef API Response Types ===

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: Option<CrossrefMessage>,
}

#[derive(Debug, Deserialize)]
struct CrossrefMessage {
    #[serde(default)]
    items: Option<Vec<CrossrefItem>>,
}

/// One item of a CrossRef `/works` response.
#[derive(Debug, Default, Deserialize)]
pub struct CrossrefItem {
    #[serde(rename = "DOI", default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub author: Vec<CrossrefAuthor>,
    #[serde(rename = "container-title", default)]
    pub container_title: Vec<String>,
    #[serde(rename = "published-print", default)]
    pub published_print: Option<CrossrefDate>,
    #[serde(rename = "published-online", default)]
    pub published_online: Option<CrossrefDate>,
    #[serde(default)]
    pub published: Option<CrossrefDate>,
    #[serde(default)]
    pub issued: Option<CrossrefDate>,
    #[serde(default)]
    pub created: Option<CrossrefDate>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(rename = "is-referenced-by-count", default)]
    pub referenced_by_count: Option<i64>,
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CrossrefAuthor {
    #[serde(default)]
    pub given: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CrossrefDate {
    #[serde(rename = "date-parts", default)]
    pub date_parts: Vec<Vec<Option<i32>>>,
}

impl CrossrefDate {
    fn year(&self) -> Option<i32> {
        self.date_parts.first().and_then(|parts| parts.first().copied().flatten())
    }
}

/// Query CrossRef for works matching `term` inside the year window.
pub async fn search(client: &Client, term: &str, query: &SourceQuery) -> Result<Vec<Record>> {
    let date_filter = format!(
        "from-pub-date:{}-01-01,until-pub-date:{}-12-31",
        query.min_year, query.max_year
    );
    let rows = query.limit.to_string();

    info!(query = term, rows = query.limit, "Starting CrossRef query");

    let request = client.get(CROSSREF_API_URL).query(&[
        ("query", term),
        ("rows", rows.as_str()),
        ("filter", date_filter.as_str()),
        ("sort", "published"),
        ("order", "desc"),
        ("mailto", query.mailto.as_str()),
    ]);

    let body = fetch_text(request, SourceKind::CrossRef.name()).await?;
    let mut records = parse_response(&body)?;
    records.truncate(query.limit);

    info!(total = records.len(), "CrossRef query complete");
    Ok(records)
}

/// Parse a CrossRef `/works` response body.
pub fn parse_response(json_str: &str) -> Result<Vec<Record>> {
    let response: CrossrefResponse = serde_json::from_str(json_str)
        .map_err(|e| ReviewError::Parse(format!("Failed to parse CrossRef response: {}", e)))?;

    let items = response
        .message
        .and_then(|m| m.items)
        .ok_or_parse("CrossRef response has no message.items")?;

    let total = items.len();
    let records: Vec<Record> = items.into_iter().filter_map(normalize).collect();
    debug!(total = total, kept = records.len(), "Normalized CrossRef items");
    Ok(records)
}

/// Convert one CrossRef item into a [`Record`]; items without a title are dropped.
pub fn normalize(item: CrossrefItem) -> Option<Record> {
    let title = item.title.into_iter().next()?;

    let authors = item
        .author
        .iter()
        .map(|a| {
            format!(
                "{} {}",
                a.given.as_deref().unwrap_or(""),
                a.family.as_deref().unwrap_or("")
            )
            .trim()
            .to_string()
        })
        .collect();

    // Print date first, then online, then the generic dates.
    let year = [
        &item.published_print,
        &item.published_online,
        &item.published,
        &item.issued,
        &item.created,
    ]
    .into_iter()
    .flatten()
    .find_map(CrossrefDate::year);

    let abstract_text = item.abstract_text.map(|s| sanitize::strip_html_tags(&s));

    RecordDraft {
        id: None,
        title,
        authors,
        year,
        abstract_text,
        citations: item.referenced_by_count.unwrap_or(0),
        url: item.url,
        doi: item.doi,
        venue: item.container_title.into_iter().next(),
        pub_type: Some(map_type(item.item_type.as_deref())),
        source: SourceKind::CrossRef.name().to_string(),
    }
    .into_record()
}

/// CrossRef type vocabulary; unmapped types default to working paper.
pub fn map_type(item_type: Option<&str>) -> PublicationType {
    match item_type.unwrap_or("") {
        "journal-article" => PublicationType::Journal,
        "proceedings-article" => PublicationType::Conference,
        "book-chapter" | "book" | "reference-book" | "monograph" | "edited-book" => {
            PublicationType::Book
        }
        "report" | "report-series" | "other" | "dataset" | "standard" => PublicationType::Report,
        _ => PublicationType::WorkingPaper,
    }
}
