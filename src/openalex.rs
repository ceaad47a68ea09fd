//! OpenAlex works search.
//!
//! OpenAlex never ships abstracts as text; they come as an inverted index of
//! word -> positions and are re-linearized here.
//!
//! API Best Practices (per OpenAlex docs):
//! - Use `mailto:email` parameter for polite pool (10 req/s vs 1 req/s)
//! - Back off on HTTP 429

use crate::error::{ReviewError, Result};
use crate::record::{PublicationType, Record, RecordDraft};
use crate::sanitize;
use crate::sources::{fetch_text, SourceKind, SourceQuery};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// OpenAlex API base URL
const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// OpenAlex hard limit for `per-page`
const MAX_PER_PAGE: usize = 200;

/// Reconstructed abstracts are cut at this many characters
const MAX_ABSTRACT_CHARS: usize = 500;

/// OpenAlex API response structures
#[derive(Debug, Deserialize)]
struct OpenAlexResponse {
    results: Vec<OpenAlexWork>,
}

/// One work of an OpenAlex `/works` response.
#[derive(Debug, Default, Deserialize)]
pub struct OpenAlexWork {
    pub id: Option<String>,
    pub title: Option<String>,
    pub display_name: Option<String>,
    pub publication_year: Option<i32>,
    pub publication_date: Option<String>,
    pub doi: Option<String>,
    pub cited_by_count: Option<i64>,
    #[serde(rename = "abstract_inverted_index")]
    pub abstract_index: Option<HashMap<String, Vec<usize>>>,
    pub authorships: Option<Vec<OpenAlexAuthorship>>,
    pub primary_location: Option<OpenAlexLocation>,
    #[serde(rename = "type")]
    pub work_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenAlexAuthorship {
    pub author: Option<OpenAlexAuthor>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenAlexAuthor {
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenAlexLocation {
    pub source: Option<OpenAlexSource>,
    pub landing_page_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenAlexSource {
    pub display_name: Option<String>,
}

/// Query OpenAlex for works matching `term` inside the year window.
pub async fn search(client: &Client, term: &str, query: &SourceQuery) -> Result<Vec<Record>> {
    let url = build_search_url(term, query);
    info!(query = term, per_page = query.limit.min(MAX_PER_PAGE), "Starting OpenAlex query");
    debug!(url = %url, "Fetching OpenAlex page");

    let body = fetch_text(client.get(&url), SourceKind::OpenAlex.name()).await?;
    let records = parse_response(&body)?;

    info!(total = records.len(), "OpenAlex query complete");
    Ok(records)
}

/// Build OpenAlex API search URL
fn build_search_url(term: &str, query: &SourceQuery) -> String {
    format!(
        "{}/works?search={}&per-page={}&filter=publication_year:{}-{}&mailto={}",
        OPENALEX_API_BASE,
        urlencoding::encode(term),
        query.limit.min(MAX_PER_PAGE),
        query.min_year,
        query.max_year,
        urlencoding::encode(&query.mailto)
    )
}

/// Parse an OpenAlex `/works` response body.
pub fn parse_response(json_str: &str) -> Result<Vec<Record>> {
    let response: OpenAlexResponse = serde_json::from_str(json_str)
        .map_err(|e| ReviewError::Parse(format!("Failed to parse OpenAlex response: {}", e)))?;

    Ok(response.results.into_iter().filter_map(normalize).collect())
}

/// Convert one OpenAlex work into a [`Record`]; works without a title are dropped.
pub fn normalize(work: OpenAlexWork) -> Option<Record> {
    let title = work.display_name.or(work.title)?;

    let authors = work
        .authorships
        .unwrap_or_default()
        .into_iter()
        .filter_map(|a| a.author.and_then(|a| a.display_name))
        .collect();

    let year = work
        .publication_year
        .or_else(|| sanitize::year_from_date(work.publication_date.as_deref()));

    // DOI (clean format without https://doi.org/ prefix)
    let doi = work
        .doi
        .map(|d| d.trim_start_matches("https://doi.org/").to_string());

    let (venue, url) = match work.primary_location {
        Some(location) => (
            location.source.and_then(|s| s.display_name),
            location.landing_page_url,
        ),
        None => (None, None),
    };

    let abstract_text = work
        .abstract_index
        .as_ref()
        .map(reconstruct_abstract)
        .map(|text| text.chars().take(MAX_ABSTRACT_CHARS).collect::<String>());

    RecordDraft {
        id: work.id,
        title,
        authors,
        year,
        abstract_text,
        citations: work.cited_by_count.unwrap_or(0),
        url,
        doi,
        venue,
        pub_type: Some(map_type(work.work_type.as_deref())),
        source: SourceKind::OpenAlex.name().to_string(),
    }
    .into_record()
}

/// OpenAlex type vocabulary; unmapped types default to journal.
pub fn map_type(work_type: Option<&str>) -> PublicationType {
    match work_type.unwrap_or("") {
        "book" => PublicationType::Book,
        "dataset" | "thesis" => PublicationType::Report,
        _ => PublicationType::Journal,
    }
}

/// Rebuild plaintext from an inverted index by sorting words on position.
pub fn reconstruct_abstract(inverted_index: &HashMap<String, Vec<usize>>) -> String {
    let mut words: Vec<(usize, &str)> = inverted_index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |p| (*p, word.as_str())))
        .collect();

    words.sort_by_key(|(pos, _)| *pos);
    words.iter().map(|(_, w)| *w).collect::<Vec<_>>().join(" ")
}
