//! Semantic Scholar paper search.
//!
//! API Details:
//! - Search endpoint: GET /graph/v1/paper/search
//! - Rate limit: 1 req/s (unauthenticated), higher with API key

use crate::error::{OptionExt, ReviewError, Result};
use crate::record::{PublicationType, Record, RecordDraft};
use crate::sanitize;
use crate::sources::{fetch_text, SourceKind, SourceQuery};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

/// Semantic Scholar API base URL
const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// The search endpoint rejects larger limits
const MAX_LIMIT: usize = 100;

const SEARCH_FIELDS: &str =
    "title,abstract,year,publicationDate,authors,citationCount,url,publicationTypes,venue,externalIds";

#[derive(Debug, Deserialize)]
struct SSSearchResponse {
    data: Option<Vec<SSPaper>>,
}

/// One paper of a Semantic Scholar search response.
#[derive(Debug, Default, Deserialize)]
pub struct SSPaper {
    #[serde(rename = "paperId")]
    pub paper_id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    #[serde(rename = "publicationDate")]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub authors: Vec<SSAuthor>,
    #[serde(rename = "citationCount")]
    pub citation_count: Option<i64>,
    pub url: Option<String>,
    #[serde(rename = "publicationTypes")]
    pub publication_types: Option<Vec<String>>,
    pub venue: Option<String>,
    #[serde(rename = "externalIds")]
    pub external_ids: Option<SSExternalIds>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SSAuthor {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SSExternalIds {
    #[serde(rename = "DOI")]
    pub doi: Option<String>,
}

/// Query Semantic Scholar for papers matching `term`.
pub async fn search(client: &Client, term: &str, query: &SourceQuery) -> Result<Vec<Record>> {
    let limit = query.limit.min(MAX_LIMIT).to_string();
    info!(query = term, limit = %limit, "Starting Semantic Scholar query");

    let request = client
        .get(format!("{}/paper/search", SS_API_BASE))
        .query(&[("query", term), ("limit", limit.as_str()), ("fields", SEARCH_FIELDS)]);

    let body = fetch_text(request, SourceKind::SemanticScholar.name()).await?;
    let records = parse_response(&body)?;

    info!(total = records.len(), "Semantic Scholar query complete");
    Ok(records)
}

/// Parse a Semantic Scholar search response body.
pub fn parse_response(json_str: &str) -> Result<Vec<Record>> {
    let response: SSSearchResponse = serde_json::from_str(json_str).map_err(|e| {
        ReviewError::Parse(format!("Failed to parse Semantic Scholar response: {}", e))
    })?;

    let papers = response.data.ok_or_parse("Semantic Scholar response has no data array")?;
    Ok(papers.into_iter().filter_map(normalize).collect())
}

/// Convert one Semantic Scholar paper into a [`Record`]; untitled papers are dropped.
pub fn normalize(paper: SSPaper) -> Option<Record> {
    let title = paper.title?;

    let year = paper
        .year
        .or_else(|| sanitize::year_from_date(paper.publication_date.as_deref()));

    RecordDraft {
        id: paper.paper_id,
        title,
        authors: paper.authors.into_iter().filter_map(|a| a.name).collect(),
        year,
        abstract_text: paper.abstract_text,
        citations: paper.citation_count.unwrap_or(0),
        url: paper.url,
        doi: paper.external_ids.and_then(|ids| ids.doi),
        venue: paper.venue.filter(|v| !v.trim().is_empty()),
        pub_type: Some(map_type(paper.publication_types.as_deref())),
        source: SourceKind::SemanticScholar.name().to_string(),
    }
    .into_record()
}

/// Semantic Scholar lists several types; only the first one counts.
pub fn map_type(types: Option<&[String]>) -> PublicationType {
    let first = types
        .and_then(|t| t.first())
        .map(|t| t.to_lowercase())
        .unwrap_or_default();

    if first.contains("conference") {
        PublicationType::Conference
    } else if first.contains("journal") {
        PublicationType::Journal
    } else if first.contains("book") {
        PublicationType::Book
    } else {
        PublicationType::Journal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() -> Result<()> {
        let body = r#"{
            "total": 2,
            "offset": 0,
            "data": [
                {
                    "paperId": "abc123",
                    "title": "Large language models and jobs",
                    "abstract": null,
                    "year": 2025,
                    "authors": [{"authorId": "1", "name": "Tyna Eloundou"}, {"name": null}],
                    "citationCount": 7,
                    "url": "https://www.semanticscholar.org/paper/abc123",
                    "publicationTypes": ["Conference", "JournalArticle"],
                    "venue": "",
                    "externalIds": {"DOI": "10.48550/arXiv.2303.10130"}
                },
                {"paperId": "def456", "title": null}
            ]
        }"#;

        let records = parse_response(body)?;
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.id, "abc123");
        assert_eq!(r.authors, "Tyna Eloundou");
        assert_eq!(r.year, Some(2025));
        assert_eq!(r.abstract_text, None);
        assert_eq!(r.venue, None);
        assert_eq!(r.doi.as_deref(), Some("10.48550/arXiv.2303.10130"));
        assert_eq!(r.pub_type, Some(PublicationType::Conference));
        assert_eq!(r.source, "Semantic Scholar");
        Ok(())
    }

    #[test]
    fn test_map_type() {
        let types = vec!["Review".to_string()];
        assert_eq!(map_type(Some(types.as_slice())), PublicationType::Journal);
        let types = vec!["Book".to_string()];
        assert_eq!(map_type(Some(types.as_slice())), PublicationType::Book);
        assert_eq!(map_type(None), PublicationType::Journal);
    }

    #[test]
    fn test_missing_data_is_parse_error() {
        assert!(matches!(
            parse_response(r#"{"message": "Too Many Requests"}"#),
            Err(ReviewError::Parse(_))
        ));
    }
}
