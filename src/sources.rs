//! Bibliographic sources.
//!
//! The set of sources is closed: [`SourceKind`] names each one and dispatches
//! to its module's `parse_response`/`search` statically. [`RecordSource`] is
//! the seam the fan-out talks to, so tests can stand in their own sources.

use crate::config::ReviewConfig;
use crate::error::{ReviewError, Result};
use crate::record::Record;
use crate::{crossref, openalex, semanticscholar};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::warn;

/// Retries after HTTP 429 before giving up on a request.
const MAX_RETRIES: u32 = 2;

/// The external APIs records are ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    CrossRef,
    SemanticScholar,
    OpenAlex,
}

impl SourceKind {
    /// Fan-out order.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::CrossRef,
        SourceKind::SemanticScholar,
        SourceKind::OpenAlex,
    ];

    /// Name stamped on every record from this source.
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::CrossRef => "CrossRef",
            SourceKind::SemanticScholar => "Semantic Scholar",
            SourceKind::OpenAlex => "OpenAlex",
        }
    }

    /// Normalize a raw response body from this source.
    pub fn parse_response(&self, body: &str) -> Result<Vec<Record>> {
        match self {
            SourceKind::CrossRef => crossref::parse_response(body),
            SourceKind::SemanticScholar => semanticscholar::parse_response(body),
            SourceKind::OpenAlex => openalex::parse_response(body),
        }
    }
}

/// Per-search request parameters shared by all sources.
#[derive(Debug, Clone)]
pub struct SourceQuery {
    pub limit: usize,
    pub min_year: i32,
    pub max_year: i32,
    pub mailto: String,
}

impl SourceQuery {
    pub fn from_config(config: &ReviewConfig) -> Self {
        Self {
            limit: config.search.results_per_source,
            min_year: config.search.min_year,
            max_year: config.search.max_year,
            mailto: config.search.mailto.clone(),
        }
    }
}

/// Anything the fan-out can query for a search term.
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;

    fn search<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<Record>>>;
}

/// A live HTTP source.
pub struct HttpSource {
    kind: SourceKind,
    client: Client,
    query: SourceQuery,
}

impl HttpSource {
    pub fn new(kind: SourceKind, client: Client, query: SourceQuery) -> Self {
        Self { kind, client, query }
    }

    /// One source per [`SourceKind`], sharing a client.
    pub fn all(config: &ReviewConfig) -> Result<Vec<HttpSource>> {
        let client = build_client(config)?;
        let query = SourceQuery::from_config(config);
        Ok(SourceKind::ALL
            .into_iter()
            .map(|kind| HttpSource::new(kind, client.clone(), query.clone()))
            .collect())
    }
}

impl RecordSource for HttpSource {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn search<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<Record>>> {
        match self.kind {
            SourceKind::CrossRef => crossref::search(&self.client, term, &self.query).boxed(),
            SourceKind::SemanticScholar => {
                semanticscholar::search(&self.client, term, &self.query).boxed()
            }
            SourceKind::OpenAlex => openalex::search(&self.client, term, &self.query).boxed(),
        }
    }
}

/// HTTP client used by every source.
pub fn build_client(config: &ReviewConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.search.source_timeout())
        .user_agent(format!("livingreview/0.1 (mailto:{})", config.search.mailto))
        .build()
        .map_err(|e| ReviewError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Send a request and return its body, backing off on HTTP 429.
pub(crate) async fn fetch_text(request: RequestBuilder, source: &str) -> Result<String> {
    let mut retries = 0;

    loop {
        let attempt = request
            .try_clone()
            .ok_or_else(|| ReviewError::Validation("request body is not cloneable".to_string()))?;
        let response = attempt.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.text().await?);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            if retries < MAX_RETRIES {
                let backoff = Duration::from_secs(2u64.pow(retries));
                warn!(
                    source = source,
                    retries = retries,
                    backoff_secs = backoff.as_secs(),
                    "Rate limited, backing off"
                );
                tokio::time::sleep(backoff).await;
                retries += 1;
                continue;
            }
            return Err(ReviewError::RateLimited(60));
        }

        return Err(ReviewError::Api {
            code: status.as_u16() as i32,
            message: format!("{} API error: {}", source, status),
        });
    }
}
