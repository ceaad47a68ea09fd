//! End-to-end ingestion through the pipeline with canned sources.

use futures::future::{BoxFuture, FutureExt};
use livingreview::collection::{Collection, InsertOutcome};
use livingreview::config::ReviewConfig;
use livingreview::crossref;
use livingreview::pipeline::{Pipeline, RefreshOutcome};
use livingreview::record::{records_from_values, PublicationType, Record, RecordDraft};
use livingreview::scoring::Scorer;
use livingreview::sources::RecordSource;
use livingreview::storage::MemoryStore;
use livingreview::{ReviewError, Result};

struct CannedSource {
    name: &'static str,
    records: Option<Vec<Record>>,
}

impl RecordSource for CannedSource {
    fn name(&self) -> &str {
        self.name
    }

    fn search<'a>(&'a self, _term: &'a str) -> BoxFuture<'a, Result<Vec<Record>>> {
        async move {
            self.records.clone().ok_or(ReviewError::Api {
                code: 503,
                message: format!("{} unavailable", self.name),
            })
        }
        .boxed()
    }
}

fn source(name: &'static str, records: Vec<Record>) -> Box<dyn RecordSource> {
    Box::new(CannedSource {
        name,
        records: Some(records),
    })
}

fn down(name: &'static str) -> Box<dyn RecordSource> {
    Box::new(CannedSource { name, records: None })
}

fn config() -> ReviewConfig {
    let mut config = ReviewConfig::default();
    config.search.min_interval_ms = 0;
    config.search.source_timeout_secs = 2;
    config
}

fn collection(config: &ReviewConfig) -> Collection<MemoryStore> {
    Collection::load(MemoryStore::new(), Scorer::from_config(config)).expect("collection")
}

fn labor_market_record() -> Record {
    RecordDraft {
        title: "AI and labor market outcomes".to_string(),
        abstract_text: Some(
            "This study examines generative AI's impact on employment trends across sectors."
                .to_string(),
        ),
        year: Some(2023),
        citations: 50,
        pub_type: Some(PublicationType::Journal),
        source: "CrossRef".to_string(),
        ..Default::default()
    }
    .into_record()
    .expect("record")
}

#[tokio::test]
async fn labor_market_record_is_accepted_scored_and_categorized() -> Result<()> {
    let config = config();
    let pipeline = Pipeline::with_sources(&config, vec![source("CrossRef", vec![labor_market_record()])]);
    let mut c = collection(&config);

    let outcome = pipeline.search("generative ai").await;
    assert_eq!(outcome.accepted.len(), 1);

    let added = c.insert_batch(outcome.accepted)?;
    assert_eq!(added, 1);

    let stored = &c.records()[0];
    assert_eq!(stored.relevance_score, 35);
    assert!(stored.categories.contains("Labor Economics"));
    assert!(stored.categories.contains("Generative AI"));
    assert_eq!(stored.is_gray_lit, Some(false));
    Ok(())
}

#[tokio::test]
async fn same_title_with_different_casing_is_stored_once() -> Result<()> {
    let config = config();
    let mut c = collection(&config);

    let first = labor_market_record();
    let mut second = labor_market_record();
    second.title = "AI AND LABOR-MARKET OUTCOMES.".to_string();

    assert_eq!(c.insert(first)?, InsertOutcome::Added);
    assert_eq!(c.insert(second)?, InsertOutcome::Duplicate);
    assert_eq!(c.len(), 1);
    Ok(())
}

#[tokio::test]
async fn placeholder_abstract_without_core_terms_is_rejected() {
    let config = config();
    let record = RecordDraft {
        title: "A remarkably long title about medieval trade routes in the Baltic".to_string(),
        abstract_text: Some("No abstract available".to_string()),
        year: Some(2024),
        citations: 40,
        doi: Some("10.1234/baltic.2024".to_string()),
        source: "OpenAlex".to_string(),
        ..Default::default()
    }
    .into_record()
    .expect("record");

    let pipeline = Pipeline::with_sources(&config, vec![source("OpenAlex", vec![record])]);
    let outcome = pipeline.search("anything").await;
    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.diagnostics.pre_filter_total, 1);
    assert_eq!(outcome.diagnostics.post_filter_total, 0);
}

#[tokio::test]
async fn crossref_record_with_doi_and_no_citations_uses_fallback() -> Result<()> {
    let body = r#"{
        "status": "ok",
        "message": {
            "items": [{
                "DOI": "10.1016/j.labeco.2024.102531",
                "title": ["Automation and employment"],
                "author": [{"given": "Jane", "family": "Doe"}],
                "published-print": {"date-parts": [[2024, 3]]},
                "is-referenced-by-count": 0,
                "type": "journal-article"
            }]
        }
    }"#;
    let records = crossref::parse_response(body)?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title.chars().count(), 25);

    let config = config();
    let pipeline = Pipeline::with_sources(&config, vec![source("CrossRef", records)]);
    let outcome = pipeline.search("automation").await;
    assert_eq!(outcome.accepted.len(), 1);
    assert_eq!(outcome.accepted[0].doi.as_deref(), Some("10.1016/j.labeco.2024.102531"));
    Ok(())
}

#[tokio::test]
async fn negative_keyword_beats_every_positive_signal() {
    let mut record = labor_market_record();
    record.title = "Generative AI, employment and algorithmic bias".to_string();
    record.citations = 5000;

    let config = config();
    let pipeline = Pipeline::with_sources(&config, vec![source("CrossRef", vec![record])]);
    let outcome = pipeline.search("generative ai").await;
    assert!(outcome.accepted.is_empty());
}

#[tokio::test]
async fn refresh_is_idempotent_and_reports_outcomes() -> Result<()> {
    let config = config();
    let pipeline = Pipeline::with_sources(
        &config,
        vec![source("CrossRef", vec![labor_market_record()]), down("Semantic Scholar")],
    );
    let mut c = collection(&config);
    let terms = config.refresh_terms();

    let first = pipeline.refresh(&mut c, &terms).await?;
    assert_eq!(first.outcome(), RefreshOutcome::Added(1));
    assert_eq!(first.searches_succeeded, terms.len());
    assert_eq!(first.sources_total, 2 * terms.len());
    assert!(first.diagnostics.post_filter_total <= first.diagnostics.pre_filter_total);

    let second = pipeline.refresh(&mut c, &terms).await?;
    assert_eq!(second.outcome(), RefreshOutcome::NoNewRecords);
    assert_eq!(c.len(), 1);

    let offline = Pipeline::with_sources(&config, vec![down("CrossRef"), down("OpenAlex")]);
    let third = offline.refresh(&mut c, &terms).await?;
    assert_eq!(third.outcome(), RefreshOutcome::ConnectivityFailure);
    assert_eq!(c.len(), 1);
    Ok(())
}

#[tokio::test]
async fn scores_stay_in_bounds_for_extreme_records() -> Result<()> {
    let config = config();
    let mut c = collection(&config);
    let extremes = [(Some(1900), 0), (Some(2030), i64::MAX), (None, 0), (Some(2026), 1_000_000)];

    for (i, (year, citations)) in extremes.into_iter().enumerate() {
        let record = RecordDraft {
            title: format!("Extreme record {}", i),
            year,
            citations,
            source: "OpenAlex".to_string(),
            ..Default::default()
        }
        .into_record()
        .expect("record");
        c.insert(record)?;
    }

    assert_eq!(c.len(), 4);
    assert!(c.records().iter().all(|r| r.relevance_score <= 100));
    Ok(())
}

#[tokio::test]
async fn saved_search_never_stores_records_outside_the_window() -> Result<()> {
    let config = config();
    let mut old = labor_market_record();
    old.title = "The future of employment".to_string();
    old.year = Some(2005);
    let pipeline = Pipeline::with_sources(
        &config,
        vec![source("Semantic Scholar", vec![old, labor_market_record()])],
    );
    let mut c = collection(&config);

    let outcome = pipeline.search("generative ai").await;
    c.insert_batch(outcome.accepted)?;

    assert_eq!(c.len(), 1);
    assert!(c
        .records()
        .iter()
        .all(|r| r.year.is_some_and(|y| (config.search.min_year..=config.search.max_year).contains(&y))));
    Ok(())
}

#[tokio::test]
async fn posted_batch_with_malformed_fields_is_ingested() -> Result<()> {
    let body = r#"[
        {"title": "Generative AI & clerical work", "type": "thesis", "year": "2024", "citations": -3},
        {"title": "Automation and wages", "authors": null, "relevanceScore": 250},
        "not a record",
        {"title": "Generative AI &amp; clerical work"}
    ]"#;
    let values: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let records = records_from_values(values, "test batch");
    assert_eq!(records.len(), 3);

    let config = config();
    let mut c = collection(&config);
    assert_eq!(c.insert_batch(records)?, 2);

    let thesis = c.records().iter().find(|r| r.title.starts_with("Generative")).expect("stored");
    assert_eq!(thesis.title, "Generative AI &amp; clerical work");
    assert_eq!(thesis.pub_type, None);
    assert_eq!(thesis.year, Some(2024));
    assert_eq!(thesis.citations, 0);
    assert!(c.records().iter().all(|r| r.relevance_score <= 100 && !r.authors.is_empty()));
    Ok(())
}
