//! Search and refresh flows.
//!
//! A search fans one term out to every source, keeps the relevant records
//! inside the acceptance window, then deduplicates and ranks them. A refresh
//! runs a search for each configured term and inserts the union into a
//! [`Collection`].

use crate::collection::Collection;
use crate::config::ReviewConfig;
use crate::dedup::dedupe_and_rank;
use crate::diagnostics::IngestionDiagnostics;
use crate::error::Result;
use crate::fanout::FanOut;
use crate::filter::RelevanceFilter;
use crate::record::Record;
use crate::scoring::Scorer;
use crate::sources::{HttpSource, RecordSource};
use crate::storage::KeyValueStore;
use serde::Serialize;
use tracing::{info, warn};

/// Result of one search term.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    /// Deduplicated, descending by relevance
    pub accepted: Vec<Record>,
    pub diagnostics: IngestionDiagnostics,
    pub sources_succeeded: usize,
    pub sources_total: usize,
}

/// How a refresh ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "added", rename_all = "camelCase")]
pub enum RefreshOutcome {
    /// No source answered any search
    ConnectivityFailure,
    NoNewRecords,
    Added(usize),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub added: usize,
    /// Records offered to the collection, summed over searches
    pub considered: usize,
    pub searches_succeeded: usize,
    pub searches_total: usize,
    /// Summed over all searches
    pub sources_succeeded: usize,
    pub sources_total: usize,
    pub diagnostics: IngestionDiagnostics,
}

impl RefreshReport {
    pub fn outcome(&self) -> RefreshOutcome {
        if self.searches_succeeded == 0 {
            RefreshOutcome::ConnectivityFailure
        } else if self.added == 0 {
            RefreshOutcome::NoNewRecords
        } else {
            RefreshOutcome::Added(self.added)
        }
    }
}

pub struct Pipeline {
    fanout: FanOut,
    filter: RelevanceFilter,
    scorer: Scorer,
}

impl Pipeline {
    /// Pipeline over the live HTTP sources.
    pub fn from_config(config: &ReviewConfig) -> Result<Self> {
        let sources = HttpSource::all(config)?
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn RecordSource>)
            .collect();
        Ok(Self::with_sources(config, sources))
    }

    pub fn with_sources(config: &ReviewConfig, sources: Vec<Box<dyn RecordSource>>) -> Self {
        Self {
            fanout: FanOut::new(
                sources,
                config.search.source_timeout(),
                config.search.min_interval(),
            ),
            filter: RelevanceFilter::from_config(config),
            scorer: Scorer::from_config(config),
        }
    }

    pub fn filter(&self) -> &RelevanceFilter {
        &self.filter
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn source_names(&self) -> Vec<String> {
        self.fanout.source_names()
    }

    /// Fan out, filter, window, deduplicate and rank one term.
    pub async fn search(&self, term: &str) -> SearchOutcome {
        let fanned = self.fanout.search(term).await;
        let sources_succeeded = fanned.sources_succeeded();
        let sources_total = fanned.sources_total();

        let fetched = fanned.into_records();
        let admitted: Vec<Record> = self
            .filter
            .apply(fetched.clone())
            .into_iter()
            .filter(|r| self.filter.within_window(r))
            .collect();
        let accepted = dedupe_and_rank(admitted, &self.scorer);
        let diagnostics = IngestionDiagnostics::from_batches(&fetched, &accepted);

        info!(
            query = term,
            fetched = diagnostics.pre_filter_total,
            accepted = diagnostics.post_filter_total,
            sources_succeeded = sources_succeeded,
            "Search complete"
        );

        SearchOutcome {
            accepted,
            diagnostics,
            sources_succeeded,
            sources_total,
        }
    }

    /// Search every term in turn and insert the results.
    ///
    /// A search counts as successful when at least one source answered it.
    /// The merged funnel counts are stored with the collection unless no
    /// search succeeded. Only a persistence failure is an error.
    pub async fn refresh<S: KeyValueStore>(
        &self,
        collection: &mut Collection<S>,
        terms: &[String],
    ) -> Result<RefreshReport> {
        let mut diagnostics = IngestionDiagnostics::default();
        let mut batch = Vec::new();
        let mut searches_succeeded = 0;
        let mut sources_succeeded = 0;
        let mut sources_total = 0;

        for term in terms {
            let outcome = self.search(term).await;
            sources_succeeded += outcome.sources_succeeded;
            sources_total += outcome.sources_total;
            if outcome.sources_succeeded == 0 {
                warn!(query = %term, "No source answered");
                continue;
            }
            searches_succeeded += 1;
            diagnostics.merge(&outcome.diagnostics);
            batch.extend(outcome.accepted);
        }

        let considered = batch.len();
        let added = collection.insert_batch(batch)?;
        if searches_succeeded > 0 {
            collection.record_run(diagnostics.clone())?;
        }

        let report = RefreshReport {
            added,
            considered,
            searches_succeeded,
            searches_total: terms.len(),
            sources_succeeded,
            sources_total,
            diagnostics,
        };
        info!(
            added = added,
            considered = considered,
            searches_succeeded = searches_succeeded,
            searches_total = terms.len(),
            outcome = ?report.outcome(),
            "Refresh complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::tests::{record, StubSource};
    use crate::storage::MemoryStore;

    fn config() -> ReviewConfig {
        let mut config = ReviewConfig::default();
        config.search.min_interval_ms = 0;
        config.search.source_timeout_secs = 1;
        config
    }

    fn relevant(title: &str, source: &str, year: Option<i32>) -> Record {
        let mut r = record(title, source);
        r.abstract_text = Some(
            "We estimate the employment effects of generative AI adoption across firms.".to_string(),
        );
        r.year = year;
        r
    }

    fn collection() -> Collection<MemoryStore> {
        Collection::load(MemoryStore::new(), Scorer::from_config(&config())).expect("collection")
    }

    #[tokio::test]
    async fn test_search_filters_dedupes_and_counts() {
        let pipeline = Pipeline::with_sources(
            &config(),
            vec![
                Box::new(StubSource::Records(
                    "CrossRef",
                    vec![
                        relevant("Generative AI and jobs", "CrossRef", Some(2024)),
                        record("Unrelated note", "CrossRef"),
                    ],
                )),
                Box::new(StubSource::Records(
                    "OpenAlex",
                    vec![relevant("Generative AI and Jobs.", "OpenAlex", Some(2024))],
                )),
                Box::new(StubSource::Failing("Semantic Scholar")),
            ],
        );

        let outcome = pipeline.search("generative ai").await;
        assert_eq!(outcome.sources_succeeded, 2);
        assert_eq!(outcome.sources_total, 3);
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].source, "CrossRef");
        assert_eq!(outcome.diagnostics.pre_filter_total, 3);
        assert_eq!(outcome.diagnostics.post_filter_total, 1);
        assert_eq!(outcome.diagnostics.post_filter_counts.get("OpenAlex"), None);
    }

    #[tokio::test]
    async fn test_search_drops_records_outside_window() {
        let pipeline = Pipeline::with_sources(
            &config(),
            vec![Box::new(StubSource::Records(
                "Semantic Scholar",
                vec![
                    relevant("Computerisation and the future of employment", "Semantic Scholar", Some(2005)),
                    relevant("Generative AI at the call centre", "Semantic Scholar", Some(2023)),
                    relevant("Undated automation study", "Semantic Scholar", None),
                ],
            ))],
        );

        let outcome = pipeline.search("automation").await;
        let years: Vec<Option<i32>> = outcome.accepted.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![Some(2023)]);
        assert_eq!(outcome.diagnostics.pre_filter_total, 3);
        assert_eq!(outcome.diagnostics.post_filter_total, 1);

        let mut c = collection();
        assert_eq!(c.insert_batch(outcome.accepted).expect("insert"), 1);
        assert!(c.records().iter().all(|r| r.year == Some(2023)));
    }

    #[tokio::test]
    async fn test_refresh_applies_window_and_inserts() -> Result<()> {
        let pipeline = Pipeline::with_sources(
            &config(),
            vec![Box::new(StubSource::Records(
                "OpenAlex",
                vec![
                    relevant("Generative AI and jobs", "OpenAlex", Some(2024)),
                    relevant("Automation in 2015", "OpenAlex", Some(2015)),
                    relevant("Undated automation study", "OpenAlex", None),
                ],
            ))],
        );
        let mut c = collection();
        let terms = vec!["a".to_string(), "b".to_string()];

        let report = pipeline.refresh(&mut c, &terms).await?;
        assert_eq!(report.searches_succeeded, 2);
        assert_eq!(report.considered, 2);
        assert_eq!(report.added, 1);
        assert_eq!(report.outcome(), RefreshOutcome::Added(1));
        assert_eq!(report.diagnostics.pre_filter_total, 6);
        assert_eq!(c.last_run(), Some(&report.diagnostics));

        let again = pipeline.refresh(&mut c, &terms).await?;
        assert_eq!(again.outcome(), RefreshOutcome::NoNewRecords);
        assert_eq!(c.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_connectivity_failure_leaves_collection() -> Result<()> {
        let pipeline = Pipeline::with_sources(
            &config(),
            vec![Box::new(StubSource::Failing("CrossRef")), Box::new(StubSource::Failing("OpenAlex"))],
        );
        let mut c = collection();
        let report = pipeline.refresh(&mut c, &["x".to_string()]).await?;
        assert_eq!(report.outcome(), RefreshOutcome::ConnectivityFailure);
        assert!(c.is_empty());
        assert!(c.stats().last_update.is_none());
        assert!(c.last_run().is_none());
        Ok(())
    }
}
