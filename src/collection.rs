//! The durable record collection.
//!
//! [`Collection`] owns every mutation of the stored records. Each successful
//! insert persists the records, the gray-literature list and the last-update
//! timestamp before it returns. A failed insert leaves both the in-memory
//! state and the stored entries as they were.

use crate::diagnostics::IngestionDiagnostics;
use crate::error::{ReviewError, Result};
use crate::record::{generate_id, normalize_text, records_from_values, title_key, PublicationType, Record};
use crate::sanitize::{self, MAX_ABSTRACT_LEN, MAX_AUTHORS_LEN, MAX_SOURCE_LEN, MAX_TITLE_LEN, MAX_VENUE_LEN};
use crate::scoring::Scorer;
use crate::storage::{KeyValueStore, GRAY_KEY, LAST_RUN_KEY, LAST_UPDATE_KEY, PAPERS_KEY};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Result of a single insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Added,
    /// A record with the same normalized title is already stored
    Duplicate,
    /// Title empty after validation
    MissingTitle,
}

/// Composable filters for [`Collection::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    /// Substring matched against normalized title, authors and abstract
    pub search: Option<String>,
    pub year: Option<i32>,
    #[serde(rename = "type")]
    pub pub_type: Option<PublicationType>,
}

/// Sort orders offered by [`Collection::query`], all descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Relevance,
    Date,
    Citations,
    Impact,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relevance" => Ok(SortKey::Relevance),
            "date" => Ok(SortKey::Date),
            "citations" => Ok(SortKey::Citations),
            "impact" => Ok(SortKey::Impact),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortKey::Relevance => "relevance",
            SortKey::Date => "date",
            SortKey::Citations => "citations",
            SortKey::Impact => "impact",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub total: usize,
    pub gray_literature: usize,
    pub last_update: Option<DateTime<Utc>>,
}

pub struct Collection<S: KeyValueStore> {
    records: Vec<Record>,
    gray: Vec<Record>,
    last_update: Option<DateTime<Utc>>,
    last_run: Option<IngestionDiagnostics>,
    keys: HashSet<String>,
    ids: HashSet<String>,
    store: S,
    scorer: Scorer,
}

impl<S: KeyValueStore> Collection<S> {
    /// Load the persisted state from `store`.
    ///
    /// Array elements that are not records are skipped. An entry that is not
    /// a JSON array at all is copied to `<key>_unreadable` and loaded as empty.
    pub fn load(mut store: S, scorer: Scorer) -> Result<Self> {
        let records: Vec<Record> = read_array(&mut store, PAPERS_KEY)?;
        let gray: Vec<Record> = read_array(&mut store, GRAY_KEY)?;
        let last_update = store.get(LAST_UPDATE_KEY)?.and_then(|raw| {
            DateTime::parse_from_rfc3339(raw.trim())
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| warn!(error = %e, "Ignoring unparseable last-update timestamp"))
                .ok()
        });
        let last_run = store.get(LAST_RUN_KEY)?.and_then(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| warn!(error = %e, "Ignoring unparseable last-run diagnostics"))
                .ok()
        });

        let keys = records.iter().map(Record::title_key).collect();
        let ids = records.iter().map(|r| r.id.clone()).collect();

        info!(records = records.len(), gray = gray.len(), "Loaded collection");
        Ok(Self {
            records,
            gray,
            last_update,
            last_run,
            keys,
            ids,
            store,
            scorer,
        })
    }

    /// Insert one record unless its normalized title is already stored.
    ///
    /// The record is re-validated, stamped with the current time, scored and
    /// classified, then prepended. Only a persistence failure is an error, and
    /// it undoes the insert.
    pub fn insert(&mut self, record: Record) -> Result<InsertOutcome> {
        let mut record = revalidate(record);
        if record.title.is_empty() {
            debug!("Rejected record without title");
            return Ok(InsertOutcome::MissingTitle);
        }

        let key = record.title_key();
        if key.is_empty() || self.keys.contains(&key) {
            debug!(title = %record.title, "Duplicate record skipped");
            return Ok(InsertOutcome::Duplicate);
        }

        if record.id.trim().is_empty() || self.ids.contains(&record.id) {
            record.id = self.fresh_id();
        }
        record.added_date = Utc::now();
        self.scorer.enrich(&mut record);

        let id = record.id.clone();
        let into_gray = record.is_gray_lit == Some(true) && !self.gray.iter().any(|g| g.title_key() == key);
        let previous_update = self.last_update;

        if into_gray {
            self.gray.insert(0, record.clone());
        }
        self.records.insert(0, record);
        self.last_update = Some(Utc::now());

        if let Err(e) = self.persist() {
            self.records.remove(0);
            if into_gray {
                self.gray.remove(0);
            }
            self.last_update = previous_update;
            if let Err(restore) = self.persist() {
                warn!(error = %restore, "Could not restore stored collection after failed insert");
            }
            return Err(e);
        }

        self.keys.insert(key);
        self.ids.insert(id);
        Ok(InsertOutcome::Added)
    }

    /// Insert each record in order; returns how many were added.
    pub fn insert_batch(&mut self, records: Vec<Record>) -> Result<usize> {
        let considered = records.len();
        let mut added = 0;
        for record in records {
            if self.insert(record)? == InsertOutcome::Added {
                added += 1;
            }
        }
        info!(considered = considered, added = added, total = self.records.len(), "Inserted batch");
        Ok(added)
    }

    /// Filtered, sorted copy of the collection.
    pub fn query(&self, filter: &RecordFilter, sort: SortKey) -> Vec<Record> {
        let needle = filter
            .search
            .as_deref()
            .map(normalize_text)
            .filter(|s| !s.is_empty());
        let searchable = |text: &str| normalize_text(&sanitize::unescape_html(text));

        let mut matched: Vec<Record> = self
            .records
            .iter()
            .filter(|r| filter.year.map_or(true, |y| r.year == Some(y)))
            .filter(|r| filter.pub_type.map_or(true, |t| r.pub_type == Some(t)))
            .filter(|r| {
                needle.as_deref().map_or(true, |n| {
                    searchable(&r.title).contains(n)
                        || searchable(&r.authors).contains(n)
                        || searchable(r.abstract_str()).contains(n)
                })
            })
            .cloned()
            .collect();

        match sort {
            SortKey::Relevance | SortKey::Impact => {
                matched.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score))
            }
            SortKey::Date => matched.sort_by(|a, b| b.year.cmp(&a.year)),
            SortKey::Citations => matched.sort_by(|a, b| b.citations.cmp(&a.citations)),
        }
        matched
    }

    /// Delete every record and the persisted entries.
    pub fn clear(&mut self) -> Result<()> {
        let removed = self.records.len();
        self.records.clear();
        self.gray.clear();
        self.keys.clear();
        self.ids.clear();
        self.last_update = None;
        self.last_run = None;

        for key in [PAPERS_KEY, GRAY_KEY, LAST_UPDATE_KEY, LAST_RUN_KEY] {
            self.store.remove(key)?;
        }
        info!(removed = removed, "Cleared collection");
        Ok(())
    }

    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            total: self.records.len(),
            gray_literature: self.gray.len(),
            last_update: self.last_update,
        }
    }

    /// True when never updated or last updated more than `max_age_hours` ago.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_hours: i64) -> bool {
        match self.last_update {
            Some(last) => now - last > Duration::hours(max_age_hours),
            None => true,
        }
    }

    /// Most recently added first.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn gray_literature(&self) -> &[Record] {
        &self.gray
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_title(&self, title: &str) -> bool {
        self.keys.contains(&title_key(title))
    }

    /// Funnel counts of the most recent ingestion run, if one was recorded.
    pub fn last_run(&self) -> Option<&IngestionDiagnostics> {
        self.last_run.as_ref()
    }

    /// Persist the funnel counts of an ingestion run.
    pub fn record_run(&mut self, diagnostics: IngestionDiagnostics) -> Result<()> {
        let raw = serde_json::to_string(&diagnostics)?;
        self.store
            .set(LAST_RUN_KEY, &raw)
            .map_err(|e| ReviewError::Storage(format!("Failed to persist {}: {}", LAST_RUN_KEY, e)))?;
        self.last_run = Some(diagnostics);
        Ok(())
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = generate_id();
            if !self.ids.contains(&id) {
                return id;
            }
        }
    }

    fn persist(&mut self) -> Result<()> {
        let papers = serde_json::to_string(&self.records)?;
        let gray = serde_json::to_string(&self.gray)?;

        for (key, value) in [(PAPERS_KEY, &papers), (GRAY_KEY, &gray)] {
            self.store.set(key, value).map_err(|e| {
                ReviewError::Storage(format!("Failed to persist {}: {}", key, e))
            })?;
        }
        let stamped = match self.last_update {
            Some(t) => self.store.set(LAST_UPDATE_KEY, &t.to_rfc3339()),
            None => self.store.remove(LAST_UPDATE_KEY),
        };
        stamped.map_err(|e| ReviewError::Storage(format!("Failed to persist {}: {}", LAST_UPDATE_KEY, e)))?;

        debug!(records = self.records.len(), bytes = papers.len(), "Persisted collection");
        Ok(())
    }
}

/// Name an unreadable entry is copied to before it is loaded as empty.
pub fn unreadable_key(key: &str) -> String {
    format!("{}_unreadable", key)
}

fn read_array<S: KeyValueStore>(store: &mut S, key: &str) -> Result<Vec<Record>> {
    let Some(raw) = store.get(key)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Vec<Value>>(&raw) {
        Ok(values) => Ok(records_from_values(values, key)),
        Err(e) => {
            let backup = unreadable_key(key);
            warn!(key = key, backup = %backup, error = %e, "Stored entry is not a record array");
            store.set(&backup, &raw)?;
            Ok(Vec::new())
        }
    }
}

/// Enforce field rules on a record that may not have come through a
/// normalizer. Text ends up escaped exactly once whether or not it arrived
/// escaped.
fn revalidate(mut record: Record) -> Record {
    record.title = sanitize::reclean_field(&record.title, MAX_TITLE_LEN);
    record.authors = sanitize::reclean_field(&record.authors, MAX_AUTHORS_LEN);
    if record.authors.is_empty() {
        record.authors = "Unknown".to_string();
    }
    record.abstract_text = record
        .abstract_text
        .map(|a| sanitize::reclean_field(&a, MAX_ABSTRACT_LEN))
        .filter(|a| !a.is_empty());
    record.venue = record
        .venue
        .map(|v| sanitize::reclean_field(&v, MAX_VENUE_LEN))
        .filter(|v| !v.is_empty());
    record.source = sanitize::reclean_field(&record.source, MAX_SOURCE_LEN);
    record.url = sanitize::sanitize_url(record.url.as_deref());
    record.doi = sanitize::sanitize_doi(record.doi.as_deref());
    record.year = sanitize::sanitize_year(record.year);
    record
}
