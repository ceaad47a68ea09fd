//! Ingestion funnel counts and read-only statistics over the collection.

use crate::filter::RelevanceFilter;
use crate::record::Record;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Entries kept in the venue and author rankings.
pub const TOP_N: usize = 10;

/// Entries kept in the keyword ranking.
pub const TOP_KEYWORDS: usize = 40;

const UNKNOWN: &str = "Unknown";

/// Tokens shorter than this never enter the keyword ranking.
const MIN_KEYWORD_LEN: usize = 4;

/// Topic words every record shares, plus common English filler.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "into", "over", "under", "about",
    "between", "using", "ai", "artificial", "intelligence", "generative", "model", "models",
    "paper", "study", "analysis", "evidence", "effects", "impact", "impacts", "work", "future",
    "jobs", "job", "labor", "labour", "market", "markets", "data", "based", "new", "system",
    "systems", "approach", "toward", "towards", "case", "cases", "review", "evolution", "of", "in",
    "on", "to", "a", "an", "is", "are", "by", "as", "at", "be", "or", "we", "our", "their", "they",
    "it", "its",
];

/// Per-source record counts before and after filtering for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionDiagnostics {
    pub pre_filter_counts: BTreeMap<String, usize>,
    pub post_filter_counts: BTreeMap<String, usize>,
    pub pre_filter_total: usize,
    pub post_filter_total: usize,
}

impl IngestionDiagnostics {
    /// `accepted` must be a subset of `fetched`.
    pub fn from_batches(fetched: &[Record], accepted: &[Record]) -> Self {
        Self {
            pre_filter_counts: count_by_source(fetched),
            post_filter_counts: count_by_source(accepted),
            pre_filter_total: fetched.len(),
            post_filter_total: accepted.len(),
        }
    }

    /// Add another run's counts to this one.
    pub fn merge(&mut self, other: &IngestionDiagnostics) {
        for (source, count) in &other.pre_filter_counts {
            *self.pre_filter_counts.entry(source.clone()).or_default() += count;
        }
        for (source, count) in &other.post_filter_counts {
            *self.post_filter_counts.entry(source.clone()).or_default() += count;
        }
        self.pre_filter_total += other.pre_filter_total;
        self.post_filter_total += other.post_filter_total;
    }

    /// Pre and post counts for every source that returned anything, by name.
    pub fn funnel(&self) -> Vec<SourceFunnel> {
        self.pre_filter_counts
            .iter()
            .map(|(source, pre)| SourceFunnel {
                source: source.clone(),
                pre: *pre,
                post: self.post_filter_counts.get(source).copied().unwrap_or(0),
            })
            .collect()
    }
}

fn count_by_source(records: &[Record]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        let source = if record.source.is_empty() {
            UNKNOWN.to_string()
        } else {
            record.source.clone()
        };
        *counts.entry(source).or_default() += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFunnel {
    pub source: String,
    pub pre: usize,
    pub post: usize,
}

/// A labelled count with its share of the collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingFields {
    /// Absent or not meaningful
    pub abstract_text: usize,
    pub year: usize,
    pub doi: usize,
    pub url: usize,
}

/// Percentages of the collection carrying each field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub abstract_text: f64,
    pub doi: f64,
    pub url: f64,
    pub ahead_of_print: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

/// Everything the statistics views show, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub total: usize,
    pub gray_literature: usize,
    pub source_distribution: Vec<Share>,
    pub ingestion: Vec<SourceFunnel>,
    pub missing: MissingFields,
    pub coverage: Coverage,
    pub citation_mean: f64,
    pub citation_median: u64,
    pub year_range: Option<YearRange>,
    pub added_last_30_days: usize,
    pub added_last_90_days: usize,
    pub yearly_output: BTreeMap<i32, usize>,
    pub type_breakdown: Vec<Share>,
    pub top_venues: Vec<Ranked>,
    pub top_authors: Vec<Ranked>,
    pub top_keywords: Vec<Ranked>,
    pub category_counts: BTreeMap<String, usize>,
}

impl DiagnosticsSnapshot {
    pub fn compute(
        records: &[Record],
        gray_literature: usize,
        last_run: Option<&IngestionDiagnostics>,
        now: DateTime<Utc>,
        filter: &RelevanceFilter,
    ) -> Self {
        let total = records.len();

        let with_abstract = records
            .iter()
            .filter(|r| filter.has_meaningful_abstract(r.abstract_str()))
            .count();
        let with_year = records.iter().filter(|r| r.year.is_some()).count();
        let with_doi = records.iter().filter(|r| r.doi.is_some()).count();
        let with_url = records.iter().filter(|r| r.url.is_some()).count();
        let ahead_of_print = records.iter().filter(|r| filter.is_ahead_of_print(r)).count();

        let mut citations: Vec<u64> = records.iter().map(|r| r.citations).collect();
        citations.sort_unstable();
        let citation_mean = if total == 0 {
            0.0
        } else {
            citations.iter().map(|&c| c as f64).sum::<f64>() / total as f64
        };
        // Upper median for even counts
        let citation_median = citations.get(total / 2).copied().unwrap_or(0);

        let years: Vec<i32> = records.iter().filter_map(|r| r.year).collect();
        let year_range = match (years.iter().min(), years.iter().max()) {
            (Some(&min), Some(&max)) => Some(YearRange { min, max }),
            _ => None,
        };
        let mut yearly_output = BTreeMap::new();
        for year in &years {
            *yearly_output.entry(*year).or_default() += 1;
        }

        let added_within = |days: i64| {
            records
                .iter()
                .filter(|r| now - r.added_date <= Duration::days(days))
                .count()
        };

        let mut category_counts = BTreeMap::new();
        for category in records.iter().flat_map(|r| r.categories.iter()) {
            *category_counts.entry(category.clone()).or_default() += 1;
        }

        Self {
            total,
            gray_literature,
            source_distribution: shares(count_by_source(records).into_iter(), total),
            ingestion: last_run.map(IngestionDiagnostics::funnel).unwrap_or_default(),
            missing: MissingFields {
                abstract_text: total - with_abstract,
                year: total - with_year,
                doi: total - with_doi,
                url: total - with_url,
            },
            coverage: Coverage {
                abstract_text: percent(with_abstract, total),
                doi: percent(with_doi, total),
                url: percent(with_url, total),
                ahead_of_print: percent(ahead_of_print, total),
            },
            citation_mean,
            citation_median,
            year_range,
            added_last_30_days: added_within(30),
            added_last_90_days: added_within(90),
            yearly_output,
            type_breakdown: shares(
                tally(records.iter().map(|r| {
                    r.pub_type
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                }))
                .into_iter(),
                total,
            ),
            top_venues: top(tally(
                records
                    .iter()
                    .filter_map(|r| r.venue.as_deref())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            )),
            top_authors: top(tally(
                records
                    .iter()
                    .flat_map(|r| r.authors.split(','))
                    .map(str::trim)
                    .filter(|a| !a.is_empty() && *a != UNKNOWN)
                    .map(str::to_string),
            )),
            top_keywords: top_keywords(records),
            category_counts,
        }
    }
}

/// Most frequent title and abstract tokens, split on anything but `[a-z0-9]`.
fn top_keywords(records: &[Record]) -> Vec<Ranked> {
    let tokens = records.iter().flat_map(|r| {
        let text = r.text().to_lowercase();
        text.split(|c: char| !c.is_ascii_lowercase() && !c.is_ascii_digit())
            .filter(|t| t.len() >= MIN_KEYWORD_LEN && !STOPWORDS.contains(t))
            .map(str::to_string)
            .collect::<Vec<_>>()
    });
    sorted_counts(tally(tokens).into_iter())
        .into_iter()
        .take(TOP_KEYWORDS)
        .map(|(label, count)| Ranked { label, count })
        .collect()
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}

fn tally(labels: impl Iterator<Item = String>) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    counts
}

/// Descending by count, then by label.
fn sorted_counts(counts: impl Iterator<Item = (String, usize)>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = counts.collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

fn shares(counts: impl Iterator<Item = (String, usize)>, total: usize) -> Vec<Share> {
    sorted_counts(counts)
        .into_iter()
        .map(|(label, count)| Share {
            label,
            count,
            percent: percent(count, total),
        })
        .collect()
}

fn top(counts: HashMap<String, usize>) -> Vec<Ranked> {
    sorted_counts(counts.into_iter())
        .into_iter()
        .take(TOP_N)
        .map(|(label, count)| Ranked { label, count })
        .collect()
}
