//! Relevance scoring, categorization and gray-literature classification.
//!
//! The score is a fixed heuristic out of 100:
//!
//! | Component | Formula | Nominal max |
//! |---|---|---|
//! | citations | `min(citations / 10, 30)` | 30 |
//! | recency | `(year - min_year) / (max_year - min_year) * 25` | 25 |
//! | keyword density | `matched / keywords.len() * 25` | 25 |
//! | publication type | fixed per type, 10 if unknown | 20 |
//!
//! Recency is deliberately not clamped, so years outside the window push it
//! below 0 or above 25. Only the rounded total is clamped to `0..=100`.

use crate::config::ReviewConfig;
use crate::record::{normalize_text, PublicationType, Record};
use crate::sanitize::unescape_html;
use std::collections::BTreeSet;

const CITATION_CAP: f64 = 30.0;
const RECENCY_WEIGHT: f64 = 25.0;
const KEYWORD_WEIGHT: f64 = 25.0;
const UNKNOWN_TYPE_WEIGHT: f64 = 10.0;

struct Category {
    name: String,
    keywords: Vec<String>,
}

pub struct Scorer {
    min_year: i32,
    max_year: i32,
    keywords: Vec<String>,
    categories: Vec<Category>,
    default_category: String,
    gray_lit_sources: Vec<String>,
    gray_lit_indicators: Vec<String>,
}

impl Scorer {
    pub fn from_config(config: &ReviewConfig) -> Self {
        let normalized = |items: &[String]| items.iter().map(|s| normalize_text(s)).collect::<Vec<_>>();
        let lower = |items: &[String]| items.iter().map(|s| s.to_lowercase()).collect::<Vec<_>>();

        Self {
            min_year: config.search.min_year,
            max_year: config.search.max_year,
            keywords: normalized(&config.keywords),
            categories: config
                .categories
                .iter()
                .map(|c| Category {
                    name: c.name.clone(),
                    keywords: normalized(&c.keywords),
                })
                .collect(),
            default_category: config.default_category.clone(),
            gray_lit_sources: lower(&config.gray_lit_sources),
            gray_lit_indicators: lower(&config.gray_lit_indicators),
        }
    }

    pub fn citation_component(&self, citations: u64) -> f64 {
        (citations as f64 / 10.0).min(CITATION_CAP)
    }

    /// Linear in year; undated records count as the window start.
    pub fn recency_component(&self, year: Option<i32>) -> f64 {
        let span = self.max_year - self.min_year;
        if span <= 0 {
            return 0.0;
        }
        let year = year.unwrap_or(self.min_year);
        (year - self.min_year) as f64 / span as f64 * RECENCY_WEIGHT
    }

    pub fn keyword_component(&self, record: &Record) -> f64 {
        if self.keywords.is_empty() {
            return 0.0;
        }
        let title = record.title_key();
        let abstract_text = normalize_text(&unescape_html(record.abstract_str()));
        let matches = self
            .keywords
            .iter()
            .filter(|k| !k.is_empty())
            .filter(|k| title.contains(k.as_str()) || abstract_text.contains(k.as_str()))
            .count();
        matches as f64 / self.keywords.len() as f64 * KEYWORD_WEIGHT
    }

    pub fn type_component(&self, pub_type: Option<PublicationType>) -> f64 {
        pub_type.map_or(UNKNOWN_TYPE_WEIGHT, |t| t.score_weight())
    }

    /// Rounded sum of the four components, clamped to `0..=100`.
    pub fn relevance_score(&self, record: &Record) -> u8 {
        let score = self.citation_component(record.citations)
            + self.recency_component(record.year)
            + self.keyword_component(record)
            + self.type_component(record.pub_type);
        score.round().clamp(0.0, 100.0) as u8
    }

    /// Every matching category, or the default one.
    pub fn categorize(&self, record: &Record) -> BTreeSet<String> {
        let text = normalize_text(&record.text());
        let mut categories: BTreeSet<String> = self
            .categories
            .iter()
            .filter(|c| c.keywords.iter().any(|k| !k.is_empty() && text.contains(k.as_str())))
            .map(|c| c.name.clone())
            .collect();
        if categories.is_empty() {
            categories.insert(self.default_category.clone());
        }
        categories
    }

    /// Report type, a known institution in source/authors/title, or a
    /// report-type phrase in title/abstract.
    pub fn is_gray_literature(&self, record: &Record) -> bool {
        if record.pub_type == Some(PublicationType::Report) {
            return true;
        }

        let source = record.source.to_lowercase();
        let authors = record.authors.to_lowercase();
        let title = record.title.to_lowercase();
        let abstract_text = record.abstract_str().to_lowercase();

        let from_institution = self.gray_lit_sources.iter().any(|s| {
            source.contains(s.as_str()) || authors.contains(s.as_str()) || title.contains(s.as_str())
        });
        let has_indicator = self
            .gray_lit_indicators
            .iter()
            .any(|i| title.contains(i.as_str()) || abstract_text.contains(i.as_str()));

        from_institution || has_indicator
    }

    /// Fill in score, categories and gray-literature flag.
    ///
    /// The score is always recomputed; categories and the gray-literature flag
    /// are kept when the record already carries them.
    pub fn enrich(&self, record: &mut Record) {
        record.relevance_score = self.relevance_score(record);
        if record.categories.is_empty() {
            record.categories = self.categorize(record);
        }
        if record.is_gray_lit.is_none() {
            record.is_gray_lit = Some(self.is_gray_literature(record));
        }
    }
}
