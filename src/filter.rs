//! Relevance filter.
//!
//! Two stages, both must pass. Negative keywords reject first and nothing later
//! can re-admit. Positive admission then needs a core term together with either
//! a real abstract or an ahead-of-print marker; records from the fallback
//! source may instead qualify on a strong title plus a credibility signal.

use crate::config::ReviewConfig;
use crate::record::{normalize_text, Record};
use crate::sanitize::unescape_html;
use tracing::debug;

/// Minimum trimmed length of a meaningful abstract.
pub const MIN_ABSTRACT_CHARS: usize = 40;

/// Minimum normalized title length for the fallback path.
pub const MIN_FALLBACK_TITLE_CHARS: usize = 20;

/// Why a record was or was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Core term plus abstract or ahead-of-print marker
    Admitted,
    /// Fallback source with strong title and credibility signal
    AdmittedFallback,
    /// Contains a negative keyword
    Excluded,
    /// Did not meet either admission path
    Rejected,
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admitted | Verdict::AdmittedFallback)
    }
}

pub struct RelevanceFilter {
    negative_keywords: Vec<String>,
    core_terms: Vec<String>,
    ahead_of_print_terms: Vec<String>,
    abstract_placeholders: Vec<String>,
    fallback_source: String,
    min_year: i32,
    max_year: i32,
}

impl RelevanceFilter {
    pub fn from_config(config: &ReviewConfig) -> Self {
        let lower = |items: &[String]| items.iter().map(|s| s.to_lowercase()).collect::<Vec<_>>();
        Self {
            negative_keywords: lower(&config.negative_keywords),
            core_terms: config
                .core_terms
                .iter()
                .map(|t| normalize_text(t))
                .filter(|t| !t.is_empty())
                .collect(),
            ahead_of_print_terms: lower(&config.ahead_of_print_terms),
            abstract_placeholders: lower(&config.abstract_placeholders),
            fallback_source: config.search.fallback_source.clone(),
            min_year: config.search.min_year,
            max_year: config.search.max_year,
        }
    }

    /// Non-empty, at least 40 characters after trimming, and not a placeholder.
    pub fn has_meaningful_abstract(&self, text: &str) -> bool {
        let clean = text.trim().to_lowercase();
        clean.chars().count() >= MIN_ABSTRACT_CHARS
            && !self.abstract_placeholders.iter().any(|p| clean.contains(p.as_str()))
    }

    /// Title or abstract carries an early-publication phrase.
    pub fn is_ahead_of_print(&self, record: &Record) -> bool {
        let text = record.text().to_lowercase();
        self.ahead_of_print_terms.iter().any(|t| text.contains(t.as_str()))
    }

    pub fn has_negative_keyword(&self, record: &Record) -> bool {
        let text = record.text().to_lowercase();
        self.negative_keywords.iter().any(|k| text.contains(k.as_str()))
    }

    pub fn evaluate(&self, record: &Record) -> Verdict {
        if self.has_negative_keyword(record) {
            return Verdict::Excluded;
        }

        let title = record.title_key();
        let text = format!("{} {}", title, normalize_text(&unescape_html(record.abstract_str())));
        let has_core_term = self.core_terms.iter().any(|t| text.contains(t.as_str()));

        if (self.has_meaningful_abstract(record.abstract_str()) || self.is_ahead_of_print(record))
            && has_core_term
        {
            return Verdict::Admitted;
        }

        if record.source == self.fallback_source {
            let strong_title = title.chars().count() > MIN_FALLBACK_TITLE_CHARS && has_core_term;
            let credible = record.citations > 0 || record.doi.is_some();
            if strong_title && credible {
                return Verdict::AdmittedFallback;
            }
        }

        Verdict::Rejected
    }

    /// Keep the admitted subset, preserving order.
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let before = records.len();
        let kept: Vec<Record> = records
            .into_iter()
            .filter(|r| self.evaluate(r).is_admitted())
            .collect();
        debug!(before = before, after = kept.len(), "Relevance filter applied");
        kept
    }

    /// Year inside the acceptance window; undated records only if ahead of print.
    pub fn within_window(&self, record: &Record) -> bool {
        match record.year {
            Some(year) => (self.min_year..=self.max_year).contains(&year),
            None => self.is_ahead_of_print(record),
        }
    }
}
