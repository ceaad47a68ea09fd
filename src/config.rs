//! Review configuration.
//!
//! Every term list the filter and scorer consult lives here, together with the
//! acceptance window and the fan-out timing. All fields default, so a JSON
//! config file only needs the keys it overrides.

use crate::error::{ReviewError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Search window, limits and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Oldest publication year accepted (inclusive)
    pub min_year: i32,
    /// Newest publication year accepted (inclusive)
    pub max_year: i32,
    /// Rows requested from each source per search
    pub results_per_source: usize,
    /// Deadline for a single source request
    pub source_timeout_secs: u64,
    /// Minimum gap between two fan-out calls
    pub min_interval_ms: u64,
    /// Source whose records may be admitted without an abstract
    pub fallback_source: String,
    /// Contact address for polite-pool access
    pub mailto: String,
    /// Age after which the collection should be refreshed
    pub stale_after_hours: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_year: 2021,
            max_year: 2026,
            results_per_source: 50,
            source_timeout_secs: 20,
            min_interval_ms: 2000,
            fallback_source: "CrossRef".to_string(),
            mailto: "livingreview@example.com".to_string(),
            stale_after_hours: 24,
        }
    }
}

impl SearchConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// A topical category and the phrases that put a record in it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: strings(keywords),
        }
    }
}

/// Complete configuration for a living review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub search: SearchConfig,
    /// Search expressions; also the keyword list of the density score
    pub keywords: Vec<String>,
    /// At least one must appear for a record to be admitted
    pub core_terms: Vec<String>,
    /// Phrases marking early-publication records
    pub ahead_of_print_terms: Vec<String>,
    /// Any of these in title/abstract rejects the record outright
    pub negative_keywords: Vec<String>,
    /// Abstract texts that mean "there is no abstract"
    pub abstract_placeholders: Vec<String>,
    /// Ordered category table
    pub categories: Vec<CategoryRule>,
    /// Category used when nothing else matches
    pub default_category: String,
    /// Institution name fragments that mark gray literature
    pub gray_lit_sources: Vec<String>,
    /// Report-type phrases that mark gray literature
    pub gray_lit_indicators: Vec<String>,
    /// Searches run on every refresh
    pub priority_keywords: Vec<String>,
    /// Authors and institutions searched on every refresh
    pub priority_entities: Vec<String>,
    /// Topic expression combined with each priority entity
    pub entity_base_query: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            keywords: strings(&[
                r#""generative AI" AND "labor market""#,
                r#""generative AI" AND "employment""#,
                r#""large language models" AND "jobs""#,
                r#""agentic AI" AND "workforce""#,
                r#"("ChatGPT" OR "LLM") AND "employment impact""#,
                r#""AI" AND "labor productivity""#,
                r#""automation" AND "wage inequality""#,
                r#""AI" AND "skill premium""#,
                r#""AI" AND "capital-labor substitution""#,
                r#""technological unemployment""#,
                r#""task automation" AND "labor demand""#,
                r#""productivity paradox" AND "AI""#,
                r#""artificial intelligence" AND "human capital""#,
                r#""AI" AND "reskilling""#,
                r#""AI" AND "upskilling""#,
                r#""skill-biased technological change""#,
                r#""future of skills" AND "AI""#,
                r#""workforce transition" AND "automation""#,
                r#""job displacement" AND "artificial intelligence""#,
                r#""job creation" AND "automation""#,
                r#""task-based approach" AND "AI""#,
                r#""job quality" AND "AI""#,
            ]),
            core_terms: strings(&[
                "generative ai",
                "genai",
                "large language model",
                "llm",
                "agentic ai",
                "labor market",
                "employment",
                "jobs",
                "wages",
                "wage",
                "productivity",
                "task automation",
                "automation",
                "workforce",
                "human capital",
                "reskilling",
                "upskilling",
                "skill-biased",
                "future of work",
                "job displacement",
                "job creation",
            ]),
            ahead_of_print_terms: strings(&[
                "ahead of print",
                "early view",
                "online first",
                "in press",
                "forthcoming",
            ]),
            negative_keywords: strings(&[
                "ethics",
                "privacy",
                "algorithmic bias",
                "fairness",
                "accountability",
                "transparency",
                "computer vision",
                "robotics surgery",
                "dataset creation",
                "model architecture",
                "philosophy",
                "governance model",
            ]),
            abstract_placeholders: strings(&["no abstract available"]),
            categories: vec![
                CategoryRule::new(
                    "Generative AI",
                    &["generative ai", "large language model", "chatgpt", "llm", "agentic ai"],
                ),
                CategoryRule::new(
                    "Labor Economics",
                    &[
                        "labor market",
                        "employment",
                        "wage",
                        "productivity",
                        "skill premium",
                        "job polarization",
                        "labor demand",
                        "unemployment",
                    ],
                ),
                CategoryRule::new(
                    "Human Capital & Skills",
                    &[
                        "reskilling",
                        "upskilling",
                        "skill development",
                        "human capital",
                        "workforce training",
                        "skill-biased",
                    ],
                ),
                CategoryRule::new(
                    "Displacement & Creation",
                    &[
                        "job displacement",
                        "job creation",
                        "task automation",
                        "technological unemployment",
                    ],
                ),
                CategoryRule::new(
                    "Policy & Governance",
                    &["ai policy", "regulation", "governance", "ethics", "ai safety"],
                ),
                CategoryRule::new(
                    "Future of Work",
                    &["future of work", "workforce transformation", "human-ai collaboration"],
                ),
            ],
            default_category: "General AI".to_string(),
            gray_lit_sources: strings(&[
                "world bank",
                "banco mundial",
                "oecd",
                "ocde",
                "mckinsey",
                "brookings",
                "imf",
                "fmi",
                "wef",
                "world economic forum",
                "united nations",
                "european commission",
                "government",
                "ministry",
                "pwc",
                "deloitte",
                "kpmg",
                "accenture",
                "institute",
                "foundation",
                "council",
                "centre",
                "organization",
                "organisation",
                "commission",
            ]),
            gray_lit_indicators: strings(&[
                "working paper",
                "policy paper",
                "white paper",
                "technical report",
                "research report",
                "policy brief",
                "discussion paper",
                "occasional paper",
                "staff paper",
            ]),
            priority_keywords: strings(&[
                r#""generative AI" AND "labor market""#,
                r#""AI" AND "labor productivity""#,
                r#""automation" AND "human capital""#,
            ]),
            priority_entities: strings(&[
                "Daron Acemoglu",
                "Erik Brynjolfsson",
                "David Autor",
                "Anna Salomons",
                "Jeffrey Sachs",
                "NBER",
                "MIT Future of Work",
                "Stanford HAI",
            ]),
            entity_base_query: r#""artificial intelligence" OR "automation""#.to_string(),
        }
    }
}

impl ReviewConfig {
    /// Load a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ReviewConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded review config");
        Ok(config)
    }

    /// Load `path` if given, otherwise the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.min_year > self.search.max_year {
            return Err(ReviewError::Config(format!(
                "min_year {} is after max_year {}",
                self.search.min_year, self.search.max_year
            )));
        }
        if self.core_terms.is_empty() {
            return Err(ReviewError::Config("core_terms must not be empty".to_string()));
        }
        if self.search.source_timeout_secs == 0 {
            return Err(ReviewError::Config(
                "source_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.default_category.trim().is_empty() {
            return Err(ReviewError::Config("default_category must not be empty".to_string()));
        }
        Ok(())
    }

    /// Search terms for a full refresh: priority keywords, then one query per
    /// priority author or institution.
    pub fn refresh_terms(&self) -> Vec<String> {
        self.priority_keywords
            .iter()
            .cloned()
            .chain(
                self.priority_entities
                    .iter()
                    .map(|entity| format!("({}) AND \"{}\"", self.entity_base_query, entity)),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReviewConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.min_year, 2021);
        assert_eq!(config.search.max_year, 2026);
        assert_eq!(config.keywords.len(), 22);
        assert_eq!(config.categories.len(), 6);
    }

    #[test]
    fn test_refresh_terms() {
        let config = ReviewConfig::default();
        let terms = config.refresh_terms();
        assert_eq!(terms.len(), 3 + 8);
        assert_eq!(
            terms[3],
            r#"("artificial intelligence" OR "automation") AND "Daron Acemoglu""#
        );
    }

    #[test]
    fn test_partial_file_overrides() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"{{"search": {{"min_year": 2019, "max_year": 2024}}, "negative_keywords": ["crypto"]}}"#
        )?;

        let config = ReviewConfig::load(file.path())?;
        assert_eq!(config.search.min_year, 2019);
        assert_eq!(config.search.results_per_source, 50);
        assert_eq!(config.negative_keywords, vec!["crypto".to_string()]);
        assert!(!config.core_terms.is_empty());
        Ok(())
    }

    #[test]
    fn test_inverted_window_rejected() {
        let mut config = ReviewConfig::default();
        config.search.min_year = 2030;
        assert!(matches!(config.validate(), Err(ReviewError::Config(_))));
    }
}
