//! Batch deduplication and ranking.

use crate::record::Record;
use crate::scoring::Scorer;
use std::collections::HashSet;
use tracing::debug;

/// Collapse records sharing a normalized title, score what survives, and sort
/// it by descending relevance.
///
/// The first record seen for a key wins. Records whose title normalizes to
/// nothing are dropped.
pub fn dedupe_and_rank(records: Vec<Record>, scorer: &Scorer) -> Vec<Record> {
    let before = records.len();
    let mut seen = HashSet::new();

    let mut kept: Vec<Record> = records
        .into_iter()
        .filter(|r| {
            let key = r.title_key();
            !key.is_empty() && seen.insert(key)
        })
        .map(|mut r| {
            scorer.enrich(&mut r);
            r
        })
        .collect();

    kept.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

    debug!(before = before, after = kept.len(), "Deduplicated batch");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReviewConfig;
    use crate::record::RecordDraft;

    fn record(title: &str, citations: i64, source: &str) -> Record {
        RecordDraft {
            title: title.to_string(),
            citations,
            year: Some(2024),
            source: source.to_string(),
            ..Default::default()
        }
        .into_record()
        .expect("record")
    }

    fn scorer() -> Scorer {
        Scorer::from_config(&ReviewConfig::default())
    }

    #[test]
    fn test_first_seen_wins() {
        let ranked = dedupe_and_rank(
            vec![
                record("AI and the Labor Market", 0, "CrossRef"),
                record("ai and the labor-market!", 900, "OpenAlex"),
                record("  AI   and the labor market ", 10, "Semantic Scholar"),
            ],
            &scorer(),
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].source, "CrossRef");
    }

    #[test]
    fn test_sorted_by_score_and_enriched() {
        let ranked = dedupe_and_rank(
            vec![
                record("Low impact", 0, "CrossRef"),
                record("High impact", 300, "CrossRef"),
                record("Middle impact", 100, "CrossRef"),
            ],
            &scorer(),
        );
        let titles: Vec<&str> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["High impact", "Middle impact", "Low impact"]);
        assert!(ranked.iter().all(|r| !r.categories.is_empty() && r.is_gray_lit.is_some()));
        assert!(ranked.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
    }

    #[test]
    fn test_same_set_regardless_of_order() {
        let batch = || {
            vec![
                record("Robots and wages", 5, "CrossRef"),
                record("Chatbots at work", 50, "OpenAlex"),
                record("Tax policy and AI", 20, "CrossRef"),
            ]
        };
        let mut forward: Vec<String> = dedupe_and_rank(batch(), &scorer())
            .into_iter()
            .map(|r| r.title)
            .collect();
        let mut reversed_input = batch();
        reversed_input.reverse();
        let mut backward: Vec<String> = dedupe_and_rank(reversed_input, &scorer())
            .into_iter()
            .map(|r| r.title)
            .collect();
        forward.sort();
        backward.sort();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_punctuation_only_title_dropped() {
        let ranked = dedupe_and_rank(vec![record("?!", 0, "CrossRef")], &scorer());
        assert!(ranked.is_empty());
    }
}
