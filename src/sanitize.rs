//! Field-level sanitization shared by every normalizer.
//!
//! Provider payloads are untrusted: text is HTML-escaped and length-capped,
//! URLs must be http(s), DOIs must match the registrant pattern. A bad field is
//! replaced by an empty value, never reported as an error.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub const MAX_TITLE_LEN: usize = 300;
pub const MAX_AUTHORS_LEN: usize = 1000;
pub const MAX_AUTHOR_NAME_LEN: usize = 100;
pub const MAX_ABSTRACT_LEN: usize = 2000;
pub const MAX_VENUE_LEN: usize = 200;
pub const MAX_SOURCE_LEN: usize = 100;

/// Years outside this range are treated as missing.
pub const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1900..=2030;

fn doi_regex() -> &'static Regex {
    static DOI: OnceLock<Regex> = OnceLock::new();
    DOI.get_or_init(|| Regex::new(r"^10\.\d{4,}/\S+$").unwrap_or_else(|_| Regex::new("$^").expect("empty regex")))
}

fn tag_regex() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]+>").unwrap_or_else(|_| Regex::new("$^").expect("empty regex")))
}

/// Neutralize characters that are unsafe inside markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_html`]. `&amp;` goes last so `&amp;lt;` yields `&lt;`.
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

/// Strip HTML/JATS tags (CrossRef abstracts arrive as `<jats:p>` markup).
pub fn strip_html_tags(text: &str) -> String {
    tag_regex().replace_all(text, "").to_string()
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Trim, cap, then escape a free-text field.
pub fn clean_field(text: &str, max_chars: usize) -> String {
    escape_html(&truncate(text.trim(), max_chars))
}

/// Re-apply [`clean_field`] to text that may already be escaped. Escaped and
/// raw input with the same content produce the same output.
pub fn reclean_field(text: &str, max_chars: usize) -> String {
    clean_field(&unescape_html(text), max_chars)
}

/// Accept only absolute http/https URLs.
pub fn sanitize_url(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(raw.to_string()),
        _ => {
            tracing::debug!(url = raw, "Rejected URL");
            None
        }
    }
}

/// Accept only DOIs of the form `10.<4+ digits>/<non-space>`.
pub fn sanitize_doi(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    doi_regex().is_match(raw).then(|| raw.to_string())
}

/// Drop zero or implausible years.
pub fn sanitize_year(year: Option<i32>) -> Option<i32> {
    year.filter(|y| PLAUSIBLE_YEARS.contains(y))
}

/// Leading four-digit year of an ISO date such as `2023-06-15`.
pub fn year_from_date(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"AI" & 'jobs'</b>"#),
            "&lt;b&gt;&quot;AI&quot; &amp; &#039;jobs&#039;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_unescape_html() {
        let raw = r#"<b>"AI" & 'jobs'</b>"#;
        assert_eq!(unescape_html(&escape_html(raw)), raw);
        assert_eq!(unescape_html("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_reclean_is_stable() {
        let once = clean_field("AI & Jobs", MAX_TITLE_LEN);
        assert_eq!(reclean_field(&once, MAX_TITLE_LEN), once);
        assert_eq!(reclean_field("AI & Jobs", MAX_TITLE_LEN), once);

        let long = "&".repeat(10);
        let capped = clean_field(&long, 4);
        assert_eq!(capped, "&amp;&amp;&amp;&amp;...");
        assert_eq!(reclean_field(&capped, 4), capped);
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html_tags("<jats:p>Hello</jats:p>"), "Hello");
        assert_eq!(strip_html_tags("No tags"), "No tags");
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            sanitize_url(Some("https://doi.org/10.1234/x")),
            Some("https://doi.org/10.1234/x".to_string())
        );
        assert_eq!(sanitize_url(Some("http://example.com")), Some("http://example.com".to_string()));
        assert_eq!(sanitize_url(Some("javascript:alert(1)")), None);
        assert_eq!(sanitize_url(Some("ftp://example.com/file")), None);
        assert_eq!(sanitize_url(Some("not a url")), None);
        assert_eq!(sanitize_url(None), None);
    }

    #[test]
    fn test_sanitize_doi() {
        assert_eq!(sanitize_doi(Some("10.1234/abc.def")), Some("10.1234/abc.def".to_string()));
        assert_eq!(sanitize_doi(Some("10.12/abc")), None);
        assert_eq!(sanitize_doi(Some("10.1234/has space")), None);
        assert_eq!(sanitize_doi(Some("doi:10.1234/abc")), None);
        assert_eq!(sanitize_doi(None), None);
    }

    #[test]
    fn test_years() {
        assert_eq!(sanitize_year(Some(2023)), Some(2023));
        assert_eq!(sanitize_year(Some(0)), None);
        assert_eq!(sanitize_year(Some(2099)), None);
        assert_eq!(year_from_date(Some("2024-03-01")), Some(2024));
        assert_eq!(year_from_date(Some("n/a")), None);
        assert_eq!(year_from_date(None), None);
    }
}
