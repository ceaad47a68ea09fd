//! CSV and RIS serialization of selected records.

use crate::error::{ReviewError, Result};
use crate::record::{PublicationType, Record};
use serde::Serialize;

#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Authors")]
    authors: &'a str,
    #[serde(rename = "Year")]
    year: Option<i32>,
    #[serde(rename = "Type")]
    pub_type: &'a str,
    #[serde(rename = "Abstract")]
    abstract_text: &'a str,
    #[serde(rename = "URL")]
    url: &'a str,
    #[serde(rename = "DOI")]
    doi: &'a str,
    #[serde(rename = "Categories")]
    categories: String,
    #[serde(rename = "Source")]
    source: &'a str,
    #[serde(rename = "Citations")]
    citations: u64,
    #[serde(rename = "Relevance Score")]
    relevance_score: u8,
}

impl<'a> From<&'a Record> for CsvRow<'a> {
    fn from(r: &'a Record) -> Self {
        Self {
            title: &r.title,
            authors: &r.authors,
            year: r.year,
            pub_type: r.pub_type.map(|t| t.as_str()).unwrap_or(""),
            abstract_text: r.abstract_str(),
            url: r.url.as_deref().unwrap_or(""),
            doi: r.doi.as_deref().unwrap_or(""),
            categories: r.categories.iter().cloned().collect::<Vec<_>>().join("; "),
            source: &r.source,
            citations: r.citations,
            relevance_score: r.relevance_score,
        }
    }
}

/// CSV with a header row, one line per record.
pub fn to_csv(records: &[Record]) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    for record in records {
        wtr.serialize(CsvRow::from(record))?;
    }
    let bytes = wtr.into_inner().map_err(|e| ReviewError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ReviewError::Parse(format!("CSV output is not UTF-8: {}", e)))
}

fn ris_type(pub_type: Option<PublicationType>) -> &'static str {
    match pub_type {
        Some(PublicationType::Conference) => "CONF",
        Some(PublicationType::Book) => "BOOK",
        Some(PublicationType::Report) => "RPRT",
        Some(PublicationType::WorkingPaper) => "UNPB",
        Some(PublicationType::Journal) | None => "JOUR",
    }
}

/// RIS, one `TY` .. `ER` block per record.
pub fn to_ris(records: &[Record]) -> String {
    let mut out = String::new();
    for r in records {
        let mut line = |tag: &str, value: &str| {
            out.push_str(tag);
            out.push_str("  - ");
            out.push_str(value);
            out.push('\n');
        };

        line("TY", ris_type(r.pub_type));
        line("TI", &r.title);
        for author in r.authors.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            line("AU", author);
        }
        if let Some(year) = r.year {
            line("PY", &year.to_string());
        }
        if let Some(url) = &r.url {
            line("UR", url);
        }
        if let Some(doi) = &r.doi {
            line("DO", doi);
        }
        if let Some(abstract_text) = &r.abstract_text {
            line("AB", abstract_text);
        }
        for category in &r.categories {
            line("KW", category);
        }
        if !r.source.is_empty() {
            line("DB", &r.source);
        }
        line("ER", "");
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordDraft;

    fn record() -> Record {
        let mut r = RecordDraft {
            title: "Generative AI, productivity and wages".to_string(),
            authors: vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()],
            year: Some(2024),
            abstract_text: Some("We \"measure\" output.".to_string()),
            citations: 12,
            url: Some("https://example.org/paper".to_string()),
            doi: Some("10.1234/abcd.5678".to_string()),
            pub_type: Some(PublicationType::WorkingPaper),
            source: "OpenAlex".to_string(),
            ..Default::default()
        }
        .into_record()
        .expect("record");
        r.categories.insert("Generative AI".to_string());
        r.categories.insert("Labor Economics".to_string());
        r.relevance_score = 48;
        r
    }

    #[test]
    fn test_csv() -> Result<()> {
        let csv = to_csv(&[record()])?;
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Title,Authors,Year,Type,Abstract,URL,DOI,Categories,Source,Citations,Relevance Score")
        );
        let row = lines.next().unwrap_or_default();
        assert!(row.starts_with("\"Generative AI, productivity and wages\",\"Ada Lovelace, Alan Turing\",2024,working-paper,"));
        assert!(row.contains("Generative AI; Labor Economics"));
        assert!(row.ends_with(",OpenAlex,12,48"));
        Ok(())
    }

    #[test]
    fn test_csv_empty_fields() -> Result<()> {
        let mut r = record();
        r.year = None;
        r.doi = None;
        r.pub_type = None;
        let csv = to_csv(&[r])?;
        assert!(csv.lines().nth(1).unwrap_or_default().contains(",,"));
        Ok(())
    }

    #[test]
    fn test_ris() {
        let ris = to_ris(&[record()]);
        let lines: Vec<&str> = ris.lines().collect();
        assert_eq!(lines[0], "TY  - UNPB");
        assert_eq!(lines[1], "TI  - Generative AI, productivity and wages");
        assert_eq!(lines[2], "AU  - Ada Lovelace");
        assert_eq!(lines[3], "AU  - Alan Turing");
        assert_eq!(lines[4], "PY  - 2024");
        assert!(lines.contains(&"DO  - 10.1234/abcd.5678"));
        assert!(lines.contains(&"KW  - Labor Economics"));
        assert!(lines.contains(&"DB  - OpenAlex"));
        assert!(ris.ends_with("ER  - \n\n"));
    }

    #[test]
    fn test_ris_type_default() {
        let mut r = record();
        r.pub_type = None;
        assert!(to_ris(&[r]).starts_with("TY  - JOUR\n"));
    }
}
