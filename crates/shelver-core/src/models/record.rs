use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::isbn::Isbn;

/// Source id stamped on records synthesized from a filename.
pub const FILENAME_SOURCE: &str = "filename";

/// Confidence given to a record built only from a filename.
pub const DEFAULT_SEED_CONFIDENCE: f32 = 0.2;

// ─── ParsedFilename ─────────────────────────────────────────

/// Best-effort (title, author) guess extracted from a raw filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFilename {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Checksum-valid ISBN that appeared in the filename, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
}

// ─── MetadataRecord ─────────────────────────────────────────

/// One producer's view of a book's metadata.
///
/// Records are values: the resolver never edits one in place, it builds a new
/// record from two inputs (see `shelver_metadata::merge`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_index: Option<f32>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Trust in this record's fields, in `[0, 1]`.
    pub confidence: f32,

    /// Provider id (or `"filename"`) that produced the record.
    pub source: String,
}

impl MetadataRecord {
    /// Minimal record; remaining fields are filled with struct update syntax.
    pub fn new(title: impl Into<String>, source: impl Into<String>, confidence: f32) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            confidence: confidence.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    /// Low-confidence seed record built from a parsed filename.
    pub fn from_filename(parsed: &ParsedFilename, confidence: f32) -> Self {
        let (isbn, isbn13) = match parsed.isbn.as_deref().and_then(|raw| Isbn::parse(raw).ok()) {
            Some(parsed) => (parsed.isbn10, Some(parsed.isbn13)),
            None => (None, None),
        };
        Self {
            authors: parsed.author.iter().cloned().collect(),
            isbn,
            isbn13,
            ..Self::new(parsed.title.clone(), FILENAME_SOURCE, confidence)
        }
    }

    /// Preferred lookup identifier: ISBN-13, else ISBN-10.
    pub fn identifier(&self) -> Option<&str> {
        non_empty(self.isbn13.as_deref()).or_else(|| non_empty(self.isbn.as_deref()))
    }

    pub fn has_identifier(&self) -> bool {
        self.identifier().is_some()
    }

    pub fn has_summary(&self) -> bool {
        self.summary.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ─── Published dates ────────────────────────────────────────

/// Lenient date parsing for catalog APIs.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM`, `YYYY` and free text holding a 4-digit
/// year ("May 2001", "c1965"). Missing month/day default to the first.
pub fn parse_published_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date);
    }

    let mut parts = input.splitn(3, '-');
    if let (Some(year), Some(month), None) = (parts.next(), parts.next(), parts.next())
        && year.len() == 4
        && let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>())
    {
        return NaiveDate::from_ymd_opt(year, month, 1);
    }

    let year = input.chars().collect::<Vec<_>>().windows(4).find_map(|w| {
        let candidate = w.iter().collect::<String>();
        if candidate.chars().all(|c| c.is_ascii_digit()) {
            candidate.parse::<i32>().ok()
        } else {
            None
        }
    })?;
    NaiveDate::from_ymd_opt(year, 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_record_from_filename() {
        let parsed = ParsedFilename {
            title: "The Hobbit".to_string(),
            author: Some("J.R.R. Tolkien".to_string()),
            isbn: Some("054792822X".to_string()),
        };
        let seed = MetadataRecord::from_filename(&parsed, DEFAULT_SEED_CONFIDENCE);
        assert_eq!(seed.source, FILENAME_SOURCE);
        assert_eq!(seed.confidence, 0.2);
        assert_eq!(seed.authors, vec!["J.R.R. Tolkien"]);
        assert_eq!(seed.isbn13.as_deref(), Some("9780547928227"));
        assert_eq!(seed.identifier(), Some("9780547928227"));
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(MetadataRecord::new("x", "t", 1.7).confidence, 1.0);
        assert_eq!(MetadataRecord::new("x", "t", -0.3).confidence, 0.0);
    }

    #[test]
    fn blank_identifiers_are_ignored() {
        let record = MetadataRecord {
            isbn13: Some("  ".to_string()),
            isbn: Some("0306406152".to_string()),
            ..MetadataRecord::new("x", "t", 0.5)
        };
        assert_eq!(record.identifier(), Some("0306406152"));
    }

    #[test]
    fn published_date_variants() {
        let ymd = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        assert_eq!(parse_published_date("2012-09-18"), ymd(2012, 9, 18));
        assert_eq!(parse_published_date("2012-09"), ymd(2012, 9, 1));
        assert_eq!(parse_published_date("1965"), ymd(1965, 1, 1));
        assert_eq!(parse_published_date("May 2001"), ymd(2001, 1, 1));
        assert_eq!(parse_published_date("unknown"), None);
    }
}
