use shelver_core::MetadataRecord;

/// Fold `b` into `a`, producing a new record.
///
/// This is **not commutative**: `merge(a, b) != merge(b, a)` in general, and
/// callers must fold results in a fixed priority order.
///
/// - `title`, `confidence`, `source` come from `b` only when `b` is strictly
///   more confident.
/// - `authors` and `tags` are replaced wholesale by `b`'s when non-empty.
/// - Every optional scalar keeps `a`'s value and only takes `b`'s to fill a gap.
pub fn merge(a: &MetadataRecord, b: &MetadataRecord) -> MetadataRecord {
    let head = if b.confidence > a.confidence { b } else { a };

    MetadataRecord {
        title: head.title.clone(),
        confidence: head.confidence,
        source: head.source.clone(),

        authors: replace_if_present(&a.authors, &b.authors),
        tags: replace_if_present(&a.tags, &b.tags),

        isbn: fill(&a.isbn, &b.isbn),
        isbn13: fill(&a.isbn13, &b.isbn13),
        publisher: fill(&a.publisher, &b.publisher),
        published_date: a.published_date.or(b.published_date),
        summary: fill(&a.summary, &b.summary),
        page_count: a.page_count.or(b.page_count),
        language: fill(&a.language, &b.language),
        cover_image_url: fill(&a.cover_image_url, &b.cover_image_url),
        series: fill(&a.series, &b.series),
        series_index: a.series_index.or(b.series_index),
    }
}

fn replace_if_present(a: &[String], b: &[String]) -> Vec<String> {
    if b.is_empty() { a.to_vec() } else { b.to_vec() }
}

fn fill(a: &Option<String>, b: &Option<String>) -> Option<String> {
    a.as_ref().or(b.as_ref()).cloned()
}

#[cfg(test)]
mod tests {
    use shelver_core::{DEFAULT_SEED_CONFIDENCE, FILENAME_SOURCE, ParsedFilename};

    use super::*;

    fn seed() -> MetadataRecord {
        MetadataRecord::from_filename(
            &ParsedFilename {
                title: "The Hobbit".to_string(),
                author: Some("Tolkien".to_string()),
                isbn: None,
            },
            DEFAULT_SEED_CONFIDENCE,
        )
    }

    fn api() -> MetadataRecord {
        MetadataRecord {
            authors: vec!["J.R.R. Tolkien".to_string()],
            isbn13: Some("9780547928227".to_string()),
            publisher: Some("Houghton Mifflin Harcourt".to_string()),
            ..MetadataRecord::new("The Hobbit: Or There and Back Again", "google_books", 0.9)
        }
    }

    #[test]
    fn confident_api_record_wins_over_seed() {
        let merged = merge(&seed(), &api());
        assert_eq!(merged.title, "The Hobbit: Or There and Back Again");
        assert_eq!(merged.authors, vec!["J.R.R. Tolkien"]);
        assert_eq!(merged.confidence, 0.9);
        assert_eq!(merged.source, "google_books");
        assert_eq!(merged.isbn13.as_deref(), Some("9780547928227"));
    }

    #[test]
    fn merge_is_order_sensitive() {
        let forward = merge(&seed(), &api());
        let backward = merge(&api(), &seed());

        assert_ne!(forward, backward);
        // Head stays with the confident record, but the seed's authors replace.
        assert_eq!(backward.title, "The Hobbit: Or There and Back Again");
        assert_eq!(backward.authors, vec!["Tolkien"]);
    }

    #[test]
    fn equal_confidence_keeps_accumulator_head() {
        let a = MetadataRecord::new("First", "one", 0.5);
        let b = MetadataRecord::new("Second", "two", 0.5);
        let merged = merge(&a, &b);
        assert_eq!(merged.title, "First");
        assert_eq!(merged.source, "one");
    }

    #[test]
    fn scalars_are_first_writer_wins() {
        let a = MetadataRecord {
            publisher: Some("Old House".to_string()),
            page_count: Some(100),
            ..MetadataRecord::new("T", "a", 0.3)
        };
        let b = MetadataRecord {
            publisher: Some("New House".to_string()),
            page_count: Some(200),
            language: Some("en".to_string()),
            series_index: Some(2.0),
            ..MetadataRecord::new("T", "b", 0.9)
        };

        let merged = merge(&a, &b);
        assert_eq!(merged.publisher.as_deref(), Some("Old House"));
        assert_eq!(merged.page_count, Some(100));
        assert_eq!(merged.language.as_deref(), Some("en"));
        assert_eq!(merged.series_index, Some(2.0));
    }

    #[test]
    fn empty_lists_do_not_erase() {
        let a = MetadataRecord {
            authors: vec!["Frank Herbert".to_string()],
            tags: vec!["sf".to_string()],
            ..MetadataRecord::new("Dune", FILENAME_SOURCE, 0.2)
        };
        let b = MetadataRecord::new("Dune", "open_library", 0.85);

        let merged = merge(&a, &b);
        assert_eq!(merged.authors, vec!["Frank Herbert"]);
        assert_eq!(merged.tags, vec!["sf"]);
    }

    #[test]
    fn inputs_are_untouched() {
        let a = seed();
        let b = api();
        let _ = merge(&a, &b);
        assert_eq!(a, seed());
        assert_eq!(b, api());
    }
}
