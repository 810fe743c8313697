use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockito::{Matcher, Server};
use shelver_core::{
    BookVariant, FileFormat, FormatPolicy, MetadataRecord, ParsedFilename, group, parse,
    preferred_format,
};
use shelver_metadata::{
    GoogleBooksProvider, MetadataProvider, OpenLibraryProvider, Resolver, Result, RetryPolicy,
};
use tokio_util::sync::CancellationToken;

const DUNE_ISBN13: &str = "9780441172719";

/// Catalog that knows Dune by title and by ISBN.
struct DuneCatalog;

fn dune(confidence: f32) -> MetadataRecord {
    MetadataRecord {
        authors: vec!["Frank Herbert".to_string()],
        isbn13: Some(DUNE_ISBN13.to_string()),
        publisher: Some("Ace".to_string()),
        ..MetadataRecord::new("Dune", "catalog", confidence)
    }
}

#[async_trait]
impl MetadataProvider for DuneCatalog {
    fn id(&self) -> &str {
        "catalog"
    }

    async fn fetch_by_identifier(
        &self,
        id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<MetadataRecord>> {
        Ok((id == DUNE_ISBN13).then(|| dune(0.95)))
    }

    async fn fetch_by_title_author(
        &self,
        title: &str,
        _author: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<MetadataRecord>> {
        Ok(if title.eq_ignore_ascii_case("dune") {
            vec![dune(0.8)]
        } else {
            Vec::new()
        })
    }
}

fn variants_before_resolution() -> Vec<BookVariant> {
    let epub = MetadataRecord::from_filename(&parse("Dune.epub"), 0.2);
    let mobi = MetadataRecord {
        isbn13: Some(DUNE_ISBN13.to_string()),
        ..MetadataRecord::from_filename(&parse("Dune.mobi"), 0.2)
    };
    vec![
        BookVariant::from_path(Path::new("Dune.epub"), 1_200_000, epub),
        BookVariant::from_path(Path::new("Dune.mobi"), 900_000, mobi),
    ]
}

fn seeds_for(variants: &[BookVariant]) -> Vec<ParsedFilename> {
    variants
        .iter()
        .map(|variant| ParsedFilename {
            title: variant.metadata.title.clone(),
            author: variant.metadata.authors.first().cloned(),
            isbn: variant.metadata.isbn13.clone(),
        })
        .collect()
}

#[tokio::test]
async fn format_variants_collapse_after_resolution() {
    let variants = variants_before_resolution();
    assert_eq!(group(&variants).len(), 2, "unresolved epub only has a title key");

    let resolver = Resolver::new(vec![Arc::new(DuneCatalog)]);
    let resolved = resolver
        .resolve_all(&seeds_for(&variants), &CancellationToken::new())
        .await;

    let variants: Vec<BookVariant> = variants
        .iter()
        .zip(resolved)
        .map(|(variant, record)| variant.with_metadata(record.unwrap()))
        .collect();

    let groups = group(&variants);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group_key, format!("isbn:{DUNE_ISBN13}"));
    assert_eq!(groups[0].formats(), vec![FileFormat::Epub, FileFormat::Mobi]);

    let policy = FormatPolicy::default();
    let reading = preferred_format(&groups[0], "reading", &policy).unwrap();
    assert_eq!(reading.format, FileFormat::Epub);
}

#[tokio::test]
async fn http_providers_resolve_in_priority_order() {
    let mut server = Server::new_async().await;

    // Google Books search finds the ISBN ...
    let _google = server
        .mock("GET", "/books/v1/volumes")
        .match_query(Matcher::UrlEncoded("q".into(), "intitle:Dune".into()))
        .with_status(200)
        .with_body(
            r#"{"totalItems": 1, "items": [{"volumeInfo": {
                "title": "Dune",
                "authors": ["Frank Herbert"],
                "industryIdentifiers": [{"type": "ISBN_13", "identifier": "9780441172719"}]
            }}]}"#,
        )
        .create_async()
        .await;

    // ... which Open Library then looks up directly.
    let open_library = server
        .mock("GET", "/api/books")
        .match_query(Matcher::UrlEncoded(
            "bibkeys".into(),
            "ISBN:9780441172719".into(),
        ))
        .with_status(200)
        .with_body(
            r#"{"ISBN:9780441172719": {
                "title": "Dune",
                "publishers": [{"name": "Ace Books"}],
                "number_of_pages": 604,
                "cover": {"large": "https://covers.openlibrary.org/b/id/1-L.jpg"}
            }}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let retry = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
    };
    let google = GoogleBooksProvider::with_params(
        &format!("{}/books/v1", server.url()),
        None,
        Duration::ZERO,
        retry,
        10,
    )
    .unwrap();
    let open_library_provider =
        OpenLibraryProvider::with_params(&server.url(), Duration::ZERO, retry, 10).unwrap();
    let resolver = Resolver::new(vec![Arc::new(google), Arc::new(open_library_provider)]);

    let record = resolver
        .resolve(&parse("Dune.epub"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.source, "google_books");
    assert_eq!(record.isbn13.as_deref(), Some(DUNE_ISBN13));
    assert_eq!(record.publisher.as_deref(), Some("Ace Books"));
    assert_eq!(record.page_count, Some(604));
    assert_eq!(
        record.cover_image_url.as_deref(),
        Some("https://covers.openlibrary.org/b/id/1-L.jpg")
    );
    open_library.assert_async().await;
}
