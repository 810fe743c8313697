//! Identifier-indexed provider backed by the Google Books volumes API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use shelver_core::{GoogleBooksConfig, Isbn, MetadataRecord, RetryConfig, parse_published_date};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::http::{RateLimitedClient, RetryPolicy};
use crate::providers::{MetadataProvider, ScoreProfile, score_match};

pub const PROVIDER_ID: &str = "google_books";

/// An ISBN hit is unambiguous.
const IDENTIFIER_CONFIDENCE: f32 = 0.95;

// ─── API response ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumesResponse {
    #[serde(default)]
    total_items: u32,
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
    page_count: Option<u32>,
    #[serde(default)]
    categories: Vec<String>,
    image_links: Option<ImageLinks>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

impl VolumeInfo {
    fn identifier(&self, kind: &str) -> Option<String> {
        self.industry_identifiers
            .iter()
            .find(|id| id.kind == kind)
            .map(|id| id.identifier.clone())
    }

    /// `None` for volumes without a title; they are useless as metadata.
    fn into_record(self) -> Option<MetadataRecord> {
        let isbn13 = self.identifier("ISBN_13");
        let isbn = self.identifier("ISBN_10");
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let cover_image_url = self
            .image_links
            .and_then(|links| links.thumbnail.or(links.small_thumbnail))
            .map(|url| url.replacen("http://", "https://", 1));

        Some(MetadataRecord {
            title,
            authors: self.authors,
            isbn,
            isbn13,
            publisher: self.publisher,
            published_date: self.published_date.as_deref().and_then(parse_published_date),
            summary: self.description,
            page_count: self.page_count.filter(|&pages| pages > 0),
            language: self.language,
            cover_image_url,
            series: None,
            series_index: None,
            tags: self.categories,
            confidence: 0.0,
            source: PROVIDER_ID.to_string(),
        })
    }
}

// ─── Provider ────────────────────────────────────────────────────────────────

pub struct GoogleBooksProvider {
    client: RateLimitedClient,
    base_url: String,
    api_key: Option<String>,
    max_results: u32,
}

impl GoogleBooksProvider {
    /// Build from config; without an API key the slower keyless interval applies.
    pub fn new(config: &GoogleBooksConfig, retry: &RetryConfig) -> Result<Self> {
        let api_key = config.api_key();
        let interval_ms = if api_key.is_some() {
            config.min_interval_ms
        } else {
            config.keyless_min_interval_ms
        };
        Self::with_params(
            &config.base_url,
            api_key,
            Duration::from_millis(interval_ms),
            RetryPolicy::from(retry),
            config.max_results,
        )
    }

    pub fn with_params(
        base_url: &str,
        api_key: Option<String>,
        min_interval: Duration,
        retry: RetryPolicy,
        max_results: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(PROVIDER_ID, min_interval, retry)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_results: max_results.max(1),
        })
    }

    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }

    async fn query_volumes(
        &self,
        q: &str,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<VolumeInfo>> {
        let mut url = Url::parse(&format!("{}/volumes", self.base_url)).map_err(|e| {
            ProviderError::InvalidRequest {
                provider: PROVIDER_ID.to_string(),
                reason: format!("invalid base URL {}: {e}", self.base_url),
            }
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", q)
                .append_pair("maxResults", &max_results.to_string());
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
        }

        match self.client.get_json::<VolumesResponse>(&url, cancel).await {
            Ok(response) => {
                debug!(provider = PROVIDER_ID, q, total = response.total_items, "volumes query");
                Ok(response.items.into_iter().map(|v| v.volume_info).collect())
            }
            Err(ProviderError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MetadataProvider for GoogleBooksProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn fetch_by_identifier(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<MetadataRecord>> {
        let isbn = Isbn::parse(id).map_err(|e| ProviderError::InvalidRequest {
            provider: PROVIDER_ID.to_string(),
            reason: e.to_string(),
        })?;

        let volumes = self
            .query_volumes(&format!("isbn:{}", isbn.isbn13), 1, cancel)
            .await?;
        Ok(volumes
            .into_iter()
            .find_map(VolumeInfo::into_record)
            .map(|record| MetadataRecord {
                isbn13: Some(isbn.isbn13),
                isbn: isbn.isbn10.or(record.isbn.clone()),
                confidence: IDENTIFIER_CONFIDENCE,
                ..record
            }))
    }

    async fn fetch_by_title_author(
        &self,
        title: &str,
        author: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetadataRecord>> {
        if title.trim().is_empty() {
            return Err(ProviderError::InvalidRequest {
                provider: PROVIDER_ID.to_string(),
                reason: "empty title".to_string(),
            });
        }

        let mut q = format!("intitle:{}", title.trim());
        if let Some(author) = author.map(str::trim).filter(|a| !a.is_empty()) {
            q.push_str(&format!(" inauthor:{author}"));
        }

        let volumes = self.query_volumes(&q, self.max_results, cancel).await?;
        Ok(volumes
            .into_iter()
            .filter_map(VolumeInfo::into_record)
            .map(|record| MetadataRecord {
                confidence: score_match(title, author, &record, ScoreProfile::IDENTIFIER_INDEXED),
                ..record
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    const HOBBIT_VOLUME: &str = r#"{
        "totalItems": 1,
        "items": [{
            "volumeInfo": {
                "title": "The Hobbit",
                "authors": ["J.R.R. Tolkien"],
                "publisher": "Houghton Mifflin Harcourt",
                "publishedDate": "2012-09-18",
                "description": "Bilbo Baggins is a hobbit.",
                "industryIdentifiers": [
                    {"type": "ISBN_10", "identifier": "054792822X"},
                    {"type": "ISBN_13", "identifier": "9780547928227"}
                ],
                "pageCount": 300,
                "categories": ["Fiction"],
                "imageLinks": {"thumbnail": "http://books.google.com/books/content?id=abc"},
                "language": "en"
            }
        }]
    }"#;

    fn provider(base_url: &str) -> GoogleBooksProvider {
        GoogleBooksProvider::with_params(
            base_url,
            None,
            Duration::ZERO,
            RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
            },
            5,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn isbn_lookup_returns_high_confidence_record() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/volumes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "isbn:9780547928227".into()),
                Matcher::UrlEncoded("maxResults".into(), "1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(HOBBIT_VOLUME)
            .create_async()
            .await;

        let record = provider(&server.url())
            .fetch_by_identifier("978-0-547-92822-7", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.title, "The Hobbit");
        assert_eq!(record.confidence, IDENTIFIER_CONFIDENCE);
        assert_eq!(record.source, PROVIDER_ID);
        assert_eq!(record.isbn13.as_deref(), Some("9780547928227"));
        assert_eq!(record.isbn.as_deref(), Some("054792822X"));
        assert_eq!(record.page_count, Some(300));
        assert_eq!(
            record.cover_image_url.as_deref(),
            Some("https://books.google.com/books/content?id=abc")
        );
        assert_eq!(
            record.published_date.map(|d| d.to_string()).as_deref(),
            Some("2012-09-18")
        );
    }

    #[tokio::test]
    async fn isbn_lookup_without_items_is_none() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/volumes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"totalItems": 0}"#)
            .create_async()
            .await;

        let result = provider(&server.url())
            .fetch_by_identifier("9780441172719", &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn malformed_isbn_is_invalid_request() {
        let err = provider("http://127.0.0.1:9")
            .fetch_by_identifier("not-an-isbn", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn title_search_scores_each_candidate() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/volumes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "intitle:The Hobbit inauthor:Tolkien".into()),
                Matcher::UrlEncoded("maxResults".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"totalItems": 3, "items": [
                    {"volumeInfo": {"title": "The Hobbit", "authors": ["J.R.R. Tolkien"],
                        "industryIdentifiers": [{"type": "ISBN_13", "identifier": "9780547928227"}]}},
                    {"volumeInfo": {"title": "The Hobbit: Illustrated Edition", "authors": ["Alan Lee"]}},
                    {"volumeInfo": {"authors": ["Nobody"]}}
                ]}"#,
            )
            .create_async()
            .await;

        let results = provider(&server.url())
            .fetch_by_title_author("The Hobbit", Some("Tolkien"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!((results[0].confidence - 0.95).abs() < 1e-6);
        assert!((results[1].confidence - 0.65).abs() < 1e-6);
    }

    #[tokio::test]
    async fn api_key_is_sent_when_configured() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/volumes")
            .match_query(Matcher::UrlEncoded("key".into(), "secret".into()))
            .with_status(200)
            .with_body(r#"{"totalItems": 0, "items": []}"#)
            .expect(1)
            .create_async()
            .await;

        let provider = GoogleBooksProvider::with_params(
            &server.url(),
            Some("secret".to_string()),
            Duration::ZERO,
            RetryPolicy::default(),
            5,
        )
        .unwrap();
        let results = provider
            .fetch_by_title_author("Dune", None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
        mock.assert_async().await;
    }

    #[test]
    fn keyless_config_uses_slower_interval() {
        let config = GoogleBooksConfig {
            api_key_env: "SHELVER_TEST_UNSET_GOOGLE_KEY".to_string(),
            ..GoogleBooksConfig::default()
        };
        let provider = GoogleBooksProvider::new(&config, &RetryConfig::default()).unwrap();
        assert_eq!(provider.client().gate().min_interval(), Duration::from_secs(2));
    }
}
