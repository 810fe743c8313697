//! Full-text-search provider backed by Open Library.
//!
//! The bibkeys endpoint is tried first for identifiers; when it has nothing,
//! the search endpoint is queried with the ISBN instead.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use shelver_core::{Isbn, MetadataRecord, OpenLibraryConfig, RetryConfig, parse_published_date};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::http::{RateLimitedClient, RetryPolicy};
use crate::providers::{MetadataProvider, ScoreProfile, score_match};

pub const PROVIDER_ID: &str = "open_library";

const COVERS_BASE_URL: &str = "https://covers.openlibrary.org";

pub struct OpenLibraryProvider {
    client: RateLimitedClient,
    base_url: String,
    max_results: u32,
}

impl OpenLibraryProvider {
    pub fn new(config: &OpenLibraryConfig, retry: &RetryConfig) -> Result<Self> {
        Self::with_params(
            &config.base_url,
            Duration::from_millis(config.min_interval_ms),
            RetryPolicy::from(retry),
            config.max_results,
        )
    }

    pub fn with_params(
        base_url: &str,
        min_interval: Duration,
        retry: RetryPolicy,
        max_results: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(PROVIDER_ID, min_interval, retry)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: max_results.max(1),
        })
    }

    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url)).map_err(|e| {
            ProviderError::InvalidRequest {
                provider: PROVIDER_ID.to_string(),
                reason: format!("invalid base URL {}: {e}", self.base_url),
            }
        })?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// GET returning `None` on 404.
    async fn get_optional(&self, url: &Url, cancel: &CancellationToken) -> Result<Option<Value>> {
        match self.client.get_json::<Value>(url, cancel).await {
            Ok(value) => Ok(Some(value)),
            Err(ProviderError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_bibkey(&self, isbn: &Isbn, cancel: &CancellationToken) -> Result<Option<Value>> {
        let bibkey = format!("ISBN:{}", isbn.isbn13);
        let url = self.endpoint(
            "/api/books",
            &[("bibkeys", bibkey.as_str()), ("format", "json"), ("jscmd", "data")],
        )?;
        Ok(self
            .get_optional(&url, cancel)
            .await?
            .and_then(|mut body| body.get_mut(&bibkey).map(Value::take)))
    }

    async fn search(
        &self,
        params: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Vec<MetadataRecord>> {
        let url = self.endpoint("/search.json", params)?;
        let docs = self
            .get_optional(&url, cancel)
            .await?
            .and_then(|body| body.get("docs").and_then(Value::as_array).cloned())
            .unwrap_or_default();
        debug!(provider = PROVIDER_ID, %url, hits = docs.len(), "search");
        Ok(docs.iter().filter_map(record_from_json).collect())
    }
}

#[async_trait]
impl MetadataProvider for OpenLibraryProvider {
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

        let record = match self.fetch_bibkey(&isbn, cancel).await? {
            Some(raw) => record_from_json(&raw),
            None => {
                debug!(provider = PROVIDER_ID, isbn = %isbn.isbn13, "bibkey miss, searching");
                self.search(&[("isbn", isbn.isbn13.as_str()), ("limit", "1")], cancel)
                    .await?
                    .into_iter()
                    .next()
            }
        };

        // Search docs list every edition's ISBNs; the queried one is authoritative.
        Ok(record.map(|record| MetadataRecord {
            isbn13: Some(isbn.isbn13),
            isbn: isbn.isbn10.or(record.isbn.clone()),
            confidence: ScoreProfile::FULL_TEXT.cap,
            ..record
        }))
    }

    async fn fetch_by_title_author(
        &self,
        title: &str,
        author: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetadataRecord>> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ProviderError::InvalidRequest {
                provider: PROVIDER_ID.to_string(),
                reason: "empty title".to_string(),
            });
        }

        let limit = self.max_results.to_string();
        let mut params = vec![("title", title), ("limit", limit.as_str())];
        if let Some(author) = author.map(str::trim).filter(|a| !a.is_empty()) {
            params.push(("author", author));
        }

        Ok(self
            .search(&params, cancel)
            .await?
            .into_iter()
            .map(|record| MetadataRecord {
                confidence: score_match(title, author, &record, ScoreProfile::FULL_TEXT),
                ..record
            })
            .collect())
    }
}

// ─── JSON mapping ────────────────────────────────────────────────────────────

/// Map a bibkeys `data` object or a search doc; `None` when it has no title.
fn record_from_json(v: &Value) -> Option<MetadataRecord> {
    let title = v
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())?
        .to_string();

    // bibkeys: [{"name": ..}], search: ["..", ..]
    let authors = names(v, "authors").or_else(|| names(v, "author_name")).unwrap_or_default();
    let publisher = names(v, "publishers")
        .or_else(|| names(v, "publisher"))
        .and_then(|p| p.into_iter().next());
    let tags = names(v, "subjects")
        .or_else(|| names(v, "subject"))
        .unwrap_or_default();

    let published_date = v
        .get("publish_date")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .or_else(|| {
            v.get("first_publish_year")
                .and_then(Value::as_i64)
                .map(|year| year.to_string())
        })
        .as_deref()
        .and_then(parse_published_date);

    let isbn_candidates: Vec<&str> = ["isbn_13", "isbn_10"]
        .iter()
        .filter_map(|key| v.get("identifiers").and_then(|ids| ids.get(*key)))
        .chain(v.get("isbn"))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_str)
        .collect();
    let isbn13 = first_valid_isbn(&isbn_candidates, 13).map(|isbn| isbn.isbn13);
    let isbn = first_valid_isbn(&isbn_candidates, 10).and_then(|isbn| isbn.isbn10);

    let cover_image_url = v
        .get("cover")
        .and_then(Value::as_object)
        .and_then(|cover| {
            cover
                .get("large")
                .or_else(|| cover.get("medium"))
                .or_else(|| cover.get("small"))
        })
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .or_else(|| {
            v.get("cover_i")
                .and_then(Value::as_i64)
                .map(|id| format!("{COVERS_BASE_URL}/b/id/{id}-L.jpg"))
        });

    let page_count = v
        .get("number_of_pages")
        .or_else(|| v.get("number_of_pages_median"))
        .and_then(Value::as_u64)
        .and_then(|pages| u32::try_from(pages).ok())
        .filter(|&pages| pages > 0);

    let summary = v.get("notes").and_then(|notes| {
        notes
            .as_str()
            .or_else(|| notes.get("value").and_then(Value::as_str))
            .map(ToOwned::to_owned)
    });

    let language = v
        .get("language")
        .and_then(Value::as_array)
        .and_then(|langs| langs.first())
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    Some(MetadataRecord {
        authors,
        isbn,
        isbn13,
        publisher,
        published_date,
        summary,
        page_count,
        language,
        cover_image_url,
        tags,
        ..MetadataRecord::new(title, PROVIDER_ID, 0.0)
    })
}

/// First candidate of `digits` length that passes the checksum.
fn first_valid_isbn(candidates: &[&str], digits: usize) -> Option<Isbn> {
    candidates
        .iter()
        .filter(|raw| raw.len() == digits)
        .find_map(|raw| Isbn::parse(raw).ok())
}

/// String list under `key`, where items are plain strings or `{"name": ..}`.
fn names(v: &Value, key: &str) -> Option<Vec<String>> {
    v.get(key).and_then(Value::as_array).map(|arr| {
        arr.iter()
            .filter_map(|item| {
                item.get("name")
                    .and_then(Value::as_str)
                    .or_else(|| item.as_str())
            })
            .map(ToOwned::to_owned)
            .collect()
    })
}
