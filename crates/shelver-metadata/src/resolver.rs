//! Metadata Resolver: folds provider results into one record per book.

use std::sync::Arc;

use futures::StreamExt;
use shelver_core::{AppConfig, DEFAULT_SEED_CONFIDENCE, MetadataRecord, ParsedFilename};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ResolveError};
use crate::merge::merge;
use crate::providers::{GoogleBooksProvider, MetadataProvider, OpenLibraryProvider};

const DEFAULT_CONCURRENCY: usize = 4;

/// Providers in priority order plus resolution knobs.
///
/// Merge order is the provider order, so two resolvers with the same providers
/// in a different order can produce different records.
pub struct Resolver {
    providers: Vec<Arc<dyn MetadataProvider>>,
    seed_confidence: f32,
    concurrency: usize,
}

impl Resolver {
    pub fn new(providers: Vec<Arc<dyn MetadataProvider>>) -> Self {
        Self {
            providers,
            seed_confidence: DEFAULT_SEED_CONFIDENCE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Enabled providers from config, identifier-indexed first.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let mut providers: Vec<Arc<dyn MetadataProvider>> = Vec::new();
        if config.providers.google_books.enabled {
            providers.push(Arc::new(GoogleBooksProvider::new(
                &config.providers.google_books,
                &config.retry,
            )?));
        }
        if config.providers.open_library.enabled {
            providers.push(Arc::new(OpenLibraryProvider::new(
                &config.providers.open_library,
                &config.retry,
            )?));
        }

        Ok(Self::new(providers)
            .with_seed_confidence(config.resolver.seed_confidence)
            .with_concurrency(config.resolver.concurrency))
    }

    pub fn with_seed_confidence(mut self, confidence: f32) -> Self {
        self.seed_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn MetadataProvider>] {
        &self.providers
    }

    /// Resolve one book.
    ///
    /// Provider failures are logged and skipped, so the worst case is the seed
    /// record itself. Only an empty provider list or cancellation is an error.
    pub async fn resolve(
        &self,
        seed: &ParsedFilename,
        cancel: &CancellationToken,
    ) -> Result<MetadataRecord, ResolveError> {
        if self.providers.is_empty() {
            return Err(ResolveError::NoProviders);
        }

        let mut best = MetadataRecord::from_filename(seed, self.seed_confidence);
        // (provider index, identifier) pairs already asked by identifier.
        let mut asked: Vec<(usize, String)> = Vec::new();

        for (index, provider) in self.providers.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }

            if let Some(id) = best.identifier() {
                asked.push((index, id.to_string()));
            }

            match lookup(provider.as_ref(), seed, &best, cancel).await {
                Ok(Some(hit)) => {
                    debug!(
                        provider = provider.id(),
                        confidence = hit.confidence,
                        title = %hit.title,
                        "merging provider result"
                    );
                    best = merge(&best, &hit);
                }
                Ok(None) => debug!(provider = provider.id(), title = %seed.title, "no match"),
                Err(e) if e.is_cancelled() => return Err(ResolveError::Cancelled),
                Err(e) => warn!(provider = provider.id(), error = %e, "provider failed, skipping"),
            }
        }

        let best = self.complete_cover(best, &asked, cancel).await?;
        info!(title = %best.title, source = %best.source, confidence = best.confidence, "resolved");
        Ok(best)
    }

    /// Resolve many books, at most `concurrency` at once. Output order matches `seeds`.
    pub async fn resolve_all(
        &self,
        seeds: &[ParsedFilename],
        cancel: &CancellationToken,
    ) -> Vec<Result<MetadataRecord, ResolveError>> {
        futures::stream::iter(seeds)
            .map(|seed| self.resolve(seed, cancel))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Ask providers, in order, for a cover when the merged record lacks one.
    async fn complete_cover(
        &self,
        best: MetadataRecord,
        asked: &[(usize, String)],
        cancel: &CancellationToken,
    ) -> Result<MetadataRecord, ResolveError> {
        if best.cover_image_url.is_some() {
            return Ok(best);
        }
        let Some(id) = best.identifier().map(str::to_string) else {
            return Ok(best);
        };

        for (index, provider) in self.providers.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }
            // Already returned (or lacked) this book without a cover.
            if asked.iter().any(|(i, asked_id)| *i == index && *asked_id == id) {
                continue;
            }

            match provider.fetch_cover_image(&id, cancel).await {
                Ok(Some(url)) => {
                    debug!(provider = provider.id(), %url, "cover completed");
                    return Ok(MetadataRecord {
                        cover_image_url: Some(url),
                        ..best
                    });
                }
                Ok(None) => {}
                Err(e) if e.is_cancelled() => return Err(ResolveError::Cancelled),
                Err(e) => warn!(provider = provider.id(), error = %e, "cover lookup failed"),
            }
        }

        Ok(best)
    }
}

/// One provider's contribution: identifier lookup when an identifier is known,
/// title/author search otherwise or when the lookup finds nothing.
async fn lookup(
    provider: &dyn MetadataProvider,
    seed: &ParsedFilename,
    best: &MetadataRecord,
    cancel: &CancellationToken,
) -> crate::error::Result<Option<MetadataRecord>> {
    if let Some(id) = best.identifier() {
        match provider.fetch_by_identifier(id, cancel).await {
            Ok(Some(hit)) => return Ok(Some(hit)),
            Ok(None) => debug!(provider = provider.id(), id, "identifier miss, falling back to search"),
            // An unusable identifier from an earlier source must not cost us the search.
            Err(ProviderError::InvalidRequest { reason, .. }) => {
                debug!(provider = provider.id(), id, %reason, "identifier rejected, falling back to search");
            }
            Err(e) => return Err(e),
        }
    }

    let candidates = provider
        .fetch_by_title_author(&seed.title, seed.author.as_deref(), cancel)
        .await?;
    Ok(most_confident(candidates))
}

/// Highest confidence wins; the earlier candidate wins ties.
fn most_confident(candidates: Vec<MetadataRecord>) -> Option<MetadataRecord> {
    candidates
        .into_iter()
        .reduce(|best, candidate| {
            if candidate.confidence > best.confidence {
                candidate
            } else {
                best
            }
        })
}
