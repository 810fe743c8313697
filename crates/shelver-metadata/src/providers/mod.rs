//! External metadata sources.
//!
//! Every provider owns its own [`RateLimitedClient`](crate::http::RateLimitedClient),
//! so rate-limit state is per instance and tests can build providers in
//! isolation.

use async_trait::async_trait;
use shelver_core::MetadataRecord;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub mod google_books;
pub mod open_library;
pub mod scoring;

pub use google_books::GoogleBooksProvider;
pub use open_library::OpenLibraryProvider;
pub use scoring::{ScoreProfile, score_match};

/// Capability shared by all metadata sources.
///
/// "No match" is `Ok(None)` / an empty list, never an error.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Stable id stamped into [`MetadataRecord::source`].
    fn id(&self) -> &str;

    async fn fetch_by_identifier(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<MetadataRecord>>;

    /// Candidates for a title (and optional author), each with its own confidence.
    async fn fetch_by_title_author(
        &self,
        title: &str,
        author: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetadataRecord>>;

    /// Cover image URL for an identifier.
    async fn fetch_cover_image(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        Ok(self
            .fetch_by_identifier(id, cancel)
            .await?
            .and_then(|record| record.cover_image_url))
    }
}
