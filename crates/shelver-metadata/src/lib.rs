//! Shelver metadata: rate-limited providers, confidence-weighted merge and resolution.

pub mod error;
pub mod http;
pub mod merge;
pub mod providers;
pub mod resolver;

pub use error::{ProviderError, ResolveError, Result};
pub use http::{RateGate, RateLimitedClient, RetryPolicy};
pub use merge::merge;
pub use providers::{
    GoogleBooksProvider, MetadataProvider, OpenLibraryProvider, ScoreProfile, score_match,
};
pub use resolver::Resolver;
