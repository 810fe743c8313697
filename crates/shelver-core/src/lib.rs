//! Shelver core: book metadata model, filename heuristics, identity grouping and config.

pub mod config;
pub mod error;
pub mod filename;
pub mod grouping;
pub mod isbn;
pub mod models;
pub mod normalize;

pub use config::{AppConfig, GoogleBooksConfig, OpenLibraryConfig, ResolverConfig, RetryConfig};
pub use error::{CoreError, Result};
pub use filename::{looks_like_author_name, parse};
pub use grouping::{FormatPolicy, group, group_key, preferred_format};
pub use isbn::Isbn;
pub use models::*;
pub use normalize::{normalize_title, trigrams};
