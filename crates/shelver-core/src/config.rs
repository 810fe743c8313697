use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::grouping::FormatPolicy;
use crate::models::DEFAULT_SEED_CONFIDENCE;

/// Root configuration, loaded from `~/.config/shelver/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub providers: ProvidersConfig,
    pub retry: RetryConfig,
    pub resolver: ResolverConfig,
    /// Purpose → ordered format tokens, e.g. `reading = ["epub", "pdf"]`.
    pub formats: FormatPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub google_books: GoogleBooksConfig,
    pub open_library: OpenLibraryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleBooksConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub min_interval_ms: u64,
    /// Interval used when no API key is available.
    pub keyless_min_interval_ms: u64,
    pub max_results: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenLibraryConfig {
    pub enabled: bool,
    pub base_url: String,
    pub min_interval_ms: u64,
    pub max_results: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request when the provider answers 429/403.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Books resolved at once by batch resolution.
    pub concurrency: usize,
    pub seed_confidence: f32,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.googleapis.com/books/v1".to_string(),
            api_key_env: "SHELVER_GOOGLE_BOOKS_KEY".to_string(),
            min_interval_ms: 1000,
            keyless_min_interval_ms: 2000,
            max_results: 10,
        }
    }
}

impl Default for OpenLibraryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://openlibrary.org".to_string(),
            min_interval_ms: 1000,
            max_results: 10,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            seed_confidence: DEFAULT_SEED_CONFIDENCE,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl GoogleBooksConfig {
    /// API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl AppConfig {
    /// Standard config file path: `~/.config/shelver/config.toml`
    pub fn config_path() -> PathBuf {
        // Allow override via env var
        if let Ok(path) = std::env::var("SHELVER_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("shelver")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(CoreError::ConfigError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.resolver.concurrency == 0 {
            return Err(CoreError::ConfigError(
                "resolver.concurrency must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.resolver.seed_confidence) {
            return Err(CoreError::ConfigError(format!(
                "resolver.seed_confidence must be within [0, 1], got {}",
                self.resolver.seed_confidence
            )));
        }
        Ok(())
    }
}
