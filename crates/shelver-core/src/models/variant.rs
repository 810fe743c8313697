use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::grouping::group_key_for;
use crate::models::MetadataRecord;

// ─── FileFormat ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Epub,
    Pdf,
    Mobi,
    Azw3,
    Fb2,
    Djvu,
    Txt,
    Html,
    Cbz,
    Cbr,
    Other,
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Epub => "epub",
            Self::Pdf => "pdf",
            Self::Mobi => "mobi",
            Self::Azw3 => "azw3",
            Self::Fb2 => "fb2",
            Self::Djvu => "djvu",
            Self::Txt => "txt",
            Self::Html => "html",
            Self::Cbz => "cbz",
            Self::Cbr => "cbr",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl FileFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "epub" => Self::Epub,
            "pdf" => Self::Pdf,
            "mobi" | "prc" => Self::Mobi,
            "azw3" | "azw" => Self::Azw3,
            "fb2" => Self::Fb2,
            "djvu" => Self::Djvu,
            "txt" | "text" => Self::Txt,
            "html" | "htm" => Self::Html,
            "cbz" => Self::Cbz,
            "cbr" => Self::Cbr,
            _ => Self::Other,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .map(|ext| Self::from_extension(&ext.to_string_lossy()))
            .unwrap_or(Self::Other)
    }
}

// ─── BookVariant ────────────────────────────────────────────

/// One physical file of a logical book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookVariant {
    /// Identity key derived from `metadata` when the variant was built.
    pub identity_key: String,
    pub format: FileFormat,
    pub file_size_bytes: u64,
    pub metadata: MetadataRecord,
}

impl BookVariant {
    pub fn new(format: FileFormat, file_size_bytes: u64, metadata: MetadataRecord) -> Self {
        Self {
            identity_key: group_key_for(&metadata),
            format,
            file_size_bytes,
            metadata,
        }
    }

    /// Variant for a file on disk, format taken from its extension.
    pub fn from_path(path: &Path, file_size_bytes: u64, metadata: MetadataRecord) -> Self {
        Self::new(FileFormat::from_path(path), file_size_bytes, metadata)
    }

    /// Same file with freshly resolved metadata; the identity key follows it.
    pub fn with_metadata(&self, metadata: MetadataRecord) -> Self {
        Self::new(self.format, self.file_size_bytes, metadata)
    }
}

// ─── BookGroup ──────────────────────────────────────────────

/// Format variants that share one identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookGroup {
    pub group_key: String,
    pub variants: Vec<BookVariant>,
    /// Index into `variants` of the most complete record.
    pub primary: usize,
}

impl BookGroup {
    pub fn primary_variant(&self) -> Option<&BookVariant> {
        self.variants.get(self.primary)
    }

    pub fn formats(&self) -> Vec<FileFormat> {
        self.variants.iter().map(|v| v.format).collect()
    }
}
