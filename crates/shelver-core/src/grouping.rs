//! Content-identity grouping of format variants.
//!
//! Groups are a pure function of the variant list: rebuild them whenever the
//! catalog changes instead of patching them in place.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::record::non_empty;
use crate::models::{BookGroup, BookVariant, FileFormat, MetadataRecord};
use crate::normalize::normalize_title;

const UNTITLED: &str = "untitled";

/// Identity key of a variant: `isbn:<isbn13>`, else `isbn:<isbn10>`, else
/// `title:<normalized title>`.
pub fn group_key(variant: &BookVariant) -> String {
    group_key_for(&variant.metadata)
}

pub fn group_key_for(metadata: &MetadataRecord) -> String {
    if let Some(isbn13) = non_empty(metadata.isbn13.as_deref()) {
        return format!("isbn:{isbn13}");
    }
    if let Some(isbn) = non_empty(metadata.isbn.as_deref()) {
        return format!("isbn:{isbn}");
    }
    let title = non_empty(Some(metadata.title.as_str())).unwrap_or(UNTITLED);
    format!("title:{}", normalize_title(title))
}

/// Cluster variants by identity key.
///
/// Groups come out in the order their key was first seen; variants keep
/// their input order inside a group.
pub fn group(variants: &[BookVariant]) -> Vec<BookGroup> {
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<BookGroup> = Vec::new();

    for variant in variants {
        let key = group_key(variant);
        let idx = *index_by_key.entry(key.clone()).or_insert_with(|| {
            groups.push(BookGroup {
                group_key: key,
                variants: Vec::new(),
                primary: 0,
            });
            groups.len() - 1
        });
        groups[idx].variants.push(variant.clone());
    }

    for group in &mut groups {
        group.primary = choose_primary_index(&group.variants);
    }
    groups
}

/// How complete a variant's metadata is; the highest score becomes primary.
pub fn completeness_score(metadata: &MetadataRecord) -> u32 {
    let mut score = 0;
    if non_empty(metadata.cover_image_url.as_deref()).is_some() {
        score += 10;
    }
    if metadata.has_summary() {
        score += 5;
    }
    if metadata.has_identifier() {
        score += 3;
    }
    if non_empty(metadata.publisher.as_deref()).is_some() {
        score += 2;
    }
    if !metadata.authors.is_empty() {
        score += 2;
    }
    if metadata.page_count.is_some_and(|pages| pages > 0) {
        score += 1;
    }
    score
}

fn choose_primary_index(variants: &[BookVariant]) -> usize {
    let mut best_idx = 0usize;
    let mut best_score = None;

    for (idx, variant) in variants.iter().enumerate() {
        let score = completeness_score(&variant.metadata);
        if best_score.is_none_or(|best| score > best) {
            best_score = Some(score);
            best_idx = idx;
        }
    }

    best_idx
}

// ─── Preferred formats ─────────────────────────────────────

pub const PURPOSE_READING: &str = "reading";
pub const PURPOSE_TRANSFER: &str = "transfer";

/// Purpose → ordered format priorities.
///
/// Purposes are plain keys so new ones can be added from config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatPolicy {
    priorities: BTreeMap<String, Vec<FileFormat>>,
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self::new()
            .with_purpose(
                PURPOSE_READING,
                [FileFormat::Epub, FileFormat::Pdf, FileFormat::Mobi, FileFormat::Azw3],
            )
            .with_purpose(
                PURPOSE_TRANSFER,
                [FileFormat::Epub, FileFormat::Azw3, FileFormat::Pdf, FileFormat::Txt],
            )
    }
}

impl FormatPolicy {
    /// Empty table; every lookup falls back to group order.
    pub fn new() -> Self {
        Self {
            priorities: BTreeMap::new(),
        }
    }

    pub fn with_purpose(
        mut self,
        purpose: impl Into<String>,
        formats: impl IntoIterator<Item = FileFormat>,
    ) -> Self {
        self.priorities
            .insert(purpose.into(), formats.into_iter().collect());
        self
    }

    pub fn priorities(&self, purpose: &str) -> &[FileFormat] {
        self.priorities
            .get(purpose)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn purposes(&self) -> impl Iterator<Item = &str> {
        self.priorities.keys().map(String::as_str)
    }

    /// Variant to use for `purpose`: the first format in the purpose's list
    /// that the group has, else the group's first variant.
    pub fn preferred_variant<'a>(
        &self,
        group: &'a BookGroup,
        purpose: &str,
    ) -> Option<&'a BookVariant> {
        self.priorities(purpose)
            .iter()
            .find_map(|format| group.variants.iter().find(|v| v.format == *format))
            .or_else(|| group.variants.first())
    }
}

/// [`FormatPolicy::preferred_variant`] as a free function.
pub fn preferred_format<'a>(
    group: &'a BookGroup,
    purpose: &str,
    policy: &FormatPolicy,
) -> Option<&'a BookVariant> {
    policy.preferred_variant(group, purpose)
}
