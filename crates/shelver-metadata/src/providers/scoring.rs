use shelver_core::MetadataRecord;

/// Additive confidence scheme for search hits, capped per provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreProfile {
    pub cap: f32,
    /// Added when the candidate carries an ISBN.
    pub identifier_bonus: f32,
}

impl ScoreProfile {
    /// Identifier-indexed catalogs: precise matches, high ceiling.
    pub const IDENTIFIER_INDEXED: Self = Self {
        cap: 0.95,
        identifier_bonus: 0.05,
    };

    /// Full-text library search: fuzzier matches, lower ceiling.
    pub const FULL_TEXT: Self = Self {
        cap: 0.85,
        identifier_bonus: 0.0,
    };
}

const BASE: f32 = 0.5;
const EXACT_TITLE: f32 = 0.3;
const PARTIAL_TITLE: f32 = 0.15;
const AUTHOR_MATCH: f32 = 0.15;

/// Confidence that `candidate` is the book asked for by `title` / `author`.
pub fn score_match(
    title: &str,
    author: Option<&str>,
    candidate: &MetadataRecord,
    profile: ScoreProfile,
) -> f32 {
    let mut score = BASE;

    let wanted = title.trim().to_lowercase();
    let got = candidate.title.trim().to_lowercase();
    if !wanted.is_empty() && !got.is_empty() {
        if wanted == got {
            score += EXACT_TITLE;
        } else if wanted.contains(&got) || got.contains(&wanted) {
            score += PARTIAL_TITLE;
        }
    }

    if let Some(author) = author.map(|a| a.trim().to_lowercase()).filter(|a| !a.is_empty())
        && candidate.authors.iter().any(|candidate_author| {
            let candidate_author = candidate_author.to_lowercase();
            candidate_author.contains(&author) || author.contains(&candidate_author)
        })
    {
        score += AUTHOR_MATCH;
    }

    if candidate.has_identifier() {
        score += profile.identifier_bonus;
    }

    score.min(profile.cap)
}
