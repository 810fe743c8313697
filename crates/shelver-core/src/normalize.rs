//! Pure string transforms shared by the filename parser, the grouper and search.

use std::collections::BTreeSet;

const LEADING_ARTICLES: &[&str] = &["the ", "a ", "an "];

/// Canonical comparison form of a title.
///
/// Lowercases, drops one leading English article, turns every run of
/// non-alphanumeric characters into a single space and trims. A title whose
/// cleaned form still starts with an article ("  The Hobbit", "The A Team") is
/// passed through again until nothing changes, so the function is idempotent.
pub fn normalize_title(title: &str) -> String {
    let mut current = normalize_title_once(title);
    loop {
        let next = normalize_title_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_title_once(title: &str) -> String {
    let lowercase = title.to_lowercase();
    let without_article = LEADING_ARTICLES
        .iter()
        .find_map(|article| lowercase.strip_prefix(article))
        .unwrap_or(&lowercase);

    let cleaned: String = without_article
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&cleaned)
}

/// Collapse runs of whitespace to a single space and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Character trigrams of the lowercased, trimmed input.
///
/// Inputs shorter than three characters yield themselves as the only element.
pub fn trigrams(s: &str) -> BTreeSet<String> {
    let normalized = s.trim().to_lowercase();
    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() < 3 {
        return BTreeSet::from([normalized]);
    }
    chars
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_article_and_punctuation() {
        assert_eq!(normalize_title("The  Hobbit!!"), "hobbit");
        assert_eq!(normalize_title("An Unexpected Journey"), "unexpected journey");
        assert_eq!(normalize_title("A Game of Thrones"), "game of thrones");
    }

    #[test]
    fn article_needs_a_following_word() {
        assert_eq!(normalize_title("The The"), "the");
        assert_eq!(normalize_title("Theory of Everything"), "theory of everything");
        assert_eq!(normalize_title("Anathem"), "anathem");
    }

    #[test]
    fn article_after_leading_punctuation() {
        assert_eq!(normalize_title("  The Hobbit"), "hobbit");
        assert_eq!(normalize_title("...the hobbit"), "hobbit");
    }

    #[test]
    fn idempotent_on_awkward_inputs() {
        let inputs = [
            "The  Hobbit!!",
            "...the hobbit",
            "  A  ",
            "The a An",
            "--An--Apple--",
            "Über die Brücke",
            "",
            "the",
            "C++ Primer (5th Edition)",
        ];
        for input in inputs {
            let once = normalize_title(input);
            assert_eq!(normalize_title(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn trigrams_of_short_and_long_strings() {
        assert_eq!(trigrams(" Ab "), BTreeSet::from(["ab".to_string()]));
        let grams = trigrams("Dune");
        assert_eq!(
            grams,
            BTreeSet::from(["dun".to_string(), "une".to_string()])
        );
    }
}
