//! Heuristic (title, author) extraction from raw ebook filenames.
//!
//! Rules run in a fixed order and the first one that matches wins:
//!
//! 1. trailing `(Author)` / `[Author]`
//! 2. `Title by Author`, when the right side looks like a person's name
//! 3. `A - B` (also en dash / em dash), sides classified with [`looks_like_author_name`]
//! 4. whole stem as title
//!
//! Parsing never fails; it always produces some title.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::isbn::Isbn;
use crate::models::ParsedFilename;
use crate::normalize::collapse_whitespace;

/// Capitalized word, optionally ending in a period for initials ("J.", "Herbert").
static NAME_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z]*\.?$").expect("valid name word regex"));

/// Separators for the dash rule, in priority order.
const DASH_SEPARATORS: &[&str] = &[" - ", " \u{2013} ", " \u{2014} "];

const MAX_NAME_WORDS: usize = 6;
const MAX_EXTENSION_LEN: usize = 5;

/// Extract a best-effort title and author from `filename`.
pub fn parse(filename: &str) -> ParsedFilename {
    let stem = strip_extension(filename.trim());
    let spaced = stem.replace('_', " ");
    let isbn = Isbn::find_in(&spaced).map(|found| found.isbn13);

    let (title, author) = split_bracketed_author(&spaced)
        .or_else(|| split_by_author(&spaced))
        .or_else(|| split_on_dash(&spaced))
        .map(|(title, author)| (title, Some(author)))
        .unwrap_or_else(|| (fallback_title(&spaced, stem), None));

    trace!(filename, %title, ?author, "parsed filename");
    ParsedFilename {
        title,
        author,
        isbn,
    }
}

/// Whether `text` reads like a person's name: 1..=6 words, at least half of
/// them capitalized (initials with a trailing period count).
///
/// This is a hint for the filename rules, not a validation.
pub fn looks_like_author_name(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || words.len() > MAX_NAME_WORDS {
        return false;
    }
    let name_like = words.iter().filter(|w| NAME_WORD_RE.is_match(w)).count();
    name_like * 2 >= words.len()
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=MAX_EXTENSION_LEN).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => name,
    }
}

fn split_bracketed_author(s: &str) -> Option<(String, String)> {
    let s = s.trim_end();
    let open = match s.chars().last()? {
        ')' => '(',
        ']' => '[',
        _ => return None,
    };
    let start = s.rfind(open)?;
    let author = s[start + open.len_utf8()..s.len() - 1].trim();
    let title = s[..start].trim();
    if title.is_empty() || author.is_empty() {
        return None;
    }
    Some((title.to_string(), author.to_string()))
}

fn split_by_author(s: &str) -> Option<(String, String)> {
    // ASCII lowercasing keeps byte offsets aligned with `s`.
    let idx = s.to_ascii_lowercase().find(" by ")?;
    let title = s[..idx].trim();
    let author = s[idx + " by ".len()..].trim();
    if title.is_empty() || !looks_like_author_name(author) {
        return None;
    }
    Some((title.to_string(), author.to_string()))
}

fn split_on_dash(s: &str) -> Option<(String, String)> {
    let (left, right) = DASH_SEPARATORS
        .iter()
        .find_map(|sep| s.split_once(sep))?;
    let (left, right) = (left.trim(), right.trim());
    if left.is_empty() || right.is_empty() {
        return None;
    }

    let left_is_name = looks_like_author_name(left);
    let right_is_name = looks_like_author_name(right);
    match (left_is_name, right_is_name) {
        (false, true) => Some((left.to_string(), right.to_string())),
        (true, false) => Some((right.to_string(), left.to_string())),
        // Both read as names: keep the "Title - Author" reading.
        (true, true) => Some((left.to_string(), right.to_string())),
        (false, false) => None,
    }
}

fn fallback_title(s: &str, stem: &str) -> String {
    let dashless = s.replace(['-', '\u{2013}', '\u{2014}'], " ");
    let title = collapse_whitespace(&dashless);
    if !title.is_empty() {
        return title;
    }
    match stem.trim() {
        "" => stem.to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(title: &str, author: Option<&str>) -> (String, Option<String>) {
        (title.to_string(), author.map(str::to_string))
    }

    fn run(filename: &str) -> (String, Option<String>) {
        let p = parse(filename);
        (p.title, p.author)
    }

    #[test]
    fn title_dash_author() {
        assert_eq!(
            run("The Hobbit - J.R.R. Tolkien.epub"),
            parsed("The Hobbit", Some("J.R.R. Tolkien"))
        );
    }

    #[test]
    fn author_dash_title() {
        assert_eq!(
            run("Frank Herbert - the spice must flow.mobi"),
            parsed("the spice must flow", Some("Frank Herbert"))
        );
    }

    #[test]
    fn en_and_em_dash_separators() {
        assert_eq!(
            run("dune messiah \u{2013} Frank Herbert.epub"),
            parsed("dune messiah", Some("Frank Herbert"))
        );
        assert_eq!(
            run("children of dune \u{2014} Frank Herbert.pdf"),
            parsed("children of dune", Some("Frank Herbert"))
        );
    }

    #[test]
    fn underscores_and_no_pattern() {
        assert_eq!(
            run("Report_Final_Draft.pdf"),
            parsed("Report Final Draft", None)
        );
    }

    #[test]
    fn bracketed_author() {
        assert_eq!(
            run("Dune (Frank Herbert).epub"),
            parsed("Dune", Some("Frank Herbert"))
        );
        assert_eq!(
            run("Neuromancer [William Gibson].azw3"),
            parsed("Neuromancer", Some("William Gibson"))
        );
    }

    #[test]
    fn empty_brackets_fall_through() {
        assert_eq!(run("Dune ().epub"), parsed("Dune ()", None));
    }

    #[test]
    fn title_by_author() {
        assert_eq!(
            run("the left hand of darkness BY Ursula K. Le Guin.epub"),
            parsed("the left hand of darkness", Some("Ursula K. Le Guin"))
        );
    }

    #[test]
    fn by_with_non_name_falls_through() {
        assert_eq!(
            run("stand by me and other stories.txt"),
            parsed("stand by me and other stories", None)
        );
    }

    #[test]
    fn dash_with_no_names_is_title_only() {
        assert_eq!(
            run("notes - draft - v2.txt"),
            parsed("notes draft v2", None)
        );
    }

    #[test]
    fn extension_is_only_stripped_when_it_looks_like_one() {
        assert_eq!(run("Mr. Smith Goes"), parsed("Mr. Smith Goes", None));
        assert_eq!(run("archive.tar.gz"), parsed("archive.tar", None));
    }

    #[test]
    fn title_is_never_empty() {
        assert_eq!(run("---.pdf").0, "---");
        assert_eq!(run("_.epub").0, "_");
        assert!(!run("  x  ").0.is_empty());
    }

    #[test]
    fn isbn_in_filename_is_reported() {
        let p = parse("Dune_9780441172719.epub");
        assert_eq!(p.isbn.as_deref(), Some("9780441172719"));
        assert_eq!(parse("Dune.epub").isbn, None);
    }

    #[test]
    fn name_classifier() {
        assert!(looks_like_author_name("J.R.R. Tolkien"));
        assert!(looks_like_author_name("Ursula K. Le Guin"));
        assert!(looks_like_author_name("Frank herbert"));
        assert!(!looks_like_author_name("the spice must flow"));
        assert!(!looks_like_author_name(""));
        assert!(!looks_like_author_name("A B C D E F G"));
    }
}
