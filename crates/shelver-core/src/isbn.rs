//! ISBN-10 / ISBN-13 validation and normalization.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Candidate ISBN tokens inside free text: 13 digits, or 9 digits plus a
/// digit/X check character, optionally broken up by hyphens.
static ISBN_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:97[89]-?)?\d{1,5}-?\d{1,7}-?\d{1,7}-?[\dX]\b")
        .expect("valid ISBN token regex")
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Isbn {
    pub raw: String,
    pub isbn13: String,
    pub isbn10: Option<String>,
}

fn strip_isbn(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

fn isbn13_check_digit(first12: &[u8]) -> u8 {
    let sum: u32 = first12
        .iter()
        .enumerate()
        .map(|(i, &d)| if i % 2 == 0 { d as u32 } else { d as u32 * 3 })
        .sum();
    ((10 - (sum % 10)) % 10) as u8
}

fn isbn10_check_char(first9: &[u8]) -> char {
    let sum: u32 = first9
        .iter()
        .enumerate()
        .map(|(i, &d)| (10 - i as u32) * d as u32)
        .sum();
    match (11 - (sum % 11)) % 11 {
        10 => 'X',
        d => (b'0' + d as u8) as char,
    }
}

fn digits_to_string(digits: &[u8]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

impl Isbn {
    /// Parse and checksum-validate an ISBN in any common notation
    /// (`978-0-547-92822-7`, `0547928220`, `ISBN 0-547-92822-0`).
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let without_prefix = trimmed
            .strip_prefix("ISBN")
            .or_else(|| trimmed.strip_prefix("isbn"))
            .unwrap_or(trimmed)
            .trim_start_matches([':', ' ']);
        let stripped = strip_isbn(without_prefix);
        let invalid = || CoreError::InvalidIsbn(input.to_string());

        match stripped.len() {
            13 => {
                let digits: Vec<u8> = stripped
                    .bytes()
                    .map(|b| b.wrapping_sub(b'0'))
                    .collect();
                if digits.iter().any(|&d| d > 9) || !stripped.starts_with("97") {
                    return Err(invalid());
                }
                if isbn13_check_digit(&digits[..12]) != digits[12] {
                    return Err(invalid());
                }
                let isbn10 = stripped.starts_with("978").then(|| {
                    let body = &digits[3..12];
                    let mut s = digits_to_string(body);
                    s.push(isbn10_check_char(body));
                    s
                });
                Ok(Self {
                    raw: input.to_string(),
                    isbn13: stripped,
                    isbn10,
                })
            }
            10 => {
                let mut digits: Vec<u8> = Vec::with_capacity(10);
                for (i, c) in stripped.chars().enumerate() {
                    match c {
                        'X' if i == 9 => digits.push(10),
                        c if c.is_ascii_digit() => digits.push(c as u8 - b'0'),
                        _ => return Err(invalid()),
                    }
                }
                let sum: u32 = digits
                    .iter()
                    .enumerate()
                    .map(|(i, &d)| (10 - i as u32) * d as u32)
                    .sum();
                if sum % 11 != 0 {
                    return Err(invalid());
                }
                let mut d13: Vec<u8> = vec![9, 7, 8];
                d13.extend_from_slice(&digits[..9]);
                d13.push(isbn13_check_digit(&d13));
                Ok(Self {
                    raw: input.to_string(),
                    isbn13: digits_to_string(&d13),
                    isbn10: Some(stripped),
                })
            }
            _ => Err(invalid()),
        }
    }

    /// First checksum-valid ISBN found anywhere in `text`.
    pub fn find_in(text: &str) -> Option<Self> {
        ISBN_TOKEN_RE
            .find_iter(text)
            .find_map(|m| Self::parse(m.as_str()).ok())
    }
}
