//! Revision token parsing
//!
//! Tokens of the form `<major>.<minor>` with an all-digit minor take part in
//! the previous-revision heuristic. Anything else is opaque.

use std::sync::OnceLock;

use regex::Regex;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([^.]+)\.([0-9]+)$").expect("static revision pattern"))
}

/// A parsed `<major>.<minor>` revision token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionToken<'a> {
    pub major: &'a str,
    pub minor: u64,
    /// Digit count of the minor as written, for zero-padded numbering.
    pub minor_width: usize,
}

impl<'a> RevisionToken<'a> {
    /// Parses a token; `None` for anything not matching `<major>.<minor>`.
    pub fn parse(token: &'a str) -> Option<Self> {
        let captures = token_pattern().captures(token)?;
        let major = captures.get(1)?.as_str();
        let minor_digits = captures.get(2)?.as_str();
        let minor = minor_digits.parse::<u64>().ok()?;
        Some(Self {
            major,
            minor,
            minor_width: minor_digits.len(),
        })
    }

    /// Tokens that could name the immediately preceding revision, most
    /// likely first. Empty when the minor is already zero.
    pub fn predecessor_candidates(&self) -> Vec<String> {
        let Some(prev) = self.minor.checked_sub(1) else {
            return Vec::new();
        };
        let padded = format!("{}.{:0width$}", self.major, prev, width = self.minor_width);
        let plain = format!("{}.{}", self.major, prev);
        if padded == plain {
            vec![plain]
        } else {
            vec![padded, plain]
        }
    }
}
