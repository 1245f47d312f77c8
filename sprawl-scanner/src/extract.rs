//! Quote-delimited hyperlink scanning.
//!
//! This is a line heuristic, not an HTML parser. A candidate starts at any
//! `http` substring and ends at the next `"`, so it assumes attribute-quoted
//! hrefs. Attribute names, comments, single-quoted values and escaped quotes
//! are not understood, and that is the intended scope.

use url::Url;

/// Candidates longer than this many characters are discarded.
pub const MAX_URL_LEN: usize = 1000;

const SCHEME_MARKER: &str = "http";
const CLOSING_QUOTE: char = '"';

/// Lazy iterator over the candidate URLs found in one line of text.
///
/// Clone it before consuming, or call [`extract_hyperlinks`] again, to scan
/// the same line a second time.
#[derive(Debug, Clone)]
pub struct Hyperlinks<'a> {
    line: &'a str,
    cursor: usize,
}

/// Scan `line` for quoted `http...` candidates, left to right.
pub fn extract_hyperlinks(line: &str) -> Hyperlinks<'_> {
    Hyperlinks { line, cursor: 0 }
}

impl<'a> Iterator for Hyperlinks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while self.cursor < self.line.len() {
            let Some(offset) = self.line[self.cursor..].find(SCHEME_MARKER) else {
                self.cursor = self.line.len();
                return None;
            };
            let start = self.cursor + offset;

            // An unterminated candidate ends the scan of this line.
            let Some(offset) = self.line[start + 1..].find(CLOSING_QUOTE) else {
                self.cursor = self.line.len();
                return None;
            };
            let end = start + 1 + offset;

            // Resume right after the closing quote, never inside the match.
            self.cursor = end + 1;

            let candidate = strip_trailing_slash(&self.line[start..end]);
            if candidate.chars().count() <= MAX_URL_LEN {
                return Some(candidate);
            }
        }
        None
    }
}

impl std::iter::FusedIterator for Hyperlinks<'_> {}

/// Remove exactly one trailing `/`, if present.
pub fn strip_trailing_slash(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// Normalize a raw URL into its identity key.
///
/// Strips one trailing `/` and rejects anything over [`MAX_URL_LEN`]
/// characters or not parseable as an absolute URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = strip_trailing_slash(raw.trim());
    if is_valid_url(trimmed) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// True when `candidate` is short enough and parses as an absolute URL
/// with a host.
pub fn is_valid_url(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.chars().count() <= MAX_URL_LEN
        && Url::parse(candidate).is_ok_and(|url| url.has_host())
}
