//! Escape encoder for the host's restricted-charset transport.
//!
//! # Invariants
//! - Code points up to U+007F are emitted unchanged.
//! - Code points up to U+FFFF become `\uXXXX` (lowercase hex, 4 digits).
//! - Code points above U+FFFF become `\u{X...}` so the escape stays one
//!   unambiguous token.
//! - Encoding is fragment-based: ASCII runs are borrowed, escapes owned.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::iter::FusedIterator;

static ESCAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\u(?:\{([0-9a-fA-F]{1,6})\}|([0-9a-fA-F]{4}))").expect("valid escape regex")
});

/// Encodes `text` into one host-safe string.
pub fn encode(text: &str) -> String {
    encode_fragments(text).collect()
}

/// Returns the encoded fragments of `text`.
///
/// The iterator is `Clone`, so a caller can restart from any point.
pub fn encode_fragments(text: &str) -> EncodedFragments<'_> {
    EncodedFragments { rest: text }
}

/// Reverses [`encode`].
///
/// Malformed escapes and escapes of non-scalar values (surrogates) are left
/// as literal text.
pub fn decode(text: &str) -> String {
    ESCAPE_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let hex = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Iterator over encoded fragments of one response.
#[derive(Debug, Clone)]
pub struct EncodedFragments<'a> {
    rest: &'a str,
}

impl<'a> Iterator for EncodedFragments<'a> {
    type Item = Cow<'a, str>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        if first.is_ascii() {
            let end = self
                .rest
                .find(|c: char| !c.is_ascii())
                .unwrap_or(self.rest.len());
            let (run, rest) = self.rest.split_at(end);
            self.rest = rest;
            return Some(Cow::Borrowed(run));
        }

        self.rest = &self.rest[first.len_utf8()..];
        Some(Cow::Owned(escape_code_point(first)))
    }
}

impl FusedIterator for EncodedFragments<'_> {}

fn escape_code_point(c: char) -> String {
    let code_point = u32::from(c);
    if code_point <= 0xFFFF {
        format!("\\u{code_point:04x}")
    } else {
        format!("\\u{{{code_point:x}}}")
    }
}
