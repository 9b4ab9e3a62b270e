//! Inline `[[...]]` link extraction and classification.
//!
//! This module is pure text processing with no I/O: extraction finds every
//! bracket-pair occurrence, classification assigns each occurrence a link
//! form. Resolution against actual brains and cards lives in `brains-db`.
//!
//! # Rules
//!
//! 1. Occurrences are scanned left to right, non-overlapping, in document order
//! 2. Offsets are byte offsets of the inner text within the source
//! 3. Classification priority: cross-brain, then versioned, then simple
//! 4. `[[brain/title]]` is cross-brain; the first unescaped `/` splits the parts
//! 5. An escaped slash (`\/`) does not split and is unescaped in the title
//! 6. `[[title:vN]]` is versioned; N must be a positive integer
//! 7. Empty or whitespace-only inner text yields no link (dropped, not an error)

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{RawLink, TypedLink};

/// `[[...]]` with a non-empty inner span that contains no closing bracket.
static BRACKET_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]]+)\]\]").expect("bracket pattern is valid"));

/// `title:vN` suffix form for versioned links.
static VERSION_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+):v([1-9][0-9]*)$").expect("version pattern is valid"));

/// Extract every `[[...]]` occurrence from `text`, in document order.
pub fn extract_raw_links(text: &str) -> Vec<RawLink> {
    BRACKET_PAIR
        .captures_iter(text)
        .filter_map(|cap| {
            let inner = cap.get(1)?;
            Some(RawLink {
                text: inner.as_str().to_string(),
                start_offset: inner.start(),
                end_offset: inner.end(),
            })
        })
        .collect()
}

/// Classify one raw link text into its typed form.
///
/// Returns None for empty or whitespace-only text. Priority order matters:
/// the cross-brain split is checked before the version suffix, which is
/// checked before falling through to a simple title.
///
/// Titles are trimmed and slash-unescaped rather than carried byte for
/// byte, so `[[ X ]]` and `[[X]]` address the same card. The stored link
/// text keeps the raw inner span.
pub fn classify(raw_text: &str) -> Option<TypedLink> {
    if raw_text.trim().is_empty() {
        return None;
    }

    if let Some(split_at) = first_unescaped_slash(raw_text) {
        let brain_name = raw_text[..split_at].trim();
        let target_title = raw_text[split_at + 1..].trim();
        if !brain_name.is_empty() && !target_title.is_empty() {
            return Some(TypedLink::CrossBrain {
                brain_name: unescape_slashes(brain_name),
                target_title: unescape_slashes(target_title),
            });
        }
    }

    if let Some(cap) = VERSION_SUFFIX.captures(raw_text) {
        let target_title = cap[1].trim();
        // Version numbers above u32 fall through to a simple title rather
        // than extracting a mangled version.
        if let Ok(version) = cap[2].parse::<u32>() {
            if !target_title.is_empty() {
                return Some(TypedLink::Versioned {
                    target_title: unescape_slashes(target_title),
                    version,
                });
            }
        }
    }

    Some(TypedLink::Simple {
        target_title: unescape_slashes(raw_text.trim()),
    })
}

/// Extract and classify, dropping occurrences that classify to nothing.
pub fn extract_typed_links(text: &str) -> Vec<(RawLink, TypedLink)> {
    extract_raw_links(text)
        .into_iter()
        .filter_map(|raw| classify(&raw.text).map(|typed| (raw, typed)))
        .collect()
}

/// Byte index of the first `/` not preceded by a backslash.
fn first_unescaped_slash(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'/' && (i == 0 || bytes[i - 1] != b'\\') {
            return Some(i);
        }
    }
    None
}

fn unescape_slashes(text: &str) -> String {
    text.replace("\\/", "/")
}
