//! Text segmentation into bounded-length pieces
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//!
//! Lengths are counted in chars, so multi-byte text is never cut inside a
//! character.

use crate::core::error::{DeliveryError, Result};

/// How far before the limit to look for a natural boundary
pub const BOUNDARY_WINDOW: usize = 50;

/// Punctuation that may end a segment when no whitespace is in reach
const CLAUSE_PUNCTUATION: [char; 6] = ['.', ',', '!', '?', ';', ':'];

/// Trim input and reject blank text before it reaches [`split`]
pub fn prepare_text(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DeliveryError::InputEmpty);
    }
    Ok(trimmed)
}

/// Split text into segments of at most `max_length` chars
///
/// Prefers cutting before the last whitespace in the window preceding the
/// limit, then after the last clause punctuation, and hard-cuts at the limit
/// only when neither exists.
pub fn split(text: &str, max_length: usize) -> Vec<String> {
    let max_length = max_length.max(1);
    let mut segments = Vec::new();
    let mut remaining = text.trim();

    while !remaining.is_empty() {
        let head: Vec<(usize, char)> = remaining.char_indices().take(max_length + 1).collect();
        if head.len() <= max_length {
            segments.push(remaining.to_string());
            break;
        }

        let cut = find_cut(&head, max_length);
        let (segment, rest) = remaining.split_at(cut);
        let segment = segment.trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        remaining = rest.trim();
    }

    segments
}

/// Byte offset to cut at; `head` holds the first `max_length + 1` chars
fn find_cut(head: &[(usize, char)], max_length: usize) -> usize {
    let window = &head[max_length.saturating_sub(BOUNDARY_WINDOW)..max_length];

    if let Some(&(offset, _)) = window.iter().rev().find(|(_, ch)| ch.is_whitespace()) {
        if offset > 0 {
            return offset;
        }
    }

    if let Some(&(offset, ch)) = window
        .iter()
        .rev()
        .find(|(_, ch)| CLAUSE_PUNCTUATION.contains(ch))
    {
        return offset + ch.len_utf8();
    }

    head[max_length].0
}

/// Rough segment count for a live counter, before actually splitting
pub fn estimate_segments(text: &str, max_length: usize) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let chars = trimmed.chars().count();
    chars.div_ceil(max_length.max(1)).max(1)
}
