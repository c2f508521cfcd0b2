//! Character-level offset remapping with sentinel markers.
//!
//! Used when a block's text changed without the block itself being
//! replaced, or as a whole-text fallback. A unique marker character is
//! inserted at each offset of interest, the marked text is char-diffed
//! against the new text, and wherever the diff drops a marker is where
//! that offset now lives. Markers never reach the live document.

use similar::{ChangeTag, TextDiff};
use tracing::warn;

/// Marker pool: Unicode noncharacters, guaranteed absent from any
/// interchange text and filtered against both inputs anyway.
const SENTINEL_RANGE: (u32, u32) = (0xFDD0, 0xFDEF);

/// Result of carrying a range through a text change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemappedRange {
    pub start: usize,
    pub end: usize,
    /// True when the span length survived: surrounding edits moved the
    /// range without eating into it.
    pub intact: bool,
}

/// Remap one char offset from `prev` to `next`.
pub fn remap_offset(prev: &str, next: &str, offset: usize) -> usize {
    remap_offsets(prev, next, &[offset])[0]
}

/// Remap several char offsets from `prev` to `next` in one diff pass.
///
/// Each offset gets its own marker inserted into a copy of `prev`.
/// Offsets past the end of `prev` count as end-of-text. Deletions are
/// emitted ahead of insertions within a replaced region, so an offset
/// sitting at an edit lands before the replacement text. If the marker
/// pool cannot cover every request, offsets are clamped to the new length
/// instead of remapped.
pub fn remap_offsets(prev: &str, next: &str, offsets: &[usize]) -> Vec<usize> {
    if offsets.is_empty() {
        return Vec::new();
    }
    let next_len = next.chars().count();
    if prev == next {
        return offsets.iter().map(|&offset| offset.min(next_len)).collect();
    }
    let Some(sentinels) = free_sentinels(prev, next, offsets.len()) else {
        warn!(
            points = offsets.len(),
            "sentinel pool exhausted, clamping offsets"
        );
        return offsets.iter().map(|&offset| offset.min(next_len)).collect();
    };

    let mut marked: Vec<char> = prev.chars().collect();
    let prev_len = marked.len();
    // Insert back to front so earlier offsets stay valid.
    let mut order: Vec<usize> = (0..offsets.len()).collect();
    order.sort_by(|&a, &b| offsets[b].cmp(&offsets[a]));
    for &slot in &order {
        marked.insert(offsets[slot].min(prev_len), sentinels[slot]);
    }
    let marked: String = marked.into_iter().collect();

    let diff = TextDiff::from_chars(marked.as_str(), next);
    let mut results = vec![0usize; offsets.len()];
    let mut new_pos = 0usize;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Equal | ChangeTag::Insert => new_pos += 1,
            ChangeTag::Delete => {
                if let Some(c) = change.value().chars().next() {
                    if let Some(slot) = sentinels.iter().position(|&s| s == c) {
                        results[slot] = new_pos;
                    }
                }
            }
        }
    }
    results
}

/// Remap a range, reporting whether its extent survived.
///
/// Both endpoints ride their own sentinel through a single diff pass.
/// When text changes only outside the range the endpoints shift together
/// and the span is intact; edits inside it make the endpoints diverge.
pub fn remap_range(prev: &str, next: &str, start: usize, end: usize) -> RemappedRange {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    let mapped = remap_offsets(prev, next, &[start, end]);
    let (mut new_start, mut new_end) = (mapped[0], mapped[1]);
    if new_start > new_end {
        std::mem::swap(&mut new_start, &mut new_end);
    }
    RemappedRange {
        start: new_start,
        end: new_end,
        intact: new_end - new_start == end - start,
    }
}

fn free_sentinels(prev: &str, next: &str, needed: usize) -> Option<Vec<char>> {
    let mut free = Vec::with_capacity(needed);
    for code in SENTINEL_RANGE.0..=SENTINEL_RANGE.1 {
        let Some(candidate) = char::from_u32(code) else {
            continue;
        };
        if prev.contains(candidate) || next.contains(candidate) {
            continue;
        }
        free.push(candidate);
        if free.len() == needed {
            return Some(free);
        }
    }
    None
}
