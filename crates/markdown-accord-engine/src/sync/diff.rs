//! Block sequence alignment via signature-encoded character diffing.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use similar::{DiffOp, TextDiff};
use tracing::warn;

use crate::editing::Block;
use crate::sync::signature::BlockSignature;

/// Kind of a [`DiffChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOp {
    Equal,
    Insert,
    Delete,
}

/// One run of an alignment between two block sequences.
///
/// `prev_index` and `next_index` are the run's starting positions in the
/// two index spaces. A side with no blocks in the run (the next side of a
/// delete, the prev side of an insert) still carries the position where
/// the run sits in that space. Chunks are emitted in order and partition
/// both sequences completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffChunk {
    pub op: ChunkOp,
    pub prev_index: usize,
    pub next_index: usize,
    pub count: usize,
}

impl DiffChunk {
    pub fn equal(prev_index: usize, next_index: usize, count: usize) -> Self {
        Self {
            op: ChunkOp::Equal,
            prev_index,
            next_index,
            count,
        }
    }

    pub fn insert(prev_index: usize, next_index: usize, count: usize) -> Self {
        Self {
            op: ChunkOp::Insert,
            prev_index,
            next_index,
            count,
        }
    }

    pub fn delete(prev_index: usize, next_index: usize, count: usize) -> Self {
        Self {
            op: ChunkOp::Delete,
            prev_index,
            next_index,
            count,
        }
    }
}

/// Private-use code point ranges for encoding signatures, ~137k in total.
const PRIVATE_USE_RANGES: [(u32, u32); 3] = [
    (0xE000, 0xF8FF),
    (0xF0000, 0xFFFFD),
    (0x100000, 0x10FFFD),
];

/// Per-call mapping from distinct signatures to single code points.
///
/// The assignment is stable within one call and never persisted, so the
/// code points carry no meaning outside the diff that allocated them.
struct SignatureAlphabet {
    assigned: HashMap<BlockSignature, char>,
    next: usize,
}

impl SignatureAlphabet {
    fn new() -> Self {
        Self {
            assigned: HashMap::new(),
            next: 0,
        }
    }

    /// Returns `None` once every private-use code point is taken.
    fn intern(&mut self, signature: &BlockSignature) -> Option<char> {
        if let Some(&encoded) = self.assigned.get(signature) {
            return Some(encoded);
        }
        let encoded = self.allocate()?;
        self.assigned.insert(signature.clone(), encoded);
        Some(encoded)
    }

    fn allocate(&mut self) -> Option<char> {
        let mut index = self.next;
        for &(lo, hi) in &PRIVATE_USE_RANGES {
            let span = (hi - lo + 1) as usize;
            if index < span {
                let encoded = char::from_u32(lo + index as u32)?;
                self.next += 1;
                return Some(encoded);
            }
            index -= span;
        }
        None
    }
}

fn encode(blocks: &[Arc<Block>], alphabet: &mut SignatureAlphabet) -> Option<String> {
    let mut encoded = String::with_capacity(blocks.len() * 4);
    for block in blocks {
        let signature = BlockSignature::of(block);
        encoded.push(alphabet.intern(&signature)?);
    }
    Some(encoded)
}

/// Align two block sequences into equal/insert/delete runs.
///
/// Every block reduces to its [`BlockSignature`] and each distinct
/// signature gets one private-use code point, so the alignment is a
/// character diff over two short strings. Duplicate signatures encode to
/// the same character and the underlying LCS resolves ties toward the
/// leftmost candidate. Replace ops are split into a delete run followed
/// by an insert run.
///
/// A document with more distinct signatures than private-use code points
/// degrades to a single delete run plus a single insert run covering both
/// sequences.
pub fn diff_blocks(prev: &[Arc<Block>], next: &[Arc<Block>]) -> Vec<DiffChunk> {
    let mut alphabet = SignatureAlphabet::new();
    let encoded = encode(prev, &mut alphabet).and_then(|p| Some((p, encode(next, &mut alphabet)?)));
    let (prev_encoded, next_encoded) = match encoded {
        Some(pair) => pair,
        None => {
            warn!(
                prev_blocks = prev.len(),
                next_blocks = next.len(),
                "signature alphabet exhausted, degrading to full replace"
            );
            return full_replace(prev.len(), next.len());
        }
    };

    let diff = TextDiff::from_chars(&prev_encoded, &next_encoded);
    let mut chunks = Vec::new();
    for op in diff.ops() {
        match *op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => chunks.push(DiffChunk::equal(old_index, new_index, len)),
            DiffOp::Delete {
                old_index,
                old_len,
                new_index,
            } => chunks.push(DiffChunk::delete(old_index, new_index, old_len)),
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => chunks.push(DiffChunk::insert(old_index, new_index, new_len)),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                chunks.push(DiffChunk::delete(old_index, new_index, old_len));
                chunks.push(DiffChunk::insert(old_index + old_len, new_index, new_len));
            }
        }
    }
    chunks
}

fn full_replace(prev_len: usize, next_len: usize) -> Vec<DiffChunk> {
    let mut chunks = Vec::new();
    if prev_len > 0 {
        chunks.push(DiffChunk::delete(0, 0, prev_len));
    }
    if next_len > 0 {
        chunks.push(DiffChunk::insert(prev_len, 0, next_len));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(texts: &[&str]) -> Vec<Arc<Block>> {
        texts
            .iter()
            .map(|text| Arc::new(Block::paragraph(*text)))
            .collect()
    }

    /// Chunks must partition both index spaces in order with no gaps.
    fn assert_partition(chunks: &[DiffChunk], prev_len: usize, next_len: usize) {
        let mut prev_cursor = 0;
        let mut next_cursor = 0;
        for chunk in chunks {
            assert_eq!(chunk.prev_index, prev_cursor, "prev cursor is contiguous");
            assert_eq!(chunk.next_index, next_cursor, "next cursor is contiguous");
            assert!(chunk.count > 0, "chunks are non-empty");
            match chunk.op {
                ChunkOp::Equal => {
                    prev_cursor += chunk.count;
                    next_cursor += chunk.count;
                }
                ChunkOp::Delete => prev_cursor += chunk.count,
                ChunkOp::Insert => next_cursor += chunk.count,
            }
        }
        assert_eq!(prev_cursor, prev_len, "prev side fully covered");
        assert_eq!(next_cursor, next_len, "next side fully covered");
    }

    // ============ Alignment tests ============

    #[test]
    fn test_empty_sequences() {
        assert!(diff_blocks(&[], &[]).is_empty());
    }

    #[test]
    fn test_identical_sequences_are_one_equal_run() {
        let prev = blocks(&["a", "b", "c"]);
        let next = blocks(&["a", "b", "c"]);
        let chunks = diff_blocks(&prev, &next);
        assert_eq!(chunks, vec![DiffChunk::equal(0, 0, 3)]);
    }

    #[test]
    fn test_pure_insert_in_middle() {
        let prev = blocks(&["a", "c"]);
        let next = blocks(&["a", "b", "c"]);
        let chunks = diff_blocks(&prev, &next);
        assert_eq!(
            chunks,
            vec![
                DiffChunk::equal(0, 0, 1),
                DiffChunk::insert(1, 1, 1),
                DiffChunk::equal(1, 2, 1),
            ]
        );
    }

    #[test]
    fn test_pure_delete() {
        let prev = blocks(&["a", "b", "c"]);
        let next = blocks(&["a", "c"]);
        let chunks = diff_blocks(&prev, &next);
        assert_eq!(
            chunks,
            vec![
                DiffChunk::equal(0, 0, 1),
                DiffChunk::delete(1, 1, 1),
                DiffChunk::equal(1, 2, 1),
            ]
        );
    }

    #[test]
    fn test_replaced_block_yields_delete_then_insert() {
        let prev = blocks(&["a", "b", "c"]);
        let next = blocks(&["a", "B", "c"]);
        let chunks = diff_blocks(&prev, &next);
        assert_eq!(
            chunks,
            vec![
                DiffChunk::equal(0, 0, 1),
                DiffChunk::delete(1, 1, 1),
                DiffChunk::insert(2, 1, 1),
                DiffChunk::equal(2, 2, 1),
            ]
        );
    }

    #[test]
    fn test_everything_replaced() {
        let prev = blocks(&["a", "b"]);
        let next = blocks(&["x", "y", "z"]);
        let chunks = diff_blocks(&prev, &next);
        assert_partition(&chunks, 2, 3);
        assert!(chunks.iter().all(|c| c.op != ChunkOp::Equal));
    }

    #[test]
    fn test_append_and_prepend() {
        let prev = blocks(&["m"]);
        let next = blocks(&["a", "m", "z"]);
        let chunks = diff_blocks(&prev, &next);
        assert_eq!(
            chunks,
            vec![
                DiffChunk::insert(0, 0, 1),
                DiffChunk::equal(0, 1, 1),
                DiffChunk::insert(1, 2, 1),
            ]
        );
    }

    #[test]
    fn test_duplicate_signatures_resolve_leftmost() {
        let prev = blocks(&["a", "a", "b"]);
        let next = blocks(&["a", "b"]);
        let chunks = diff_blocks(&prev, &next);
        // The first copy survives. The opposite bias would read
        // delete(0, 0, 1), equal(1, 0, 2).
        assert_eq!(
            chunks,
            vec![
                DiffChunk::equal(0, 0, 1),
                DiffChunk::delete(1, 1, 1),
                DiffChunk::equal(2, 1, 1),
            ]
        );
    }

    #[test]
    fn test_whitespace_rewrap_reads_as_equal() {
        let prev = blocks(&["hello world"]);
        let next = blocks(&["hello\nworld"]);
        let chunks = diff_blocks(&prev, &next);
        assert_eq!(chunks, vec![DiffChunk::equal(0, 0, 1)]);
    }

    #[test]
    fn test_mixed_kinds_align_by_identity() {
        let prev = vec![
            Arc::new(Block::heading(1, "title")),
            Arc::new(Block::paragraph("body")),
            Arc::new(Block::thematic_break()),
        ];
        let next = vec![
            Arc::new(Block::heading(1, "title")),
            Arc::new(Block::paragraph("rewritten")),
            Arc::new(Block::thematic_break()),
        ];
        let chunks = diff_blocks(&prev, &next);
        assert_eq!(
            chunks,
            vec![
                DiffChunk::equal(0, 0, 1),
                DiffChunk::delete(1, 1, 1),
                DiffChunk::insert(2, 1, 1),
                DiffChunk::equal(2, 2, 1),
            ]
        );
    }

    #[test]
    fn test_partition_holds_for_disjoint_content() {
        let prev = blocks(&["one", "two", "three", "four"]);
        let next = blocks(&["five", "two", "six"]);
        let chunks = diff_blocks(&prev, &next);
        assert_partition(&chunks, 4, 3);
    }

    // ============ Alphabet tests ============

    #[test]
    fn test_alphabet_allocates_distinct_code_points() {
        let mut alphabet = SignatureAlphabet::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            let c = alphabet.allocate().unwrap();
            assert!(seen.insert(c), "allocated twice: {c:?}");
        }
    }

    #[test]
    fn test_alphabet_exhausts_to_none() {
        let capacity: usize = PRIVATE_USE_RANGES
            .iter()
            .map(|&(lo, hi)| (hi - lo + 1) as usize)
            .sum();
        let mut alphabet = SignatureAlphabet::new();
        for _ in 0..capacity {
            assert!(alphabet.allocate().is_some());
        }
        assert!(alphabet.allocate().is_none());
    }
}
