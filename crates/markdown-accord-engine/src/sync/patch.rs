//! Applies a block alignment to the live document tree.

use std::sync::Arc;

use tracing::debug;

use crate::editing::{Block, Document};
use crate::sync::diff::{ChunkOp, DiffChunk};

/// Result of applying an alignment to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Whether the block list changed.
    pub mutated: bool,
}

/// Mutate `document`'s top-level blocks to match `next` according to a
/// previously computed alignment.
///
/// Blocks covered by equal runs are never touched, so their `Arc`s (and
/// any selection inside them) survive the patch. Deletions apply in
/// descending prev order, then insertions in ascending next order against
/// the already-shrunk list, with every target clamped to the current
/// length. The whole mutation is one batch: observers see a single change
/// set and one version bump.
pub fn apply_patch(
    document: &mut Document,
    next: &[Arc<Block>],
    chunks: &[DiffChunk],
) -> PatchOutcome {
    if chunks.iter().all(|chunk| chunk.op == ChunkOp::Equal) {
        return PatchOutcome { mutated: false };
    }

    let mut doc = document.begin_batch();

    let mut deletes: Vec<&DiffChunk> = chunks
        .iter()
        .filter(|chunk| chunk.op == ChunkOp::Delete)
        .collect();
    deletes.sort_by(|a, b| b.prev_index.cmp(&a.prev_index));
    for chunk in deletes {
        doc.remove_blocks(chunk.prev_index..chunk.prev_index + chunk.count);
    }

    let mut inserts: Vec<&DiffChunk> = chunks
        .iter()
        .filter(|chunk| chunk.op == ChunkOp::Insert)
        .collect();
    inserts.sort_by_key(|chunk| chunk.next_index);
    for chunk in inserts {
        let end = (chunk.next_index + chunk.count).min(next.len());
        let start = chunk.next_index.min(end);
        doc.insert_blocks(chunk.next_index, &next[start..end]);
    }

    debug!(
        chunks = chunks.len(),
        blocks = doc.block_count(),
        "applied block patch"
    );

    PatchOutcome { mutated: true }
}
