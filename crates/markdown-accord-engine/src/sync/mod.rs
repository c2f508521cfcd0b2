/*!
# Synchronization Core

Keeps one live document converged with a remote text value without ever
interrupting the user mid-edit.

## Architecture Overview

### 1. Block Alignment (`signature.rs`, `diff.rs`)

- Every top-level block gets a [`BlockSignature`]: kind label plus
  whitespace-normalized content, hashed
- Two block sequences are aligned by interning signatures into
  private-use characters and running a character diff over the encoded
  strings
- The result is a partition of both sequences into equal, insert, and
  delete chunks

### 2. Tree Patching (`patch.rs`)

- Applies an alignment to the live [`Document`](crate::editing::Document)
  inside one batch scope
- Equal blocks keep their `Arc` allocation; only inserted and deleted
  ranges touch the tree

### 3. Position Remapping (`remap.rs`, `sentinel.rs`)

- Block-level: carries a [`Point`](crate::editing::Point) across an
  alignment, exact through equal chunks, clamped to the nearest
  surviving block otherwise
- Character-level: marks offsets with noncharacter sentinels, diffs the
  marked text against the new text, and reads each sentinel's landing
  position out of the diff

### 4. Reconciliation (`merge.rs`, `session.rs`)

- [`three_way_merge`] folds remote edits into the local text through the
  last agreed baseline, keeping both sides on conflict
- [`SyncSession`] schedules the whole pipeline: remote values defer
  while the user is active or typing, local edits save after a quiet
  period, and every timer is driven by injected instants
*/

// Module exports
pub mod diff;
pub mod merge;
pub mod patch;
pub mod remap;
pub mod sentinel;
pub mod session;
pub mod signature;

// Public API re-exports
pub use diff::{ChunkOp, DiffChunk, diff_blocks};
pub use merge::three_way_merge;
pub use patch::{PatchOutcome, apply_patch};
pub use remap::{RemappedPoint, remap_point, remap_selection};
pub use sentinel::{RemappedRange, remap_offset, remap_offsets, remap_range};
pub use session::{EditorHost, SyncEffect, SyncSession, SyncState};
pub use signature::BlockSignature;
