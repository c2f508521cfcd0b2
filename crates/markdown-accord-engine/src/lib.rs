pub mod config;
pub mod editing;
pub mod markdown;
pub mod sync;

// Re-export key types for easier usage
pub use config::SyncOptions;
pub use editing::{Block, BlockKind, Cmd, Document, Node, Point, Selection, TextSpan};
pub use markdown::{ParseError, parse, serialize};
pub use sync::{
    BlockSignature, ChunkOp, DiffChunk, EditorHost, PatchOutcome, RemappedPoint, RemappedRange,
    SyncEffect, SyncSession, SyncState, apply_patch, diff_blocks, remap_offset, remap_offsets,
    remap_point, remap_range, remap_selection, three_way_merge,
};
