/*!
 * # Editing Model
 *
 * The document model the synchronization core operates on: a tree of
 * block-level nodes mutated by edit commands from the surface and by
 * sync passes from the [`sync`](crate::sync) module.
 *
 * ## Architecture Overview
 *
 * ### 1. Structural Block Tree
 * - The document is an ordered sequence of top-level [`Block`]s, each a
 *   tree of nested blocks and inline [`TextSpan`] leaves
 * - Top-level blocks live behind `Arc`: a sync pass that classifies a
 *   block as unchanged leaves the allocation alone, which is what keeps
 *   a caret inside it stable for free
 * - Block identity is structural (kind + content), never allocation
 *   identity
 *
 * ### 2. Command-Based Editing
 * - All local edits flow through the [`Cmd`] enum and
 *   [`Document::apply`]
 * - Commands address text with [`Point`]s: a child-index path from the
 *   document root to a text leaf plus a character offset
 * - Invalid targets degrade to no-ops; an edit command can never poison
 *   the open document
 *
 * ### 3. Batched Change Publication
 * - Every mutation records a [`ChangeRecord`] and bumps the version
 *   counter on publication
 * - [`Document::begin_batch`] returns an RAII guard that holds
 *   publication open, so a multi-step mutation (a sync patch) is
 *   observed as a single change
 *
 * ## Module Structure
 *
 * - **`block`**: `Block`, `BlockKind`, `Node`, `TextSpan` tree types
 * - **`point`**: `Point` and `Selection` addressing
 * - **`document`**: the `Document` container, change records, batching
 * - **`commands`**: the `Cmd` edit algebra
 */

// Module exports
pub mod block;
pub mod commands;
pub mod document;
pub mod point;

// Public API re-exports
pub use block::{Block, BlockKind, Node, TextSpan};
pub use commands::Cmd;
pub use document::{BatchGuard, ChangeRecord, Document, EditOutcome};
pub use point::{Point, Selection, resolve_text};
