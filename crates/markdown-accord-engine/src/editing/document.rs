use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::editing::block::{Block, Node, TextSpan, byte_of_char};
use crate::editing::commands::{Cmd, apply_command};
use crate::editing::point::Selection;

/// Record of one structural change to the top-level block list, published
/// to observers via [`Document::take_changes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeRecord {
    Inserted { index: usize, count: usize },
    Removed { index: usize, count: usize },
    /// A block's content changed in place (text edit inside the block).
    Replaced { index: usize },
}

/// Result of applying a single edit command.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    /// Selection after the edit, if any is active.
    pub selection: Option<Selection>,
    /// Document version after the edit.
    pub version: u64,
    /// Whether the edit changed document content (not just the selection).
    pub dirty: bool,
}

/// The live document: an ordered sequence of top-level blocks plus the
/// active selection.
///
/// Owned exclusively by the editing session. Mutation happens either
/// through edit commands ([`Document::apply`]) or through a sync pass
/// (the patch applicator), never concurrently. Every mutation publishes
/// [`ChangeRecord`]s and bumps the version counter; a batch scope
/// ([`Document::begin_batch`]) coalesces the records of several mutations
/// into a single publication, so observers never see a half-patched tree.
#[derive(Debug, Clone)]
pub struct Document {
    blocks: Vec<Arc<Block>>,
    selection: Option<Selection>,
    version: u64,
    batch_depth: u32,
    pending: Vec<ChangeRecord>,
    published: Vec<ChangeRecord>,
}

// Version and change bookkeeping are excluded: two documents are equal
// when they hold the same content and selection.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.blocks == other.blocks && self.selection == other.selection
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Document {
    pub fn new(blocks: Vec<Arc<Block>>) -> Self {
        Self {
            blocks,
            selection: None,
            version: 0,
            batch_depth: 0,
            pending: Vec::new(),
            published: Vec::new(),
        }
    }

    pub fn blocks(&self) -> &[Arc<Block>] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Version counter, incremented once per published mutation (a whole
    /// batch counts as one).
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Selection changes are not content changes: no record, no version bump.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    /// Apply an edit command. See [`Cmd`] for the available edits.
    pub fn apply(&mut self, cmd: Cmd) -> EditOutcome {
        apply_command(self, cmd)
    }

    /// Open a batch scope. Mutations made while the guard is alive are
    /// published together when it drops, with a single version bump.
    pub fn begin_batch(&mut self) -> BatchGuard<'_> {
        self.batch_depth += 1;
        BatchGuard { doc: self }
    }

    /// Drain the published change records.
    pub fn take_changes(&mut self) -> Vec<ChangeRecord> {
        std::mem::take(&mut self.published)
    }

    /// Insert blocks before `at`, clamped to the current length.
    pub fn insert_blocks(&mut self, at: usize, blocks: &[Arc<Block>]) {
        if blocks.is_empty() {
            return;
        }
        let at = at.min(self.blocks.len());
        self.blocks.splice(at..at, blocks.iter().cloned());
        self.record(ChangeRecord::Inserted {
            index: at,
            count: blocks.len(),
        });
    }

    /// Remove the blocks in `range`, clamped to the current length.
    pub fn remove_blocks(&mut self, range: Range<usize>) {
        let start = range.start.min(self.blocks.len());
        let end = range.end.min(self.blocks.len());
        if start >= end {
            return;
        }
        self.blocks.drain(start..end);
        self.record(ChangeRecord::Removed {
            index: start,
            count: end - start,
        });
    }

    /// Replace `[start, end)` (character offsets, clamped) of the text leaf
    /// at `path` with `replacement`. Returns the caret offset after the
    /// replacement, or `None` when the path does not address a text leaf.
    ///
    /// Copy-on-write: a block shared with another tree is cloned before
    /// mutation, so the other holder is unaffected.
    pub(crate) fn splice_leaf(
        &mut self,
        path: &[usize],
        start: usize,
        end: usize,
        replacement: &str,
    ) -> Option<usize> {
        let index = *path.first()?;
        let caret = {
            let block = Arc::make_mut(self.blocks.get_mut(index)?);
            let span = leaf_mut(block, &path[1..])?;
            let len = span.char_len();
            let start = start.min(len);
            let end = end.clamp(start, len);
            let byte_start = byte_of_char(&span.text, start);
            let byte_end = byte_of_char(&span.text, end);
            span.text.replace_range(byte_start..byte_end, replacement);
            start + replacement.chars().count()
        };
        self.record(ChangeRecord::Replaced { index });
        Some(caret)
    }

    pub(crate) fn outcome(&self, dirty: bool) -> EditOutcome {
        EditOutcome {
            selection: self.selection.clone(),
            version: self.version,
            dirty,
        }
    }

    fn record(&mut self, change: ChangeRecord) {
        self.pending.push(change);
        if self.batch_depth == 0 {
            self.publish();
        }
    }

    fn publish(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.version += 1;
        self.published.append(&mut self.pending);
    }
}

fn leaf_mut<'a>(block: &'a mut Block, tail: &[usize]) -> Option<&'a mut TextSpan> {
    let (&leaf, inner) = tail.split_last()?;
    let mut children = &mut block.children;
    for &index in inner {
        children = match children.get_mut(index)? {
            Node::Block(child) => &mut child.children,
            Node::Text(_) => return None,
        };
    }
    match children.get_mut(leaf)? {
        Node::Text(span) => Some(span),
        Node::Block(_) => None,
    }
}

/// Scope that holds change publication open until dropped.
///
/// Dereferences to [`Document`], so patch code mutates straight through it.
pub struct BatchGuard<'a> {
    doc: &'a mut Document,
}

impl std::ops::Deref for BatchGuard<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.doc
    }
}

impl std::ops::DerefMut for BatchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        self.doc
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.doc.batch_depth -= 1;
        if self.doc.batch_depth == 0 {
            self.doc.publish();
        }
    }
}
