use std::sync::Arc;

use tracing::debug;

use crate::editing::block::{Block, BlockKind, Node, TextSpan, byte_of_char};
use crate::editing::document::{Document, EditOutcome};
use crate::editing::point::{Point, Selection};

/// Commands that can be applied to the document.
///
/// All text positions are [`Point`]s (leaf path + character offset).
/// Range commands operate within a single text leaf; the editing surface
/// composes multi-block edits out of these primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    InsertText {
        at: Point,
        text: String,
    },
    DeleteRange {
        start: Point,
        end: Point,
    },
    ReplaceRange {
        start: Point,
        end: Point,
        text: String,
    },
    /// Split the block under `at` in two. The text after the point moves
    /// into a fresh paragraph, matching the usual Enter-key behavior.
    SplitBlock {
        at: Point,
    },
    SetSelection {
        selection: Option<Selection>,
    },
}

/// Apply a command to the document.
///
/// Invalid targets (a path that no longer resolves to a text leaf) make the
/// command a no-op rather than an error; the caller keeps a live document
/// either way.
pub(crate) fn apply_command(doc: &mut Document, cmd: Cmd) -> EditOutcome {
    match cmd {
        Cmd::SetSelection { selection } => {
            doc.set_selection(selection);
            doc.outcome(false)
        }
        Cmd::InsertText { at, text } => {
            splice(doc, at.clone(), at, &text)
        }
        Cmd::DeleteRange { start, end } => splice(doc, start, end, ""),
        Cmd::ReplaceRange { start, end, text } => splice(doc, start, end, &text),
        Cmd::SplitBlock { at } => split_block(doc, at),
    }
}

fn splice(doc: &mut Document, start: Point, end: Point, replacement: &str) -> EditOutcome {
    if start.path != end.path {
        debug!(?start.path, ?end.path, "range spans text leaves, ignoring edit");
        return doc.outcome(false);
    }
    let (from, to) = if start.offset <= end.offset {
        (start.offset, end.offset)
    } else {
        (end.offset, start.offset)
    };
    match doc.splice_leaf(&start.path, from, to, replacement) {
        Some(caret_offset) => {
            let caret = Point::new(start.path, caret_offset);
            doc.set_selection(Some(Selection::caret(caret)));
            doc.outcome(true)
        }
        None => {
            debug!(path = ?start.path, "edit target is not a text leaf, ignoring edit");
            doc.outcome(false)
        }
    }
}

fn split_block(doc: &mut Document, at: Point) -> EditOutcome {
    // Splitting is supported for top-level blocks whose text leaf sits
    // directly under them (paragraphs and headings).
    let [index, leaf] = at.path[..] else {
        debug!(path = ?at.path, "split target is not a top-level leaf, ignoring edit");
        return doc.outcome(false);
    };
    let Some((kind, before, after)) = doc.blocks().get(index).and_then(|block| {
        let span = block.children.get(leaf)?.as_text()?;
        let cut = byte_of_char(&span.text, at.offset);
        Some((
            block.kind.clone(),
            span.text[..cut].to_string(),
            span.text[cut..].to_string(),
        ))
    }) else {
        debug!(path = ?at.path, "split target is not a text leaf, ignoring edit");
        return doc.outcome(false);
    };

    let left = Block::new(kind, vec![Node::Text(TextSpan::new(before))]);
    let right = Block::new(BlockKind::Paragraph, vec![Node::Text(TextSpan::new(after))]);
    {
        let mut doc = doc.begin_batch();
        doc.remove_blocks(index..index + 1);
        doc.insert_blocks(index, &[Arc::new(left), Arc::new(right)]);
    }
    doc.set_selection(Some(Selection::caret(Point::new(vec![index + 1, 0], 0))));
    doc.outcome(true)
}
