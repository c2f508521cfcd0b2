use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::editing::block::{Block, Node, TextSpan};

/// A location inside a block's text content.
///
/// `path` addresses a text-bearing leaf by child indices from the document
/// root (`path[0]` is the top-level block index). `offset` is a character
/// offset within that leaf. A point is valid only when the path resolves to
/// a text leaf and `offset <= leaf.char_len()`; code that receives points
/// from outside clamps rather than trusts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub path: Vec<usize>,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Vec<usize>, offset: usize) -> Self {
        Self { path, offset }
    }

    /// Index of the top-level block this point lives in.
    pub fn block_index(&self) -> Option<usize> {
        self.path.first().copied()
    }

    /// Point at the start of the block at `index`, preferring its first
    /// text leaf. Blocks without text content (a thematic break) are
    /// addressed by the bare block path.
    pub fn block_start(index: usize, block: &Block) -> Self {
        match block.text_leaves().first() {
            Some((leaf_path, _)) => {
                let mut path = Vec::with_capacity(leaf_path.len() + 1);
                path.push(index);
                path.extend_from_slice(leaf_path);
                Self::new(path, 0)
            }
            None => Self::new(vec![index], 0),
        }
    }
}

/// A selection between two points; collapsed when anchor == focus (a caret).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn caret(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn collapse_to_anchor(&self) -> Self {
        Self::caret(self.anchor.clone())
    }
}

/// Resolve a path to the text span it addresses, if any.
pub fn resolve_text<'a>(blocks: &'a [Arc<Block>], path: &[usize]) -> Option<&'a TextSpan> {
    let (&first, rest) = path.split_first()?;
    let mut children = &blocks.get(first)?.children;
    let (&leaf, inner) = rest.split_last()?;
    for &index in inner {
        children = match children.get(index)? {
            Node::Block(block) => &block.children,
            Node::Text(_) => return None,
        };
    }
    children.get(leaf)?.as_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::block::BlockKind;

    fn doc() -> Vec<Arc<Block>> {
        vec![
            Arc::new(Block::paragraph("hello")),
            Arc::new(Block::bullet_list(vec![Block::new(
                BlockKind::ListItem,
                vec![
                    Node::Text(TextSpan::new("item")),
                    Node::Block(Block::bullet_list(vec![Block::list_item("deep")])),
                ],
            )])),
            Arc::new(Block::thematic_break()),
        ]
    }

    // ============ Path resolution tests ============

    #[test]
    fn resolves_paragraph_leaf() {
        let blocks = doc();
        let span = resolve_text(&blocks, &[0, 0]).expect("paragraph leaf");
        assert_eq!(span.text, "hello");
    }

    #[test]
    fn resolves_nested_list_leaf() {
        let blocks = doc();
        let span = resolve_text(&blocks, &[1, 0, 1, 0, 0]).expect("nested leaf");
        assert_eq!(span.text, "deep");
    }

    #[test]
    fn rejects_paths_to_non_text_nodes() {
        let blocks = doc();
        assert!(resolve_text(&blocks, &[1, 0]).is_none(), "list item is not a leaf");
        assert!(resolve_text(&blocks, &[2]).is_none(), "bare block path has no leaf");
        assert!(resolve_text(&blocks, &[9, 0]).is_none(), "out of range");
        assert!(resolve_text(&blocks, &[]).is_none());
    }

    // ============ Point and selection tests ============

    #[test]
    fn block_start_prefers_first_text_leaf() {
        let blocks = doc();
        assert_eq!(Point::block_start(0, &blocks[0]), Point::new(vec![0, 0], 0));
        assert_eq!(
            Point::block_start(1, &blocks[1]),
            Point::new(vec![1, 0, 0], 0)
        );
        assert_eq!(Point::block_start(2, &blocks[2]), Point::new(vec![2], 0));
    }

    #[test]
    fn caret_is_collapsed() {
        let caret = Selection::caret(Point::new(vec![0, 0], 3));
        assert!(caret.is_collapsed());
        assert_eq!(caret.anchor, caret.focus);
    }

    #[test]
    fn collapse_to_anchor_drops_focus() {
        let selection = Selection::new(Point::new(vec![0, 0], 1), Point::new(vec![0, 0], 4));
        assert!(!selection.is_collapsed());
        let collapsed = selection.collapse_to_anchor();
        assert!(collapsed.is_collapsed());
        assert_eq!(collapsed.anchor, Point::new(vec![0, 0], 1));
    }
}
