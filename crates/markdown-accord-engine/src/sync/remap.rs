//! Selection remapping across block-level patches.

use std::sync::Arc;

use crate::editing::{Block, Point, Selection};
use crate::sync::diff::{ChunkOp, DiffChunk};

/// A point carried across a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemappedPoint {
    pub point: Point,
    /// True when the original location is gone and the point landed on a
    /// safe nearby position instead.
    pub approximate: bool,
}

/// Map a point through a block alignment onto the post-patch sequence.
///
/// Points inside equal runs shift by the run displacement and keep their
/// leaf path and offset. A point in a deleted run lands at the start of
/// the block now occupying the run's next-side position. An index the
/// alignment does not cover clamps to the last block. Returns `None` only
/// when `next` is empty, there is nowhere to land.
pub fn remap_point(
    next: &[Arc<Block>],
    point: &Point,
    chunks: &[DiffChunk],
) -> Option<RemappedPoint> {
    let old_index = point.block_index()?;

    let covering = chunks.iter().find(|chunk| {
        chunk.op != ChunkOp::Insert
            && old_index >= chunk.prev_index
            && old_index < chunk.prev_index + chunk.count
    });

    match covering {
        Some(chunk) if chunk.op == ChunkOp::Equal => {
            let mut path = point.path.clone();
            path[0] = chunk.next_index + (old_index - chunk.prev_index);
            Some(RemappedPoint {
                point: Point::new(path, point.offset),
                approximate: false,
            })
        }
        Some(chunk) => {
            // Block deleted; land on whatever took its place.
            let landing = chunk.next_index.min(next.len().checked_sub(1)?);
            Some(RemappedPoint {
                point: Point::block_start(landing, &next[landing]),
                approximate: true,
            })
        }
        None => {
            let landing = next.len().checked_sub(1)?;
            Some(RemappedPoint {
                point: Point::block_start(landing, &next[landing]),
                approximate: true,
            })
        }
    }
}

/// Map a selection through a block alignment.
///
/// Anchor and focus remap independently. If both survive exactly the
/// selection keeps its shape; any approximation collapses it to a caret,
/// preferring the anchor's landing point.
pub fn remap_selection(
    next: &[Arc<Block>],
    selection: &Selection,
    chunks: &[DiffChunk],
) -> Option<Selection> {
    let anchor = remap_point(next, &selection.anchor, chunks);
    let focus = remap_point(next, &selection.focus, chunks);
    match (anchor, focus) {
        (Some(anchor), Some(focus)) if !anchor.approximate && !focus.approximate => {
            Some(Selection::new(anchor.point, focus.point))
        }
        (Some(anchor), _) => Some(Selection::caret(anchor.point)),
        (None, Some(focus)) => Some(Selection::caret(focus.point)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::diff::diff_blocks;

    fn paragraphs(texts: &[&str]) -> Vec<Arc<Block>> {
        texts
            .iter()
            .map(|text| Arc::new(Block::paragraph(*text)))
            .collect()
    }

    // ============ Point remap tests ============

    #[test]
    fn test_equal_run_is_exact() {
        let prev = paragraphs(&["a", "b"]);
        let next = paragraphs(&["a", "b"]);
        let chunks = diff_blocks(&prev, &next);
        let point = Point::new(vec![1, 0], 1);
        let remapped = remap_point(&next, &point, &chunks).unwrap();
        assert!(!remapped.approximate);
        assert_eq!(remapped.point, point);
    }

    #[test]
    fn test_pure_insert_shifts_following_blocks() {
        let prev = paragraphs(&["a", "b"]);
        let next = paragraphs(&["a", "n1", "n2", "b"]);
        let chunks = diff_blocks(&prev, &next);

        let tail = remap_point(&next, &Point::new(vec![1, 0], 1), &chunks).unwrap();
        assert!(!tail.approximate);
        assert_eq!(tail.point, Point::new(vec![3, 0], 1), "shifted by +2");

        let head = remap_point(&next, &Point::new(vec![0, 0], 1), &chunks).unwrap();
        assert!(!head.approximate);
        assert_eq!(head.point, Point::new(vec![0, 0], 1), "untouched");
    }

    #[test]
    fn test_delete_lands_on_replacement_start() {
        let prev = paragraphs(&["a", "b", "c"]);
        let next = paragraphs(&["a", "x", "c"]);
        let chunks = diff_blocks(&prev, &next);
        let remapped = remap_point(&next, &Point::new(vec![1, 0], 1), &chunks).unwrap();
        assert!(remapped.approximate);
        assert_eq!(remapped.point, Point::new(vec![1, 0], 0));
    }

    #[test]
    fn test_delete_at_end_clamps_landing() {
        let prev = paragraphs(&["a", "b"]);
        let next = paragraphs(&["a"]);
        let chunks = diff_blocks(&prev, &next);
        let remapped = remap_point(&next, &Point::new(vec![1, 0], 0), &chunks).unwrap();
        assert!(remapped.approximate);
        assert_eq!(remapped.point, Point::new(vec![0, 0], 0));
    }

    #[test]
    fn test_empty_next_has_nowhere_to_land() {
        let prev = paragraphs(&["a"]);
        let chunks = diff_blocks(&prev, &[]);
        assert!(remap_point(&[], &Point::new(vec![0, 0], 0), &chunks).is_none());
    }

    #[test]
    fn test_uncovered_index_clamps_to_last_block() {
        let prev = paragraphs(&["a", "b"]);
        let next = paragraphs(&["a", "b"]);
        let chunks = diff_blocks(&prev, &next);
        let stale = Point::new(vec![9, 0], 4);
        let remapped = remap_point(&next, &stale, &chunks).unwrap();
        assert!(remapped.approximate);
        assert_eq!(remapped.point, Point::new(vec![1, 0], 0));
    }

    #[test]
    fn test_landing_on_leafless_block() {
        let prev = paragraphs(&["a", "b"]);
        let next = vec![
            Arc::new(Block::paragraph("a")),
            Arc::new(Block::thematic_break()),
        ];
        let chunks = diff_blocks(&prev, &next);
        let remapped = remap_point(&next, &Point::new(vec![1, 0], 1), &chunks).unwrap();
        assert!(remapped.approximate);
        assert_eq!(remapped.point, Point::new(vec![1], 0));
    }

    // ============ Selection remap tests ============

    #[test]
    fn test_exact_selection_keeps_shape() {
        let prev = paragraphs(&["a", "bb"]);
        let next = paragraphs(&["n", "a", "bb"]);
        let chunks = diff_blocks(&prev, &next);
        let selection = Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 2));
        let remapped = remap_selection(&next, &selection, &chunks).unwrap();
        assert_eq!(
            remapped,
            Selection::new(Point::new(vec![1, 0], 0), Point::new(vec![2, 0], 2))
        );
    }

    #[test]
    fn test_approximate_endpoint_collapses_to_anchor() {
        let prev = paragraphs(&["a", "b"]);
        let next = paragraphs(&["a", "x"]);
        let chunks = diff_blocks(&prev, &next);
        let selection = Selection::new(Point::new(vec![0, 0], 1), Point::new(vec![1, 0], 1));
        let remapped = remap_selection(&next, &selection, &chunks).unwrap();
        assert!(remapped.is_collapsed());
        assert_eq!(remapped.anchor, Point::new(vec![0, 0], 1));
    }

    #[test]
    fn test_selection_on_empty_next_is_gone() {
        let prev = paragraphs(&["a"]);
        let chunks = diff_blocks(&prev, &[]);
        let selection = Selection::caret(Point::new(vec![0, 0], 0));
        assert!(remap_selection(&[], &selection, &chunks).is_none());
    }
}
