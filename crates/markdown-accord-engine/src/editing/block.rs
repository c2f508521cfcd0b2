use serde::{Deserialize, Serialize};

/// Kind tag for a block node, carrying kind-specific attributes.
///
/// The kind participates in block identity for alignment purposes: two
/// blocks with the same text but different kinds (say a paragraph and an
/// H2 with identical words) are never treated as the same block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Paragraph,
    Heading { level: u8 },
    BulletList,
    NumberedList { start: u64 },
    ListItem,
    CodeFence { lang: Option<String> },
    BlockQuote,
    ThematicBreak,
}

/// A run of inline text. Inline markup (emphasis, links, escapes) is kept
/// verbatim in `text`; rendering it is the surface's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
}

impl TextSpan {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Length in characters, not bytes. All offsets in this crate are
    /// character offsets.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// One child slot of a block: either a nested block or an inline text run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Block(Block),
    Text(TextSpan),
}

impl Node {
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Node::Block(block) => Some(block),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextSpan> {
        match self {
            Node::Text(span) => Some(span),
            Node::Block(_) => None,
        }
    }
}

/// A node of the document tree and the unit of diffing.
///
/// Identity is structural: two blocks are "the same" if their signatures
/// match, never because they are the same allocation. Top-level blocks are
/// shared behind `Arc`, so an unchanged block survives a sync pass with its
/// allocation (and any caret inside it) untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub children: Vec<Node>,
}

impl Block {
    pub fn new(kind: BlockKind, children: Vec<Node>) -> Self {
        Self { kind, children }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::with_text(BlockKind::Paragraph, text)
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::with_text(BlockKind::Heading { level }, text)
    }

    pub fn code_fence(lang: Option<&str>, code: impl Into<String>) -> Self {
        Self::with_text(
            BlockKind::CodeFence {
                lang: lang.map(str::to_owned),
            },
            code,
        )
    }

    pub fn list_item(text: impl Into<String>) -> Self {
        Self::with_text(BlockKind::ListItem, text)
    }

    pub fn bullet_list(items: Vec<Block>) -> Self {
        Self::new(BlockKind::BulletList, items.into_iter().map(Node::Block).collect())
    }

    pub fn numbered_list(start: u64, items: Vec<Block>) -> Self {
        Self::new(
            BlockKind::NumberedList { start },
            items.into_iter().map(Node::Block).collect(),
        )
    }

    pub fn quote(children: Vec<Block>) -> Self {
        Self::new(BlockKind::BlockQuote, children.into_iter().map(Node::Block).collect())
    }

    pub fn thematic_break() -> Self {
        Self::new(BlockKind::ThematicBreak, Vec::new())
    }

    fn with_text(kind: BlockKind, text: impl Into<String>) -> Self {
        let text = text.into();
        let children = if text.is_empty() {
            Vec::new()
        } else {
            vec![Node::Text(TextSpan::new(text))]
        };
        Self::new(kind, children)
    }

    /// Concatenated text of every descendant text span, in document order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Total character count of the block's text content.
    pub fn char_len(&self) -> usize {
        self.text_leaves().iter().map(|(_, len)| len).sum()
    }

    /// Paths (relative to this block) and character lengths of every text
    /// leaf, in document order.
    pub fn text_leaves(&self) -> Vec<(Vec<usize>, usize)> {
        let mut leaves = Vec::new();
        let mut prefix = Vec::new();
        collect_leaves(&self.children, &mut prefix, &mut leaves);
        leaves
    }

    /// Locate the leaf containing the given flattened text offset.
    ///
    /// Returns the leaf path (relative to this block) and the offset within
    /// that leaf, clamping past-the-end offsets to the final leaf's end.
    /// `None` when the block has no text leaves at all.
    pub fn point_at_text_offset(&self, offset: usize) -> Option<(Vec<usize>, usize)> {
        let leaves = self.text_leaves();
        let mut consumed = 0;
        for (path, len) in &leaves {
            if offset <= consumed + len {
                return Some((path.clone(), offset - consumed));
            }
            consumed += len;
        }
        leaves
            .last()
            .map(|(path, len)| (path.clone(), *len))
    }

    /// Flatten a leaf-relative position into an offset over the block's
    /// concatenated text. `None` when `leaf_path` is not a text leaf of
    /// this block.
    pub fn text_offset_of(&self, leaf_path: &[usize], offset: usize) -> Option<usize> {
        let mut consumed = 0;
        for (path, len) in self.text_leaves() {
            if path == leaf_path {
                return Some(consumed + offset.min(len));
            }
            consumed += len;
        }
        None
    }
}

fn collect_text(children: &[Node], out: &mut String) {
    for node in children {
        match node {
            Node::Text(span) => out.push_str(&span.text),
            Node::Block(block) => collect_text(&block.children, out),
        }
    }
}

fn collect_leaves(children: &[Node], prefix: &mut Vec<usize>, out: &mut Vec<(Vec<usize>, usize)>) {
    for (index, node) in children.iter().enumerate() {
        prefix.push(index);
        match node {
            Node::Text(span) => out.push((prefix.clone(), span.char_len())),
            Node::Block(block) => collect_leaves(&block.children, prefix, out),
        }
        prefix.pop();
    }
}

/// Byte index of the `char_offset`-th character of `s`, clamped to `s.len()`.
pub(crate) fn byte_of_char(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(byte, _)| byte)
        .unwrap_or(s.len())
}
