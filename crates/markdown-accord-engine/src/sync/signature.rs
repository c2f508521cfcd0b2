//! Content identity signatures for structural diffing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::Regex;

use crate::editing::{Block, BlockKind, Node};

/// Content identity of a block for diff alignment.
///
/// Two blocks with equal signatures are interchangeable as far as the
/// structural diff is concerned. The payload is kind-aware: prose text is
/// whitespace-collapsed so a rewrap or trailing-space change does not read
/// as a block replacement, code keeps its literal text and language tag,
/// and container kinds fold their children's signatures in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockSignature {
    label: &'static str,
    payload: String,
    hash: u64,
    /// Char length of the normalized payload.
    len: usize,
}

impl BlockSignature {
    pub fn of(block: &Block) -> Self {
        let label = kind_label(&block.kind);
        let payload = payload_of(block);
        let mut hasher = DefaultHasher::new();
        label.hash(&mut hasher);
        payload.hash(&mut hasher);
        let hash = hasher.finish();
        let len = payload.chars().count();
        Self {
            label,
            payload,
            hash,
            len,
        }
    }

    /// Kind tag, e.g. `"paragraph"` or `"code-fence"`.
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn fingerprint(&self) -> u64 {
        self.hash
    }

    pub fn payload_len(&self) -> usize {
        self.len
    }
}

fn kind_label(kind: &BlockKind) -> &'static str {
    match kind {
        BlockKind::Paragraph => "paragraph",
        BlockKind::Heading { .. } => "heading",
        BlockKind::BulletList => "bullet-list",
        BlockKind::NumberedList { .. } => "numbered-list",
        BlockKind::ListItem => "list-item",
        BlockKind::CodeFence { .. } => "code-fence",
        BlockKind::BlockQuote => "block-quote",
        BlockKind::ThematicBreak => "thematic-break",
    }
}

fn payload_of(block: &Block) -> String {
    match &block.kind {
        BlockKind::Paragraph => collapse_whitespace(&block.text()),
        // The level is part of identity: demoting a heading replaces it.
        BlockKind::Heading { level } => {
            format!("{level}|{}", collapse_whitespace(&block.text()))
        }
        // Code is literal; whitespace changes inside a fence are real.
        BlockKind::CodeFence { lang } => {
            format!("{}|{}", lang.as_deref().unwrap_or(""), block.text())
        }
        BlockKind::ThematicBreak => String::new(),
        BlockKind::NumberedList { start } => format!("{start}|{}", fold_children(block)),
        BlockKind::BulletList | BlockKind::ListItem | BlockKind::BlockQuote => {
            fold_children(block)
        }
    }
}

fn fold_children(block: &Block) -> String {
    let mut payload = String::new();
    for node in &block.children {
        match node {
            Node::Text(span) => payload.push_str(&collapse_whitespace(&span.text)),
            Node::Block(child) => {
                payload.push('[');
                payload.push_str(kind_label(&child.kind));
                payload.push(':');
                payload.push_str(&payload_of(child));
                payload.push(']');
            }
        }
    }
    payload
}

static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn collapse_whitespace(text: &str) -> String {
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));
    re.replace_all(text.trim(), " ").into_owned()
}
