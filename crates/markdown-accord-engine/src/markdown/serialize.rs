//! Canonical markdown rendering of block trees.

use std::sync::Arc;

use crate::editing::{Block, BlockKind, Node};

/// Render blocks as canonical markdown text.
///
/// Canonical form uses ATX headings, `-` bullets, dot-numbered ordered
/// lists renumbered from the list start, fenced code blocks and `>` quote
/// prefixes, with one blank line between top-level blocks and a trailing
/// newline after the last one.
///
/// The output is deterministic: equal trees produce equal text, so the
/// sync engine can compare documents byte-for-byte and reuse rendered
/// text as a merge baseline.
pub fn serialize(blocks: &[Arc<Block>]) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_block(block, "", &mut out);
    }
    out
}

fn write_block(block: &Block, indent: &str, out: &mut String) {
    match &block.kind {
        BlockKind::Paragraph => write_prose(&block.text(), indent, out),
        BlockKind::Heading { level } => {
            let level = (*level).clamp(1, 6);
            // Headings are single-line constructs.
            let text = block.text().replace('\n', " ");
            out.push_str(indent);
            for _ in 0..level {
                out.push('#');
            }
            if !text.is_empty() {
                out.push(' ');
                out.push_str(&text);
            }
            out.push('\n');
        }
        BlockKind::CodeFence { lang } => write_code(lang.as_deref(), &block.text(), indent, out),
        BlockKind::ThematicBreak => {
            out.push_str(indent);
            out.push_str("---\n");
        }
        BlockKind::BlockQuote => write_quote(block, indent, out),
        BlockKind::BulletList => write_list(block, indent, None, out),
        BlockKind::NumberedList { start } => write_list(block, indent, Some(*start), out),
        // Items are rendered by their parent list; a stray item falls back
        // to bullet form.
        BlockKind::ListItem => write_item(block, indent, "- ", out),
    }
}

fn write_prose(text: &str, indent: &str, out: &mut String) {
    for line in text.split('\n') {
        if !line.is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
        out.push('\n');
    }
}

fn write_code(lang: Option<&str>, code: &str, indent: &str, out: &mut String) {
    // The fence must be longer than any backtick run opening a body line.
    let mut fence_len = 3;
    for line in code.lines() {
        let ticks = line.trim_start().chars().take_while(|&c| c == '`').count();
        if ticks >= fence_len {
            fence_len = ticks + 1;
        }
    }
    out.push_str(indent);
    for _ in 0..fence_len {
        out.push('`');
    }
    if let Some(lang) = lang {
        // A backtick fence's info string cannot itself contain backticks,
        // unlike the tilde fence it may have arrived from.
        let lang = lang.find('`').map_or(lang, |cut| &lang[..cut]);
        out.push_str(lang.trim());
    }
    out.push('\n');
    if !code.is_empty() {
        for line in code.split('\n') {
            if !line.is_empty() {
                out.push_str(indent);
                out.push_str(line);
            }
            out.push('\n');
        }
    }
    out.push_str(indent);
    for _ in 0..fence_len {
        out.push('`');
    }
    out.push('\n');
}

fn write_quote(block: &Block, indent: &str, out: &mut String) {
    let child_indent = format!("{indent}> ");
    let mut first = true;
    for node in &block.children {
        if !first {
            // A bare marker line keeps sibling paragraphs from merging.
            out.push_str(indent);
            out.push_str(">\n");
        }
        match node {
            Node::Block(child) => write_block(child, &child_indent, out),
            Node::Text(span) => write_prose(&span.text, &child_indent, out),
        }
        first = false;
    }
    if first {
        out.push_str(indent);
        out.push_str(">\n");
    }
}

fn write_list(block: &Block, indent: &str, start: Option<u64>, out: &mut String) {
    let mut number = start;
    for node in &block.children {
        let Node::Block(item) = node else { continue };
        match &mut number {
            Some(n) => {
                let marker = format!("{n}. ");
                *n += 1;
                write_item(item, indent, &marker, out);
            }
            None => write_item(item, indent, "- ", out),
        }
    }
}

fn write_item(item: &Block, indent: &str, marker: &str, out: &mut String) {
    // Continuation and child lines align under the marker width, so `- `
    // indents by two and `10. ` by four.
    let child_indent = format!("{indent}{}", " ".repeat(marker.len()));
    let mut rest = &item.children[..];
    out.push_str(indent);
    if let Some(Node::Text(span)) = item.children.first() {
        rest = &item.children[1..];
        let mut lines = span.text.split('\n');
        match lines.next() {
            Some(first) if !first.is_empty() => {
                out.push_str(marker);
                out.push_str(first);
            }
            _ => out.push_str(marker.trim_end()),
        }
        out.push('\n');
        for line in lines {
            if !line.is_empty() {
                out.push_str(&child_indent);
                out.push_str(line);
            }
            out.push('\n');
        }
    } else {
        out.push_str(marker.trim_end());
        out.push('\n');
    }
    for node in rest {
        match node {
            Node::Block(child) => {
                if !matches!(
                    child.kind,
                    BlockKind::BulletList | BlockKind::NumberedList { .. }
                ) {
                    // Nested lists attach directly under the item line;
                    // other child blocks need a separating blank line.
                    out.push('\n');
                }
                write_block(child, &child_indent, out);
            }
            Node::Text(span) => write_prose(&span.text, &child_indent, out),
        }
    }
}
