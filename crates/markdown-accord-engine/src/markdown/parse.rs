//! Markdown to block tree conversion.
//!
//! Drives `pulldown-cmark` events into [`Block`] trees. Inline content is
//! captured verbatim from the source text so emphasis markers, links and
//! escapes survive a parse/serialize cycle untouched.

use std::borrow::Cow;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use regex::Regex;
use thiserror::Error;

use crate::editing::{Block, BlockKind, Node, TextSpan};

/// Maximum supported container nesting depth.
///
/// Deeper trees are rejected up front so path-based addressing and
/// recursive serialization stay well-behaved on hostile input.
pub const MAX_DEPTH: usize = 64;

/// Failure to build a block tree from markdown text.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("block nesting exceeds supported depth of {max_depth}")]
    TooDeep { max_depth: usize },
}

/// Parse markdown text into a sequence of top-level blocks.
///
/// Recognizes the structural subset of CommonMark the sync engine works
/// with: paragraphs, headings, bullet and numbered lists, fenced and
/// indented code blocks, block quotes and thematic breaks. Inline markup
/// is kept as raw text rather than being interpreted, and soft-wrapped
/// lines are joined with a single space.
pub fn parse(text: &str) -> Result<Vec<Arc<Block>>, ParseError> {
    let mut builder = TreeBuilder::new(text);
    for (event, range) in Parser::new(text).into_offset_iter() {
        builder.process(event, range)?;
    }
    Ok(builder.finish())
}

/// What an open leaf capture becomes once its tag closes.
enum LeafKind {
    Paragraph,
    /// Paragraph text that belongs directly to the enclosing list item.
    ItemText,
    Heading(u8),
    Code { lang: Option<String> },
    Html,
}

struct Leaf {
    kind: LeafKind,
    buf: String,
}

/// Incremental tree builder driven by `pulldown-cmark` events.
///
/// Open container blocks (lists, items, quotes) live on `stack`; leaf text
/// accumulates in `leaf`. Inline events are skipped while `inline_depth`
/// is non-zero because the whole inline span was already copied verbatim
/// when its start tag fired.
struct TreeBuilder<'a> {
    source: &'a str,
    finished: Vec<Arc<Block>>,
    stack: Vec<Block>,
    leaf: Option<Leaf>,
    inline_depth: usize,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            finished: Vec::new(),
            stack: Vec::new(),
            leaf: None,
            inline_depth: 0,
        }
    }

    fn process(&mut self, event: Event<'_>, range: Range<usize>) -> Result<(), ParseError> {
        match event {
            Event::Start(tag) => self.start_tag(tag, range)?,
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text_event(&text, range),
            Event::Code(_) | Event::InlineHtml(_) => self.raw_inline(range),
            Event::Html(html) => self.html_event(&html),
            Event::SoftBreak => self.break_event(" "),
            Event::HardBreak => self.break_event("  \n"),
            Event::Rule => {
                self.close_leaf();
                self.close_block(Block::thematic_break());
            }
            // Extension events; none of these fire with default options.
            _ => {}
        }
        Ok(())
    }

    fn start_tag(&mut self, tag: Tag<'_>, range: Range<usize>) -> Result<(), ParseError> {
        match tag {
            Tag::Paragraph => {
                self.close_leaf();
                self.leaf = Some(Leaf {
                    kind: self.prose_leaf_kind(),
                    buf: String::new(),
                });
            }
            Tag::Heading { level, .. } => {
                self.close_leaf();
                self.leaf = Some(Leaf {
                    kind: LeafKind::Heading(level as u8),
                    buf: String::new(),
                });
            }
            Tag::CodeBlock(kind) => {
                self.close_leaf();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        if info.is_empty() {
                            None
                        } else {
                            Some(info.to_string())
                        }
                    }
                    // Indented code is canonicalized to a fence.
                    CodeBlockKind::Indented => None,
                };
                self.leaf = Some(Leaf {
                    kind: LeafKind::Code { lang },
                    buf: String::new(),
                });
            }
            Tag::HtmlBlock => {
                self.close_leaf();
                self.leaf = Some(Leaf {
                    kind: LeafKind::Html,
                    buf: String::new(),
                });
            }
            Tag::List(start) => {
                let kind = match start {
                    Some(start) => BlockKind::NumberedList { start },
                    None => BlockKind::BulletList,
                };
                self.push_container(kind)?;
            }
            Tag::Item => self.push_container(BlockKind::ListItem)?,
            Tag::BlockQuote(_) => self.push_container(BlockKind::BlockQuote)?,
            Tag::Emphasis
            | Tag::Strong
            | Tag::Strikethrough
            | Tag::Superscript
            | Tag::Subscript
            | Tag::Link { .. }
            | Tag::Image { .. } => {
                if self.inline_depth == 0 {
                    self.push_raw(range);
                }
                self.inline_depth += 1;
            }
            // Tables, footnotes and metadata blocks are not enabled.
            _ => {}
        }
        Ok(())
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock | TagEnd::HtmlBlock => {
                self.close_leaf();
            }
            TagEnd::List(_) | TagEnd::Item | TagEnd::BlockQuote(_) => {
                // Tight list items never emit a paragraph end, so the item
                // text capture is still open here.
                self.close_leaf();
                self.pop_container();
            }
            TagEnd::Emphasis
            | TagEnd::Strong
            | TagEnd::Strikethrough
            | TagEnd::Superscript
            | TagEnd::Subscript
            | TagEnd::Link
            | TagEnd::Image => {
                self.inline_depth = self.inline_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn text_event(&mut self, text: &str, range: Range<usize>) {
        if self.inline_depth > 0 {
            return;
        }
        let verbatim = matches!(
            self.leaf,
            Some(Leaf {
                kind: LeafKind::Code { .. } | LeafKind::Html,
                ..
            })
        );
        if verbatim {
            // Cow text, not the raw slice: indented code arrives with its
            // indent already stripped.
            self.ensure_leaf().buf.push_str(text);
        } else {
            self.push_raw(range);
        }
    }

    fn raw_inline(&mut self, range: Range<usize>) {
        if self.inline_depth == 0 {
            self.push_raw(range);
        }
    }

    fn html_event(&mut self, html: &str) {
        if self.leaf.is_none() {
            self.leaf = Some(Leaf {
                kind: LeafKind::Html,
                buf: String::new(),
            });
        }
        if let Some(leaf) = &mut self.leaf {
            leaf.buf.push_str(html);
        }
    }

    fn break_event(&mut self, text: &str) {
        if self.inline_depth > 0 {
            return;
        }
        self.ensure_leaf().buf.push_str(text);
    }

    fn push_raw(&mut self, range: Range<usize>) {
        let source = self.source;
        let slice = &source[range];
        if slice.contains('\n') {
            let folded = unwrap_inline(slice);
            self.ensure_leaf().buf.push_str(&folded);
        } else {
            self.ensure_leaf().buf.push_str(slice);
        }
    }

    /// Leaf for the first paragraph of a list item vs. an ordinary one.
    ///
    /// The first paragraph of an item is the item's own text; later
    /// paragraphs become nested child blocks.
    fn prose_leaf_kind(&self) -> LeafKind {
        match self.stack.last() {
            Some(item) if matches!(item.kind, BlockKind::ListItem) && item.children.is_empty() => {
                LeafKind::ItemText
            }
            _ => LeafKind::Paragraph,
        }
    }

    fn ensure_leaf(&mut self) -> &mut Leaf {
        let kind = self.prose_leaf_kind();
        self.leaf.get_or_insert_with(|| Leaf {
            kind,
            buf: String::new(),
        })
    }

    fn push_container(&mut self, kind: BlockKind) -> Result<(), ParseError> {
        self.close_leaf();
        if self.stack.len() >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                max_depth: MAX_DEPTH,
            });
        }
        self.stack.push(Block::new(kind, Vec::new()));
        Ok(())
    }

    fn pop_container(&mut self) {
        if let Some(block) = self.stack.pop() {
            self.close_block(block);
        }
    }

    fn close_leaf(&mut self) {
        let Some(leaf) = self.leaf.take() else { return };
        match leaf.kind {
            LeafKind::Paragraph => {
                if !leaf.buf.is_empty() {
                    self.close_block(Block::paragraph(leaf.buf));
                }
            }
            LeafKind::ItemText => {
                if leaf.buf.is_empty() {
                    return;
                }
                match self.stack.last_mut() {
                    Some(item) if matches!(item.kind, BlockKind::ListItem) => {
                        item.children.push(Node::Text(TextSpan::new(leaf.buf)));
                    }
                    _ => self.close_block(Block::paragraph(leaf.buf)),
                }
            }
            LeafKind::Heading(level) => self.close_block(Block::heading(level, leaf.buf)),
            LeafKind::Code { lang } => {
                let mut code = leaf.buf;
                if code.ends_with('\n') {
                    code.pop();
                }
                self.close_block(Block::code_fence(lang.as_deref(), code));
            }
            LeafKind::Html => {
                let mut html = leaf.buf;
                if html.ends_with('\n') {
                    html.pop();
                }
                if !html.is_empty() {
                    self.close_block(Block::paragraph(html));
                }
            }
        }
    }

    /// Attach a completed block to the innermost open container, or to the
    /// finished top-level sequence.
    ///
    /// Adjacent sibling lists of the same kind are merged. `pulldown-cmark`
    /// starts a new list whenever the marker style changes, but canonical
    /// output has a single marker style, so two such lists would collapse
    /// into one on the next parse anyway.
    fn close_block(&mut self, block: Block) {
        match self.stack.last_mut() {
            Some(parent) => match parent.children.last_mut() {
                Some(Node::Block(last)) if same_list_kind(&last.kind, &block.kind) => {
                    last.children.extend(block.children);
                }
                _ => parent.children.push(Node::Block(block)),
            },
            None => match self.finished.last_mut() {
                Some(last) if same_list_kind(&last.kind, &block.kind) => {
                    Arc::make_mut(last).children.extend(block.children);
                }
                _ => self.finished.push(Arc::new(block)),
            },
        }
    }

    fn finish(mut self) -> Vec<Arc<Block>> {
        self.close_leaf();
        // Event streams are balanced, but fold up any stragglers rather
        // than dropping them.
        while let Some(block) = self.stack.pop() {
            self.close_block(block);
        }
        self.finished
    }
}

static SOFT_WRAP: OnceLock<Regex> = OnceLock::new();

/// Line breaks inside a single inline span fold to one space, the same
/// treatment soft breaks get between inline events.
fn unwrap_inline(text: &str) -> Cow<'_, str> {
    let re = SOFT_WRAP.get_or_init(|| {
        Regex::new(r"[ \t]*\n[ \t]*").expect("Invalid line wrap regex")
    });
    re.replace_all(text, " ")
}

fn same_list_kind(a: &BlockKind, b: &BlockKind) -> bool {
    matches!(
        (a, b),
        (BlockKind::BulletList, BlockKind::BulletList)
            | (
                BlockKind::NumberedList { .. },
                BlockKind::NumberedList { .. }
            )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(text: &str) -> Arc<Block> {
        let blocks = parse(text).unwrap();
        assert_eq!(blocks.len(), 1, "expected a single block for {text:?}");
        blocks.into_iter().next().unwrap()
    }

    fn child_blocks(block: &Block) -> Vec<&Block> {
        block.children.iter().filter_map(Node::as_block).collect()
    }

    // ============ Paragraph and inline tests ============

    #[test]
    fn test_parse_paragraph() {
        let block = parse_one("hello world");
        assert_eq!(block.kind, BlockKind::Paragraph);
        assert_eq!(block.text(), "hello world");
    }

    #[test]
    fn test_soft_breaks_join_with_space() {
        let block = parse_one("line one\nline two");
        assert_eq!(block.text(), "line one line two");
    }

    #[test]
    fn test_hard_break_preserved() {
        let block = parse_one("first  \nsecond");
        assert_eq!(block.text(), "first  \nsecond");
    }

    #[test]
    fn test_inline_markup_kept_verbatim() {
        let source = "some **bold**, *emphasis*, `code` and a [link](https://example.com)";
        let block = parse_one(source);
        assert_eq!(block.text(), source);
    }

    #[test]
    fn test_escapes_kept_verbatim() {
        let source = r"not \*emphasis\* and an &amp; entity";
        let block = parse_one(source);
        assert_eq!(block.text(), source);
    }

    #[test]
    fn test_multiple_paragraphs() {
        let blocks = parse("one\n\ntwo").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text(), "one");
        assert_eq!(blocks[1].text(), "two");
    }

    // ============ Heading tests ============

    #[test]
    fn test_atx_heading_levels() {
        let blocks = parse("# First\n\n###### Last").unwrap();
        assert_eq!(blocks[0].kind, BlockKind::Heading { level: 1 });
        assert_eq!(blocks[0].text(), "First");
        assert_eq!(blocks[1].kind, BlockKind::Heading { level: 6 });
        assert_eq!(blocks[1].text(), "Last");
    }

    #[test]
    fn test_setext_heading_becomes_atx() {
        let block = parse_one("Title\n=====");
        assert_eq!(block.kind, BlockKind::Heading { level: 1 });
        assert_eq!(block.text(), "Title");
    }

    #[test]
    fn test_empty_heading() {
        let block = parse_one("##");
        assert_eq!(block.kind, BlockKind::Heading { level: 2 });
        assert_eq!(block.text(), "");
    }

    // ============ List tests ============

    #[test]
    fn test_tight_bullet_list() {
        let list = parse_one("- alpha\n- beta");
        assert_eq!(list.kind, BlockKind::BulletList);
        let items = child_blocks(&list);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, BlockKind::ListItem);
        assert_eq!(items[0].text(), "alpha");
        assert_eq!(items[1].text(), "beta");
    }

    #[test]
    fn test_numbered_list_keeps_start() {
        let list = parse_one("3. third\n4. fourth");
        assert_eq!(list.kind, BlockKind::NumberedList { start: 3 });
        let items = child_blocks(&list);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text(), "third");
    }

    #[test]
    fn test_nested_list() {
        let list = parse_one("- outer\n  - inner");
        let items = child_blocks(&list);
        assert_eq!(items.len(), 1);
        let item = items[0];
        assert_eq!(item.children.len(), 2, "item text plus nested list");
        assert!(matches!(item.children[0], Node::Text(_)));
        let nested = item.children[1].as_block().unwrap();
        assert_eq!(nested.kind, BlockKind::BulletList);
        assert_eq!(nested.text(), "inner");
    }

    #[test]
    fn test_loose_item_keeps_first_paragraph_as_item_text() {
        let list = parse_one("- first\n\n  second");
        let items = child_blocks(&list);
        assert_eq!(items.len(), 1);
        let item = items[0];
        assert_eq!(item.children.len(), 2);
        assert_eq!(item.children[0].as_text().unwrap().text, "first");
        let para = item.children[1].as_block().unwrap();
        assert_eq!(para.kind, BlockKind::Paragraph);
        assert_eq!(para.text(), "second");
    }

    #[test]
    fn test_marker_change_merges_bullet_lists() {
        let list = parse_one("- dash\n* star");
        assert_eq!(list.kind, BlockKind::BulletList);
        let items = child_blocks(&list);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text(), "dash");
        assert_eq!(items[1].text(), "star");
    }

    #[test]
    fn test_wrapped_emphasis_folds_to_one_line() {
        let block = parse_one("some *wrapped\nemphasis* here");
        assert_eq!(block.text(), "some *wrapped emphasis* here");
    }

    #[test]
    fn test_delimiter_change_merges_numbered_lists() {
        let list = parse_one("1. dot\n1) paren");
        assert_eq!(list.kind, BlockKind::NumberedList { start: 1 });
        assert_eq!(child_blocks(&list).len(), 2);
    }

    #[test]
    fn test_bullet_and_numbered_lists_stay_separate() {
        let blocks = parse("- bullet\n\n1. numbered").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, BlockKind::BulletList);
        assert_eq!(blocks[1].kind, BlockKind::NumberedList { start: 1 });
    }

    #[test]
    fn test_empty_list_item() {
        let list = parse_one("- first\n-\n- third");
        let items = child_blocks(&list);
        assert_eq!(items.len(), 3);
        assert!(items[1].children.is_empty());
    }

    // ============ Code block tests ============

    #[test]
    fn test_fenced_code_with_language() {
        let block = parse_one("```rust\nfn main() {}\n```");
        assert_eq!(
            block.kind,
            BlockKind::CodeFence {
                lang: Some("rust".to_string())
            }
        );
        assert_eq!(block.text(), "fn main() {}");
    }

    #[test]
    fn test_fenced_code_without_language() {
        let block = parse_one("```\nplain\n```");
        assert_eq!(block.kind, BlockKind::CodeFence { lang: None });
    }

    #[test]
    fn test_code_preserves_interior_blank_lines() {
        let block = parse_one("```\nfirst\n\nlast\n```");
        assert_eq!(block.text(), "first\n\nlast");
    }

    #[test]
    fn test_indented_code_becomes_fence() {
        let block = parse_one("    indented code");
        assert_eq!(block.kind, BlockKind::CodeFence { lang: None });
        assert_eq!(block.text(), "indented code");
    }

    #[test]
    fn test_code_is_not_inline_parsed() {
        let block = parse_one("```\n**not bold**\n```");
        assert_eq!(block.text(), "**not bold**");
    }

    // ============ Quote and break tests ============

    #[test]
    fn test_block_quote_with_two_paragraphs() {
        let quote = parse_one("> first\n>\n> second");
        assert_eq!(quote.kind, BlockKind::BlockQuote);
        let children = child_blocks(&quote);
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text(), "first");
        assert_eq!(children[1].text(), "second");
    }

    #[test]
    fn test_lazy_quote_continuation() {
        let quote = parse_one("> first\ncontinued");
        assert_eq!(quote.text(), "first continued");
    }

    #[test]
    fn test_thematic_break() {
        let blocks = parse("before\n\n---\n\nafter").unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].kind, BlockKind::ThematicBreak);
    }

    #[test]
    fn test_html_block_kept_as_raw_paragraph() {
        let block = parse_one("<div>\nhi\n</div>");
        assert_eq!(block.kind, BlockKind::Paragraph);
        assert_eq!(block.text(), "<div>\nhi\n</div>");
    }

    // ============ Edge case tests ============

    #[test]
    fn test_empty_input() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_nesting_depth_limit() {
        let mut text = String::new();
        for depth in 0..80 {
            text.push_str(&"  ".repeat(depth));
            text.push_str("- x\n");
        }
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, ParseError::TooDeep { max_depth: MAX_DEPTH }));
    }

    #[test]
    fn test_shared_blocks_compare_equal_across_parses() {
        let a = parse("# Title\n\nbody").unwrap();
        let b = parse("# Title\n\nbody").unwrap();
        assert_eq!(a, b);
    }
}
