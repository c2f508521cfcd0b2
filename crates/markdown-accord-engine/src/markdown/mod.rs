/*!
# Markdown Layer

Converts between markdown text and the block tree in [`crate::editing`].

## Architecture Overview

### 1. Parsing (`parse.rs`)

- Streams `pulldown-cmark` events into a block tree
- Captures inline content verbatim from the source text
- Canonicalizes structure only: marker styles, setext headings, indented
  code

### 2. Serialization (`serialize.rs`)

- Renders the canonical text form used for diffing and merging
- One blank line between top-level blocks, trailing newline at the end
- Deterministic: equal trees always produce equal text

Canonical text is a fixed point of the pair: parsing serializer output
and serializing again reproduces the same bytes. The sync engine relies
on this to keep its merge baseline aligned with the document it
describes.
*/

// Module exports
pub mod parse;
pub mod serialize;

// Public API re-exports
pub use parse::{MAX_DEPTH, ParseError, parse};
pub use serialize::serialize;
