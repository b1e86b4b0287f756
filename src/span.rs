use serde::{Deserialize, Serialize};

/// Source location with byte offsets and a 1-indexed line/column position.
///
/// Spans are attached to syntax-tree nodes and carried into IR operations as
/// bookmarks so that diagnostics raised during constant evaluation can point
/// back at the originating source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}
