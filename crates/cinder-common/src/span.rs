use serde::Serialize;

/// Byte-offset span into source text. Start is inclusive, end is exclusive.
///
/// All positions in the Cinder core are tracked as byte offsets into the
/// original source string. Line/column information is computed on demand
/// via [`LineIndex`] when needed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Span used for trees that have no source position.
    pub const DUMMY: Span = Span { start: 0, end: 0 };

    /// Create a new span from byte offsets.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span is empty (zero-length).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether this is the dummy position.
    pub fn is_dummy(&self) -> bool {
        *self == Span::DUMMY
    }

    /// Merge two spans into one that covers both.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Whether `other` lies entirely inside this span.
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A 1-based line and column, printed as `line:column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for LineCol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Offsets of line starts in one source text, for turning spans into the
/// line/column positions diagnostics print.
#[derive(Debug)]
pub struct LineIndex {
    starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i as u32 + 1))
            .collect();
        LineIndex { starts, len: source.len() as u32 }
    }

    /// Position of a byte offset. Offsets past the end clamp to the end.
    pub fn locate(&self, offset: u32) -> LineCol {
        let offset = offset.min(self.len);
        let line = self.starts.partition_point(|s| *s <= offset).max(1) - 1;
        LineCol { line: line as u32 + 1, column: offset - self.starts[line] + 1 }
    }

    /// Position of the first byte of `span`.
    pub fn start_of(&self, span: Span) -> LineCol {
        self.locate(span.start)
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_merge_covers_both() {
        let a = Span::new(4, 8);
        let b = Span::new(2, 5);
        assert_eq!(a.merge(b), Span::new(2, 8));
        assert!(a.merge(b).contains(a));
    }

    #[test]
    fn dummy_span_is_empty() {
        assert!(Span::DUMMY.is_empty());
        assert!(Span::DUMMY.is_dummy());
        assert!(!Span::new(1, 2).is_dummy());
    }

    #[test]
    fn spans_map_to_lines_and_columns() {
        let idx = LineIndex::new("class A {\n  int x;\n}\n");
        assert_eq!(idx.locate(0), LineCol { line: 1, column: 1 });
        assert_eq!(idx.start_of(Span::new(12, 15)).to_string(), "2:3");
        assert_eq!(idx.locate(500).line, 4);
        assert_eq!(idx.line_count(), 4);
    }
}
