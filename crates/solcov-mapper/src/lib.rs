// SPDX-License-Identifier: AGPL-3.0

//! Source locations for compiled contracts
//!
//! Translates byte offsets into line/column positions and decodes the
//! compiler's per-instruction source maps into program counter lookups.

use serde::{Deserialize, Serialize};

mod offsets;
mod source_map;

pub use offsets::OffsetIndex;
pub use source_map::{
    decode_bytecode_hex, decode_source_map, instruction_offsets, parse_source_map, IndexedSource,
    JumpType, PcToSourceRange, SourceMapEntry, UnresolvedInstruction,
};

/// A position in a source file. Lines start at 1, columns at 0, and
/// columns count bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

impl LineColumn {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Inclusive range inside a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: LineColumn,
    pub end: LineColumn,
}

impl SourceRange {
    pub fn new(start: LineColumn, end: LineColumn) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// True when `child` lies entirely within `self`. Every range contains
    /// itself.
    pub fn contains(&self, child: &SourceRange) -> bool {
        self.start <= child.start && child.end <= self.end
    }
}

/// A range attributed to one of the files a contract was compiled from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrossFileSourceRange {
    pub file_index: usize,
    pub file_name: String,
    pub location: SourceRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(sl: usize, sc: usize, el: usize, ec: usize) -> SourceRange {
        SourceRange::new(LineColumn::new(sl, sc), LineColumn::new(el, ec))
    }

    #[test]
    fn test_line_column_ordering() {
        assert!(LineColumn::new(1, 9) < LineColumn::new(2, 0));
        assert!(LineColumn::new(3, 1) < LineColumn::new(3, 2));
        assert_eq!(LineColumn::new(4, 4), LineColumn::new(4, 4));
    }

    #[test]
    fn test_contains_reflexive() {
        let r = range(2, 4, 5, 1);
        assert!(r.contains(&r));
    }

    #[test]
    fn test_contains_nested_and_disjoint() {
        let parent = range(2, 0, 6, 10);
        assert!(parent.contains(&range(3, 2, 3, 8)));
        assert!(parent.contains(&range(2, 0, 2, 0)));
        assert!(!parent.contains(&range(1, 5, 3, 0)));
        assert!(!parent.contains(&range(6, 0, 6, 11)));
    }
}
