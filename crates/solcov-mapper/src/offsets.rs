// SPDX-License-Identifier: AGPL-3.0

use solcov_constants::{FIRST_COLUMN, FIRST_LINE};
use solcov_exceptions::{CoverageError, CoverageResult};

use crate::{LineColumn, SourceRange};

/// Byte offset -> line/column lookup for one source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl OffsetIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );

        Self {
            line_starts,
            len: text.len(),
        }
    }

    /// Length in bytes of the indexed text
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Defined for every offset in `[0, len]`.
    pub fn offset_to_line_column(&self, offset: usize) -> CoverageResult<LineColumn> {
        if offset > self.len {
            return Err(CoverageError::OutOfRangeOffset {
                offset: offset as i64,
                len: self.len,
            });
        }

        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };

        Ok(LineColumn {
            line: line_idx + FIRST_LINE,
            column: offset - self.line_starts[line_idx] + FIRST_COLUMN,
        })
    }

    /// Range covering `[start, end)`; the reported end is the last
    /// character, or `start` itself for an empty span.
    pub fn range(&self, start: usize, end: usize) -> CoverageResult<SourceRange> {
        let last = if end > start { end - 1 } else { start };
        Ok(SourceRange {
            start: self.offset_to_line_column(start)?,
            end: self.offset_to_line_column(last)?,
        })
    }

    /// Range from a signed `start:length` pair as found in source maps.
    pub fn range_from_source_map(&self, start: i64, length: i64) -> CoverageResult<SourceRange> {
        if start < 0 || length < 0 {
            return Err(CoverageError::OutOfRangeOffset {
                offset: start.min(length),
                len: self.len,
            });
        }
        let start = start as usize;
        self.range(start, start + length as usize)
    }
}
