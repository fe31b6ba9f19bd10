// SPDX-License-Identifier: AGPL-3.0

//! Coverage errors
//!
//! Every failure the coverage pipeline can raise. Failures fall in two
//! classes. Isolated ones drop a single program counter, source file or
//! trace and aggregation continues. Structural ones abort the affected
//! contract.

use thiserror::Error;

/// How far a failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Only the offending program counter, file or trace is dropped.
    Isolated,
    /// The whole contract is abandoned.
    Structural,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoverageError {
    #[error("Malformed source map entry #{index} `{entry}`: {reason}")]
    MalformedSourceMapEntry {
        index: usize,
        entry: String,
        reason: String,
    },

    #[error("Unknown source file index {file_index} ({num_files} files known)")]
    UnknownSourceFile { file_index: i64, num_files: usize },

    #[error("Unsupported assignment target `{kind}` at offset {start}")]
    UnsupportedAssignmentTarget { kind: String, start: usize },

    #[error("Transaction to an unknown address: {0}")]
    UnknownContractAddress(String),

    #[error("Unknown contract creation transaction: {0}")]
    UnknownCreationTransaction(String),

    #[error("Offset {offset} out of range (source length {len})")]
    OutOfRangeOffset { offset: i64, len: usize },

    #[error("Invalid bytecode: {0}")]
    InvalidBytecode(String),

    #[error("Malformed AST: {0}")]
    MalformedAst(String),
}

impl CoverageError {
    pub fn severity(&self) -> Severity {
        match self {
            CoverageError::UnknownSourceFile { .. }
            | CoverageError::OutOfRangeOffset { .. }
            | CoverageError::UnknownContractAddress(_)
            | CoverageError::UnknownCreationTransaction(_) => Severity::Isolated,
            CoverageError::MalformedSourceMapEntry { .. }
            | CoverageError::UnsupportedAssignmentTarget { .. }
            | CoverageError::InvalidBytecode(_)
            | CoverageError::MalformedAst(_) => Severity::Structural,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.severity() == Severity::Structural
    }

    pub fn malformed_entry(index: usize, entry: &str, reason: impl Into<String>) -> Self {
        CoverageError::MalformedSourceMapEntry {
            index,
            entry: entry.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for coverage operations
pub type CoverageResult<T> = Result<T, CoverageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_entry_display() {
        let err = CoverageError::malformed_entry(3, "1:x", "non-numeric length");
        assert_eq!(
            err.to_string(),
            "Malformed source map entry #3 `1:x`: non-numeric length"
        );
    }

    #[test]
    fn test_unknown_source_file_display() {
        let err = CoverageError::UnknownSourceFile {
            file_index: -1,
            num_files: 2,
        };
        assert_eq!(
            err.to_string(),
            "Unknown source file index -1 (2 files known)"
        );
    }

    #[test]
    fn test_severity_isolated() {
        assert_eq!(
            CoverageError::UnknownContractAddress("0xabc".to_string()).severity(),
            Severity::Isolated
        );
        assert_eq!(
            CoverageError::OutOfRangeOffset { offset: 9, len: 4 }.severity(),
            Severity::Isolated
        );
    }

    #[test]
    fn test_severity_structural() {
        let err = CoverageError::UnsupportedAssignmentTarget {
            kind: "IndexExpression".to_string(),
            start: 12,
        };
        assert!(err.is_structural());
        assert!(CoverageError::malformed_entry(0, "", "empty").is_structural());
    }
}
