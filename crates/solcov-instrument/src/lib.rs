// SPDX-License-Identifier: AGPL-3.0

//! Static instrumentation of Solidity sources
//!
//! Walks a contract file's syntax tree and assigns stable ids and source
//! ranges to every statement, `if` branch and function. Ids start at 1 per
//! file and follow traversal order, so instrumenting the same text twice
//! yields the same maps.

use serde::{Deserialize, Serialize};
use solcov_exceptions::CoverageResult;
use solcov_mapper::{OffsetIndex, SourceRange};
use std::collections::BTreeMap;

mod ast;
mod visitor;
mod walker;

pub use ast::{AstNode, NodeKind};
pub use visitor::Visitor;
pub use walker::Walker;

pub type StatementId = u32;
pub type BranchId = u32;
pub type FunctionId = u32;

pub type StatementDescription = SourceRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchType {
    If,
}

/// Both arms of an `if`. Index 0 is the consequent, index 1 the
/// alternate, or the `if` statement itself when there is no `else`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchDescription {
    pub line: usize,
    #[serde(rename = "type")]
    pub branch_type: BranchType,
    pub locations: [SourceRange; 2],
    /// No `else` in the source. Ranges inside the consequent never count
    /// toward index 1.
    #[serde(skip)]
    pub implicit_alternate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescription {
    pub name: String,
    pub line: usize,
    pub loc: SourceRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<bool>,
}

/// Branch shapes that are recognised but not tracked yet. They never
/// contribute to branch coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UntrackedBranchKind {
    /// `assert(..)` / `require(..)` conditions
    AssertOrRequire,
    /// `x = cond ? a : b`
    Ternary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UntrackedBranch {
    pub kind: UntrackedBranchKind,
    pub loc: SourceRange,
}

/// Traversal state for one file. Owned by a single `instrument` call.
#[derive(Debug, Default)]
pub struct InstrumentationContext {
    statement_id: StatementId,
    branch_id: BranchId,
    fn_id: FunctionId,
    pub statement_map: BTreeMap<StatementId, StatementDescription>,
    pub branch_map: BTreeMap<BranchId, BranchDescription>,
    pub fn_map: BTreeMap<FunctionId, FunctionDescription>,
    pub untracked: Vec<UntrackedBranch>,
}

impl InstrumentationContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_statement_id(&mut self) -> StatementId {
        self.statement_id += 1;
        self.statement_id
    }

    fn next_branch_id(&mut self) -> BranchId {
        self.branch_id += 1;
        self.branch_id
    }

    fn next_fn_id(&mut self) -> FunctionId {
        self.fn_id += 1;
        self.fn_id
    }

    fn finish(self, file_name: &str) -> InstrumentedSource {
        InstrumentedSource {
            file_name: file_name.to_string(),
            statement_map: self.statement_map,
            branch_map: self.branch_map,
            fn_map: self.fn_map,
            untracked: self.untracked,
        }
    }
}

/// Instrumentation maps of one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentedSource {
    pub file_name: String,
    pub statement_map: BTreeMap<StatementId, StatementDescription>,
    pub branch_map: BTreeMap<BranchId, BranchDescription>,
    pub fn_map: BTreeMap<FunctionId, FunctionDescription>,
    pub untracked: Vec<UntrackedBranch>,
}

/// Seam to the external Solidity parser.
pub trait SourceParser: Send + Sync {
    fn parse(&self, file_name: &str, source: &str) -> CoverageResult<AstNode>;
}

/// Instruments one file.
pub fn instrument(file_name: &str, source: &str, ast: &AstNode) -> CoverageResult<InstrumentedSource> {
    let offsets = OffsetIndex::new(source);
    let walker = Walker::new(Visitor::new(&offsets));
    let mut ctx = InstrumentationContext::new();
    walker.walk(&mut ctx, ast)?;

    tracing::debug!(
        file = file_name,
        statements = ctx.statement_map.len(),
        branches = ctx.branch_map.len(),
        functions = ctx.fn_map.len(),
        "instrumented"
    );

    Ok(ctx.finish(file_name))
}

/// Parses and instruments one file.
pub fn instrument_source(
    parser: &dyn SourceParser,
    file_name: &str,
    source: &str,
) -> CoverageResult<InstrumentedSource> {
    let ast = parser.parse(file_name, source)?;
    instrument(file_name, source, &ast)
}
