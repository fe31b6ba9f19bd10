// SPDX-License-Identifier: AGPL-3.0

use solcov_constants::MEMBER_TERNARY_START_CORRECTION;
use solcov_exceptions::{CoverageError, CoverageResult};
use solcov_mapper::{OffsetIndex, SourceRange};

use crate::{
    AstNode, BranchDescription, BranchType, FunctionDescription, InstrumentationContext, NodeKind,
    UntrackedBranch, UntrackedBranchKind,
};

/// Records descriptions into an [`InstrumentationContext`]. One handler per
/// node kind that produces output.
#[derive(Debug, Clone, Copy)]
pub struct Visitor<'a> {
    offsets: &'a OffsetIndex,
}

impl<'a> Visitor<'a> {
    pub fn new(offsets: &'a OffsetIndex) -> Self {
        Self { offsets }
    }

    fn range(&self, node: &AstNode) -> CoverageResult<SourceRange> {
        self.offsets.range(node.start, node.end)
    }

    pub fn visit_statement(
        &self,
        ctx: &mut InstrumentationContext,
        node: &AstNode,
    ) -> CoverageResult<()> {
        let loc = self.range(node)?;
        let id = ctx.next_statement_id();
        ctx.statement_map.insert(id, loc);
        Ok(())
    }

    pub fn visit_function_declaration(
        &self,
        ctx: &mut InstrumentationContext,
        node: &AstNode,
        name: &str,
    ) -> CoverageResult<()> {
        let loc = self.range(node)?;
        let id = ctx.next_fn_id();
        ctx.fn_map.insert(
            id,
            FunctionDescription {
                name: name.to_string(),
                line: loc.start.line,
                loc,
                skip: None,
            },
        );
        Ok(())
    }

    pub fn visit_if_statement(
        &self,
        ctx: &mut InstrumentationContext,
        node: &AstNode,
        consequent: &AstNode,
        alternate: Option<&AstNode>,
    ) -> CoverageResult<()> {
        let own = self.range(node)?;
        let consequent = self.range(consequent)?;
        let (alternate, implicit_alternate) = match alternate {
            Some(alternate) => (self.range(alternate)?, false),
            None => (own, true),
        };

        let id = ctx.next_branch_id();
        ctx.branch_map.insert(
            id,
            BranchDescription {
                line: own.start.line,
                branch_type: BranchType::If,
                locations: [consequent, alternate],
                implicit_alternate,
            },
        );
        Ok(())
    }

    /// Only assignments of a ternary are of interest. Their target must be
    /// a plain name, a declaration or a member access. The member-access
    /// start correction applies to the ternary's `UntrackedBranch` location;
    /// the enclosing statement keeps the parser's range.
    pub fn visit_assignment_expression(
        &self,
        ctx: &mut InstrumentationContext,
        node: &AstNode,
        left: &AstNode,
        right: &AstNode,
    ) -> CoverageResult<()> {
        if !matches!(right.kind, NodeKind::ConditionalExpression { .. }) {
            return Ok(());
        }

        let start = match left.kind {
            NodeKind::Identifier { .. } | NodeKind::DeclarativeExpression { .. } => node.start,
            NodeKind::MemberExpression { .. } => {
                node.start.saturating_sub(MEMBER_TERNARY_START_CORRECTION)
            }
            _ => {
                return Err(CoverageError::UnsupportedAssignmentTarget {
                    kind: left.type_name().to_string(),
                    start: left.start,
                })
            }
        };

        self.visit_conditional_expression(ctx, start, node.end)
    }

    fn visit_conditional_expression(
        &self,
        ctx: &mut InstrumentationContext,
        start: usize,
        end: usize,
    ) -> CoverageResult<()> {
        let loc = self.offsets.range(start, end)?;
        ctx.untracked.push(UntrackedBranch {
            kind: UntrackedBranchKind::Ternary,
            loc,
        });
        Ok(())
    }

    pub fn visit_assert_or_require(
        &self,
        ctx: &mut InstrumentationContext,
        node: &AstNode,
    ) -> CoverageResult<()> {
        let loc = self.range(node)?;
        ctx.untracked.push(UntrackedBranch {
            kind: UntrackedBranchKind::AssertOrRequire,
            loc,
        });
        Ok(())
    }
}
