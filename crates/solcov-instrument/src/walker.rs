// SPDX-License-Identifier: AGPL-3.0

use solcov_exceptions::CoverageResult;

use crate::{AstNode, InstrumentationContext, NodeKind, Visitor};

/// Callees whose conditions are candidates for per-argument branches
const ASSERTION_CALLEES: &[&str] = &["assert", "require"];

/// Depth-first traversal in source order, dispatching to the [`Visitor`].
#[derive(Debug, Clone, Copy)]
pub struct Walker<'a> {
    visitor: Visitor<'a>,
}

impl<'a> Walker<'a> {
    pub fn new(visitor: Visitor<'a>) -> Self {
        Self { visitor }
    }

    pub fn walk(&self, ctx: &mut InstrumentationContext, node: &AstNode) -> CoverageResult<()> {
        match &node.kind {
            NodeKind::Program { body }
            | NodeKind::ContractStatement { body, .. }
            | NodeKind::LibraryStatement { body, .. }
            | NodeKind::BlockStatement { body } => self.walk_all(ctx, body),

            NodeKind::FunctionDeclaration {
                name,
                modifiers,
                body,
            } => match body {
                Some(body) => {
                    self.visitor.visit_function_declaration(ctx, node, name)?;
                    self.walk_all(ctx, modifiers)?;
                    self.walk(ctx, body)
                }
                None => Ok(()),
            },

            NodeKind::ModifierDeclaration { name, body } => match body {
                Some(body) => {
                    self.visitor.visit_function_declaration(ctx, node, name)?;
                    self.walk(ctx, body)
                }
                None => Ok(()),
            },

            NodeKind::ExpressionStatement { expression } => {
                self.visitor.visit_statement(ctx, node)?;
                self.walk(ctx, expression)
            }

            NodeKind::ReturnStatement
            | NodeKind::ThrowStatement
            | NodeKind::PlaceholderStatement
            | NodeKind::StateVariableDeclaration => self.visitor.visit_statement(ctx, node),

            NodeKind::VariableDeclaration { declarations }
            | NodeKind::VariableDeclarationTuple { declarations } => {
                self.visitor.visit_statement(ctx, node)?;
                self.walk_all(ctx, declarations)
            }

            NodeKind::ForStatement { body } | NodeKind::WhileStatement { body } => {
                self.visitor.visit_statement(ctx, node)?;
                self.walk(ctx, body)
            }

            NodeKind::IfStatement {
                consequent,
                alternate,
            } => {
                self.visitor
                    .visit_if_statement(ctx, node, consequent, alternate.as_deref())?;
                self.walk(ctx, consequent)?;
                match alternate {
                    Some(alternate) => self.walk(ctx, alternate),
                    None => Ok(()),
                }
            }

            NodeKind::CallExpression { callee, .. } => {
                // only the head of a call chain has an Identifier callee
                if let NodeKind::Identifier { name } = &callee.kind {
                    if ASSERTION_CALLEES.contains(&name.as_str()) {
                        self.visitor.visit_assert_or_require(ctx, node)?;
                    }
                }
                self.walk(ctx, callee)
            }

            NodeKind::AssignmentExpression { left, right } => {
                self.visitor
                    .visit_assignment_expression(ctx, node, left, right)?;
                self.walk(ctx, left)?;
                self.walk(ctx, right)
            }

            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                self.walk(ctx, test)?;
                self.walk(ctx, consequent)?;
                self.walk(ctx, alternate)
            }

            NodeKind::MemberExpression { object } => self.walk(ctx, object),
            NodeKind::UnaryExpression { argument } => self.walk(ctx, argument),
            NodeKind::NewExpression { callee } => self.walk(ctx, callee),
            NodeKind::UsingStatement { target } => match target {
                Some(target) => self.walk(ctx, target),
                None => Ok(()),
            },

            NodeKind::Identifier { .. } | NodeKind::DeclarativeExpression { .. } => Ok(()),

            NodeKind::Other { children, .. } => self.walk_all(ctx, children),
        }
    }

    fn walk_all(&self, ctx: &mut InstrumentationContext, nodes: &[AstNode]) -> CoverageResult<()> {
        nodes.iter().try_for_each(|node| self.walk(ctx, node))
    }
}
