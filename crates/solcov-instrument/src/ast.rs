// SPDX-License-Identifier: AGPL-3.0

//! Parsed syntax tree as produced by the external Solidity parser.

use serde_json::Value as JsonValue;
use solcov_exceptions::{CoverageError, CoverageResult};

/// A syntax tree node with its byte span `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub start: usize,
    pub end: usize,
    pub kind: NodeKind,
}

/// Node kinds the instrumenter distinguishes. Everything else is kept as
/// `Other` together with its child nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Program {
        body: Vec<AstNode>,
    },
    ContractStatement {
        name: String,
        body: Vec<AstNode>,
    },
    LibraryStatement {
        name: String,
        body: Vec<AstNode>,
    },
    FunctionDeclaration {
        name: String,
        modifiers: Vec<AstNode>,
        body: Option<Box<AstNode>>,
    },
    ModifierDeclaration {
        name: String,
        body: Option<Box<AstNode>>,
    },
    BlockStatement {
        body: Vec<AstNode>,
    },
    ExpressionStatement {
        expression: Box<AstNode>,
    },
    ReturnStatement,
    ThrowStatement,
    PlaceholderStatement,
    StateVariableDeclaration,
    VariableDeclaration {
        declarations: Vec<AstNode>,
    },
    VariableDeclarationTuple {
        declarations: Vec<AstNode>,
    },
    ForStatement {
        body: Box<AstNode>,
    },
    WhileStatement {
        body: Box<AstNode>,
    },
    IfStatement {
        consequent: Box<AstNode>,
        alternate: Option<Box<AstNode>>,
    },
    CallExpression {
        callee: Box<AstNode>,
        arguments: Vec<AstNode>,
    },
    AssignmentExpression {
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    ConditionalExpression {
        test: Box<AstNode>,
        consequent: Box<AstNode>,
        alternate: Box<AstNode>,
    },
    MemberExpression {
        object: Box<AstNode>,
    },
    UnaryExpression {
        argument: Box<AstNode>,
    },
    NewExpression {
        callee: Box<AstNode>,
    },
    UsingStatement {
        target: Option<Box<AstNode>>,
    },
    Identifier {
        name: String,
    },
    DeclarativeExpression {
        name: String,
    },
    Other {
        kind: String,
        children: Vec<AstNode>,
    },
}

impl NodeKind {
    /// The parser's `type` tag for this kind
    pub fn type_name(&self) -> &str {
        match self {
            NodeKind::Program { .. } => "Program",
            NodeKind::ContractStatement { .. } => "ContractStatement",
            NodeKind::LibraryStatement { .. } => "LibraryStatement",
            NodeKind::FunctionDeclaration { .. } => "FunctionDeclaration",
            NodeKind::ModifierDeclaration { .. } => "ModifierDeclaration",
            NodeKind::BlockStatement { .. } => "BlockStatement",
            NodeKind::ExpressionStatement { .. } => "ExpressionStatement",
            NodeKind::ReturnStatement => "ReturnStatement",
            NodeKind::ThrowStatement => "ThrowStatement",
            NodeKind::PlaceholderStatement => "PlaceholderStatement",
            NodeKind::StateVariableDeclaration => "StateVariableDeclaration",
            NodeKind::VariableDeclaration { .. } => "VariableDeclaration",
            NodeKind::VariableDeclarationTuple { .. } => "VariableDeclarationTuple",
            NodeKind::ForStatement { .. } => "ForStatement",
            NodeKind::WhileStatement { .. } => "WhileStatement",
            NodeKind::IfStatement { .. } => "IfStatement",
            NodeKind::CallExpression { .. } => "CallExpression",
            NodeKind::AssignmentExpression { .. } => "AssignmentExpression",
            NodeKind::ConditionalExpression { .. } => "ConditionalExpression",
            NodeKind::MemberExpression { .. } => "MemberExpression",
            NodeKind::UnaryExpression { .. } => "UnaryExpression",
            NodeKind::NewExpression { .. } => "NewExpression",
            NodeKind::UsingStatement { .. } => "UsingStatement",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::DeclarativeExpression { .. } => "DeclarativeExpression",
            NodeKind::Other { kind, .. } => kind,
        }
    }
}

impl AstNode {
    pub fn new(start: usize, end: usize, kind: NodeKind) -> Self {
        Self { start, end, kind }
    }

    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    /// Converts a parser JSON node (`type`, `start`, `end` plus kind
    /// specific fields) into the typed tree.
    pub fn from_json(node: &JsonValue) -> CoverageResult<Self> {
        let node_type = node
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| malformed("node without `type`"))?;
        let start = offset_field(node, node_type, "start")?;
        let end = offset_field(node, node_type, "end")?;

        let kind = match node_type {
            "Program" => NodeKind::Program {
                body: child_list(node, "body")?,
            },
            "ContractStatement" => NodeKind::ContractStatement {
                name: name_field(node),
                body: child_list(node, "body")?,
            },
            "LibraryStatement" => NodeKind::LibraryStatement {
                name: name_field(node),
                body: child_list(node, "body")?,
            },
            "FunctionDeclaration" => NodeKind::FunctionDeclaration {
                name: name_field(node),
                modifiers: child_list(node, "modifiers")?,
                body: optional_child(node, "body")?,
            },
            "ModifierDeclaration" => NodeKind::ModifierDeclaration {
                name: name_field(node),
                body: optional_child(node, "body")?,
            },
            "BlockStatement" => NodeKind::BlockStatement {
                body: child_list(node, "body")?,
            },
            "ExpressionStatement" => NodeKind::ExpressionStatement {
                expression: required_child(node, node_type, "expression")?,
            },
            "ReturnStatement" => NodeKind::ReturnStatement,
            "ThrowStatement" => NodeKind::ThrowStatement,
            "PlaceholderStatement" => NodeKind::PlaceholderStatement,
            "StateVariableDeclaration" => NodeKind::StateVariableDeclaration,
            "VariableDeclaration" => NodeKind::VariableDeclaration {
                declarations: child_list(node, "declarations")?,
            },
            "VariableDeclarationTuple" => NodeKind::VariableDeclarationTuple {
                declarations: child_list(node, "declarations")?,
            },
            "ForStatement" => NodeKind::ForStatement {
                body: required_child(node, node_type, "body")?,
            },
            "WhileStatement" => NodeKind::WhileStatement {
                body: required_child(node, node_type, "body")?,
            },
            "IfStatement" => NodeKind::IfStatement {
                consequent: required_child(node, node_type, "consequent")?,
                alternate: optional_child(node, "alternate")?,
            },
            "CallExpression" => NodeKind::CallExpression {
                callee: required_child(node, node_type, "callee")?,
                arguments: child_list(node, "arguments")?,
            },
            "AssignmentExpression" => NodeKind::AssignmentExpression {
                left: required_child(node, node_type, "left")?,
                right: required_child(node, node_type, "right")?,
            },
            "ConditionalExpression" => NodeKind::ConditionalExpression {
                test: required_child(node, node_type, "test")?,
                consequent: required_child(node, node_type, "consequent")?,
                alternate: required_child(node, node_type, "alternate")?,
            },
            "MemberExpression" => NodeKind::MemberExpression {
                object: required_child(node, node_type, "object")?,
            },
            "UnaryExpression" => NodeKind::UnaryExpression {
                argument: required_child(node, node_type, "argument")?,
            },
            "NewExpression" => NodeKind::NewExpression {
                callee: required_child(node, node_type, "callee")?,
            },
            "UsingStatement" => NodeKind::UsingStatement {
                target: optional_child(node, "for")?,
            },
            "Identifier" => NodeKind::Identifier {
                name: name_field(node),
            },
            "DeclarativeExpression" => NodeKind::DeclarativeExpression {
                name: name_field(node),
            },
            other => NodeKind::Other {
                kind: other.to_string(),
                children: generic_children(node)?,
            },
        };

        Ok(Self { start, end, kind })
    }
}

fn malformed(msg: impl Into<String>) -> CoverageError {
    CoverageError::MalformedAst(msg.into())
}

fn is_node(value: &JsonValue) -> bool {
    value.get("type").map(|t| t.is_string()).unwrap_or(false)
}

fn offset_field(node: &JsonValue, node_type: &str, field: &str) -> CoverageResult<usize> {
    node.get(field)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| malformed(format!("{} without `{}` offset", node_type, field)))
}

fn name_field(node: &JsonValue) -> String {
    node.get("name")
        .and_then(|n| n.as_str())
        .unwrap_or("")
        .to_string()
}

fn optional_child(node: &JsonValue, field: &str) -> CoverageResult<Option<Box<AstNode>>> {
    match node.get(field) {
        Some(value) if is_node(value) => Ok(Some(Box::new(AstNode::from_json(value)?))),
        _ => Ok(None),
    }
}

fn required_child(node: &JsonValue, node_type: &str, field: &str) -> CoverageResult<Box<AstNode>> {
    optional_child(node, field)?
        .ok_or_else(|| malformed(format!("{} without `{}`", node_type, field)))
}

/// Node-valued entries of an array field. Missing or null fields are empty.
fn child_list(node: &JsonValue, field: &str) -> CoverageResult<Vec<AstNode>> {
    match node.get(field) {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter(|item| is_node(item))
            .map(AstNode::from_json)
            .collect(),
        Some(value) if is_node(value) => Ok(vec![AstNode::from_json(value)?]),
        _ => Ok(Vec::new()),
    }
}

/// Every node reachable through one field of an unknown node kind, in
/// field order.
fn generic_children(node: &JsonValue) -> CoverageResult<Vec<AstNode>> {
    let mut children = Vec::new();
    if let Some(fields) = node.as_object() {
        for (field, value) in fields {
            if field == "type" {
                continue;
            }
            match value {
                JsonValue::Array(_) => children.extend(child_list(node, field)?),
                value if is_node(value) => children.push(AstNode::from_json(value)?),
                _ => {}
            }
        }
    }
    Ok(children)
}
