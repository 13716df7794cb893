//! Statement nodes of the data, logic and action slots.

use super::expr::{CallExpr, Expr};
use super::range::Span;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn node_type(&self) -> &'static str {
        match &self.kind {
            StatementKind::Assign { .. } => "Assign",
            StatementKind::If(_) => "If",
            StatementKind::Conclude(_) => "Conclude",
            StatementKind::Call(_) => "Call",
            StatementKind::Write { .. } => "Write",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StatementKind {
    /// `X := expr` or `let X be expr`
    Assign { target: String, value: Expr },
    If(IfChain),
    Conclude(Expr),
    /// A call whose result is not bound
    Call(CallExpr),
    Write {
        message: Expr,
        destination: Option<String>,
    },
}

/// `if .. then .. (elseif .. then ..)* (else ..)? endif`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfChain {
    pub branches: Vec<ConditionalBranch>,
    pub otherwise: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalBranch {
    pub condition: Expr,
    pub body: Vec<Statement>,
    pub span: Span,
}
