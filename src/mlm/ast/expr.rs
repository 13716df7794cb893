//! Expression nodes
//!
//! One variant per node kind of the expression grammar. Precedence is resolved by the
//! parser, so the tree shape already reflects grouping; there is no parenthesis node.

use super::range::Span;
use crate::mlm::token::ConceptRef;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    /// Name of the variable when the expression is a bare identifier.
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn node_type(&self) -> &'static str {
        match &self.kind {
            ExprKind::Number(_) => "Number",
            ExprKind::Str(_) => "String",
            ExprKind::Term(_) => "Term",
            ExprKind::Bool(_) => "Boolean",
            ExprKind::Null => "Null",
            ExprKind::Now => "Now",
            ExprKind::It => "It",
            ExprKind::Identifier(_) => "Identifier",
            ExprKind::Concept(_) => "Concept",
            ExprKind::List(_) => "List",
            ExprKind::Unary { .. } => "Unary",
            ExprKind::Binary { .. } => "Binary",
            ExprKind::Compare { .. } => "Compare",
            ExprKind::IsNull { .. } => "IsNull",
            ExprKind::Duration { .. } => "Duration",
            ExprKind::Modifier { .. } => "Modifier",
            ExprKind::Function { .. } => "Function",
            ExprKind::Read(_) => "Read",
            ExprKind::Where { .. } => "Where",
            ExprKind::OccurWithinPast { .. } => "OccurWithinPast",
            ExprKind::OccurWithin { .. } => "OccurWithin",
            ExprKind::Temporal { .. } => "Temporal",
            ExprKind::Sort(_) => "Sort",
            ExprKind::Call(_) => "Call",
            ExprKind::Event(_) => "Event",
            ExprKind::Destination(_) => "Destination",
            ExprKind::MlmRef(_) => "MlmRef",
            ExprKind::ResultRef(_) => "ResultRef",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Term(String),
    Bool(bool),
    Null,
    Now,
    /// `it` / `they` inside a where clause
    It,
    Identifier(String),
    Concept(ConceptRef),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    IsNull {
        operand: Box<Expr>,
        negated: bool,
    },
    /// `6 months`
    Duration {
        amount: Box<Expr>,
        unit: String,
    },
    /// `last 3 from X`, `count X`, `max of X`
    Modifier {
        modifier: ReadModifier,
        param: Option<Box<Expr>>,
        operand: Box<Expr>,
    },
    /// `time of X`
    Function {
        name: String,
        operand: Box<Expr>,
    },
    Read(Box<Expr>),
    Where {
        operand: Box<Expr>,
        condition: Box<Expr>,
    },
    /// `it occurred within the past 6 months`
    OccurWithinPast {
        subject: Box<Expr>,
        window: Box<Expr>,
    },
    /// `it occurred within a to b`
    OccurWithin {
        subject: Box<Expr>,
        from: Box<Expr>,
        to: Box<Expr>,
    },
    /// `x occurred before y`, `3 days after time of y`
    Temporal {
        relation: TemporalRelation,
        subject: Box<Expr>,
        anchor: Box<Expr>,
    },
    Sort(Box<Expr>),
    Call(CallExpr),
    Event(ConceptRef),
    Destination(ConceptRef),
    MlmRef(String),
    /// `||name||` inside call parameters
    ResultRef(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallExpr {
    pub target: String,
    pub params: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Or,
    And,
    Concat,
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Seqto,
    Merge,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOp::Or => "OR",
            BinaryOp::And => "AND",
            BinaryOp::Concat => "||",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Power => "**",
            BinaryOp::Seqto => "SEQTO",
            BinaryOp::Merge => "MERGE",
        };
        f.write_str(text)
    }
}

/// Relational operators, after symbolic and worded spellings have been unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    Equals,
    NotEquals,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    In,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CompareOp::Equals => "=",
            CompareOp::NotEquals => "<>",
            CompareOp::LessThan => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterOrEqual => ">=",
            CompareOp::In => "IN",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TemporalRelation {
    Before,
    After,
}

/// Aggregation/selection modifiers that may wrap a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadModifier {
    Last,
    First,
    Minimum,
    Maximum,
    Average,
    Sum,
    Median,
    Count,
    Exist,
}

impl fmt::Display for ReadModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReadModifier::Last => "LAST",
            ReadModifier::First => "FIRST",
            ReadModifier::Minimum => "MIN",
            ReadModifier::Maximum => "MAX",
            ReadModifier::Average => "AVG",
            ReadModifier::Sum => "SUM",
            ReadModifier::Median => "MEDIAN",
            ReadModifier::Count => "COUNT",
            ReadModifier::Exist => "EXIST",
        };
        f.write_str(text)
    }
}
