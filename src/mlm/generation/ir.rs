//! The structured IR produced by the generator.

use crate::mlm::building::{
    ActionTemplate, Assignment, CallRecord, Comparison, Conclusion, ReadDescriptor, Section,
};
use serde::Serialize;

/// One compiled MLM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Procedure {
    pub name: String,
    pub title: Option<String>,
    /// Sections in the order their slots appeared
    pub sections: Vec<SectionCode>,
    pub stats: BlockStats,
}

impl Procedure {
    pub fn section(&self, section: Section) -> Option<&SectionCode> {
        self.sections.iter().find(|code| code.section == section)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionCode {
    pub section: Section,
    pub body: Vec<Stmt>,
}

/// Blocks opened and closed while reconstructing. Equal for balanced input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockStats {
    pub blocks_opened: usize,
    pub blocks_closed: usize,
}

impl BlockStats {
    pub fn is_balanced(&self) -> bool {
        self.blocks_opened == self.blocks_closed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Read(ReadDescriptor),
    Assign(Assignment),
    Call(CallRecord),
    Conclude(Conclusion),
    Write(ActionTemplate),
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Stmt>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
    pub condition: Condition,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Compare(Comparison),
    Literal(bool),
}

impl Condition {
    /// `AND(a, b)` style outline with comparison keys, for tests and logs.
    pub fn outline(&self) -> String {
        match self {
            Condition::And(lhs, rhs) => format!("AND({}, {})", lhs.outline(), rhs.outline()),
            Condition::Or(lhs, rhs) => format!("OR({}, {})", lhs.outline(), rhs.outline()),
            Condition::Not(operand) => format!("NOT({})", operand.outline()),
            Condition::Compare(comparison) => {
                format!("{} {}", comparison.key, comparison.operator)
            }
            Condition::Literal(value) => value.to_string().to_uppercase(),
        }
    }
}

/// Whether every path through `body` ends in a conclusion.
pub fn always_concludes(body: &[Stmt]) -> bool {
    match body.last() {
        Some(Stmt::Conclude(_)) => true,
        Some(Stmt::If {
            branches,
            otherwise: Some(otherwise),
        }) => {
            branches.iter().all(|branch| always_concludes(&branch.body))
                && always_concludes(otherwise)
        }
        _ => false,
    }
}
