//! The rule model
//!
//!     The aggregate the builder fills in while walking the tree. Everything the generator
//!     needs is here; the tree itself is not consulted again.
//!
//! Evaluate Elements
//!
//!     Each top-level statement of a data, logic or action slot becomes one
//!     [`EvaluateElement`]: the statement flattened into [`ElementToken`]s in encounter order.
//!     Conditions are written in prefix order (`AND a b`), so the generator can rebuild them
//!     without precedence rules. Records referenced by the tokens (reads, calls,
//!     assignments, conclusions, actions) are kept in ordered lists and consumed by the
//!     generator in that same order.
//!
//!         if a > 1 and b then conclude true; else conclude false; endif
//!
//!         IF AND COMPARE(a) COMPARE(b) THEN CONCLUDE ELSE CONCLUDE ENDIF

use super::records::{
    ActionTemplate, Assignment, CallRecord, Comparison, Conclusion, Operand, ReadDescriptor,
};
use crate::mlm::ast::range::Span;
use crate::mlm::ast::{MlmDate, ValidationCode, VersionNumber};
use crate::mlm::token::ConceptRef;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Data,
    Logic,
    Action,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Data => "data",
            Section::Logic => "logic",
            Section::Action => "action",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ElementToken {
    If,
    ElseIf,
    Then,
    Else,
    EndIf,
    And,
    Or,
    Not,
    /// A comparison, by key into the section's comparison map
    Compare(String),
    /// A constant condition
    Literal(bool),
    Read,
    Call,
    Assign,
    Conclude,
    Write,
}

impl fmt::Display for ElementToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementToken::If => write!(f, "IF"),
            ElementToken::ElseIf => write!(f, "ELSEIF"),
            ElementToken::Then => write!(f, "THEN"),
            ElementToken::Else => write!(f, "ELSE"),
            ElementToken::EndIf => write!(f, "ENDIF"),
            ElementToken::And => write!(f, "AND"),
            ElementToken::Or => write!(f, "OR"),
            ElementToken::Not => write!(f, "NOT"),
            ElementToken::Compare(key) => write!(f, "COMPARE({})", key),
            ElementToken::Literal(value) => write!(f, "{}", value.to_string().to_uppercase()),
            ElementToken::Read => write!(f, "READ"),
            ElementToken::Call => write!(f, "CALL"),
            ElementToken::Assign => write!(f, "ASSIGN"),
            ElementToken::Conclude => write!(f, "CONCLUDE"),
            ElementToken::Write => write!(f, "WRITE"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluateElement {
    pub tokens: Vec<ElementToken>,
    pub span: Span,
}

impl fmt::Display for EvaluateElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self.tokens.iter().map(ToString::to_string).collect();
        f.write_str(&tokens.join(" "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionModel {
    pub elements: Vec<EvaluateElement>,
    pub comparisons: BTreeMap<String, Comparison>,
    pub calls: Vec<CallRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeLimit {
    pub amount: f64,
    pub unit: super::records::DurationUnit,
}

/// Maintenance and library slots plus the scalar knowledge slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub mlmname: Option<String>,
    pub arden: Option<VersionNumber>,
    pub version: Option<VersionNumber>,
    pub institution: Option<String>,
    pub author: Option<String>,
    pub specialist: Option<String>,
    pub date: Option<MlmDate>,
    pub validation: Option<ValidationCode>,
    pub purpose: Option<String>,
    pub explanation: Option<String>,
    pub keywords: Vec<String>,
    pub citations: Option<String>,
    pub links: Option<String>,
    pub mlm_type: Option<String>,
    pub priority: Option<f64>,
    pub urgency: Option<Operand>,
    /// Source text of each evoke trigger
    pub evoke: Vec<String>,
    pub age_min: Option<AgeLimit>,
    pub age_max: Option<AgeLimit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleModel {
    pub metadata: Metadata,
    /// Variable → first read bound to it
    pub concepts: BTreeMap<String, ReadDescriptor>,
    /// Every read in occurrence order
    pub reads: Vec<ReadDescriptor>,
    pub data: SectionModel,
    pub logic: SectionModel,
    pub action: SectionModel,
    /// Order in which the block slots appeared
    pub section_order: Vec<Section>,
    pub conclusions: Vec<Conclusion>,
    pub assignments: Vec<Assignment>,
    pub actions: Vec<ActionTemplate>,
    pub events: BTreeMap<String, ConceptRef>,
    pub destinations: BTreeMap<String, ConceptRef>,
    /// Variable → module name, from `X := mlm 'name'`
    pub modules: BTreeMap<String, String>,
}

impl RuleModel {
    pub fn section(&self, section: Section) -> &SectionModel {
        match section {
            Section::Data => &self.data,
            Section::Logic => &self.logic,
            Section::Action => &self.action,
        }
    }

    pub fn section_mut(&mut self, section: Section) -> &mut SectionModel {
        match section {
            Section::Data => &mut self.data,
            Section::Logic => &mut self.logic,
            Section::Action => &mut self.action,
        }
    }

    /// All comparisons whose variable is `variable`, in key order.
    pub fn comparisons_on<'a>(&'a self, variable: &'a str) -> impl Iterator<Item = &'a Comparison> {
        [&self.data, &self.logic, &self.action]
            .into_iter()
            .flat_map(|section| section.comparisons.values())
            .filter(move |comparison| comparison.variable == variable)
    }

    /// Name used for generated code: the mlmname slot, else the title.
    pub fn name(&self) -> &str {
        self.metadata
            .mlmname
            .as_deref()
            .or(self.metadata.title.as_deref())
            .unwrap_or("mlm")
    }
}
