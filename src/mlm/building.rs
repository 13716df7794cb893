//! Semantic model builder
//!
//!     One depth-first walk over the [`Mlm`] tree that fills in a [`RuleModel`]:
//!
//!         metadata       maintenance and library slots, priority, urgency, evoke, ages
//!         reads          concept retrievals with read type, count and lookback window
//!         elements       flattened statements per data/logic/action section
//!         comparisons    relational tests, one record per test
//!         calls, conclusions, assignments, actions
//!
//!     All state of a build (comparison key counters, the set of bound variables, the
//!     element being filled in) lives in one [`Builder`], created per compilation.
//!
//! Diagnostics
//!
//!     Shapes the model cannot represent are not dropped silently. An unknown duration
//!     unit, a call parameter naming no bound variable, a statement after `conclude`, a
//!     condition or operand with no evaluable form: each produces a warning at the
//!     offending source range.

pub mod model;
pub mod records;

mod conditions;
mod metadata;
mod reads;
mod statements;

pub use model::{ElementToken, EvaluateElement, Metadata, RuleModel, Section, SectionModel};
pub use records::{
    ActionTemplate, Answer, Assignment, CallParam, CallRecord, Comparison, Conclusion,
    DurationUnit, Fragment, Literal, Lookback, Operand, Operator, Outcome, ReadDescriptor,
    ReadType,
};

use crate::mlm::ast::range::Span;
use crate::mlm::ast::{Mlm, SlotKind};
use crate::mlm::diagnostics::{Diagnostic, Stage};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The model and the diagnostics of one build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub model: RuleModel,
    pub diagnostics: Vec<Diagnostic>,
}

/// Build the rule model of a parsed MLM. `source` is the text the tree was parsed from.
pub fn build(mlm: &Mlm, source: &str) -> BuildOutput {
    let mut builder = Builder::new(source);
    builder.build_metadata(mlm);
    for slot in mlm.knowledge.slots.iter() {
        let section = match slot.kind {
            SlotKind::Data => Section::Data,
            SlotKind::Logic => Section::Logic,
            SlotKind::Action => Section::Action,
            _ => continue,
        };
        if let Some(statements) = mlm.block(slot.kind).filter(|_| {
            // Duplicate block slots are reported by the parser; only the first is built.
            !builder.model.section_order.contains(&section)
        }) {
            builder.build_section(section, statements);
        }
    }
    builder.finish()
}

pub struct Builder<'source> {
    source: &'source str,
    model: RuleModel,
    diagnostics: Vec<Diagnostic>,
    /// Comparisons seen so far per variable
    key_counters: HashMap<String, usize>,
    bound: HashSet<String>,
    section: Section,
    /// `if`s opened and not yet closed in the current element
    depth: usize,
    /// Target of the assignment whose value is being converted
    hoist_target: Option<String>,
    /// Reads hoisted out of the current assignment value
    hoisted: usize,
}

impl<'source> Builder<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            model: RuleModel::default(),
            diagnostics: Vec::new(),
            key_counters: HashMap::new(),
            bound: HashSet::new(),
            section: Section::Data,
            depth: 0,
            hoist_target: None,
            hoisted: 0,
        }
    }

    pub fn finish(self) -> BuildOutput {
        debug!(
            reads = self.model.reads.len(),
            conclusions = self.model.conclusions.len(),
            actions = self.model.actions.len(),
            diagnostics = self.diagnostics.len(),
            "built rule model"
        );
        BuildOutput {
            model: self.model,
            diagnostics: self.diagnostics,
        }
    }

    fn warn(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::warning(Stage::Build, code, message, span));
    }

    /// Source text of a span, trimmed.
    fn text(&self, span: &Span) -> String {
        self.source
            .get(span.clone())
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn bind(&mut self, variable: &str) {
        self.bound.insert(variable.to_string());
    }

    fn is_bound(&self, variable: &str) -> bool {
        self.bound.contains(variable)
    }

    /// Append a token that begins a statement. At depth 0 it starts a new element.
    fn open_statement(&mut self, token: ElementToken, span: &Span) {
        let section = self.section;
        let depth = self.depth;
        let elements = &mut self.model.section_mut(section).elements;
        if depth == 0 || elements.is_empty() {
            elements.push(EvaluateElement {
                tokens: Vec::new(),
                span: span.clone(),
            });
        }
        self.emit(token);
    }

    /// Append a token to the current element.
    fn emit(&mut self, token: ElementToken) {
        match token {
            ElementToken::If => self.depth += 1,
            ElementToken::EndIf => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        let section = self.section;
        if let Some(element) = self.model.section_mut(section).elements.last_mut() {
            element.tokens.push(token);
        }
    }

    /// Next free comparison key for `variable`: `A`, then `A#1`, `A#2`, ...
    fn comparison_key(&mut self, variable: &str) -> String {
        let counter = self.key_counters.entry(variable.to_string()).or_insert(0);
        let key = if *counter == 0 {
            variable.to_string()
        } else {
            format!("{}#{}", variable, counter)
        };
        *counter += 1;
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlm::diagnostics::codes;
    use crate::mlm::parsing::parse;

    fn build_source(source: &str) -> BuildOutput {
        let output = parse(source).unwrap();
        assert!(!output.has_errors(), "{:?}", output.diagnostics);
        build(&output.mlm, source)
    }

    #[test]
    fn test_keys_are_per_builder() {
        let first = build_source("logic: if A > 1 then conclude true; endif;;");
        let second = build_source("logic: if A > 1 then conclude true; endif;;");
        assert!(first.model.logic.comparisons.contains_key("A"));
        assert!(second.model.logic.comparisons.contains_key("A"));
    }

    #[test]
    fn test_each_top_level_statement_is_one_element() {
        let out = build_source(
            "data: X := {x}; if X > 1 then Y := 2; else Y := 3; endif; call f with X;;",
        );
        let elements: Vec<String> = out.model.data.elements.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            elements,
            vec![
                "READ",
                "IF COMPARE(X) THEN ASSIGN ELSE ASSIGN ENDIF",
                "CALL",
            ]
        );
        assert_eq!(out.model.section_order, vec![Section::Data]);
    }

    #[test]
    fn test_unreachable_statement_after_conclude() {
        let out = build_source("logic: if a then conclude true; x := 1; endif;;");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].code, codes::UNREACHABLE_STATEMENT);
        assert_eq!(
            out.model.logic.elements[0].to_string(),
            "IF COMPARE(a) THEN CONCLUDE ENDIF"
        );
    }
}
