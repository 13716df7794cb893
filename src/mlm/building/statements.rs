//! Statement walk of the data, logic and action slots.

use super::model::{ElementToken, Section};
use super::reads::is_read;
use super::records::{
    ActionTemplate, Assignment, CallParam, CallRecord, Conclusion, Fragment, Operand, Outcome,
};
use super::Builder;
use crate::mlm::ast::range::Span;
use crate::mlm::ast::{CallExpr, Expr, ExprKind, IfChain, Statement, StatementKind};
use crate::mlm::diagnostics::codes;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

/// `||name||` inside a string literal of a `write`
static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\|\|\s*([A-Za-z][A-Za-z0-9_]*)\s*\|\|").expect("marker pattern is valid")
});

impl Builder<'_> {
    pub(super) fn build_section(&mut self, section: Section, statements: &[Statement]) {
        trace!(%section, statements = statements.len(), "building section");
        self.section = section;
        self.depth = 0;
        self.model.section_order.push(section);
        self.build_statements(statements);
    }

    /// Statements after a `conclude` in the same list can never run and are dropped.
    fn build_statements(&mut self, statements: &[Statement]) {
        let mut remaining = statements.iter();
        while let Some(statement) = remaining.next() {
            if self.build_statement(statement) {
                for unreachable in remaining {
                    self.warn(
                        codes::UNREACHABLE_STATEMENT,
                        "statement after 'conclude' is never executed",
                        unreachable.span.clone(),
                    );
                }
                return;
            }
        }
    }

    /// Returns whether the statement concluded.
    fn build_statement(&mut self, statement: &Statement) -> bool {
        let span = &statement.span;
        match &statement.kind {
            StatementKind::Assign { target, value } => self.build_assignment(target, value, span),
            StatementKind::If(chain) => self.build_if(chain, span),
            StatementKind::Conclude(outcome) => return self.build_conclude(outcome, span),
            StatementKind::Call(call) => {
                let record = self.call_record(None, call);
                let section = self.section;
                self.model.section_mut(section).calls.push(record);
                self.open_statement(ElementToken::Call, span);
            }
            StatementKind::Write {
                message,
                destination,
            } => {
                let mut template = ActionTemplate {
                    fragments: Vec::new(),
                    destination: destination.clone(),
                    span: span.clone(),
                };
                self.collect_fragments(message, &mut template);
                self.model.actions.push(template);
                self.open_statement(ElementToken::Write, span);
            }
        }
        false
    }

    fn build_assignment(&mut self, target: &str, value: &Expr, span: &Span) {
        match &value.kind {
            ExprKind::Event(concept) => {
                self.model.events.insert(target.to_string(), concept.clone());
            }
            ExprKind::Destination(concept) => {
                self.model
                    .destinations
                    .insert(target.to_string(), concept.clone());
            }
            ExprKind::MlmRef(name) => {
                self.model.modules.insert(target.to_string(), name.clone());
            }
            ExprKind::Call(call) => {
                let record = self.call_record(Some(target), call);
                let section = self.section;
                self.model.section_mut(section).calls.push(record);
                self.open_statement(ElementToken::Call, span);
            }
            _ if is_read(value) => match self.reduce_read(target, value) {
                Some(read) => {
                    self.model
                        .concepts
                        .entry(target.to_string())
                        .or_insert_with(|| read.clone());
                    self.model.reads.push(read);
                    self.open_statement(ElementToken::Read, span);
                }
                None => {
                    let text = self.text(&value.span);
                    self.push_assignment(target, text.clone(), Operand::Unsupported(text), span);
                }
            },
            _ => {
                let text = self.text(&value.span);
                self.hoist_target = Some(target.to_string());
                self.hoisted = 0;
                let operand = self.operand(value);
                self.hoist_target = None;
                self.push_assignment(target, text, operand, span);
            }
        }
        self.bind(target);
    }

    fn push_assignment(&mut self, variable: &str, text: String, value: Operand, span: &Span) {
        self.model.assignments.push(Assignment {
            variable: variable.to_string(),
            text,
            value,
            span: span.clone(),
        });
        self.open_statement(ElementToken::Assign, span);
    }

    fn build_if(&mut self, chain: &IfChain, span: &Span) {
        self.open_statement(ElementToken::If, span);
        for (index, branch) in chain.branches.iter().enumerate() {
            if index > 0 {
                self.emit(ElementToken::ElseIf);
            }
            self.flatten_condition(&branch.condition);
            self.emit(ElementToken::Then);
            self.build_statements(&branch.body);
        }
        if let Some(otherwise) = &chain.otherwise {
            self.emit(ElementToken::Else);
            self.build_statements(otherwise);
        }
        self.emit(ElementToken::EndIf);
    }

    fn build_conclude(&mut self, outcome: &Expr, span: &Span) -> bool {
        if self.section != Section::Logic {
            self.warn(
                codes::CONCLUDE_OUTSIDE_LOGIC,
                format!("'conclude' in the {} slot is ignored", self.section),
                span.clone(),
            );
            return false;
        }
        let outcome = match &outcome.kind {
            ExprKind::Bool(value) => Outcome::Literal(*value),
            ExprKind::Identifier(name) => Outcome::Variable(name.clone()),
            _ => {
                self.warn(
                    codes::UNSUPPORTED_OPERAND,
                    format!(
                        "conclusion '{}' is not a boolean or a variable, concluding false",
                        self.text(&outcome.span)
                    ),
                    outcome.span.clone(),
                );
                Outcome::Literal(false)
            }
        };
        self.model.conclusions.push(Conclusion {
            outcome,
            span: span.clone(),
        });
        self.open_statement(ElementToken::Conclude, span);
        true
    }

    fn call_record(&mut self, result: Option<&str>, call: &CallExpr) -> CallRecord {
        let params = call.params.iter().map(|param| self.call_param(param)).collect();
        CallRecord {
            result: result.map(str::to_string),
            target: call.target.clone(),
            module: self.model.modules.get(&call.target).cloned(),
            params,
            span: call.span.clone(),
        }
    }

    fn call_param(&mut self, param: &Expr) -> CallParam {
        match &param.kind {
            ExprKind::Identifier(name) => {
                self.check_bound(name, &param.span);
                CallParam::Variable(name.clone())
            }
            ExprKind::ResultRef(name) => {
                self.check_bound(name, &param.span);
                CallParam::ResultRef(name.clone())
            }
            _ => match self.operand(param) {
                Operand::Literal(literal) => CallParam::Literal(literal),
                operand => CallParam::Expression(operand),
            },
        }
    }

    fn check_bound(&mut self, name: &str, span: &Span) {
        if !self.is_bound(name) {
            self.warn(
                codes::UNBOUND_CALL_PARAMETER,
                format!("call parameter '{}' is not bound to any value", name),
                span.clone(),
            );
        }
    }

    /// Split a `write` message on `||` concatenation and `||name||` markers.
    fn collect_fragments(&mut self, message: &Expr, template: &mut ActionTemplate) {
        match &message.kind {
            ExprKind::Binary {
                op: crate::mlm::ast::BinaryOp::Concat,
                lhs,
                rhs,
            } => {
                self.collect_fragments(lhs, template);
                self.collect_fragments(rhs, template);
            }
            ExprKind::Str(text) | ExprKind::Term(text) => interpolate(text, template),
            ExprKind::Identifier(name) => template.push(Fragment::Variable(name.clone())),
            ExprKind::Number(n) => template.push(Fragment::Literal(n.to_string())),
            _ => {
                let text = self.text(&message.span);
                self.warn(
                    codes::UNSUPPORTED_OPERAND,
                    format!("'{}' cannot be interpolated, written as text", text),
                    message.span.clone(),
                );
                template.push(Fragment::Literal(text));
            }
        }
    }
}

fn interpolate(text: &str, template: &mut ActionTemplate) {
    let mut last = 0;
    for caps in MARKER.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        template.push(Fragment::Literal(text[last..whole.start()].to_string()));
        template.push(Fragment::Variable(name.as_str().to_string()));
        last = whole.end();
    }
    template.push(Fragment::Literal(text[last..].to_string()));
}

#[cfg(test)]
mod tests {
    use crate::mlm::building::{
        build, BuildOutput, CallParam, Fragment, Literal, Operand, Outcome, ReadType, Section,
    };
    use crate::mlm::diagnostics::codes;
    use crate::mlm::parsing::parse;

    fn build_source(source: &str) -> BuildOutput {
        let parsed = parse(source).unwrap();
        assert!(!parsed.has_errors(), "{:?}", parsed.diagnostics);
        build(&parsed.mlm, source)
    }

    #[test]
    fn test_end_to_end_example() {
        let out = build_source(
            "data: X := {X_concept};; \
             logic: if X > 5 then conclude true; else conclude false; endif;;",
        );
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        let model = &out.model;
        assert_eq!(model.reads.len(), 1);
        assert_eq!(model.reads[0].concept, "X_concept");
        assert_eq!(model.reads[0].variable, "X");
        assert_eq!(model.reads[0].read_type, ReadType::Last);
        assert_eq!(model.reads[0].how_many, 1);
        assert_eq!(
            model.logic.elements[0].to_string(),
            "IF COMPARE(X) THEN CONCLUDE ELSE CONCLUDE ENDIF"
        );
        let outcomes: Vec<&Outcome> = model.conclusions.iter().map(|c| &c.outcome).collect();
        assert_eq!(
            outcomes,
            vec![&Outcome::Literal(true), &Outcome::Literal(false)]
        );
        assert_eq!(model.section_order, vec![Section::Data, Section::Logic]);
    }

    #[test]
    fn test_assignment_keeps_source_text() {
        let out = build_source("data: dose := weight * 2.5;;");
        let assignment = &out.model.assignments[0];
        assert_eq!(assignment.variable, "dose");
        assert_eq!(assignment.text, "weight * 2.5");
        assert!(matches!(assignment.value, Operand::Binary { .. }));
    }

    #[test]
    fn test_call_parameters() {
        let out = build_source(
            "data: checker := mlm 'renal_check'; K := {potassium}; \
             R := call checker with K, 5, ||missing||;;",
        );
        let call = &out.model.data.calls[0];
        assert_eq!(call.result.as_deref(), Some("R"));
        assert_eq!(call.module.as_deref(), Some("renal_check"));
        assert_eq!(
            call.params,
            vec![
                CallParam::Variable("K".to_string()),
                CallParam::Literal(Literal::Number(5.0)),
                CallParam::ResultRef("missing".to_string()),
            ]
        );
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].code, codes::UNBOUND_CALL_PARAMETER);
        let elements: Vec<String> = out.model.data.elements.iter().map(|e| e.to_string()).collect();
        assert_eq!(elements, vec!["READ", "CALL"]);
    }

    #[test]
    fn test_write_interpolation() {
        let out = build_source(
            "action: write \"Potassium ||K|| is high for \" || name at clinician;;",
        );
        let action = &out.model.actions[0];
        assert_eq!(
            action.fragments,
            vec![
                Fragment::Literal("Potassium ".to_string()),
                Fragment::Variable("K".to_string()),
                Fragment::Literal(" is high for ".to_string()),
                Fragment::Variable("name".to_string()),
            ]
        );
        assert_eq!(action.destination.as_deref(), Some("clinician"));
    }

    #[test]
    fn test_conclude_outside_logic() {
        let out = build_source("data: conclude true; x := 1;;");
        assert_eq!(out.diagnostics[0].code, codes::CONCLUDE_OUTSIDE_LOGIC);
        assert!(out.model.conclusions.is_empty());
        assert_eq!(out.model.assignments.len(), 1);
    }

    #[test]
    fn test_bindings_emit_no_element() {
        let out = build_source(
            "data: e := event {admission}; d := destination {pager};;",
        );
        assert!(out.model.data.elements.is_empty());
        assert_eq!(out.model.events["e"].name, "admission");
        assert_eq!(out.model.destinations["d"].name, "pager");
    }
}
