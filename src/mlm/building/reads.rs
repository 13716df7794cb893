//! Read-expression reduction
//!
//!     A read is written as a concept reference wrapped in any number of modifiers and
//!     where clauses, with or without the `read` keyword:
//!
//!         {potassium}
//!         read last 3 from {CD4 Count} where it occurred within the past 6 months
//!         max of read {creatinine from lab}
//!
//!     The wrappers are peeled outermost first down to the concept, which creates the
//!     descriptor. The modifiers are then folded back onto it right to left, so the one
//!     written outermost decides the read type.

use super::model::ElementToken;
use super::records::{DurationUnit, Lookback, Operand, ReadDescriptor, ReadType};
use super::Builder;
use crate::mlm::ast::{Expr, ExprKind, ReadModifier};
use crate::mlm::diagnostics::codes;
use crate::mlm::token::ConceptRef;

/// Whether `expr` is a concept read, possibly wrapped in modifiers and where clauses.
pub(super) fn is_read(expr: &Expr) -> bool {
    let mut current = expr;
    loop {
        match &current.kind {
            ExprKind::Read(_) | ExprKind::Concept(_) => return true,
            ExprKind::Modifier { operand, .. } | ExprKind::Where { operand, .. } => {
                current = operand.as_ref()
            }
            _ => return false,
        }
    }
}

impl Builder<'_> {
    /// Reduce `expr` to a descriptor bound to `variable`.
    pub(super) fn reduce_read(&mut self, variable: &str, expr: &Expr) -> Option<ReadDescriptor> {
        let mut modifiers: Vec<(ReadModifier, Option<&Expr>)> = Vec::new();
        let mut windows: Vec<&Expr> = Vec::new();
        let mut current = expr;
        let concept: &ConceptRef = loop {
            match &current.kind {
                ExprKind::Concept(concept) => break concept,
                ExprKind::Read(inner) => current = inner.as_ref(),
                ExprKind::Modifier {
                    modifier,
                    param,
                    operand,
                } => {
                    modifiers.push((*modifier, param.as_deref()));
                    current = operand.as_ref();
                }
                ExprKind::Where { operand, condition } => {
                    windows.push(condition.as_ref());
                    current = operand.as_ref();
                }
                _ => {
                    self.warn(
                        codes::UNSUPPORTED_READ,
                        format!("cannot read from '{}'", self.text(&current.span)),
                        current.span.clone(),
                    );
                    return None;
                }
            }
        };

        let mut descriptor = ReadDescriptor::new(&concept.name, variable, expr.span.clone());
        descriptor.datasource = concept.datasource.clone();
        for (modifier, param) in modifiers.into_iter().rev() {
            self.apply_modifier(&mut descriptor, modifier, param);
        }
        for condition in windows.into_iter().rev() {
            self.apply_window(&mut descriptor, condition);
        }
        Some(descriptor)
    }

    /// Retrieve a read nested inside the value assigned to `target` into a variable of
    /// its own (`D.read1`, `D.read2`, ...) and refer to it by name.
    pub(super) fn hoist_read(&mut self, target: &str, expr: &Expr) -> Operand {
        self.hoisted += 1;
        let variable = format!("{}.read{}", target, self.hoisted);
        match self.reduce_read(&variable, expr) {
            Some(read) => {
                self.model.reads.push(read);
                self.open_statement(ElementToken::Read, &expr.span);
                Operand::Variable(variable)
            }
            None => Operand::Unsupported(self.text(&expr.span)),
        }
    }

    fn apply_modifier(
        &mut self,
        descriptor: &mut ReadDescriptor,
        modifier: ReadModifier,
        param: Option<&Expr>,
    ) {
        descriptor.read_type = ReadType::from(modifier);
        let Some(param) = param else {
            return;
        };
        match &param.kind {
            ExprKind::Number(n) if *n >= 1.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 => {
                descriptor.how_many = *n as u32;
            }
            ExprKind::Duration { amount, unit } => {
                if let Some(lookback) = self.lookback(amount, unit, &param.span) {
                    descriptor.duration = Some(lookback);
                }
            }
            _ => self.warn(
                codes::INVALID_COUNT,
                format!(
                    "'{}' is not a positive whole count, keeping {}",
                    self.text(&param.span),
                    descriptor.how_many
                ),
                param.span.clone(),
            ),
        }
    }

    /// `where it occurred within [the] past <n> <unit>`
    fn apply_window(&mut self, descriptor: &mut ReadDescriptor, condition: &Expr) {
        if let ExprKind::OccurWithinPast { subject, window } = &condition.kind {
            if let (ExprKind::It, ExprKind::Duration { amount, unit }) = (&subject.kind, &window.kind)
            {
                if let Some(lookback) = self.lookback(amount, unit, &window.span) {
                    descriptor.duration = Some(lookback);
                }
                return;
            }
        }
        self.warn(
            codes::UNSUPPORTED_READ,
            format!(
                "unsupported where clause '{}', the read is not restricted",
                self.text(&condition.span)
            ),
            condition.span.clone(),
        );
    }

    fn lookback(
        &mut self,
        amount: &Expr,
        unit: &str,
        span: &crate::mlm::ast::Span,
    ) -> Option<Lookback> {
        let value = match amount.kind {
            ExprKind::Number(value) => value,
            _ => {
                self.warn(
                    codes::UNSUPPORTED_READ,
                    format!("lookback amount '{}' must be a number", self.text(&amount.span)),
                    amount.span.clone(),
                );
                return None;
            }
        };
        match DurationUnit::from_word(unit) {
            Some(unit) => Some(Lookback::past(value, unit)),
            None => {
                self.warn(
                    codes::UNKNOWN_DURATION_UNIT,
                    format!(
                        "unknown duration unit '{}', expected days, months or years; \
                         the lookback window is left unset",
                        unit
                    ),
                    span.clone(),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::mlm::building::{build, BuildOutput, DurationUnit, Lookback, ReadType};
    use crate::mlm::diagnostics::codes;
    use crate::mlm::parsing::parse;
    use rstest::rstest;

    fn data(statements: &str) -> BuildOutput {
        let source = format!("data: {};;", statements);
        let parsed = parse(&source).unwrap();
        assert!(!parsed.has_errors(), "{:?}", parsed.diagnostics);
        build(&parsed.mlm, &source)
    }

    #[test]
    fn test_bare_concept_defaults_to_last_one() {
        let out = data("X := {X_concept}");
        assert_eq!(out.model.reads.len(), 1);
        let read = &out.model.reads[0];
        assert_eq!(read.concept, "X_concept");
        assert_eq!(read.variable, "X");
        assert_eq!(read.read_type, ReadType::Last);
        assert_eq!(read.how_many, 1);
        assert_eq!(read.duration, None);
    }

    #[test]
    fn test_modifier_with_count() {
        let out = data("C := read last 3 from {CD4 Count}");
        let read = &out.model.reads[0];
        assert_eq!(read.concept, "CD4 Count");
        assert_eq!(read.read_type, ReadType::Last);
        assert_eq!(read.how_many, 3);
    }

    #[test]
    fn test_outer_modifier_wins_the_read_type() {
        let out = data("M := max of read first 4 from {weight from vitals}");
        let read = &out.model.reads[0];
        assert_eq!(read.read_type, ReadType::Max);
        assert_eq!(read.how_many, 4);
        assert_eq!(read.datasource.as_deref(), Some("vitals"));
    }

    #[rstest]
    #[case("days", DurationUnit::Days)]
    #[case("Day", DurationUnit::Days)]
    #[case("MONTHS", DurationUnit::Months)]
    #[case("years", DurationUnit::Years)]
    fn test_lookback_window(#[case] unit: &str, #[case] expected: DurationUnit) {
        let out = data(&format!(
            "K := read {{potassium}} where it occurred within the past 6 {}",
            unit
        ));
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert_eq!(
            out.model.reads[0].duration,
            Some(Lookback::past(6.0, expected))
        );
    }

    #[test]
    fn test_unknown_unit_is_reported_and_left_unset() {
        let out = data("K := read {potassium} where it occurred within the past 6 fortnights");
        assert_eq!(out.model.reads[0].duration, None);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].code, codes::UNKNOWN_DURATION_UNIT);
    }

    #[test]
    fn test_first_definition_wins_in_concept_map() {
        let out = data("X := {a}; X := {b}");
        assert_eq!(out.model.reads.len(), 2);
        assert_eq!(out.model.concepts["X"].concept, "a");
    }

    #[test]
    fn test_fractional_count_is_reported() {
        let out = data("X := read last 2.5 from {a}");
        assert_eq!(out.model.reads[0].how_many, 1);
        assert_eq!(out.diagnostics[0].code, codes::INVALID_COUNT);
    }
}
