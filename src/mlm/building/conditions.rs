//! Condition flattening, comparisons and operands
//!
//!     Conditions are appended to the current element in prefix order. Every connective
//!     has a fixed arity (AND and OR take two operands, NOT takes one), so the token
//!     sequence rebuilds to exactly one tree:
//!
//!         a > 1 and not (b or c)   →   AND COMPARE(a) NOT OR COMPARE(b) COMPARE(c)
//!
//!     Leaves are comparisons on a variable. Each comparison gets its own record under a
//!     key unique in this build, so two tests on the same variable never overwrite each
//!     other.

use super::model::ElementToken;
use super::reads::is_read;
use super::records::{Answer, Comparison, Literal, Operand, Operator};
use super::Builder;
use crate::mlm::ast::{BinaryOp, CompareOp, Expr, ExprKind, ReadModifier, UnaryOp};
use crate::mlm::diagnostics::codes;

fn operator_for(op: CompareOp) -> Operator {
    match op {
        CompareOp::Equals => Operator::Equals,
        CompareOp::NotEquals => Operator::NotEquals,
        CompareOp::LessThan => Operator::LessThan,
        CompareOp::LessOrEqual => Operator::LessOrEqual,
        CompareOp::GreaterThan => Operator::GreaterThan,
        CompareOp::GreaterOrEqual => Operator::GreaterOrEqual,
        CompareOp::In => Operator::In,
    }
}

impl Builder<'_> {
    pub(super) fn flatten_condition(&mut self, condition: &Expr) {
        match &condition.kind {
            ExprKind::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                lhs,
                rhs,
            } => {
                self.emit(if *op == BinaryOp::And {
                    ElementToken::And
                } else {
                    ElementToken::Or
                });
                self.flatten_condition(lhs);
                self.flatten_condition(rhs);
            }
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                self.emit(ElementToken::Not);
                self.flatten_condition(operand);
            }
            ExprKind::Compare { op, lhs, rhs } => self.compare(condition, *op, lhs, rhs),
            ExprKind::IsNull { operand, negated } => {
                let operator = if *negated {
                    Operator::Exists
                } else {
                    Operator::IsNull
                };
                self.unary_test(condition, operand, operator);
            }
            ExprKind::Modifier {
                modifier: ReadModifier::Exist,
                param: None,
                operand,
            } => self.unary_test(condition, operand, Operator::Exists),
            ExprKind::Identifier(_) => self.unary_test(condition, condition, Operator::Exists),
            ExprKind::Bool(value) => self.emit(ElementToken::Literal(*value)),
            _ => self.unsupported_condition(condition),
        }
    }

    fn unsupported_condition(&mut self, condition: &Expr) {
        self.warn(
            codes::UNSUPPORTED_CONDITION,
            format!(
                "condition '{}' cannot be reconstructed and is treated as false",
                self.text(&condition.span)
            ),
            condition.span.clone(),
        );
        self.emit(ElementToken::Literal(false));
    }

    fn unary_test(&mut self, condition: &Expr, operand: &Expr, operator: Operator) {
        match operand.as_identifier() {
            Some(variable) => {
                let variable = variable.to_string();
                self.push_comparison(condition, variable, operator, Answer::None);
            }
            None => self.unsupported_condition(condition),
        }
    }

    fn compare(&mut self, condition: &Expr, op: CompareOp, lhs: &Expr, rhs: &Expr) {
        let operator = operator_for(op);
        let (variable, answer_expr, operator) = match (lhs.as_identifier(), rhs.as_identifier()) {
            (Some(variable), _) => (variable, rhs, operator),
            // 5 < X reads as X > 5
            (None, Some(variable)) => match operator.mirrored() {
                Some(mirrored) => (variable, lhs, mirrored),
                None => return self.unsupported_condition(condition),
            },
            (None, None) => return self.unsupported_condition(condition),
        };
        let variable = variable.to_string();

        let answer = if operator == Operator::In {
            match &answer_expr.kind {
                ExprKind::List(items) => {
                    Answer::List(items.iter().map(|item| self.operand(item)).collect())
                }
                _ => Answer::List(vec![self.operand(answer_expr)]),
            }
        } else {
            Answer::Single(self.operand(answer_expr))
        };
        self.push_comparison(condition, variable, operator, answer);
    }

    fn push_comparison(
        &mut self,
        condition: &Expr,
        variable: String,
        operator: Operator,
        answer: Answer,
    ) {
        let key = self.comparison_key(&variable);
        let comparison = Comparison {
            key: key.clone(),
            variable,
            operator,
            answer,
            span: condition.span.clone(),
        };
        let section = self.section;
        self.model
            .section_mut(section)
            .comparisons
            .insert(key.clone(), comparison);
        self.emit(ElementToken::Compare(key));
    }

    /// Convert a value expression. Shapes with no evaluable form are reported and kept
    /// as source text.
    pub(super) fn operand(&mut self, expr: &Expr) -> Operand {
        if is_read(expr) {
            return match self.hoist_target.clone() {
                Some(target) => self.hoist_read(&target, expr),
                None => self.unsupported_operand(expr),
            };
        }
        match &expr.kind {
            ExprKind::Number(n) => Operand::Literal(Literal::Number(*n)),
            ExprKind::Str(text) | ExprKind::Term(text) => Operand::Literal(Literal::Text(text.clone())),
            ExprKind::Bool(b) => Operand::Literal(Literal::Bool(*b)),
            ExprKind::Null => Operand::Literal(Literal::Null),
            ExprKind::Now => Operand::Now,
            ExprKind::Identifier(name) => Operand::Variable(name.clone()),
            ExprKind::List(items) => Operand::List(items.iter().map(|i| self.operand(i)).collect()),
            ExprKind::Unary {
                op: UnaryOp::Negate,
                operand,
            } => match operand.kind {
                ExprKind::Number(n) => Operand::Literal(Literal::Number(-n)),
                _ => Operand::Negate(Box::new(self.operand(operand))),
            },
            ExprKind::Binary {
                op:
                    op @ (BinaryOp::Add
                    | BinaryOp::Subtract
                    | BinaryOp::Multiply
                    | BinaryOp::Divide
                    | BinaryOp::Power
                    | BinaryOp::Concat),
                lhs,
                rhs,
            } => Operand::Binary {
                op: *op,
                lhs: Box::new(self.operand(lhs)),
                rhs: Box::new(self.operand(rhs)),
            },
            ExprKind::Duration { amount, unit } => Operand::Duration {
                amount: Box::new(self.operand(amount)),
                unit: unit.clone(),
            },
            ExprKind::Modifier {
                modifier,
                param: None,
                operand,
            } => Operand::Function {
                name: modifier.to_string().to_lowercase(),
                operand: Box::new(self.operand(operand)),
            },
            ExprKind::Function { name, operand } => Operand::Function {
                name: name.clone(),
                operand: Box::new(self.operand(operand)),
            },
            _ => self.unsupported_operand(expr),
        }
    }

    fn unsupported_operand(&mut self, expr: &Expr) -> Operand {
        let text = self.text(&expr.span);
        self.warn(
            codes::UNSUPPORTED_OPERAND,
            format!("expression '{}' has no evaluable form", text),
            expr.span.clone(),
        );
        Operand::Unsupported(text)
    }
}

#[cfg(test)]
mod tests {
    use crate::mlm::building::{build, Answer, BuildOutput, Literal, Operand, Operator};
    use crate::mlm::diagnostics::codes;
    use crate::mlm::parsing::parse;
    use rstest::rstest;

    fn logic(statements: &str) -> BuildOutput {
        let source = format!("logic: {};;", statements);
        let parsed = parse(&source).unwrap();
        assert!(!parsed.has_errors(), "{:?}", parsed.diagnostics);
        build(&parsed.mlm, &source)
    }

    #[test]
    fn test_two_comparisons_on_one_key() {
        let out = logic("if A > 1 and A < 10 then conclude true; endif");
        let comparisons = &out.model.logic.comparisons;
        assert_eq!(comparisons.len(), 2);
        assert_eq!(comparisons["A"].operator, Operator::GreaterThan);
        assert_eq!(comparisons["A#1"].operator, Operator::LessThan);
        assert_eq!(
            comparisons["A#1"].answer,
            Answer::Single(Operand::Literal(Literal::Number(10.0)))
        );
        assert_eq!(
            out.model.logic.elements[0].to_string(),
            "IF AND COMPARE(A) COMPARE(A#1) THEN CONCLUDE ENDIF"
        );
    }

    #[rstest]
    #[case("X = 1", Operator::Equals)]
    #[case("X equals 1", Operator::Equals)]
    #[case("X > 1", Operator::GreaterThan)]
    #[case("X is greater than 1", Operator::GreaterThan)]
    #[case("X >= 1", Operator::GreaterOrEqual)]
    #[case("X ge 1", Operator::GreaterOrEqual)]
    #[case("X < 1", Operator::LessThan)]
    #[case("X is less than 1", Operator::LessThan)]
    #[case("X <= 1", Operator::LessOrEqual)]
    #[case("X le 1", Operator::LessOrEqual)]
    #[case("X <> 1", Operator::NotEquals)]
    #[case("X ne 1", Operator::NotEquals)]
    #[case("X in (1, 2)", Operator::In)]
    #[case("1 < X", Operator::GreaterThan)]
    #[case("X is null", Operator::IsNull)]
    #[case("X is not null", Operator::Exists)]
    #[case("exist X", Operator::Exists)]
    #[case("X", Operator::Exists)]
    fn test_operator_codes(#[case] condition: &str, #[case] expected: Operator) {
        let out = logic(&format!("if {} then conclude true; endif", condition));
        assert_eq!(out.model.logic.comparisons["X"].operator, expected);
    }

    #[test]
    fn test_in_accumulates_answer_list() {
        let out = logic("if X in (\"a\", \"b\", 3) then conclude true; endif");
        match &out.model.logic.comparisons["X"].answer {
            Answer::List(items) => assert_eq!(items.len(), 3),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_prefix_order_for_nested_connectives() {
        let out = logic("if a > 1 and not (b or c) then conclude true; endif");
        assert_eq!(
            out.model.logic.elements[0].to_string(),
            "IF AND COMPARE(a) NOT OR COMPARE(b) COMPARE(c) THEN CONCLUDE ENDIF"
        );
    }

    #[test]
    fn test_unsupported_condition_is_reported() {
        let out = logic("if a + 1 > b + 2 then conclude true; endif");
        assert_eq!(out.diagnostics[0].code, codes::UNSUPPORTED_CONDITION);
        assert_eq!(
            out.model.logic.elements[0].to_string(),
            "IF FALSE THEN CONCLUDE ENDIF"
        );
    }
}
