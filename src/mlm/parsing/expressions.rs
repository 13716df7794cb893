//! Expression parsing
//!
//! One method per precedence level, loosest first:
//!
//!     sort / merge
//!     where
//!     seqto
//!     or
//!     and
//!     not
//!     comparison      = <> < <= > >= in, worded forms, is [not] ..., occurred ...
//!     concatenation   ||
//!     additive        + -
//!     multiplicative  * / **
//!     duration        6 months
//!     application     unary minus, last/first/min/max/avg/sum/median/count/exist, time of
//!     atom

use super::{ParseResult, Parser};
use crate::mlm::ast::{
    BinaryOp, CompareOp, Expr, ExprKind, ReadModifier, TemporalRelation, UnaryOp,
};
use crate::mlm::token::{Keyword, Token, TokenKind};

fn modifier_for(keyword: Keyword) -> Option<ReadModifier> {
    let modifier = match keyword {
        Keyword::Last => ReadModifier::Last,
        Keyword::First => ReadModifier::First,
        Keyword::Minimum => ReadModifier::Minimum,
        Keyword::Maximum => ReadModifier::Maximum,
        Keyword::Average => ReadModifier::Average,
        Keyword::Sum => ReadModifier::Sum,
        Keyword::Median => ReadModifier::Median,
        Keyword::Count => ReadModifier::Count,
        Keyword::Exist => ReadModifier::Exist,
        _ => return None,
    };
    Some(modifier)
}

impl Parser<'_> {
    pub(super) fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_sort()
    }

    fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr, start: usize) -> Expr {
        Expr::new(
            ExprKind::Binary {
                op,
                lhs: lhs.boxed(),
                rhs: rhs.boxed(),
            },
            self.span_from(start),
        )
    }

    fn negate(&self, operand: Expr, start: usize) -> Expr {
        Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: operand.boxed(),
            },
            self.span_from(start),
        )
    }

    fn parse_sort(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        if self.eat_keyword(Keyword::Sort) {
            let operand = self.parse_sort()?;
            return Ok(Expr::new(
                ExprKind::Sort(operand.boxed()),
                self.span_from(start),
            ));
        }
        let mut lhs = self.parse_where()?;
        while self.eat_keyword(Keyword::Merge) {
            let rhs = self.parse_where()?;
            lhs = self.binary(BinaryOp::Merge, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_where(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        let operand = self.parse_seqto()?;
        if self.eat_keyword(Keyword::Where) {
            let condition = self.parse_seqto()?;
            return Ok(Expr::new(
                ExprKind::Where {
                    operand: operand.boxed(),
                    condition: condition.boxed(),
                },
                self.span_from(start),
            ));
        }
        Ok(operand)
    }

    fn parse_seqto(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        let mut lhs = self.parse_or()?;
        while self.eat_keyword(Keyword::Seqto) {
            let rhs = self.parse_or()?;
            lhs = self.binary(BinaryOp::Seqto, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        let mut lhs = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let rhs = self.parse_and()?;
            lhs = self.binary(BinaryOp::Or, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        let mut lhs = self.parse_not()?;
        while self.eat_keyword(Keyword::And) {
            let rhs = self.parse_not()?;
            lhs = self.binary(BinaryOp::And, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        if self.eat_keyword(Keyword::Not) {
            let operand = self.parse_not()?;
            return Ok(self.negate(operand, start));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        let lhs = self.parse_concat()?;

        let symbol = match self.peek_kind() {
            TokenKind::Equal => Some(CompareOp::Equals),
            TokenKind::NotEqual | TokenKind::SlashEqual => Some(CompareOp::NotEquals),
            TokenKind::Less => Some(CompareOp::LessThan),
            TokenKind::LessEqual => Some(CompareOp::LessOrEqual),
            TokenKind::Greater => Some(CompareOp::GreaterThan),
            TokenKind::GreaterEqual => Some(CompareOp::GreaterOrEqual),
            TokenKind::Keyword(Keyword::In) => Some(CompareOp::In),
            _ => None,
        };
        if let Some(op) = symbol {
            self.current += 1;
            return self.finish_compare(op, lhs, start);
        }

        if let Some(op) = self.parse_relational_word() {
            return self.finish_compare(op, lhs, start);
        }

        match self.peek_kind() {
            TokenKind::Keyword(Keyword::Not) if self.peek_nth_kind(1) == TokenKind::Keyword(Keyword::In) => {
                self.current += 2;
                let compare = self.finish_compare(CompareOp::In, lhs, start)?;
                Ok(self.negate(compare, start))
            }
            TokenKind::Keyword(Keyword::Is) => {
                self.current += 1;
                self.parse_is(lhs, start)
            }
            TokenKind::Keyword(Keyword::Occur) => {
                self.current += 1;
                let negated = self.eat_keyword(Keyword::Not);
                let expr = self.parse_occurrence(lhs, start)?;
                Ok(if negated { self.negate(expr, start) } else { expr })
            }
            TokenKind::Keyword(Keyword::Before) | TokenKind::Keyword(Keyword::After) => {
                self.parse_temporal(lhs, start)
            }
            _ => Ok(lhs),
        }
    }

    fn finish_compare(&mut self, op: CompareOp, lhs: Expr, start: usize) -> ParseResult<Expr> {
        let rhs = self.parse_concat()?;
        Ok(Expr::new(
            ExprKind::Compare {
                op,
                lhs: lhs.boxed(),
                rhs: rhs.boxed(),
            },
            self.span_from(start),
        ))
    }

    /// Worded relational operators: `eq`, `equal to`, `less than or equal`, `ge`, ...
    fn parse_relational_word(&mut self) -> Option<CompareOp> {
        let keyword = match self.peek_kind() {
            TokenKind::Keyword(keyword) => keyword,
            _ => return None,
        };
        let op = match keyword {
            Keyword::Equals => {
                self.current += 1;
                self.eat_keyword(Keyword::To);
                CompareOp::Equals
            }
            Keyword::NotEquals => {
                self.current += 1;
                CompareOp::NotEquals
            }
            Keyword::LessOrEqual => {
                self.current += 1;
                CompareOp::LessOrEqual
            }
            Keyword::GreaterOrEqual => {
                self.current += 1;
                CompareOp::GreaterOrEqual
            }
            Keyword::LessThan | Keyword::GreaterThan => {
                self.current += 1;
                self.eat_keyword(Keyword::Than);
                let or_equal = self.at_keyword(Keyword::Or)
                    && self.peek_nth_kind(1) == TokenKind::Keyword(Keyword::Equals);
                if or_equal {
                    self.current += 2;
                    self.eat_keyword(Keyword::To);
                }
                match (keyword, or_equal) {
                    (Keyword::LessThan, false) => CompareOp::LessThan,
                    (Keyword::LessThan, true) => CompareOp::LessOrEqual,
                    (_, false) => CompareOp::GreaterThan,
                    (_, true) => CompareOp::GreaterOrEqual,
                }
            }
            _ => return None,
        };
        Some(op)
    }

    /// Everything after `is`: `is [not] null`, `is [not] in`, `is [not] equal to`, ...
    fn parse_is(&mut self, lhs: Expr, start: usize) -> ParseResult<Expr> {
        let negated = self.eat_keyword(Keyword::Not);

        if self.eat_keyword(Keyword::Null) {
            return Ok(Expr::new(
                ExprKind::IsNull {
                    operand: lhs.boxed(),
                    negated,
                },
                self.span_from(start),
            ));
        }

        let op = if self.eat_keyword(Keyword::In) {
            Some(CompareOp::In)
        } else {
            self.parse_relational_word()
        };
        let expr = match op {
            Some(CompareOp::Equals) if negated => {
                return self.finish_compare(CompareOp::NotEquals, lhs, start)
            }
            Some(op) => self.finish_compare(op, lhs, start)?,
            None => match self.peek_kind() {
                TokenKind::Keyword(Keyword::Within) => self.parse_occurrence(lhs, start)?,
                TokenKind::Keyword(Keyword::Before) | TokenKind::Keyword(Keyword::After) => {
                    self.parse_temporal(lhs, start)?
                }
                _ => return Err(self.unexpected("comparison after 'is'")),
            },
        };
        Ok(if negated { self.negate(expr, start) } else { expr })
    }

    /// `within [the] past d`, `within a to b`, `before x`, `after x`
    fn parse_occurrence(&mut self, subject: Expr, start: usize) -> ParseResult<Expr> {
        if !self.eat_keyword(Keyword::Within) {
            return self.parse_temporal(subject, start);
        }
        self.eat_keyword(Keyword::The);
        if self.eat_keyword(Keyword::Past) {
            let window = self.parse_concat()?;
            return Ok(Expr::new(
                ExprKind::OccurWithinPast {
                    subject: subject.boxed(),
                    window: window.boxed(),
                },
                self.span_from(start),
            ));
        }
        let from = self.parse_concat()?;
        self.expect_keyword(Keyword::To)?;
        let to = self.parse_concat()?;
        Ok(Expr::new(
            ExprKind::OccurWithin {
                subject: subject.boxed(),
                from: from.boxed(),
                to: to.boxed(),
            },
            self.span_from(start),
        ))
    }

    fn parse_temporal(&mut self, subject: Expr, start: usize) -> ParseResult<Expr> {
        let relation = if self.eat_keyword(Keyword::Before) {
            TemporalRelation::Before
        } else if self.eat_keyword(Keyword::After) {
            TemporalRelation::After
        } else {
            return Err(self.unexpected("'within', 'before' or 'after'"));
        };
        let anchor = self.parse_concat()?;
        Ok(Expr::new(
            ExprKind::Temporal {
                relation,
                subject: subject.boxed(),
                anchor: anchor.boxed(),
            },
            self.span_from(start),
        ))
    }

    fn parse_concat(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        let mut lhs = self.parse_additive()?;
        while self.eat(TokenKind::Concat) {
            let rhs = self.parse_additive()?;
            lhs = self.binary(BinaryOp::Concat, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => return Ok(lhs),
            };
            self.current += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = self.binary(op, lhs, rhs, start);
        }
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        let mut lhs = self.parse_duration()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Power => BinaryOp::Power,
                _ => return Ok(lhs),
            };
            self.current += 1;
            let rhs = self.parse_duration()?;
            lhs = self.binary(op, lhs, rhs, start);
        }
    }

    /// A number or variable directly followed by a unit word: `6 months`.
    fn parse_duration(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        let amount = self.parse_application()?;
        let quantity = matches!(amount.kind, ExprKind::Number(_) | ExprKind::Identifier(_));
        if quantity {
            if let Some(Token::Identifier(unit)) = self.peek() {
                let unit = unit.clone();
                self.current += 1;
                return Ok(Expr::new(
                    ExprKind::Duration {
                        amount: amount.boxed(),
                        unit,
                    },
                    self.span_from(start),
                ));
            }
        }
        Ok(amount)
    }

    fn parse_application(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        if self.eat(TokenKind::Minus) {
            let operand = self.parse_application()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Negate,
                    operand: operand.boxed(),
                },
                self.span_from(start),
            ));
        }

        if let TokenKind::Keyword(keyword) = self.peek_kind() {
            if let Some(modifier) = modifier_for(keyword) {
                self.current += 1;
                let param = self.parse_modifier_param()?;
                let operand = self.parse_application()?;
                return Ok(Expr::new(
                    ExprKind::Modifier {
                        modifier,
                        param: param.map(Expr::boxed),
                        operand: operand.boxed(),
                    },
                    self.span_from(start),
                ));
            }
            if keyword == Keyword::Time {
                self.current += 1;
                self.eat_keyword(Keyword::Of);
                let operand = self.parse_application()?;
                return Ok(Expr::new(
                    ExprKind::Function {
                        name: "time".to_string(),
                        operand: operand.boxed(),
                    },
                    self.span_from(start),
                ));
            }
        }
        self.parse_atom()
    }

    /// The optional count (`last 3 from`) or duration (`last 2 days from`) of a modifier,
    /// consuming the trailing `from`/`of`.
    fn parse_modifier_param(&mut self) -> ParseResult<Option<Expr>> {
        let joins = |kind: TokenKind| {
            kind == TokenKind::Keyword(Keyword::From) || kind == TokenKind::Keyword(Keyword::Of)
        };
        let param = match (self.peek_kind(), self.peek_nth_kind(1), self.peek_nth_kind(2)) {
            (TokenKind::Number, next, _) if joins(next) => Some(self.parse_atom()?),
            (TokenKind::Number, TokenKind::Identifier, next) if joins(next) => {
                Some(self.parse_duration()?)
            }
            _ => None,
        };
        if !self.eat_keyword(Keyword::From) {
            self.eat_keyword(Keyword::Of);
        }
        Ok(param)
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        let start = self.current_span().start;
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.unexpected("expression")),
        };

        let kind = match token {
            Token::Number(text) => {
                let value = text.parse::<f64>().map_err(|_| {
                    self.malformed(format!("invalid number '{}'", text), self.current_span())
                })?;
                self.current += 1;
                ExprKind::Number(value)
            }
            Token::Str(text) => {
                self.current += 1;
                ExprKind::Str(text)
            }
            Token::Term(text) => {
                self.current += 1;
                ExprKind::Term(text)
            }
            Token::Concept(concept) => {
                self.current += 1;
                ExprKind::Concept(concept)
            }
            Token::Identifier(name) => {
                self.current += 1;
                ExprKind::Identifier(name)
            }
            Token::OpenParen => return self.parse_parenthesized(),
            Token::Concat => {
                self.current += 1;
                let name = self.expect_name()?;
                self.expect(TokenKind::Concat)?;
                ExprKind::ResultRef(name)
            }
            Token::Keyword(keyword) => match keyword {
                Keyword::True | Keyword::False => {
                    self.current += 1;
                    ExprKind::Bool(keyword == Keyword::True)
                }
                Keyword::Null => {
                    self.current += 1;
                    ExprKind::Null
                }
                Keyword::Now => {
                    self.current += 1;
                    ExprKind::Now
                }
                Keyword::It => {
                    self.current += 1;
                    ExprKind::It
                }
                Keyword::Read => {
                    self.current += 1;
                    ExprKind::Read(self.parse_where()?.boxed())
                }
                Keyword::Call => ExprKind::Call(self.parse_call()?),
                Keyword::Event | Keyword::Destination => {
                    self.current += 1;
                    let concept = match self.peek() {
                        Some(Token::Concept(concept)) => concept.clone(),
                        _ => return Err(self.unexpected("concept reference")),
                    };
                    self.current += 1;
                    if keyword == Keyword::Event {
                        ExprKind::Event(concept)
                    } else {
                        ExprKind::Destination(concept)
                    }
                }
                Keyword::Mlm => {
                    self.current += 1;
                    let name = match self.peek() {
                        Some(Token::Term(name)) | Some(Token::Str(name)) => name.clone(),
                        _ => return Err(self.unexpected("module name")),
                    };
                    self.current += 1;
                    ExprKind::MlmRef(name)
                }
                keyword if keyword.is_slot_label() => {
                    self.current += 1;
                    ExprKind::Identifier(keyword.as_str().to_string())
                }
                _ => return Err(self.unexpected("expression")),
            },
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr::new(kind, self.span_from(start)))
    }

    /// `( expr )` or a list `( a, b, ... )`
    fn parse_parenthesized(&mut self) -> ParseResult<Expr> {
        let start = self.expect(TokenKind::OpenParen)?.start;
        if self.eat(TokenKind::CloseParen) {
            return Ok(Expr::new(ExprKind::List(Vec::new()), self.span_from(start)));
        }
        let first = self.parse_expr()?;
        if !self.at(TokenKind::Comma) {
            self.expect(TokenKind::CloseParen)?;
            return Ok(Expr::new(first.kind, self.span_from(start)));
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            items.push(self.parse_expr()?);
        }
        self.expect(TokenKind::CloseParen)?;
        Ok(Expr::new(ExprKind::List(items), self.span_from(start)))
    }
}

#[cfg(test)]
mod tests {
    use crate::mlm::ast::{
        BinaryOp, CompareOp, Expr, ExprKind, ReadModifier, SlotKind, StatementKind,
        TemporalRelation, UnaryOp,
    };
    use crate::mlm::parsing::parse;
    use rstest::rstest;

    fn expr(source: &str) -> Expr {
        let output = parse(&format!("logic: conclude {};;", source)).unwrap();
        assert!(
            output.diagnostics.is_empty(),
            "{}: {:?}",
            source,
            output.diagnostics
        );
        match &output.mlm.block(SlotKind::Logic).unwrap()[0].kind {
            StatementKind::Conclude(expr) => expr.clone(),
            other => panic!("expected conclude, got {:?}", other),
        }
    }

    fn compare_op(expr: &Expr) -> CompareOp {
        match &expr.kind {
            ExprKind::Compare { op, .. } => *op,
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[rstest]
    #[case("A = 1", CompareOp::Equals)]
    #[case("A eq 1", CompareOp::Equals)]
    #[case("A is equal to 1", CompareOp::Equals)]
    #[case("A <> 1", CompareOp::NotEquals)]
    #[case("A /= 1", CompareOp::NotEquals)]
    #[case("A ne 1", CompareOp::NotEquals)]
    #[case("A is not equal 1", CompareOp::NotEquals)]
    #[case("A < 1", CompareOp::LessThan)]
    #[case("A lt 1", CompareOp::LessThan)]
    #[case("A is less than 1", CompareOp::LessThan)]
    #[case("A <= 1", CompareOp::LessOrEqual)]
    #[case("A le 1", CompareOp::LessOrEqual)]
    #[case("A is less than or equal to 1", CompareOp::LessOrEqual)]
    #[case("A > 1", CompareOp::GreaterThan)]
    #[case("A gt 1", CompareOp::GreaterThan)]
    #[case("A is greater than 1", CompareOp::GreaterThan)]
    #[case("A >= 1", CompareOp::GreaterOrEqual)]
    #[case("A ge 1", CompareOp::GreaterOrEqual)]
    #[case("A is greater than or equal 1", CompareOp::GreaterOrEqual)]
    #[case("A in (1, 2)", CompareOp::In)]
    #[case("A is in (1, 2)", CompareOp::In)]
    fn test_operator_spellings(#[case] source: &str, #[case] op: CompareOp) {
        assert_eq!(compare_op(&expr(source)), op);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let parsed = expr("a or b and c");
        match parsed.kind {
            ExprKind::Binary { op, rhs, .. } => {
                assert_eq!(op, BinaryOp::Or);
                assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::And, .. }));
            }
            other => panic!("expected or, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_precedence_inside_comparison() {
        let parsed = expr("a + 2 * 3 > 10");
        match parsed.kind {
            ExprKind::Compare { lhs, .. } => match lhs.kind {
                ExprKind::Binary { op, rhs, .. } => {
                    assert_eq!(op, BinaryOp::Add);
                    assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Multiply, .. }));
                }
                other => panic!("expected addition, got {:?}", other),
            },
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_not_and_is_null() {
        let parsed = expr("not x is not null");
        match parsed.kind {
            ExprKind::Unary { op, operand } => {
                assert_eq!(op, UnaryOp::Not);
                assert!(matches!(operand.kind, ExprKind::IsNull { negated: true, .. }));
            }
            other => panic!("expected not, got {:?}", other),
        }
    }

    #[test]
    fn test_read_with_modifier_and_where() {
        let parsed = expr("read last 3 from {CD4 Count} where it occurred within the past 6 months");
        let ExprKind::Read(inner) = parsed.kind else {
            panic!("expected read");
        };
        let ExprKind::Where { operand, condition } = inner.kind else {
            panic!("expected where");
        };
        match operand.kind {
            ExprKind::Modifier {
                modifier, param, ..
            } => {
                assert_eq!(modifier, ReadModifier::Last);
                assert_eq!(param.map(|p| p.kind), Some(ExprKind::Number(3.0)));
            }
            other => panic!("expected modifier, got {:?}", other),
        }
        match condition.kind {
            ExprKind::OccurWithinPast { subject, window } => {
                assert_eq!(subject.kind, ExprKind::It);
                assert!(matches!(
                    window.kind,
                    ExprKind::Duration { ref unit, .. } if unit == "months"
                ));
            }
            other => panic!("expected occurrence window, got {:?}", other),
        }
    }

    #[test]
    fn test_temporal_relation_with_duration() {
        let parsed = expr("3 days after time of x");
        match parsed.kind {
            ExprKind::Temporal {
                relation, anchor, ..
            } => {
                assert_eq!(relation, TemporalRelation::After);
                assert!(matches!(anchor.kind, ExprKind::Function { ref name, .. } if name == "time"));
            }
            other => panic!("expected temporal, got {:?}", other),
        }
    }

    #[test]
    fn test_not_in_and_lists() {
        let parsed = expr("x not in (1, 2, 3)");
        let ExprKind::Unary { operand, .. } = parsed.kind else {
            panic!("expected not");
        };
        match operand.kind {
            ExprKind::Compare { op, rhs, .. } => {
                assert_eq!(op, CompareOp::In);
                assert!(matches!(&rhs.kind, ExprKind::List(items) if items.len() == 3));
            }
            other => panic!("expected in, got {:?}", other),
        }
    }

    #[test]
    fn test_atoms() {
        assert_eq!(expr("'abc'").kind, ExprKind::Term("abc".to_string()));
        assert_eq!(expr("mlm 'other'").kind, ExprKind::MlmRef("other".to_string()));
        assert_eq!(expr("null").kind, ExprKind::Null);
        assert_eq!(expr("date").kind, ExprKind::Identifier("date".to_string()));
        assert!(matches!(expr("event {storage}").kind, ExprKind::Event(_)));
        assert!(matches!(expr("-(1 + 2)").kind, ExprKind::Unary { op: UnaryOp::Negate, .. }));
    }
}
