//! Statements of the data, logic and action slots.

use super::{ParseResult, Parser};
use crate::mlm::ast::{CallExpr, ConditionalBranch, IfChain, Statement, StatementKind};
use crate::mlm::diagnostics::codes;
use crate::mlm::token::{Keyword, Token, TokenKind};

/// Keywords that end the body of a conditional branch.
const BRANCH_END: &[Keyword] = &[Keyword::Else, Keyword::ElseIf, Keyword::EndIf];

impl Parser<'_> {
    /// Statements up to the end of the slot.
    pub(super) fn parse_block(&mut self) -> Vec<Statement> {
        self.parse_statements(false)
    }

    /// Statements of a branch body, up to `else`, `elseif`, `endif` or the end of the slot.
    fn parse_branch_body(&mut self) -> Vec<Statement> {
        self.parse_statements(true)
    }

    fn parse_statements(&mut self, in_branch: bool) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.halted || self.at_eof() || self.at(TokenKind::SlotEnd) {
                break;
            }
            if in_branch && BRANCH_END.iter().any(|k| self.at_keyword(*k)) {
                break;
            }

            let start = self.current;
            match self.parse_statement() {
                Ok(Some(statement)) => {
                    statements.push(statement);
                    self.expect_statement_end(in_branch);
                }
                Ok(None) => {}
                Err(error) => {
                    self.report(error);
                    self.synchronize_statement();
                    if self.current == start {
                        self.current += 1;
                    }
                }
            }
        }
        statements
    }

    /// `;` and `;;` that do not end the slot.
    fn skip_separators(&mut self) {
        loop {
            if self.at(TokenKind::Semicolon)
                || (self.at(TokenKind::SlotEnd) && !self.is_slot_boundary())
            {
                self.current += 1;
            } else {
                return;
            }
        }
    }

    fn expect_statement_end(&mut self, in_branch: bool) {
        let ends = match self.peek_kind() {
            TokenKind::Semicolon | TokenKind::SlotEnd | TokenKind::Eof => true,
            TokenKind::Keyword(keyword) => in_branch && BRANCH_END.contains(&keyword),
            _ => false,
        };
        if !ends {
            let error = self.unexpected("';' after statement");
            self.report_with_code(codes::MISSING_TERMINATOR, error);
            self.synchronize_statement();
        }
    }

    /// One statement. `Ok(None)` means the statement was malformed and has already been
    /// reported and skipped.
    fn parse_statement(&mut self) -> ParseResult<Option<Statement>> {
        let start = self.current_span().start;
        let kind = match self.peek_kind() {
            TokenKind::Keyword(Keyword::If) => return self.parse_if(),
            TokenKind::Keyword(Keyword::Let) => {
                self.current += 1;
                let target = self.expect_name()?;
                self.expect_keyword(Keyword::Be)?;
                let value = self.parse_expr()?;
                StatementKind::Assign { target, value }
            }
            TokenKind::Keyword(Keyword::Conclude) => {
                self.current += 1;
                StatementKind::Conclude(self.parse_expr()?)
            }
            TokenKind::Keyword(Keyword::Call) => StatementKind::Call(self.parse_call()?),
            TokenKind::Keyword(Keyword::Write) => {
                self.current += 1;
                let message = self.parse_expr()?;
                let destination = if self.eat_keyword(Keyword::At) {
                    Some(self.parse_destination_name()?)
                } else {
                    None
                };
                StatementKind::Write {
                    message,
                    destination,
                }
            }
            _ if self.peek_nth_kind(1) == TokenKind::Assign => {
                let target = self.expect_name()?;
                self.current += 1;
                let value = self.parse_expr()?;
                StatementKind::Assign { target, value }
            }
            _ => return Err(self.unexpected("statement")),
        };
        Ok(Some(Statement::new(kind, self.span_from(start))))
    }

    fn parse_destination_name(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(Token::Concept(concept)) => {
                let name = concept.name.clone();
                self.current += 1;
                Ok(name)
            }
            _ => self.expect_name(),
        }
    }

    /// `call target [with p1, p2, ...]`
    pub(super) fn parse_call(&mut self) -> ParseResult<CallExpr> {
        let start = self.expect_keyword(Keyword::Call)?.start;
        let target = match self.peek() {
            Some(Token::Term(name)) | Some(Token::Str(name)) => {
                let name = name.clone();
                self.current += 1;
                name
            }
            _ => self.expect_name()?,
        };
        let mut params = Vec::new();
        if self.eat_keyword(Keyword::With) {
            params.push(self.parse_expr()?);
            while self.eat(TokenKind::Comma) {
                params.push(self.parse_expr()?);
            }
        }
        Ok(CallExpr {
            target,
            params,
            span: self.span_from(start),
        })
    }

    /// `if c then s (elseif c then s)* (else s)? endif`
    ///
    /// A malformed branch header makes the whole chain unusable; the chain is reported
    /// and skipped up to its matching `endif`.
    fn parse_if(&mut self) -> ParseResult<Option<Statement>> {
        let start = self.current_span().start;
        self.current += 1;
        let mut branches = Vec::new();
        let mut otherwise = None;

        let mut branch_start = start;
        loop {
            let condition = match self.parse_branch_header() {
                Ok(condition) => condition,
                Err(error) => {
                    self.report(error);
                    self.skip_past_endif();
                    return Ok(None);
                }
            };
            let body = self.parse_branch_body();
            branches.push(ConditionalBranch {
                condition,
                body,
                span: self.span_from(branch_start),
            });

            branch_start = self.current_span().start;
            if self.eat_keyword(Keyword::ElseIf) {
                continue;
            }
            if self.eat_keyword(Keyword::Else) {
                otherwise = Some(self.parse_branch_body());
            }
            break;
        }

        if !self.eat_keyword(Keyword::EndIf) {
            let error = self.unexpected("'endif'");
            self.report_with_code(codes::MISSING_TERMINATOR, error);
        }
        let chain = IfChain {
            branches,
            otherwise,
        };
        Ok(Some(Statement::new(
            StatementKind::If(chain),
            self.span_from(start),
        )))
    }

    fn parse_branch_header(&mut self) -> ParseResult<crate::mlm::ast::Expr> {
        let condition = self.parse_expr()?;
        self.expect_keyword(Keyword::Then)?;
        Ok(condition)
    }

    /// Skip to just past the `endif` matching an already consumed `if`, or to the end of
    /// the slot when there is none.
    fn skip_past_endif(&mut self) {
        let mut depth = 1usize;
        while !self.at_eof() {
            if self.at(TokenKind::SlotEnd) && self.is_slot_boundary() {
                return;
            }
            match self.peek_kind() {
                TokenKind::Keyword(Keyword::If) => depth += 1,
                TokenKind::Keyword(Keyword::EndIf) => {
                    depth -= 1;
                    if depth == 0 {
                        self.current += 1;
                        return;
                    }
                }
                _ => {}
            }
            self.current += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::mlm::ast::{ExprKind, SlotKind, StatementKind};
    use crate::mlm::diagnostics::codes;
    use crate::mlm::parsing::parse;

    fn logic(source: &str) -> (Vec<StatementKind>, Vec<&'static str>) {
        let output = parse(&format!("logic: {}", source)).unwrap();
        let statements = output
            .mlm
            .block(SlotKind::Logic)
            .map(|block| block.iter().map(|s| s.kind.clone()).collect())
            .unwrap_or_default();
        (
            statements,
            output.diagnostics.iter().map(|d| d.code).collect(),
        )
    }

    #[test]
    fn test_assignment_forms() {
        let (statements, codes) = logic("X := 5; let Y be X + 1;;");
        assert!(codes.is_empty());
        assert!(matches!(&statements[0], StatementKind::Assign { target, .. } if target == "X"));
        assert!(matches!(&statements[1], StatementKind::Assign { target, .. } if target == "Y"));
    }

    #[test]
    fn test_elseif_chain() {
        let (statements, codes) = logic(
            "if a > 1 then conclude true; elseif a < 0 then x := 1; conclude false; else conclude false; endif;;",
        );
        assert!(codes.is_empty(), "{:?}", codes);
        match &statements[0] {
            StatementKind::If(chain) => {
                assert_eq!(chain.branches.len(), 2);
                assert_eq!(chain.branches[1].body.len(), 2);
                assert!(chain.otherwise.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_write_with_destination_and_call() {
        let (statements, codes) =
            logic("write \"Dose \" || D at email_dest; call check with D, ||result||;;");
        assert!(codes.is_empty(), "{:?}", codes);
        assert!(matches!(
            &statements[0],
            StatementKind::Write { destination: Some(d), .. } if d == "email_dest"
        ));
        match &statements[1] {
            StatementKind::Call(call) => {
                assert_eq!(call.target, "check");
                assert_eq!(call.params.len(), 2);
                assert_eq!(call.params[1].kind, ExprKind::ResultRef("result".to_string()));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_statement_recovers_at_separator() {
        let (statements, codes) = logic("x := ; y := 2;;");
        assert_eq!(codes, vec![codes::UNEXPECTED_TOKEN]);
        assert_eq!(statements.len(), 1);
        assert!(matches!(&statements[0], StatementKind::Assign { target, .. } if target == "y"));
    }

    #[test]
    fn test_bad_if_header_skips_to_matching_endif() {
        let (statements, codes) =
            logic("if then if b then x := 1; endif; conclude true; endif; y := 2;;");
        assert_eq!(codes, vec![codes::UNEXPECTED_TOKEN]);
        assert_eq!(statements.len(), 1);
        assert!(matches!(&statements[0], StatementKind::Assign { target, .. } if target == "y"));
    }

    #[test]
    fn test_error_inside_nested_branch_keeps_outer_chain() {
        let (statements, codes) =
            logic("if a then if b then x := ); endif; conclude true; else conclude false; endif;;");
        assert_eq!(codes, vec![codes::UNEXPECTED_TOKEN]);
        match &statements[0] {
            StatementKind::If(chain) => {
                assert_eq!(chain.branches[0].body.len(), 2);
                assert!(chain.otherwise.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_endif_is_reported() {
        let (statements, codes) = logic("if a then conclude true;; action: write \"x\";;");
        assert_eq!(codes, vec![codes::MISSING_TERMINATOR]);
        assert_eq!(statements.len(), 1);
    }
}
