//! Parser
//!
//!     A hand-written recursive-descent parser over the token vector produced by
//!     [`lexing`](crate::mlm::lexing). It is organized into submodules by grammar level:
//!
//!         categories   module structure: category headers, slots, slot terminators
//!         statements   data/logic/action statements and if-chains
//!         expressions  the expression precedence ladder
//!         structured   sub-grammars for version, date and validation slot text
//!
//! Error Recovery
//!
//!     The parser never stops at the first syntax error. Each failure is recorded as a
//!     [`Diagnostic`] and the parser synchronizes on a follow set before continuing:
//!
//!         slot level        ;;
//!         statement level   ;  ;;  else  elseif  endif
//!
//!     Statement synchronization counts nested `if`/`endif` pairs so that recovery inside a
//!     nested conditional does not stop at an inner `endif`. Structured slots (priority,
//!     urgency, evoke, age bounds and the structured text slots) are all-or-nothing: a
//!     malformed one is reported and left out of the tree. Block slots keep every statement
//!     that parsed.
//!
//!     After `max_errors` errors the parser reports that it gave up and stops.

mod categories;
mod expressions;
mod statements;
pub mod structured;

use crate::mlm::ast::range::Span;
use crate::mlm::ast::Mlm;
use crate::mlm::diagnostics::{codes, Diagnostic, Stage};
use crate::mlm::lexing::{tokenize, LexError, Spanned};
use crate::mlm::token::{Keyword, Token, TokenKind};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MAX_ERRORS: usize = 25;

/// Tokens that end a slot.
const SLOT_FOLLOW: &[TokenKind] = &[TokenKind::SlotEnd];

/// Tokens that end a statement.
const STATEMENT_FOLLOW: &[TokenKind] = &[
    TokenKind::Semicolon,
    TokenKind::SlotEnd,
    TokenKind::Keyword(Keyword::Else),
    TokenKind::Keyword(Keyword::ElseIf),
    TokenKind::Keyword(Keyword::EndIf),
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("{message}")]
    Malformed { message: String, span: Span },
}

impl SyntaxError {
    pub fn span(&self) -> &Span {
        match self {
            SyntaxError::Unexpected { span, .. } | SyntaxError::Malformed { span, .. } => span,
        }
    }
}

pub type ParseResult<T> = Result<T, SyntaxError>;

/// The tree and the diagnostics of one parse.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub mlm: Mlm,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Tokenize and parse `source`. Only lexical errors are returned as `Err`.
pub fn parse(source: &str) -> Result<ParseOutput, LexError> {
    parse_with_limit(source, DEFAULT_MAX_ERRORS)
}

pub fn parse_with_limit(source: &str, max_errors: usize) -> Result<ParseOutput, LexError> {
    let tokens = tokenize(source)?;
    Ok(Parser::new(tokens, source)
        .with_max_errors(max_errors)
        .parse())
}

pub struct Parser<'source> {
    tokens: Vec<Spanned>,
    source: &'source str,
    current: usize,
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    max_errors: usize,
    halted: bool,
}

impl<'source> Parser<'source> {
    pub fn new(tokens: Vec<Spanned>, source: &'source str) -> Self {
        Self {
            tokens,
            source,
            current: 0,
            diagnostics: Vec::new(),
            error_count: 0,
            max_errors: DEFAULT_MAX_ERRORS,
            halted: false,
        }
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors.max(1);
        self
    }

    pub fn parse(mut self) -> ParseOutput {
        let mlm = self.parse_mlm();
        debug!(
            slots = mlm.slots().count(),
            errors = self.error_count,
            diagnostics = self.diagnostics.len(),
            "parsed MLM"
        );
        ParseOutput {
            mlm,
            diagnostics: self.diagnostics,
        }
    }
}

// Token helpers

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.current + n).map(|(token, _)| token)
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek_nth_kind(0)
    }

    fn peek_nth_kind(&self, n: usize) -> TokenKind {
        self.peek_nth(n).map_or(TokenKind::Eof, Token::kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.at(TokenKind::Keyword(keyword))
    }

    fn at_eof(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn current_span(&self) -> Span {
        match self.tokens.get(self.current) {
            Some((_, span)) => span.clone(),
            None => self.source.len()..self.source.len(),
        }
    }

    fn previous_span(&self) -> Span {
        match self.current.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some((_, span)) => span.clone(),
            None => 0..0,
        }
    }

    /// Span from `start` to the end of the last consumed token.
    fn span_from(&self, start: usize) -> Span {
        start..self.previous_span().end.max(start)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat(TokenKind::Keyword(keyword))
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Span> {
        if self.at(kind) {
            let span = self.current_span();
            self.current += 1;
            Ok(span)
        } else {
            Err(self.unexpected(kind.to_string()))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<Span> {
        self.expect(TokenKind::Keyword(keyword))
    }

    /// A variable name. Slot labels are accepted as names.
    fn expect_name(&mut self) -> ParseResult<String> {
        match self.peek().and_then(Token::as_identifier) {
            Some(name) => {
                self.current += 1;
                Ok(name)
            }
            None => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: impl Into<String>) -> SyntaxError {
        let found = match self.peek() {
            Some(token) => format!("'{}'", token),
            None => TokenKind::Eof.to_string(),
        };
        SyntaxError::Unexpected {
            expected: expected.into(),
            found,
            span: self.current_span(),
        }
    }

    fn malformed(&self, message: impl Into<String>, span: Span) -> SyntaxError {
        SyntaxError::Malformed {
            message: message.into(),
            span,
        }
    }
}

// Diagnostics and recovery

impl Parser<'_> {
    fn report(&mut self, error: SyntaxError) {
        let code = match &error {
            SyntaxError::Unexpected { .. } => codes::UNEXPECTED_TOKEN,
            SyntaxError::Malformed { .. } => codes::MALFORMED_SLOT,
        };
        self.report_with_code(code, error);
    }

    fn report_with_code(&mut self, code: &'static str, error: SyntaxError) {
        if self.halted {
            return;
        }
        let span = error.span().clone();
        self.diagnostics
            .push(Diagnostic::error(Stage::Parse, code, error.to_string(), span.clone()));
        self.error_count += 1;
        if self.error_count >= self.max_errors {
            self.diagnostics.push(Diagnostic::error(
                Stage::Parse,
                codes::TOO_MANY_ERRORS,
                format!("too many errors ({}), parsing stopped", self.error_count),
                span,
            ));
            self.halted = true;
        }
    }

    fn warn(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::warning(Stage::Parse, code, message, span));
    }

    /// Skip tokens until one of `follow` (or the end of input) is next.
    fn synchronize(&mut self, follow: &[TokenKind]) {
        while !self.at_eof() && !follow.contains(&self.peek_kind()) {
            self.current += 1;
        }
    }

    /// Like [`synchronize`](Self::synchronize) with the statement follow set, but an
    /// `if` opened while skipping hides the branch keywords up to its `endif`.
    fn synchronize_statement(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            let kind = self.peek_kind();
            if depth == 0 && STATEMENT_FOLLOW.contains(&kind) {
                return;
            }
            if kind == TokenKind::SlotEnd && self.is_slot_boundary() {
                return;
            }
            match kind {
                TokenKind::Keyword(Keyword::If) => depth += 1,
                TokenKind::Keyword(Keyword::EndIf) => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.current += 1;
        }
    }

    /// Skip to the end of the current slot, leaving the `;;` in place.
    fn skip_slot(&mut self) {
        loop {
            self.synchronize(SLOT_FOLLOW);
            if self.at_eof() || self.is_slot_boundary() {
                return;
            }
            self.current += 1;
        }
    }

    /// Whether the `;;` at the cursor closes the slot.
    ///
    /// Inside a block slot `;;` may also separate statements. It ends the slot only when
    /// the input ends after it or another slot, a category header or `end:` follows.
    fn is_slot_boundary(&self) -> bool {
        if !self.at(TokenKind::SlotEnd) {
            return false;
        }
        match self.peek_nth_kind(1) {
            TokenKind::Eof => true,
            TokenKind::Keyword(keyword)
                if keyword.is_slot_label() || keyword.is_category() || keyword == Keyword::End =>
            {
                self.peek_nth_kind(2) == TokenKind::Colon
            }
            _ => false,
        }
    }
}
