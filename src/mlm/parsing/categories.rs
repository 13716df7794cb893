//! Module structure: categories and slots.

use super::structured;
use super::{ParseResult, Parser, SLOT_FOLLOW};
use crate::mlm::ast::{AgeBound, CategoryKind, Mlm, Slot, SlotBody, SlotKind};
use crate::mlm::diagnostics::codes;
use crate::mlm::token::{Keyword, Token, TokenKind};
use tracing::trace;

impl Parser<'_> {
    pub(super) fn parse_mlm(&mut self) -> Mlm {
        let mut mlm = Mlm::default();
        let mut current: Option<CategoryKind> = None;

        while !self.at_eof() && !self.halted {
            let followed_by_colon = self.peek_nth_kind(1) == TokenKind::Colon;
            match self.peek_kind() {
                TokenKind::SlotEnd => {
                    self.current += 1;
                }
                TokenKind::Keyword(keyword) if keyword.is_category() && followed_by_colon => {
                    let span = self.current_span();
                    self.current += 2;
                    if let Some(kind) = CategoryKind::from_keyword(keyword) {
                        let category = mlm.category_mut(kind);
                        if category.header.is_some() {
                            self.warn(
                                codes::DUPLICATE_SLOT,
                                format!("duplicate '{}' category", kind.label()),
                                span.clone(),
                            );
                        } else {
                            category.header = Some(span);
                        }
                        current = Some(kind);
                    }
                }
                TokenKind::Keyword(Keyword::End) if followed_by_colon => {
                    self.current += 2;
                    self.eat(TokenKind::SlotEnd);
                    if !self.at_eof() {
                        let span = self.current_span().start..self.source.len();
                        self.warn(
                            codes::TRAILING_INPUT,
                            "input after 'end:' is ignored",
                            span,
                        );
                    }
                    break;
                }
                TokenKind::Keyword(keyword) if keyword.is_slot_label() && followed_by_colon => {
                    if let Some(slot) = self.parse_slot(keyword, current) {
                        let category = mlm.category_mut(slot.kind.category());
                        if category.slots.iter().any(|s| s.kind == slot.kind) {
                            self.warn(
                                codes::DUPLICATE_SLOT,
                                format!("duplicate '{}' slot, first one is used", slot.kind.label()),
                                slot.span.clone(),
                            );
                        }
                        category.slots.push(slot);
                    }
                }
                _ => {
                    let error = self.unexpected("slot label");
                    self.report(error);
                    self.skip_slot();
                }
            }
        }
        mlm
    }

    /// Parse `label: body ;;`. The cursor is on the label.
    fn parse_slot(&mut self, keyword: Keyword, current: Option<CategoryKind>) -> Option<Slot> {
        let start = self.current_span().start;
        let kind = SlotKind::from_keyword(keyword)?;
        self.current += 2;
        trace!(slot = kind.label(), "parsing slot");

        if let Some(category) = current {
            if category != kind.category() {
                self.warn(
                    codes::MISPLACED_SLOT,
                    format!(
                        "'{}' belongs to the {} category, found under {}",
                        kind.label(),
                        kind.category().label(),
                        category.label()
                    ),
                    self.span_from(start),
                );
            }
        }

        let body = match kind {
            SlotKind::Data | SlotKind::Logic | SlotKind::Action => {
                Some(SlotBody::Block(self.parse_block()))
            }
            SlotKind::Version => self.structured_text(structured::parse_version, SlotBody::Version),
            SlotKind::Arden => {
                self.structured_text(structured::parse_arden_version, SlotBody::Version)
            }
            SlotKind::Date => self.structured_text(structured::parse_date, SlotBody::Date),
            SlotKind::Validation => {
                self.structured_text(structured::parse_validation, SlotBody::Validation)
            }
            SlotKind::Priority => self.structured(Self::parse_priority),
            SlotKind::Urgency => self.structured(|p| p.parse_expr().map(SlotBody::Urgency)),
            SlotKind::Evoke => self.structured(Self::parse_evoke),
            SlotKind::AgeMin | SlotKind::AgeMax => self.structured(Self::parse_age),
            _ => Some(SlotBody::Text(self.slot_text())),
        };

        self.finish_slot(kind);
        body.map(|body| Slot {
            kind,
            body,
            span: self.span_from(start),
        })
    }

    /// Consume the slot terminator, reporting and skipping anything left before it.
    fn finish_slot(&mut self, kind: SlotKind) {
        if self.halted || self.at_eof() {
            return;
        }
        if self.is_slot_boundary() {
            self.current += 1;
            return;
        }
        if !self.at(TokenKind::SlotEnd) {
            let error = self.unexpected(format!("';;' to end the '{}' slot", kind.label()));
            self.report_with_code(codes::MISSING_TERMINATOR, error);
        }
        self.skip_slot();
        self.eat(TokenKind::SlotEnd);
    }

    /// Raw text of a free-text slot.
    fn slot_text(&mut self) -> String {
        if let Some(Token::SlotText(text)) = self.peek() {
            let text = text.trim().to_string();
            self.current += 1;
            return text;
        }
        // Labels that were not at a slot start reach here unlexed; take the source slice.
        let start = self.current_span().start;
        self.synchronize(SLOT_FOLLOW);
        let end = self.current_span().start;
        self.source[start..end.max(start)].trim().to_string()
    }

    fn structured_text<T>(
        &mut self,
        grammar: fn(&str) -> Result<T, String>,
        wrap: fn(T) -> SlotBody,
    ) -> Option<SlotBody> {
        let span = self.current_span();
        let text = self.slot_text();
        match grammar(&text) {
            Ok(value) => Some(wrap(value)),
            Err(message) => {
                let error = self.malformed(message, span);
                self.report(error);
                None
            }
        }
    }

    /// Run a structured slot grammar; on failure report and skip to the terminator.
    fn structured(
        &mut self,
        grammar: impl FnOnce(&mut Self) -> ParseResult<SlotBody>,
    ) -> Option<SlotBody> {
        let result = grammar(self).and_then(|body| {
            if self.at(TokenKind::SlotEnd) || self.at_eof() {
                Ok(body)
            } else {
                Err(self.unexpected("';;'"))
            }
        });
        match result {
            Ok(body) => Some(body),
            Err(error) => {
                self.report(error);
                self.skip_slot();
                None
            }
        }
    }

    fn parse_priority(&mut self) -> ParseResult<SlotBody> {
        let span = self.current_span();
        let negative = self.eat(TokenKind::Minus);
        match self.peek() {
            Some(Token::Number(text)) => {
                let value: f64 = text
                    .parse()
                    .map_err(|_| self.malformed(format!("invalid priority '{}'", text), span))?;
                self.current += 1;
                Ok(SlotBody::Priority(if negative { -value } else { value }))
            }
            _ => Err(self.malformed(
                format!(
                    "priority must be a number, found {}",
                    self.peek()
                        .map_or(TokenKind::Eof.to_string(), |t| format!("'{}'", t))
                ),
                self.current_span(),
            )),
        }
    }

    fn parse_evoke(&mut self) -> ParseResult<SlotBody> {
        let mut triggers = Vec::new();
        while !self.at(TokenKind::SlotEnd) && !self.at_eof() {
            triggers.push(self.parse_expr()?);
            if !self.eat(TokenKind::Semicolon) && !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(SlotBody::Evoke(triggers))
    }

    /// `18 years`
    fn parse_age(&mut self) -> ParseResult<SlotBody> {
        let start = self.current_span().start;
        let amount = match self.peek() {
            Some(Token::Number(text)) => text.parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| self.unexpected("number"))?;
        self.current += 1;
        let unit = self.expect_name()?;
        Ok(SlotBody::Age(AgeBound {
            amount,
            unit,
            span: self.span_from(start),
        }))
    }
}
