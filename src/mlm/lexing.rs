//! Lexer
//!
//!     Tokenization is done in two layers. The logos automaton in [`token`](crate::mlm::token)
//!     recognizes punctuation, literals and words. The [`Lexer`] wrapper on top of it
//!     classifies words through the keyword table and handles the one context-sensitive
//!     part of the language: free-text slots.
//!
//! Slot Text
//!
//!     Slots such as `title:`, `author:` or `links:` contain prose, not code. Prose contains
//!     apostrophes, unbalanced braces and `//` in URLs, all of which would either fail or
//!     mislead the automaton. When such a label appears at the start of a slot and is
//!     followed by a colon, the wrapper emits the label and the colon, then takes everything
//!     up to the next `;;` as a single [`Token::SlotText`].
//!
//!     A slot starts at the beginning of the input, after a `;;`, or after a category header
//!     (`maintenance:`, `library:`, `knowledge:`). Elsewhere, slot labels are ordinary words,
//!     so `date := now;;` inside a logic slot is an assignment to a variable named `date`.
//!
//! Errors
//!
//!     Lexical errors are fatal. The first unrecognized sequence stops tokenization and is
//!     returned as a [`LexError`]; there is no recovery at this layer.

use crate::mlm::ast::range::Span;
use crate::mlm::token::{keyword_for, Keyword, Token};
use logos::Logos;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::debug;

/// A token with its byte span.
pub type Spanned = (Token, Span);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unrecognized input {text:?} at byte {}", span.start)]
    Unrecognized { text: String, span: Span },
    #[error("unterminated {what} starting at byte {}", span.start)]
    Unterminated { what: &'static str, span: Span },
}

impl LexError {
    pub fn span(&self) -> &Span {
        match self {
            LexError::Unrecognized { span, .. } | LexError::Unterminated { span, .. } => span,
        }
    }
}

/// Iterator over the tokens of one MLM source.
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    pending: VecDeque<Spanned>,
    slot_start: bool,
    after_category: bool,
    failed: bool,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            pending: VecDeque::new(),
            slot_start: true,
            after_category: false,
            failed: false,
        }
    }

    fn error_at(&self, span: Span) -> LexError {
        let source = self.inner.source();
        let rest = &source[span.start..];
        let what = if rest.starts_with('"') {
            Some("string literal")
        } else if rest.starts_with('\'') {
            Some("term literal")
        } else if rest.starts_with('{') {
            Some("concept reference")
        } else if rest.starts_with("/*") {
            Some("block comment")
        } else {
            None
        };
        match what {
            Some(what) => LexError::Unterminated {
                what,
                span: span.start..source.len(),
            },
            None => LexError::Unrecognized {
                text: source[span.clone()].to_string(),
                span,
            },
        }
    }

    /// Queues `:` and the raw slot text when `label` opens a text slot.
    fn capture_slot_text(&mut self) -> bool {
        let rest = self.inner.remainder();
        let trimmed = rest.trim_start();
        if !trimmed.starts_with(':') || trimmed.starts_with(":=") {
            return false;
        }
        let colon_start = self.inner.span().end + (rest.len() - trimmed.len());
        let body = &trimmed[1..];
        let length = body.find(";;").unwrap_or(body.len());
        let text = body[..length].to_string();
        let text_start = colon_start + 1;

        self.pending
            .push_back((Token::Colon, colon_start..text_start));
        self.pending
            .push_back((Token::SlotText(text), text_start..text_start + length));
        self.inner.bump(rest.len() - body.len() + length);
        true
    }

    fn track_slot_start(&mut self, token: &Token) {
        let (slot_start, after_category) = match token {
            Token::SlotEnd => (true, false),
            Token::Colon if self.after_category => (true, false),
            Token::Keyword(keyword) if keyword.is_category() || *keyword == Keyword::End => {
                (false, true)
            }
            _ => (false, false),
        };
        self.slot_start = slot_start;
        self.after_category = after_category;
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Spanned, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(spanned) = self.pending.pop_front() {
            self.track_slot_start(&spanned.0);
            return Some(Ok(spanned));
        }
        if self.failed {
            return None;
        }

        let token = match self.inner.next()? {
            Ok(token) => token,
            Err(()) => {
                self.failed = true;
                return Some(Err(self.error_at(self.inner.span())));
            }
        };
        let span = self.inner.span();

        let token = match token {
            Token::Identifier(word) => match keyword_for(&word) {
                Some(keyword) => Token::Keyword(keyword),
                None => Token::Identifier(word),
            },
            other => other,
        };

        if let Token::Keyword(keyword) = &token {
            if self.slot_start && keyword.is_text_slot_label() && self.capture_slot_text() {
                // The label itself is not a slot boundary; the queued colon follows it.
                self.slot_start = false;
                self.after_category = false;
                return Some(Ok((token, span)));
            }
        }

        self.track_slot_start(&token);
        Some(Ok((token, span)))
    }
}

/// Tokenize a whole MLM source.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, LexError> {
    let tokens = Lexer::new(source).collect::<Result<Vec<_>, _>>()?;
    debug!(tokens = tokens.len(), bytes = source.len(), "tokenized MLM source");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlm::token::ConceptRef;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_text_slot_is_captured_raw() {
        let source = "title: Don't {panic} // here;;";
        let spanned = tokenize(source).unwrap();
        assert_eq!(
            spanned,
            vec![
                (Token::Keyword(Keyword::Title), 0..5),
                (Token::Colon, 5..6),
                (
                    Token::SlotText(" Don't {panic} // here".to_string()),
                    6..28
                ),
                (Token::SlotEnd, 28..30),
            ]
        );
    }

    #[test]
    fn test_links_keep_urls() {
        assert_eq!(
            tokens("links: http://example.org/a;;"),
            vec![
                Token::Keyword(Keyword::Links),
                Token::Colon,
                Token::SlotText(" http://example.org/a".to_string()),
                Token::SlotEnd,
            ]
        );
    }

    #[test]
    fn test_slot_text_after_category_header() {
        assert_eq!(
            tokens("maintenance: filename: dose_check;;"),
            vec![
                Token::Keyword(Keyword::Maintenance),
                Token::Colon,
                Token::Keyword(Keyword::MlmName),
                Token::Colon,
                Token::SlotText(" dose_check".to_string()),
                Token::SlotEnd,
            ]
        );
    }

    #[test]
    fn test_slot_label_inside_statements_is_a_word() {
        assert_eq!(
            tokens("logic: date := 5;;"),
            vec![
                Token::Keyword(Keyword::Logic),
                Token::Colon,
                Token::Keyword(Keyword::Date),
                Token::Assign,
                Token::Number("5".to_string()),
                Token::SlotEnd,
            ]
        );
    }

    #[test]
    fn test_text_slot_without_terminator_runs_to_end() {
        assert_eq!(
            tokens("author: Jane"),
            vec![
                Token::Keyword(Keyword::Author),
                Token::Colon,
                Token::SlotText(" Jane".to_string()),
            ]
        );
    }

    #[test]
    fn test_words_are_classified() {
        assert_eq!(
            tokens("data: X := READ {x};;"),
            vec![
                Token::Keyword(Keyword::Data),
                Token::Colon,
                Token::Identifier("X".to_string()),
                Token::Assign,
                Token::Keyword(Keyword::Read),
                Token::Concept(ConceptRef::new("x")),
                Token::SlotEnd,
            ]
        );
    }

    #[test]
    fn test_unknown_character_is_fatal() {
        let err = tokenize("logic: x := 5 # 3;;").unwrap_err();
        assert_eq!(
            err,
            LexError::Unrecognized {
                text: "#".to_string(),
                span: 14..15
            }
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("action: write \"oops;;").unwrap_err();
        assert!(matches!(
            err,
            LexError::Unterminated {
                what: "string literal",
                ..
            }
        ));
        assert_eq!(err.span().start, 14);
    }
}
