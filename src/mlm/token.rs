//! Token types shared by the lexer and parser.
//!
//!     The character-level automaton is generated by logos. Words are produced as plain
//!     identifiers by the automaton and classified afterwards through the case-insensitive
//!     [keyword table](keyword_for), so `IF`, `If` and `if` all become [`Keyword::If`].
//!
//! Token Layers
//!
//!     Core Tokens:
//!         Produced directly by logos: punctuation, operators, literals and words.
//!
//!     Synthetic Tokens:
//!         [`Token::SlotText`] never comes out of the automaton. The lexer captures the raw
//!         text of free-text slots (title, author, purpose, ...) and of the structured text
//!         slots (version, date, validation, ...) as a single token, since their content is
//!         prose that would not survive tokenization.
//!
//!         [`Token::Keyword`] is produced by the keyword table from identifier tokens.

use logos::Logos;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A reference to an external concept: `{name}` or `{name from datasource}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConceptRef {
    pub name: String,
    pub datasource: Option<String>,
}

impl ConceptRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datasource: None,
        }
    }

    pub fn with_datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }
}

impl fmt::Display for ConceptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.datasource {
            Some(source) => write!(f, "{{{} from {}}}", self.name, source),
            None => write!(f, "{{{}}}", self.name),
        }
    }
}

static CONCEPT_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^(.*?)\s+from\s+(.+)$").expect("concept pattern is valid"));

fn concept_ref(lex: &mut logos::Lexer<Token>) -> ConceptRef {
    let slice = lex.slice();
    let inner = slice[1..slice.len() - 1].trim();
    match CONCEPT_FROM.captures(inner) {
        Some(caps) => ConceptRef::new(caps[1].trim()).with_datasource(caps[2].trim()),
        None => ConceptRef::new(inner),
    }
}

/// Strips the delimiters and collapses doubled delimiters (`""` or `''`).
fn unescape(slice: &str, delimiter: char) -> String {
    let inner = &slice[1..slice.len() - 1];
    let doubled: String = [delimiter, delimiter].iter().collect();
    inner.replace(&doubled, &delimiter.to_string())
}

/// All tokens of the MLM language.
#[derive(Logos, Debug, Clone, PartialEq, Serialize)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    // Two-character operators. logos takes the longest match, so these always win over
    // their single-character prefixes.
    #[token(":=")]
    Assign,
    #[token("/=")]
    SlashEqual,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("<>")]
    NotEqual,
    #[token(";;")]
    SlotEnd,
    #[token("||")]
    Concat,
    #[token("**")]
    Power,
    #[token("://")]
    UrlSeparator,

    // Single-character tokens
    #[token("=")]
    Equal,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    // Literals
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),
    #[regex(r#""([^"]|"")*""#, |lex| unescape(lex.slice(), '"'))]
    Str(String),
    #[regex(r"'([^']|'')*'", |lex| unescape(lex.slice(), '\''))]
    Term(String),
    #[regex(r"\{[^}]*\}", concept_ref)]
    Concept(ConceptRef),
    #[regex(r"[A-Za-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Produced by the lexer wrapper, never by the automaton
    Keyword(Keyword),
    SlotText(String),
}

/// Payload-free classification of a token, used for follow sets and expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Assign,
    SlashEqual,
    LessEqual,
    GreaterEqual,
    NotEqual,
    SlotEnd,
    Concat,
    Power,
    UrlSeparator,
    Equal,
    Less,
    Greater,
    Plus,
    Minus,
    Star,
    Slash,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Number,
    Str,
    Term,
    Concept,
    Identifier,
    Keyword(Keyword),
    SlotText,
    Eof,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Assign => TokenKind::Assign,
            Token::SlashEqual => TokenKind::SlashEqual,
            Token::LessEqual => TokenKind::LessEqual,
            Token::GreaterEqual => TokenKind::GreaterEqual,
            Token::NotEqual => TokenKind::NotEqual,
            Token::SlotEnd => TokenKind::SlotEnd,
            Token::Concat => TokenKind::Concat,
            Token::Power => TokenKind::Power,
            Token::UrlSeparator => TokenKind::UrlSeparator,
            Token::Equal => TokenKind::Equal,
            Token::Less => TokenKind::Less,
            Token::Greater => TokenKind::Greater,
            Token::Plus => TokenKind::Plus,
            Token::Minus => TokenKind::Minus,
            Token::Star => TokenKind::Star,
            Token::Slash => TokenKind::Slash,
            Token::OpenParen => TokenKind::OpenParen,
            Token::CloseParen => TokenKind::CloseParen,
            Token::OpenBracket => TokenKind::OpenBracket,
            Token::CloseBracket => TokenKind::CloseBracket,
            Token::Comma => TokenKind::Comma,
            Token::Semicolon => TokenKind::Semicolon,
            Token::Colon => TokenKind::Colon,
            Token::Dot => TokenKind::Dot,
            Token::Number(_) => TokenKind::Number,
            Token::Str(_) => TokenKind::Str,
            Token::Term(_) => TokenKind::Term,
            Token::Concept(_) => TokenKind::Concept,
            Token::Identifier(_) => TokenKind::Identifier,
            Token::Keyword(keyword) => TokenKind::Keyword(*keyword),
            Token::SlotText(_) => TokenKind::SlotText,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, Token::Keyword(k) if *k == keyword)
    }

    /// Word-like text of the token when it can stand in for an identifier.
    ///
    /// Slot labels are only reserved in front of a colon, so `date` or `type` remain usable
    /// as variable names inside statements.
    pub fn as_identifier(&self) -> Option<String> {
        match self {
            Token::Identifier(name) => Some(name.clone()),
            Token::Keyword(keyword) if keyword.is_slot_label() => {
                Some(keyword.as_str().to_string())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(text) => write!(f, "{}", text),
            Token::Str(text) => write!(f, "\"{}\"", text.replace('"', "\"\"")),
            Token::Term(text) => write!(f, "'{}'", text.replace('\'', "''")),
            Token::Concept(concept) => write!(f, "{}", concept),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Keyword(keyword) => write!(f, "{}", keyword.as_str().to_uppercase()),
            Token::SlotText(text) => write!(f, "{}", text.trim()),
            other => write!(f, "{}", other.kind().to_string().trim_matches('\'')),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Assign => "':='",
            TokenKind::SlashEqual => "'/='",
            TokenKind::LessEqual => "'<='",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::NotEqual => "'<>'",
            TokenKind::SlotEnd => "';;'",
            TokenKind::Concat => "'||'",
            TokenKind::Power => "'**'",
            TokenKind::UrlSeparator => "'://'",
            TokenKind::Equal => "'='",
            TokenKind::Less => "'<'",
            TokenKind::Greater => "'>'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::OpenParen => "'('",
            TokenKind::CloseParen => "')'",
            TokenKind::OpenBracket => "'['",
            TokenKind::CloseBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
            TokenKind::Dot => "'.'",
            TokenKind::Number => "number",
            TokenKind::Str => "string",
            TokenKind::Term => "term",
            TokenKind::Concept => "concept reference",
            TokenKind::Identifier => "identifier",
            TokenKind::Keyword(keyword) => return write!(f, "'{}'", keyword.as_str()),
            TokenKind::SlotText => "slot text",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

macro_rules! keywords {
    ( $( $variant:ident => [ $canonical:literal $(, $alias:literal )* ] ),* $(,)? ) => {
        /// Reserved words. Matching is case-insensitive.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum Keyword {
            $( $variant, )*
        }

        impl Keyword {
            /// Canonical lowercase spelling.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Keyword::$variant => $canonical, )*
                }
            }
        }

        static KEYWORDS: Lazy<HashMap<&'static str, Keyword>> = Lazy::new(|| {
            let mut table = HashMap::new();
            $(
                table.insert($canonical, Keyword::$variant);
                $( table.insert($alias, Keyword::$variant); )*
            )*
            table
        });
    };
}

keywords! {
    // Categories
    Maintenance => ["maintenance"],
    Library => ["library"],
    Knowledge => ["knowledge"],
    End => ["end"],

    // Slot labels
    Title => ["title"],
    MlmName => ["mlmname", "filename"],
    Arden => ["arden"],
    Version => ["version"],
    Institution => ["institution"],
    Author => ["author"],
    Specialist => ["specialist"],
    Date => ["date"],
    Validation => ["validation"],
    Purpose => ["purpose"],
    Explanation => ["explanation"],
    Keywords => ["keywords"],
    Citations => ["citations"],
    Links => ["links"],
    Type => ["type"],
    Data => ["data"],
    Priority => ["priority"],
    Evoke => ["evoke"],
    Logic => ["logic"],
    Action => ["action"],
    Urgency => ["urgency"],
    AgeMin => ["age_min"],
    AgeMax => ["age_max"],

    // Statements
    If => ["if"],
    Then => ["then"],
    ElseIf => ["elseif"],
    Else => ["else"],
    EndIf => ["endif"],
    Conclude => ["conclude"],
    Call => ["call"],
    With => ["with"],
    Write => ["write"],
    At => ["at"],
    Let => ["let"],
    Be => ["be"],

    // Expressions
    And => ["and"],
    Or => ["or"],
    Not => ["not"],
    Is => ["is", "are", "was", "were"],
    In => ["in"],
    True => ["true"],
    False => ["false"],
    Null => ["null"],
    Read => ["read"],
    From => ["from"],
    Of => ["of"],
    Where => ["where"],
    It => ["it", "they"],
    Occur => ["occur", "occurs", "occurred"],
    Within => ["within"],
    The => ["the"],
    Past => ["past"],
    To => ["to"],
    Sort => ["sort"],
    Merge => ["merge"],
    Seqto => ["seqto"],
    Event => ["event"],
    Destination => ["destination"],
    Mlm => ["mlm"],
    Last => ["last"],
    First => ["first"],
    Minimum => ["minimum", "min"],
    Maximum => ["maximum", "max"],
    Average => ["average", "avg"],
    Sum => ["sum"],
    Median => ["median"],
    Count => ["count"],
    Exist => ["exist", "exists"],
    Equals => ["eq", "equal", "equals"],
    LessThan => ["lt", "less"],
    GreaterThan => ["gt", "greater"],
    LessOrEqual => ["le"],
    GreaterOrEqual => ["ge"],
    NotEquals => ["ne"],
    Than => ["than"],
    Time => ["time"],
    Now => ["now", "currenttime"],
    After => ["after"],
    Before => ["before"],
}

impl Keyword {
    /// Labels that open a slot when followed by a colon.
    pub fn is_slot_label(&self) -> bool {
        matches!(
            self,
            Keyword::Title
                | Keyword::MlmName
                | Keyword::Arden
                | Keyword::Version
                | Keyword::Institution
                | Keyword::Author
                | Keyword::Specialist
                | Keyword::Date
                | Keyword::Validation
                | Keyword::Purpose
                | Keyword::Explanation
                | Keyword::Keywords
                | Keyword::Citations
                | Keyword::Links
                | Keyword::Type
                | Keyword::Data
                | Keyword::Priority
                | Keyword::Evoke
                | Keyword::Logic
                | Keyword::Action
                | Keyword::Urgency
                | Keyword::AgeMin
                | Keyword::AgeMax
        )
    }

    /// Slots whose body is captured verbatim by the lexer.
    pub fn is_text_slot_label(&self) -> bool {
        matches!(
            self,
            Keyword::Title
                | Keyword::MlmName
                | Keyword::Arden
                | Keyword::Version
                | Keyword::Institution
                | Keyword::Author
                | Keyword::Specialist
                | Keyword::Date
                | Keyword::Validation
                | Keyword::Purpose
                | Keyword::Explanation
                | Keyword::Keywords
                | Keyword::Citations
                | Keyword::Links
                | Keyword::Type
        )
    }

    pub fn is_category(&self) -> bool {
        matches!(
            self,
            Keyword::Maintenance | Keyword::Library | Keyword::Knowledge
        )
    }

    /// Aggregation modifiers that may prefix a read.
    pub fn is_read_modifier(&self) -> bool {
        matches!(
            self,
            Keyword::Last
                | Keyword::First
                | Keyword::Minimum
                | Keyword::Maximum
                | Keyword::Average
                | Keyword::Sum
                | Keyword::Median
                | Keyword::Count
                | Keyword::Exist
        )
    }
}

/// Case-insensitive keyword lookup.
pub fn keyword_for(word: &str) -> Option<Keyword> {
    KEYWORDS.get(word.to_ascii_lowercase().as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<Token> {
        Token::lexer(source).filter_map(|result| result.ok()).collect()
    }

    #[test]
    fn test_two_character_operators_win() {
        assert_eq!(
            lex_all(":= /= <= >= <> ;; ||"),
            vec![
                Token::Assign,
                Token::SlashEqual,
                Token::LessEqual,
                Token::GreaterEqual,
                Token::NotEqual,
                Token::SlotEnd,
                Token::Concat,
            ]
        );
    }

    #[test]
    fn test_single_character_fallback() {
        assert_eq!(
            lex_all(": = < > ; /"),
            vec![
                Token::Colon,
                Token::Equal,
                Token::Less,
                Token::Greater,
                Token::Semicolon,
                Token::Slash,
            ]
        );
    }

    #[test]
    fn test_comments_produce_no_tokens() {
        assert_eq!(
            lex_all("a // trailing\n/* block\n comment */ b"),
            vec![
                Token::Identifier("a".to_string()),
                Token::Identifier("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_url_separator_is_not_a_comment() {
        assert_eq!(
            lex_all("http://host"),
            vec![
                Token::Identifier("http".to_string()),
                Token::UrlSeparator,
                Token::Identifier("host".to_string()),
            ]
        );
    }

    #[test]
    fn test_doubled_delimiters_escape() {
        assert_eq!(
            lex_all(r#""say ""hi""" 'O''Brien'"#),
            vec![
                Token::Str("say \"hi\"".to_string()),
                Token::Term("O'Brien".to_string()),
            ]
        );
    }

    #[test]
    fn test_concept_with_datasource() {
        assert_eq!(
            lex_all("{gender from person} {CD4 Count}"),
            vec![
                Token::Concept(ConceptRef::new("gender").with_datasource("person")),
                Token::Concept(ConceptRef::new("CD4 Count")),
            ]
        );
    }

    #[test]
    fn test_concept_is_non_greedy() {
        assert_eq!(
            lex_all("{a} {b}"),
            vec![
                Token::Concept(ConceptRef::new("a")),
                Token::Concept(ConceptRef::new("b")),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            lex_all("5 2.5 .75"),
            vec![
                Token::Number("5".to_string()),
                Token::Number("2.5".to_string()),
                Token::Number(".75".to_string()),
            ]
        );
    }

    #[test]
    fn test_keyword_table_is_case_insensitive() {
        assert_eq!(keyword_for("IF"), Some(Keyword::If));
        assert_eq!(keyword_for("EndIf"), Some(Keyword::EndIf));
        assert_eq!(keyword_for("occurred"), Some(Keyword::Occur));
        assert_eq!(keyword_for("Filename"), Some(Keyword::MlmName));
        assert_eq!(keyword_for("patient"), None);
    }

    #[test]
    fn test_slot_labels_act_as_identifiers() {
        let token = Token::Keyword(Keyword::Date);
        assert_eq!(token.as_identifier(), Some("date".to_string()));
        assert_eq!(Token::Keyword(Keyword::If).as_identifier(), None);
    }
}
