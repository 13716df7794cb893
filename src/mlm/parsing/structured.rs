//! Sub-grammars for structured slot text
//!
//!     The lexer hands the bodies of `version:`, `arden:`, `date:` and `validation:` over as
//!     raw text. These small character-level grammars turn that text into typed values:
//!
//!         version     1.00
//!         arden       Version 2.5   (the word is optional)
//!         date        2008-03-06, 2008-03-06T14:05, 2008-03-06 14:05:30.5Z,
//!                     2008-03-06T14:05:00-05:00
//!         validation  production | research | testing | expired
//!
//!     Errors are returned as messages; the parser attaches the slot span.

use crate::mlm::ast::{MlmDate, ValidationCode, VersionNumber};
use chrono::{NaiveDate, NaiveTime};
use chumsky::prelude::*;
use chumsky::primitive::filter;

type GrammarError = Simple<char>;

fn digit() -> impl Parser<char, char, Error = GrammarError> + Clone {
    filter(|c: &char| c.is_ascii_digit())
}

/// An unsigned integer of any length. Leading zeros are allowed.
fn integer() -> impl Parser<char, u32, Error = GrammarError> + Clone {
    digit()
        .repeated()
        .at_least(1)
        .collect::<String>()
        .try_map(|text, span| {
            text.parse::<u32>()
                .map_err(|e| Simple::custom(span, e.to_string()))
        })
}

/// Exactly `count` digits.
fn fixed(count: usize) -> impl Parser<char, u32, Error = GrammarError> + Clone {
    digit()
        .repeated()
        .exactly(count)
        .collect::<String>()
        .try_map(|text, span| {
            text.parse::<u32>()
                .map_err(|e| Simple::custom(span, e.to_string()))
        })
}

fn version_number() -> impl Parser<char, VersionNumber, Error = GrammarError> + Clone {
    integer()
        .then(just('.').ignore_then(integer()).or_not())
        .map(|(major, minor)| VersionNumber {
            major,
            minor: minor.unwrap_or(0),
        })
}

fn version() -> impl Parser<char, VersionNumber, Error = GrammarError> {
    version_number().padded().then_ignore(end())
}

fn arden_version() -> impl Parser<char, VersionNumber, Error = GrammarError> {
    let word = filter(|c: &char| c.is_ascii_alphabetic())
        .repeated()
        .at_least(1)
        .collect::<String>()
        .try_map(|word, span| {
            if word.eq_ignore_ascii_case("version") {
                Ok(())
            } else {
                Err(Simple::custom(span, format!("expected 'version', found '{}'", word)))
            }
        });
    word.padded()
        .or_not()
        .ignore_then(version_number())
        .padded()
        .then_ignore(end())
}

fn calendar_date() -> impl Parser<char, NaiveDate, Error = GrammarError> + Clone {
    fixed(4)
        .then_ignore(just('-'))
        .then(fixed(2))
        .then_ignore(just('-'))
        .then(fixed(2))
        .try_map(|((year, month), day), span| {
            NaiveDate::from_ymd_opt(year as i32, month, day)
                .ok_or_else(|| Simple::custom(span, "invalid calendar date"))
        })
}

fn time_of_day() -> impl Parser<char, NaiveTime, Error = GrammarError> + Clone {
    let fraction = just('.').ignore_then(digit().repeated().at_least(1).collect::<String>());
    let seconds = just(':').ignore_then(fixed(2)).then(fraction.or_not());

    fixed(2)
        .then_ignore(just(':'))
        .then(fixed(2))
        .then(seconds.or_not())
        .try_map(|((hour, minute), seconds), span| {
            let (second, fraction) = seconds.unwrap_or((0, None));
            let nanos = fraction.map_or(0, |digits| {
                let mut digits: String = digits.chars().take(9).collect();
                while digits.len() < 9 {
                    digits.push('0');
                }
                digits.parse::<u32>().unwrap_or(0)
            });
            NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
                .ok_or_else(|| Simple::custom(span, "invalid time of day"))
        })
}

/// `Z` or `+hh:mm` / `-hh:mm`, in minutes east of UTC.
fn zone_offset() -> impl Parser<char, i32, Error = GrammarError> + Clone {
    let utc = one_of("Zz").to(0);
    let offset = one_of("+-")
        .then(fixed(2))
        .then_ignore(just(':'))
        .then(fixed(2))
        .try_map(|((sign, hours), minutes), span| {
            if hours > 23 || minutes > 59 {
                return Err(Simple::custom(span, "invalid zone offset"));
            }
            let total = (hours * 60 + minutes) as i32;
            Ok(if sign == '-' { -total } else { total })
        });
    utc.or(offset)
}

fn date() -> impl Parser<char, MlmDate, Error = GrammarError> {
    let separator = one_of("Tt")
        .ignored()
        .or(filter(|c: &char| *c == ' ' || *c == '\t')
            .repeated()
            .at_least(1)
            .ignored());

    calendar_date()
        .then(
            separator
                .ignore_then(time_of_day())
                .then(zone_offset().or_not())
                .or_not(),
        )
        .padded()
        .then_ignore(end())
        .map(|(date, time)| MlmDate {
            date,
            time: time.map(|(time, _)| time),
            offset_minutes: time.and_then(|(_, offset)| offset),
        })
}

fn describe(text: &str, errors: Vec<GrammarError>) -> String {
    match errors.into_iter().next() {
        Some(error) => match error.reason() {
            chumsky::error::SimpleReason::Custom(message) => {
                format!("{} in '{}'", message, text.trim())
            }
            _ => format!("unexpected input at offset {} in '{}'", error.span().start, text.trim()),
        },
        None => format!("malformed value '{}'", text.trim()),
    }
}

pub fn parse_version(text: &str) -> Result<VersionNumber, String> {
    version()
        .parse(text)
        .map_err(|errors| format!("version: {}", describe(text, errors)))
}

pub fn parse_arden_version(text: &str) -> Result<VersionNumber, String> {
    arden_version()
        .parse(text)
        .map_err(|errors| format!("arden version: {}", describe(text, errors)))
}

pub fn parse_date(text: &str) -> Result<MlmDate, String> {
    date()
        .parse(text)
        .map_err(|errors| format!("date: {}", describe(text, errors)))
}

pub fn parse_validation(text: &str) -> Result<ValidationCode, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "production" => Ok(ValidationCode::Production),
        "research" => Ok(ValidationCode::Research),
        "testing" => Ok(ValidationCode::Testing),
        "expired" => Ok(ValidationCode::Expired),
        other => Err(format!(
            "validation: expected production, research, testing or expired, found '{}'",
            other
        )),
    }
}
