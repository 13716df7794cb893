//! Value records shared by the builder and the generator.

use crate::mlm::ast::range::Span;
use crate::mlm::ast::{BinaryOp, ReadModifier};
use serde::Serialize;
use std::fmt;

/// Aggregation or selection applied when a concept is retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadType {
    #[default]
    Last,
    First,
    Min,
    Max,
    Avg,
    Sum,
    Median,
    Count,
    Exist,
}

impl From<ReadModifier> for ReadType {
    fn from(modifier: ReadModifier) -> Self {
        match modifier {
            ReadModifier::Last => ReadType::Last,
            ReadModifier::First => ReadType::First,
            ReadModifier::Minimum => ReadType::Min,
            ReadModifier::Maximum => ReadType::Max,
            ReadModifier::Average => ReadType::Avg,
            ReadModifier::Sum => ReadType::Sum,
            ReadModifier::Median => ReadType::Median,
            ReadModifier::Count => ReadType::Count,
            ReadModifier::Exist => ReadType::Exist,
        }
    }
}

impl ReadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadType::Last => "last",
            ReadType::First => "first",
            ReadType::Min => "min",
            ReadType::Max => "max",
            ReadType::Avg => "avg",
            ReadType::Sum => "sum",
            ReadType::Median => "median",
            ReadType::Count => "count",
            ReadType::Exist => "exist",
        }
    }
}

impl fmt::Display for ReadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Days,
    Months,
    Years,
}

impl DurationUnit {
    /// Case-insensitive prefix match: `Day`, `days` → days, `YEARS` → years.
    pub fn from_word(word: &str) -> Option<Self> {
        let word = word.to_ascii_lowercase();
        if word.starts_with("day") {
            Some(DurationUnit::Days)
        } else if word.starts_with("month") {
            Some(DurationUnit::Months)
        } else if word.starts_with("year") {
            Some(DurationUnit::Years)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Days => "days",
            DurationUnit::Months => "months",
            DurationUnit::Years => "years",
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LookbackKind {
    Past,
}

/// A bounded lookback window: `within the past 6 months`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lookback {
    pub kind: LookbackKind,
    pub value: f64,
    pub unit: DurationUnit,
}

impl Lookback {
    pub fn past(value: f64, unit: DurationUnit) -> Self {
        Self {
            kind: LookbackKind::Past,
            value,
            unit,
        }
    }
}

/// One retrieval of a concept, bound to a variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadDescriptor {
    pub concept: String,
    pub variable: String,
    pub read_type: ReadType,
    pub how_many: u32,
    pub duration: Option<Lookback>,
    pub datasource: Option<String>,
    pub span: Span,
}

impl ReadDescriptor {
    pub fn new(concept: impl Into<String>, variable: impl Into<String>, span: Span) -> Self {
        Self {
            concept: concept.into(),
            variable: variable.into(),
            read_type: ReadType::Last,
            how_many: 1,
            duration: None,
            datasource: None,
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Text(text) => write!(f, "{:?}", text),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

/// A value expression the generator knows how to evaluate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operand {
    Literal(Literal),
    Variable(String),
    List(Vec<Operand>),
    Binary {
        op: BinaryOp,
        lhs: Box<Operand>,
        rhs: Box<Operand>,
    },
    Negate(Box<Operand>),
    /// `count X`, `time of X` applied to a value rather than a read
    Function { name: String, operand: Box<Operand> },
    Duration { amount: Box<Operand>, unit: String },
    Now,
    /// Source text of an expression with no evaluable form
    Unsupported(String),
}

/// Relational operator codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    #[serde(rename = "EQUALS")]
    Equals,
    #[serde(rename = "NE")]
    NotEquals,
    #[serde(rename = "LT")]
    LessThan,
    #[serde(rename = "LTE")]
    LessOrEqual,
    #[serde(rename = "GT")]
    GreaterThan,
    #[serde(rename = "GTE")]
    GreaterOrEqual,
    #[serde(rename = "IN")]
    In,
    /// Bare variable, `exist X`, `X is not null`
    #[serde(rename = "EXISTS")]
    Exists,
    #[serde(rename = "IS_NULL")]
    IsNull,
}

impl Operator {
    pub fn code(&self) -> &'static str {
        match self {
            Operator::Equals => "EQUALS",
            Operator::NotEquals => "NE",
            Operator::LessThan => "LT",
            Operator::LessOrEqual => "LTE",
            Operator::GreaterThan => "GT",
            Operator::GreaterOrEqual => "GTE",
            Operator::In => "IN",
            Operator::Exists => "EXISTS",
            Operator::IsNull => "IS_NULL",
        }
    }

    /// The operator that gives the same result with the operands swapped.
    pub fn mirrored(&self) -> Option<Operator> {
        match self {
            Operator::Equals => Some(Operator::Equals),
            Operator::NotEquals => Some(Operator::NotEquals),
            Operator::LessThan => Some(Operator::GreaterThan),
            Operator::LessOrEqual => Some(Operator::GreaterOrEqual),
            Operator::GreaterThan => Some(Operator::LessThan),
            Operator::GreaterOrEqual => Some(Operator::LessOrEqual),
            Operator::In | Operator::Exists | Operator::IsNull => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Answer {
    None,
    Single(Operand),
    List(Vec<Operand>),
}

/// One relational test on a variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Unique key: the variable name, suffixed `#n` from its second comparison on
    pub key: String,
    pub variable: String,
    pub operator: Operator,
    pub answer: Answer,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CallParam {
    Literal(Literal),
    Variable(String),
    /// `||name||`
    ResultRef(String),
    Expression(Operand),
}

/// `[R :=] call target [with params]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRecord {
    pub result: Option<String>,
    pub target: String,
    /// Module name when `target` was bound with `mlm 'name'`
    pub module: Option<String>,
    pub params: Vec<CallParam>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    Literal(bool),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conclusion {
    pub outcome: Outcome,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub variable: String,
    /// Exact source text of the assigned expression
    pub text: String,
    pub value: Operand,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Fragment {
    Literal(String),
    Variable(String),
}

/// Interpolation template of one `write` statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionTemplate {
    pub fragments: Vec<Fragment>,
    pub destination: Option<String>,
    pub span: Span,
}

impl ActionTemplate {
    /// Append a fragment, merging adjacent literals.
    pub fn push(&mut self, fragment: Fragment) {
        if let Fragment::Literal(text) = &fragment {
            if text.is_empty() {
                return;
            }
            if let Some(Fragment::Literal(previous)) = self.fragments.last_mut() {
                previous.push_str(text);
                return;
            }
        }
        self.fragments.push(fragment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("days", Some(DurationUnit::Days))]
    #[case("Day", Some(DurationUnit::Days))]
    #[case("MONTHS", Some(DurationUnit::Months))]
    #[case("month", Some(DurationUnit::Months))]
    #[case("years", Some(DurationUnit::Years))]
    #[case("Yearly", Some(DurationUnit::Years))]
    #[case("weeks", None)]
    #[case("hours", None)]
    fn test_unit_prefix_matching(#[case] word: &str, #[case] expected: Option<DurationUnit>) {
        assert_eq!(DurationUnit::from_word(word), expected);
    }

    #[test]
    fn test_template_merges_literals() {
        let mut template = ActionTemplate {
            fragments: Vec::new(),
            destination: None,
            span: 0..0,
        };
        template.push(Fragment::Literal("a".to_string()));
        template.push(Fragment::Literal("b".to_string()));
        template.push(Fragment::Variable("X".to_string()));
        template.push(Fragment::Literal(String::new()));
        assert_eq!(
            template.fragments,
            vec![
                Fragment::Literal("ab".to_string()),
                Fragment::Variable("X".to_string())
            ]
        );
    }

    #[test]
    fn test_operator_mirroring() {
        assert_eq!(Operator::LessThan.mirrored(), Some(Operator::GreaterThan));
        assert_eq!(Operator::In.mirrored(), None);
    }
}
