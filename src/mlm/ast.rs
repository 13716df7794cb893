//! Abstract syntax tree for medical logic modules
//!
//!     The tree mirrors the category grammar of an MLM:
//!
//!         Mlm
//!         ├── maintenance   title, mlmname, arden, version, institution, author,
//!         │                 specialist, date, validation
//!         ├── library       purpose, explanation, keywords, citations, links
//!         └── knowledge     type, data, priority, evoke, logic, action, urgency,
//!                           age_min, age_max
//!
//!     Each category is an ordered list of [`Slot`]s. Free-text slots keep their raw text,
//!     structured slots hold their parsed value, and the data/logic/action slots hold
//!     [`Statement`]s. A slot that failed to parse is absent; the diagnostic explains why.
//!
//!     The tree is built once per parse and consumed by the model builder.

pub mod expr;
pub mod range;
pub mod statement;

pub use expr::{
    BinaryOp, CallExpr, CompareOp, Expr, ExprKind, ReadModifier, TemporalRelation, UnaryOp,
};
pub use range::{Position, SourceLocation, Span};
pub use statement::{ConditionalBranch, IfChain, Statement, StatementKind};

use crate::mlm::token::Keyword;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CategoryKind {
    Maintenance,
    Library,
    Knowledge,
}

impl CategoryKind {
    pub fn from_keyword(keyword: Keyword) -> Option<Self> {
        match keyword {
            Keyword::Maintenance => Some(CategoryKind::Maintenance),
            Keyword::Library => Some(CategoryKind::Library),
            Keyword::Knowledge => Some(CategoryKind::Knowledge),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategoryKind::Maintenance => "maintenance",
            CategoryKind::Library => "library",
            CategoryKind::Knowledge => "knowledge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SlotKind {
    Title,
    MlmName,
    Arden,
    Version,
    Institution,
    Author,
    Specialist,
    Date,
    Validation,
    Purpose,
    Explanation,
    Keywords,
    Citations,
    Links,
    Type,
    Data,
    Priority,
    Evoke,
    Logic,
    Action,
    Urgency,
    AgeMin,
    AgeMax,
}

impl SlotKind {
    pub fn from_keyword(keyword: Keyword) -> Option<Self> {
        let kind = match keyword {
            Keyword::Title => SlotKind::Title,
            Keyword::MlmName => SlotKind::MlmName,
            Keyword::Arden => SlotKind::Arden,
            Keyword::Version => SlotKind::Version,
            Keyword::Institution => SlotKind::Institution,
            Keyword::Author => SlotKind::Author,
            Keyword::Specialist => SlotKind::Specialist,
            Keyword::Date => SlotKind::Date,
            Keyword::Validation => SlotKind::Validation,
            Keyword::Purpose => SlotKind::Purpose,
            Keyword::Explanation => SlotKind::Explanation,
            Keyword::Keywords => SlotKind::Keywords,
            Keyword::Citations => SlotKind::Citations,
            Keyword::Links => SlotKind::Links,
            Keyword::Type => SlotKind::Type,
            Keyword::Data => SlotKind::Data,
            Keyword::Priority => SlotKind::Priority,
            Keyword::Evoke => SlotKind::Evoke,
            Keyword::Logic => SlotKind::Logic,
            Keyword::Action => SlotKind::Action,
            Keyword::Urgency => SlotKind::Urgency,
            Keyword::AgeMin => SlotKind::AgeMin,
            Keyword::AgeMax => SlotKind::AgeMax,
            _ => return None,
        };
        Some(kind)
    }

    /// The category a slot belongs to in a well-formed MLM.
    pub fn category(&self) -> CategoryKind {
        match self {
            SlotKind::Title
            | SlotKind::MlmName
            | SlotKind::Arden
            | SlotKind::Version
            | SlotKind::Institution
            | SlotKind::Author
            | SlotKind::Specialist
            | SlotKind::Date
            | SlotKind::Validation => CategoryKind::Maintenance,
            SlotKind::Purpose
            | SlotKind::Explanation
            | SlotKind::Keywords
            | SlotKind::Citations
            | SlotKind::Links => CategoryKind::Library,
            _ => CategoryKind::Knowledge,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SlotKind::Title => "title",
            SlotKind::MlmName => "mlmname",
            SlotKind::Arden => "arden",
            SlotKind::Version => "version",
            SlotKind::Institution => "institution",
            SlotKind::Author => "author",
            SlotKind::Specialist => "specialist",
            SlotKind::Date => "date",
            SlotKind::Validation => "validation",
            SlotKind::Purpose => "purpose",
            SlotKind::Explanation => "explanation",
            SlotKind::Keywords => "keywords",
            SlotKind::Citations => "citations",
            SlotKind::Links => "links",
            SlotKind::Type => "type",
            SlotKind::Data => "data",
            SlotKind::Priority => "priority",
            SlotKind::Evoke => "evoke",
            SlotKind::Logic => "logic",
            SlotKind::Action => "action",
            SlotKind::Urgency => "urgency",
            SlotKind::AgeMin => "age_min",
            SlotKind::AgeMax => "age_max",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub kind: SlotKind,
    pub body: SlotBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SlotBody {
    Text(String),
    Version(VersionNumber),
    Date(MlmDate),
    Validation(ValidationCode),
    Priority(f64),
    Urgency(Expr),
    Evoke(Vec<Expr>),
    Age(AgeBound),
    Block(Vec<Statement>),
}

/// `major.minor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionNumber {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// `year-month-day` with optional time of day and zone offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MlmDate {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    /// Offset from UTC in minutes
    pub offset_minutes: Option<i32>,
}

impl fmt::Display for MlmDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        if let Some(time) = self.time {
            write!(f, "T{}", time.format("%H:%M:%S"))?;
        }
        match self.offset_minutes {
            Some(0) => write!(f, "Z"),
            Some(minutes) => {
                let sign = if minutes < 0 { '-' } else { '+' };
                let minutes = minutes.abs();
                write!(f, "{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
            }
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationCode {
    Production,
    Research,
    Testing,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBound {
    pub amount: f64,
    pub unit: String,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Category {
    /// Span of the `maintenance:`-style header, absent when the slots appeared bare
    pub header: Option<Span>,
    pub slots: Vec<Slot>,
}

/// One parsed medical logic module.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Mlm {
    pub maintenance: Category,
    pub library: Category,
    pub knowledge: Category,
}

impl Mlm {
    pub fn category(&self, kind: CategoryKind) -> &Category {
        match kind {
            CategoryKind::Maintenance => &self.maintenance,
            CategoryKind::Library => &self.library,
            CategoryKind::Knowledge => &self.knowledge,
        }
    }

    pub fn category_mut(&mut self, kind: CategoryKind) -> &mut Category {
        match kind {
            CategoryKind::Maintenance => &mut self.maintenance,
            CategoryKind::Library => &mut self.library,
            CategoryKind::Knowledge => &mut self.knowledge,
        }
    }

    /// All slots in category order, then source order.
    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.maintenance
            .slots
            .iter()
            .chain(self.library.slots.iter())
            .chain(self.knowledge.slots.iter())
    }

    pub fn slot(&self, kind: SlotKind) -> Option<&Slot> {
        self.category(kind.category())
            .slots
            .iter()
            .find(|slot| slot.kind == kind)
    }

    pub fn text(&self, kind: SlotKind) -> Option<&str> {
        match self.slot(kind).map(|slot| &slot.body) {
            Some(SlotBody::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn block(&self, kind: SlotKind) -> Option<&[Statement]> {
        match self.slot(kind).map(|slot| &slot.body) {
            Some(SlotBody::Block(statements)) => Some(statements.as_slice()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_categories() {
        assert_eq!(SlotKind::Title.category(), CategoryKind::Maintenance);
        assert_eq!(SlotKind::Links.category(), CategoryKind::Library);
        assert_eq!(SlotKind::Logic.category(), CategoryKind::Knowledge);
        assert_eq!(SlotKind::AgeMax.category(), CategoryKind::Knowledge);
    }

    #[test]
    fn test_date_display() {
        let date = MlmDate {
            date: NaiveDate::from_ymd_opt(2008, 3, 6).unwrap(),
            time: NaiveTime::from_hms_opt(14, 5, 0),
            offset_minutes: Some(-300),
        };
        assert_eq!(date.to_string(), "2008-03-06T14:05:00-05:00");
    }

    #[test]
    fn test_slot_lookup() {
        let mut mlm = Mlm::default();
        mlm.maintenance.slots.push(Slot {
            kind: SlotKind::Title,
            body: SlotBody::Text("Dosing".to_string()),
            span: 0..5,
        });
        assert_eq!(mlm.text(SlotKind::Title), Some("Dosing"));
        assert!(mlm.block(SlotKind::Logic).is_none());
    }
}
