//! Metadata extraction from the maintenance, library and scalar knowledge slots.

use super::model::AgeLimit;
use super::records::DurationUnit;
use super::Builder;
use crate::mlm::ast::{AgeBound, Mlm, SlotBody, SlotKind};
use crate::mlm::diagnostics::codes;

impl Builder<'_> {
    pub(super) fn build_metadata(&mut self, mlm: &Mlm) {
        for slot in mlm.slots() {
            // First occurrence wins, like the parser's duplicate handling
            if mlm.slot(slot.kind).map(|first| first.span != slot.span) == Some(true) {
                continue;
            }
            let text = match &slot.body {
                SlotBody::Text(text) => Some(text.clone()),
                _ => None,
            };
            let metadata = &mut self.model.metadata;
            match (&slot.kind, &slot.body) {
                (SlotKind::Title, _) => metadata.title = text,
                (SlotKind::MlmName, _) => metadata.mlmname = text,
                (SlotKind::Institution, _) => metadata.institution = text,
                (SlotKind::Author, _) => metadata.author = text,
                (SlotKind::Specialist, _) => metadata.specialist = text,
                (SlotKind::Purpose, _) => metadata.purpose = text,
                (SlotKind::Explanation, _) => metadata.explanation = text,
                (SlotKind::Citations, _) => metadata.citations = text,
                (SlotKind::Links, _) => metadata.links = text,
                (SlotKind::Type, _) => metadata.mlm_type = text,
                (SlotKind::Keywords, SlotBody::Text(text)) => {
                    metadata.keywords = split_keywords(text);
                }
                (SlotKind::Arden, SlotBody::Version(version)) => metadata.arden = Some(*version),
                (SlotKind::Version, SlotBody::Version(version)) => {
                    metadata.version = Some(*version)
                }
                (SlotKind::Date, SlotBody::Date(date)) => metadata.date = Some(date.clone()),
                (SlotKind::Validation, SlotBody::Validation(code)) => {
                    metadata.validation = Some(*code)
                }
                (SlotKind::Priority, SlotBody::Priority(priority)) => {
                    metadata.priority = Some(*priority)
                }
                (SlotKind::Urgency, SlotBody::Urgency(expr)) => {
                    let operand = self.operand(expr);
                    self.model.metadata.urgency = Some(operand);
                }
                (SlotKind::Evoke, SlotBody::Evoke(triggers)) => {
                    let evoke = triggers.iter().map(|t| self.text(&t.span)).collect();
                    self.model.metadata.evoke = evoke;
                }
                (SlotKind::AgeMin, SlotBody::Age(bound)) => {
                    self.model.metadata.age_min = self.age_limit(bound);
                }
                (SlotKind::AgeMax, SlotBody::Age(bound)) => {
                    self.model.metadata.age_max = self.age_limit(bound);
                }
                _ => {}
            }
        }
    }

    fn age_limit(&mut self, bound: &AgeBound) -> Option<AgeLimit> {
        match DurationUnit::from_word(&bound.unit) {
            Some(unit) => Some(AgeLimit {
                amount: bound.amount,
                unit,
            }),
            None => {
                self.warn(
                    codes::UNKNOWN_DURATION_UNIT,
                    format!("unknown age unit '{}', expected days, months or years", bound.unit),
                    bound.span.clone(),
                );
                None
            }
        }
    }
}

/// `a; b, c` → `[a, b, c]`
fn split_keywords(text: &str) -> Vec<String> {
    text.split([';', ','])
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::mlm::ast::VersionNumber;
    use crate::mlm::building::{build, DurationUnit};
    use crate::mlm::diagnostics::codes;
    use crate::mlm::parsing::parse;

    #[test]
    fn test_metadata_from_all_categories() {
        let source = "maintenance: title: Potassium;; mlmname: k_check;; arden: Version 2.5;; \
                      version: 1.02;; date: 2008-03-06;; validation: testing;; \
                      library: keywords: potassium; renal, dosing;; \
                      knowledge: type: data_driven;; priority: 60;; urgency: 50;; \
                      age_min: 18 years;; age_max: 70 weeks;; end:";
        let parsed = parse(source).unwrap();
        let out = build(&parsed.mlm, source);
        let metadata = &out.model.metadata;
        assert_eq!(metadata.title.as_deref(), Some("Potassium"));
        assert_eq!(out.model.name(), "k_check");
        assert_eq!(metadata.arden, Some(VersionNumber { major: 2, minor: 5 }));
        assert_eq!(metadata.version, Some(VersionNumber { major: 1, minor: 2 }));
        assert_eq!(metadata.keywords, vec!["potassium", "renal", "dosing"]);
        assert_eq!(metadata.priority, Some(60.0));
        assert_eq!(
            metadata.age_min.as_ref().map(|age| age.unit),
            Some(DurationUnit::Years)
        );
        assert!(metadata.age_max.is_none());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].code, codes::UNKNOWN_DURATION_UNIT);
    }
}
