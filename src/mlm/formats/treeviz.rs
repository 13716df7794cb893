//! Tree visualization of a parsed MLM
//!
//!     One line per node, nesting shown by indentation, node type shown by its icon:
//!
//!         ⧉ mlm
//!         § knowledge
//!           ≔ data
//!             ← X := {X_concept}
//!           ≔ logic
//!             ⑂ if X > 5
//!               ⊨ conclude true
//!             ⑂ else
//!               ⊨ conclude false
//!
//!     Statement and expression text is taken from the source, with whitespace collapsed
//!     and long lines truncated.

use crate::mlm::ast::range::Span;
use crate::mlm::ast::{CategoryKind, Mlm, Slot, SlotBody, Statement, StatementKind, ValidationCode};

const MAX_TEXT: usize = 60;

fn icon(node_type: &str) -> &'static str {
    match node_type {
        "Mlm" => "⧉",
        "Category" => "§",
        "Slot" => "≔",
        "Assign" => "←",
        "If" => "⑂",
        "Conclude" => "⊨",
        "Call" => "↗",
        "Write" => "✎",
        _ => "○",
    }
}

/// Truncate text to max length
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let mut truncated = s.chars().take(max_chars).collect::<String>();
        truncated.push_str("...");
        truncated
    } else {
        s.to_string()
    }
}

struct Outline<'a> {
    source: &'a str,
    lines: Vec<String>,
}

impl<'a> Outline<'a> {
    fn push(&mut self, depth: usize, node_type: &str, label: &str) {
        self.lines
            .push(format!("{}{} {}", "  ".repeat(depth), icon(node_type), label));
    }

    /// Whitespace-collapsed, truncated source text of a span.
    fn text(&self, span: &Span) -> String {
        let raw = self.source.get(span.clone()).unwrap_or_default();
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        truncate(&collapsed, MAX_TEXT)
    }

    fn slot(&mut self, depth: usize, slot: &Slot) {
        let label = slot.kind.label();
        let summary = match &slot.body {
            SlotBody::Text(text) => truncate(
                &text.split_whitespace().collect::<Vec<_>>().join(" "),
                MAX_TEXT,
            ),
            SlotBody::Version(version) => version.to_string(),
            SlotBody::Date(date) => date.to_string(),
            SlotBody::Validation(code) => match code {
                ValidationCode::Production => "production",
                ValidationCode::Research => "research",
                ValidationCode::Testing => "testing",
                ValidationCode::Expired => "expired",
            }
            .to_string(),
            SlotBody::Priority(priority) => priority.to_string(),
            SlotBody::Urgency(expr) => self.text(&expr.span),
            SlotBody::Evoke(triggers) => triggers
                .iter()
                .map(|trigger| self.text(&trigger.span))
                .collect::<Vec<_>>()
                .join("; "),
            SlotBody::Age(bound) => format!("{} {}", bound.amount, bound.unit),
            SlotBody::Block(statements) => {
                self.push(depth, "Slot", label);
                self.statements(depth + 1, statements);
                return;
            }
        };
        self.push(depth, "Slot", &format!("{}: {}", label, summary));
    }

    fn statements(&mut self, depth: usize, statements: &[Statement]) {
        for statement in statements {
            match &statement.kind {
                StatementKind::If(chain) => {
                    for (index, branch) in chain.branches.iter().enumerate() {
                        let keyword = if index == 0 { "if" } else { "elseif" };
                        let label = format!("{} {}", keyword, self.text(&branch.condition.span));
                        self.push(depth, "If", &label);
                        self.statements(depth + 1, &branch.body);
                    }
                    if let Some(otherwise) = &chain.otherwise {
                        self.push(depth, "If", "else");
                        self.statements(depth + 1, otherwise);
                    }
                }
                _ => {
                    let label = self.text(&statement.span);
                    self.push(depth, statement.node_type(), &label);
                }
            }
        }
    }
}

pub fn to_treeviz(mlm: &Mlm, source: &str) -> String {
    let mut outline = Outline {
        source,
        lines: Vec::new(),
    };
    outline.push(0, "Mlm", "mlm");
    for kind in [
        CategoryKind::Maintenance,
        CategoryKind::Library,
        CategoryKind::Knowledge,
    ] {
        let category = mlm.category(kind);
        if category.slots.is_empty() {
            continue;
        }
        outline.push(0, "Category", kind.label());
        for slot in category.slots.iter() {
            outline.slot(1, slot);
        }
    }
    outline.lines.join("\n")
}
