//! Code generation
//!
//!     Rebuilds structured control flow from the flat evaluate elements of a rule model.
//!     Two explicit stacks drive the reconstruction:
//!
//!         groups    connectives of the condition being read, each waiting for its
//!                   operands (AND and OR take two, NOT takes one)
//!         blocks    the chains and branch bodies currently open
//!
//!     Token handling per element:
//!
//!         IF        open a chain, start a condition
//!         THEN      finish the condition, open a branch body
//!         ELSEIF    close the open body, start a condition
//!         ELSE      close the open body, open an unconditional body
//!         ENDIF     close the open body, close the chain
//!         CONCLUDE  emit the conclusion, close the enclosing body
//!         READ, CALL, ASSIGN, WRITE
//!                   emit the next record of that kind
//!
//!     Records are consumed in order: reads, assignments, conclusions and actions from
//!     the model-wide lists, calls from the section's own list. Every list must be used
//!     up exactly; leftovers and shortfalls are reported, as is any element whose tokens
//!     do not nest.
//!
//! Output
//!
//!     A [`Procedure`] of [`Stmt`] trees, one body per section, plus [`BlockStats`]. The
//!     renderers in [`render`] turn it into target source.

pub mod ir;
pub mod render;

pub use ir::{always_concludes, BlockStats, Branch, Condition, Procedure, SectionCode, Stmt};
pub use render::{render_rust, RenderOptions};

use crate::mlm::ast::range::Span;
use crate::mlm::building::{ElementToken, EvaluateElement, RuleModel, Section, SectionModel};
use crate::mlm::diagnostics::{codes, Diagnostic, Stage};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub procedure: Procedure,
    pub diagnostics: Vec<Diagnostic>,
}

/// Generate the procedure of a rule model.
pub fn generate(model: &RuleModel) -> GenerateOutput {
    Generator::new(model).generate()
}

#[derive(Debug, Clone, Copy)]
enum Connective {
    And,
    Or,
    Not,
}

impl Connective {
    fn arity(&self) -> usize {
        match self {
            Connective::And | Connective::Or => 2,
            Connective::Not => 1,
        }
    }

    fn combine(&self, mut operands: Vec<Condition>) -> Condition {
        let first = Box::new(operands.remove(0));
        match self {
            Connective::Not => Condition::Not(first),
            Connective::And => Condition::And(first, Box::new(operands.remove(0))),
            Connective::Or => Condition::Or(first, Box::new(operands.remove(0))),
        }
    }
}

struct Group {
    connective: Connective,
    operands: Vec<Condition>,
}

/// A condition being read in prefix order.
#[derive(Default)]
struct ConditionFrame {
    groups: Vec<Group>,
    result: Option<Condition>,
    /// Operands beyond a complete condition
    overflow: bool,
}

impl ConditionFrame {
    fn open(&mut self, connective: Connective) {
        self.groups.push(Group {
            connective,
            operands: Vec::with_capacity(connective.arity()),
        });
    }

    fn push(&mut self, mut condition: Condition) {
        loop {
            let Some(group) = self.groups.last_mut() else {
                if self.result.is_some() {
                    self.overflow = true;
                } else {
                    self.result = Some(condition);
                }
                return;
            };
            group.operands.push(condition);
            if group.operands.len() < group.connective.arity() {
                return;
            }
            let Some(group) = self.groups.pop() else {
                return;
            };
            condition = group.connective.combine(group.operands);
        }
    }

    /// The finished condition, or `None` when operands are missing or left over.
    fn finish(self) -> Option<Condition> {
        if !self.groups.is_empty() || self.overflow {
            return None;
        }
        self.result
    }
}

enum Block {
    Root(Vec<Stmt>),
    Chain {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Stmt>>,
    },
    Then {
        condition: Condition,
        body: Vec<Stmt>,
    },
    Else(Vec<Stmt>),
}

#[derive(Default)]
struct Cursors {
    reads: usize,
    assignments: usize,
    conclusions: usize,
    actions: usize,
    calls: usize,
}

pub struct Generator<'model> {
    model: &'model RuleModel,
    diagnostics: Vec<Diagnostic>,
    cursors: Cursors,
    stats: BlockStats,
}

impl<'model> Generator<'model> {
    pub fn new(model: &'model RuleModel) -> Self {
        Self {
            model,
            diagnostics: Vec::new(),
            cursors: Cursors::default(),
            stats: BlockStats::default(),
        }
    }

    pub fn generate(mut self) -> GenerateOutput {
        let model = self.model;
        let mut sections = Vec::new();
        for section in model.section_order.iter().copied() {
            let body = self.generate_section(section, model.section(section));
            sections.push(SectionCode { section, body });
        }
        self.check_exhausted();

        debug!(
            sections = sections.len(),
            opened = self.stats.blocks_opened,
            closed = self.stats.blocks_closed,
            "generated procedure"
        );
        GenerateOutput {
            procedure: Procedure {
                name: model.name().to_string(),
                title: model.metadata.title.clone(),
                sections,
                stats: self.stats,
            },
            diagnostics: self.diagnostics,
        }
    }

    fn generate_section(&mut self, section: Section, code: &SectionModel) -> Vec<Stmt> {
        self.cursors.calls = 0;
        let mut body = Vec::new();
        for element in code.elements.iter() {
            body.extend(self.reconstruct(section, element));
        }
        if self.cursors.calls < code.calls.len() {
            self.error(
                codes::UNCONSUMED_RECORDS,
                format!(
                    "{} call(s) of the {} section were never emitted",
                    code.calls.len() - self.cursors.calls,
                    section
                ),
                code.calls[self.cursors.calls].span.clone(),
            );
        }
        body
    }

    /// Rebuild one element into the statements it stands for.
    fn reconstruct(&mut self, section: Section, element: &EvaluateElement) -> Vec<Stmt> {
        let model = self.model;
        let mut blocks = vec![Block::Root(Vec::new())];
        let mut condition: Option<ConditionFrame> = None;
        let span = &element.span;

        for token in element.tokens.iter() {
            match token {
                ElementToken::And | ElementToken::Or | ElementToken::Not => {
                    let connective = match token {
                        ElementToken::And => Connective::And,
                        ElementToken::Or => Connective::Or,
                        _ => Connective::Not,
                    };
                    match condition.as_mut() {
                        Some(frame) => frame.open(connective),
                        None => self.unbalanced(format!("'{}' outside a condition", token), span),
                    }
                }
                ElementToken::Compare(_) | ElementToken::Literal(_) => {
                    let leaf = self.leaf(section, token, span);
                    match condition.as_mut() {
                        Some(frame) => frame.push(leaf),
                        None => self.unbalanced(format!("'{}' outside a condition", token), span),
                    }
                }
                ElementToken::If => {
                    if condition.is_some() {
                        self.unbalanced("'IF' inside a condition", span);
                    }
                    blocks.push(Block::Chain {
                        branches: Vec::new(),
                        otherwise: None,
                    });
                    condition = Some(ConditionFrame::default());
                }
                ElementToken::ElseIf => {
                    self.close_body(&mut blocks);
                    condition = Some(ConditionFrame::default());
                }
                ElementToken::Then => {
                    let finished = match condition.take().map(ConditionFrame::finish) {
                        Some(Some(finished)) => finished,
                        _ => {
                            self.unbalanced("incomplete condition before 'THEN'", span);
                            Condition::Literal(false)
                        }
                    };
                    blocks.push(Block::Then {
                        condition: finished,
                        body: Vec::new(),
                    });
                    self.stats.blocks_opened += 1;
                }
                ElementToken::Else => {
                    self.close_body(&mut blocks);
                    blocks.push(Block::Else(Vec::new()));
                    self.stats.blocks_opened += 1;
                }
                ElementToken::EndIf => {
                    self.close_body(&mut blocks);
                    self.close_chain(&mut blocks, span);
                }
                ElementToken::Conclude => {
                    if let Some(conclusion) = model.conclusions.get(self.cursors.conclusions) {
                        self.cursors.conclusions += 1;
                        self.append(&mut blocks, Stmt::Conclude(conclusion.clone()), span);
                    } else {
                        self.missing("conclusion", span);
                    }
                    self.close_body(&mut blocks);
                }
                ElementToken::Read => {
                    if let Some(read) = model.reads.get(self.cursors.reads) {
                        self.cursors.reads += 1;
                        self.append(&mut blocks, Stmt::Read(read.clone()), span);
                    } else {
                        self.missing("read", span);
                    }
                }
                ElementToken::Assign => {
                    if let Some(assignment) = model.assignments.get(self.cursors.assignments) {
                        self.cursors.assignments += 1;
                        self.append(&mut blocks, Stmt::Assign(assignment.clone()), span);
                    } else {
                        self.missing("assignment", span);
                    }
                }
                ElementToken::Write => {
                    if let Some(action) = model.actions.get(self.cursors.actions) {
                        self.cursors.actions += 1;
                        self.append(&mut blocks, Stmt::Write(action.clone()), span);
                    } else {
                        self.missing("action", span);
                    }
                }
                ElementToken::Call => {
                    let calls = &model.section(section).calls;
                    if let Some(call) = calls.get(self.cursors.calls) {
                        self.cursors.calls += 1;
                        self.append(&mut blocks, Stmt::Call(call.clone()), span);
                    } else {
                        self.missing("call", span);
                    }
                }
            }
        }

        if condition.is_some() {
            self.unbalanced("condition without 'THEN'", span);
        }
        if blocks.len() > 1 {
            self.unbalanced("element ends with open blocks", span);
            while blocks.len() > 1 {
                self.close_body(&mut blocks);
                self.close_chain(&mut blocks, span);
            }
        }
        match blocks.pop() {
            Some(Block::Root(body)) => body,
            _ => Vec::new(),
        }
    }

    fn leaf(&mut self, section: Section, token: &ElementToken, span: &Span) -> Condition {
        match token {
            ElementToken::Compare(key) => {
                let model = self.model;
                match model.section(section).comparisons.get(key) {
                    Some(comparison) => Condition::Compare(comparison.clone()),
                    None => {
                        self.missing(&format!("comparison '{}'", key), span);
                        Condition::Literal(false)
                    }
                }
            }
            ElementToken::Literal(value) => Condition::Literal(*value),
            _ => Condition::Literal(false),
        }
    }

    fn append(&mut self, blocks: &mut [Block], stmt: Stmt, span: &Span) {
        match blocks.last_mut() {
            Some(Block::Root(body))
            | Some(Block::Then { body, .. })
            | Some(Block::Else(body)) => body.push(stmt),
            _ => self.unbalanced("statement between branches", span),
        }
    }

    /// Close the innermost body if one is open and attach it to its chain.
    fn close_body(&mut self, blocks: &mut Vec<Block>) {
        if !matches!(blocks.last(), Some(Block::Then { .. }) | Some(Block::Else(_))) {
            return;
        }
        let Some(closed) = blocks.pop() else {
            return;
        };
        self.stats.blocks_closed += 1;
        if let Some(Block::Chain {
            branches,
            otherwise,
        }) = blocks.last_mut()
        {
            match closed {
                Block::Then { condition, body } => branches.push(Branch { condition, body }),
                Block::Else(body) => *otherwise = Some(body),
                _ => {}
            }
        }
    }

    /// Close the innermost chain and append it to the enclosing block.
    fn close_chain(&mut self, blocks: &mut Vec<Block>, span: &Span) {
        if !matches!(blocks.last(), Some(Block::Chain { .. })) {
            self.unbalanced("'ENDIF' without an open 'IF'", span);
            return;
        }
        if let Some(Block::Chain {
            branches,
            otherwise,
        }) = blocks.pop()
        {
            self.append(blocks, Stmt::If { branches, otherwise }, span);
        }
    }

    fn check_exhausted(&mut self) {
        let model = self.model;
        let leftovers = [
            ("read", self.cursors.reads, model.reads.iter().map(|r| &r.span).collect::<Vec<_>>()),
            (
                "assignment",
                self.cursors.assignments,
                model.assignments.iter().map(|a| &a.span).collect(),
            ),
            (
                "conclusion",
                self.cursors.conclusions,
                model.conclusions.iter().map(|c| &c.span).collect(),
            ),
            (
                "action",
                self.cursors.actions,
                model.actions.iter().map(|a| &a.span).collect(),
            ),
        ];
        for (what, used, spans) in leftovers {
            if used < spans.len() {
                self.error(
                    codes::UNCONSUMED_RECORDS,
                    format!("{} {} record(s) were never emitted", spans.len() - used, what),
                    spans[used].clone(),
                );
            }
        }
    }

    fn unbalanced(&mut self, message: impl Into<String>, span: &Span) {
        self.error(codes::UNBALANCED_ELEMENT, message, span.clone());
    }

    fn missing(&mut self, what: &str, span: &Span) {
        self.error(
            codes::MISSING_RECORD,
            format!("no {} record left for this element", what),
            span.clone(),
        );
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(Stage::Generate, code, message, span));
    }
}
