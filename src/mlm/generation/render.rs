//! Rust source rendering of a [`Procedure`]
//!
//!     The generated module exposes one entry point, `evaluate`, that runs the data
//!     section, then the logic section, and the action section only when logic
//!     concluded true. It is written against a small runtime interface:
//!
//!         Context       read(&Read) -> Value, call(name, &[Value]) -> Value, now() -> Value
//!         Evaluation    get(name) -> Value, set(name, Value), write(String, Option<&str>)
//!         Value         from(..), comparisons (gt, le, is_in, exists, ..), arithmetic
//!
//!     The path of the crate providing that interface is configurable.

use super::ir::{always_concludes, Branch, Condition, Procedure, Stmt};
use crate::mlm::building::{
    ActionTemplate, Answer, CallParam, CallRecord, Comparison, DurationUnit, Fragment, Literal,
    Operand, Operator, Outcome, ReadDescriptor, ReadType, Section,
};
use crate::mlm::ast::BinaryOp;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub runtime_crate: String,
    pub emit_comments: bool,
    pub indent: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            runtime_crate: "arden_runtime".to_string(),
            emit_comments: true,
            indent: 4,
        }
    }
}

/// Render `procedure` as a Rust module.
pub fn render_rust(procedure: &Procedure, options: &RenderOptions) -> String {
    let mut out = Output::new(options);
    if options.emit_comments {
        out.line(&format!("//! Generated from MLM `{}`", one_line(&procedure.name)));
        if let Some(title) = &procedure.title {
            out.line(&format!("//! {}", one_line(title)));
        }
        out.blank();
    }
    out.line(&format!(
        "use {}::{{Context, Evaluation, Read, ReadType, Unit, Value, Within}};",
        options.runtime_crate
    ));
    out.blank();

    out.line("pub fn evaluate<C: Context>(ctx: &mut C) -> Evaluation {");
    out.indented(|out| {
        out.line("let mut eval = Evaluation::default();");
        out.line("data(ctx, &mut eval);");
        out.line("if logic(ctx, &mut eval) {");
        out.indented(|out| out.line("action(ctx, &mut eval);"));
        out.line("}");
        out.line("eval");
    });
    out.line("}");

    for section in [Section::Data, Section::Logic, Section::Action] {
        let body = procedure
            .section(section)
            .map(|code| code.body.as_slice())
            .unwrap_or_default();
        out.blank();
        render_section(&mut out, section, body);
    }
    out.finish()
}

/// Slot and source text may span lines; comments may not.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn render_section(out: &mut Output, section: Section, body: &[Stmt]) {
    let returns = if section == Section::Logic { " -> bool" } else { "" };
    out.line("#[allow(unused_variables)]");
    out.line(&format!(
        "fn {}<C: Context>(ctx: &mut C, eval: &mut Evaluation){} {{",
        section, returns
    ));
    out.indented(|out| {
        render_body(out, body);
        if section == Section::Logic && !always_concludes(body) {
            out.line("false");
        }
    });
    out.line("}");
}

fn render_body(out: &mut Output, body: &[Stmt]) {
    for stmt in body {
        render_stmt(out, stmt);
    }
}

fn render_stmt(out: &mut Output, stmt: &Stmt) {
    match stmt {
        Stmt::Read(read) => out.line(&format!(
            "eval.set({:?}, ctx.read(&{}));",
            read.variable,
            read_literal(read)
        )),
        Stmt::Assign(assignment) => {
            if out.comments {
                if let Operand::Unsupported(text) = &assignment.value {
                    out.line(&format!("// unsupported: {}", one_line(text)));
                }
            }
            out.line(&format!(
                "eval.set({:?}, {});",
                assignment.variable,
                operand(&assignment.value)
            ));
        }
        Stmt::Call(call) => match &call.result {
            Some(result) => out.line(&format!("eval.set({:?}, {});", result, call_expr(call))),
            None => out.line(&format!("{};", call_expr(call))),
        },
        Stmt::Conclude(conclusion) => out.line(&match &conclusion.outcome {
            Outcome::Literal(value) => format!("return {};", value),
            Outcome::Variable(name) => format!("return eval.get({:?}).is_true();", name),
        }),
        Stmt::Write(action) => render_write(out, action),
        Stmt::If {
            branches,
            otherwise,
        } => render_if(out, branches, otherwise.as_deref()),
    }
}

fn render_if(out: &mut Output, branches: &[Branch], otherwise: Option<&[Stmt]>) {
    for (index, branch) in branches.iter().enumerate() {
        let keyword = if index == 0 { "if" } else { "} else if" };
        out.line(&format!("{} {} {{", keyword, condition_expr(&branch.condition)));
        out.indented(|out| render_body(out, &branch.body));
    }
    if let Some(otherwise) = otherwise {
        out.line("} else {");
        out.indented(|out| render_body(out, otherwise));
    }
    out.line("}");
}

fn render_write(out: &mut Output, action: &ActionTemplate) {
    let mut template = String::new();
    let mut args = Vec::new();
    for fragment in action.fragments.iter() {
        match fragment {
            Fragment::Literal(text) => template.push_str(&text.replace('{', "{{").replace('}', "}}")),
            Fragment::Variable(name) => {
                template.push_str("{}");
                args.push(format!("eval.get({:?})", name));
            }
        }
    }
    let message = if args.is_empty() {
        format!("{:?}.to_string()", template)
    } else {
        format!("format!({:?}, {})", template, args.join(", "))
    };
    let destination = match &action.destination {
        Some(destination) => format!("Some({:?})", destination),
        None => "None".to_string(),
    };
    out.line(&format!("eval.write({}, {});", message, destination));
}

fn read_literal(read: &ReadDescriptor) -> String {
    let datasource = match &read.datasource {
        Some(source) => format!("Some({:?})", source),
        None => "None".to_string(),
    };
    let within = match &read.duration {
        Some(lookback) => format!(
            "Some(Within::past({:?}, {}))",
            lookback.value,
            unit(lookback.unit)
        ),
        None => "None".to_string(),
    };
    format!(
        "Read {{ concept: {:?}, datasource: {}, read_type: {}, how_many: {}, within: {} }}",
        read.concept,
        datasource,
        read_type(read.read_type),
        read.how_many,
        within
    )
}

fn read_type(read_type: ReadType) -> &'static str {
    match read_type {
        ReadType::Last => "ReadType::Last",
        ReadType::First => "ReadType::First",
        ReadType::Min => "ReadType::Min",
        ReadType::Max => "ReadType::Max",
        ReadType::Avg => "ReadType::Avg",
        ReadType::Sum => "ReadType::Sum",
        ReadType::Median => "ReadType::Median",
        ReadType::Count => "ReadType::Count",
        ReadType::Exist => "ReadType::Exist",
    }
}

fn unit(unit: DurationUnit) -> &'static str {
    match unit {
        DurationUnit::Days => "Unit::Days",
        DurationUnit::Months => "Unit::Months",
        DurationUnit::Years => "Unit::Years",
    }
}

fn call_expr(call: &CallRecord) -> String {
    let params: Vec<String> = call
        .params
        .iter()
        .map(|param| match param {
            CallParam::Literal(value) => literal(value),
            CallParam::Variable(name) | CallParam::ResultRef(name) => {
                format!("eval.get({:?})", name)
            }
            CallParam::Expression(value) => operand(value),
        })
        .collect();
    let target = call.module.as_deref().unwrap_or(&call.target);
    format!("ctx.call({:?}, &[{}])", target, params.join(", "))
}

fn condition_expr(condition: &Condition) -> String {
    match condition {
        Condition::And(lhs, rhs) => format!("({} && {})", condition_expr(lhs), condition_expr(rhs)),
        Condition::Or(lhs, rhs) => format!("({} || {})", condition_expr(lhs), condition_expr(rhs)),
        Condition::Not(inner) => format!("!{}", condition_expr(inner)),
        Condition::Compare(comparison) => compare(comparison),
        Condition::Literal(value) => value.to_string(),
    }
}

fn compare(comparison: &Comparison) -> String {
    let subject = format!("eval.get({:?})", comparison.variable);
    let answer = match &comparison.answer {
        Answer::None => String::new(),
        Answer::Single(value) => format!("&{}", operand(value)),
        Answer::List(values) => {
            let values: Vec<String> = values.iter().map(operand).collect();
            format!("&[{}]", values.join(", "))
        }
    };
    let method = match comparison.operator {
        Operator::Equals => "equals",
        Operator::NotEquals => "not_equals",
        Operator::LessThan => "lt",
        Operator::LessOrEqual => "le",
        Operator::GreaterThan => "gt",
        Operator::GreaterOrEqual => "ge",
        Operator::In => "is_in",
        Operator::Exists => "exists",
        Operator::IsNull => "is_null",
    };
    format!("{}.{}({})", subject, method, answer)
}

fn literal(value: &Literal) -> String {
    match value {
        Literal::Number(n) => format!("Value::from({:?})", n),
        Literal::Text(text) => format!("Value::from({:?})", text),
        Literal::Bool(b) => format!("Value::from({})", b),
        Literal::Null => "Value::Null".to_string(),
    }
}

fn operand(value: &Operand) -> String {
    match value {
        Operand::Literal(value) => literal(value),
        Operand::Variable(name) => format!("eval.get({:?})", name),
        Operand::List(items) => {
            let items: Vec<String> = items.iter().map(operand).collect();
            format!("Value::list(vec![{}])", items.join(", "))
        }
        Operand::Binary { op, lhs, rhs } => {
            let method = match op {
                BinaryOp::Add => "add",
                BinaryOp::Subtract => "sub",
                BinaryOp::Multiply => "mul",
                BinaryOp::Divide => "div",
                BinaryOp::Power => "pow",
                BinaryOp::Concat => "concat",
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
                BinaryOp::Seqto => "seqto",
                BinaryOp::Merge => "merge",
            };
            format!("{}.{}(&{})", operand(lhs), method, operand(rhs))
        }
        Operand::Negate(inner) => format!("{}.neg()", operand(inner)),
        Operand::Function { name, operand: inner } => {
            format!("{}.apply({:?})", operand(inner), name)
        }
        Operand::Duration { amount, unit } => {
            format!("Value::duration({}, {:?})", operand(amount), unit)
        }
        Operand::Now => "ctx.now()".to_string(),
        Operand::Unsupported(_) => "Value::Null".to_string(),
    }
}

/// Line writer with indentation.
struct Output {
    text: String,
    level: usize,
    indent: usize,
    comments: bool,
}

impl Output {
    fn new(options: &RenderOptions) -> Self {
        Self {
            text: String::new(),
            level: 0,
            indent: options.indent,
            comments: options.emit_comments,
        }
    }

    fn line(&mut self, line: &str) {
        self.text.push_str(&" ".repeat(self.level * self.indent));
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }

    fn indented(&mut self, f: impl FnOnce(&mut Output)) {
        self.level += 1;
        f(self);
        self.level -= 1;
    }

    fn finish(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlm::building::build;
    use crate::mlm::generation::generate;
    use crate::mlm::parsing::parse;

    fn render_source(source: &str, options: &RenderOptions) -> String {
        let parsed = parse(source).unwrap();
        let built = build(&parsed.mlm, source);
        render_rust(&generate(&built.model).procedure, options)
    }

    #[test]
    fn test_render_end_to_end() {
        let options = RenderOptions {
            emit_comments: false,
            ..RenderOptions::default()
        };
        let rendered = render_source(
            "data: X := {X_concept};; \
             logic: if X > 5 then conclude true; else conclude false; endif;;",
            &options,
        );
        insta::assert_snapshot!(rendered, @r###"
        use arden_runtime::{Context, Evaluation, Read, ReadType, Unit, Value, Within};

        pub fn evaluate<C: Context>(ctx: &mut C) -> Evaluation {
            let mut eval = Evaluation::default();
            data(ctx, &mut eval);
            if logic(ctx, &mut eval) {
                action(ctx, &mut eval);
            }
            eval
        }

        #[allow(unused_variables)]
        fn data<C: Context>(ctx: &mut C, eval: &mut Evaluation) {
            eval.set("X", ctx.read(&Read { concept: "X_concept", datasource: None, read_type: ReadType::Last, how_many: 1, within: None }));
        }

        #[allow(unused_variables)]
        fn logic<C: Context>(ctx: &mut C, eval: &mut Evaluation) -> bool {
            if eval.get("X").gt(&Value::from(5.0)) {
                return true;
            } else {
                return false;
            }
        }

        #[allow(unused_variables)]
        fn action<C: Context>(ctx: &mut C, eval: &mut Evaluation) {
        }
        "###);
    }

    #[test]
    fn test_render_write_and_lookback() {
        let rendered = render_source(
            "data: K := read last 3 from {potassium} where it occurred within the past 6 months;; \
             action: write \"K {mmol} ||K||\" at clinician;;",
            &RenderOptions::default(),
        );
        assert!(rendered.contains("how_many: 3, within: Some(Within::past(6.0, Unit::Months))"));
        assert!(rendered.contains(
            r#"eval.write(format!("K {{mmol}} {}", eval.get("K")), Some("clinician"));"#
        ));
        assert!(rendered.starts_with("//! Generated from MLM `mlm`"));
        assert!(rendered.contains("    false\n}"));
    }

    #[test]
    fn test_runtime_crate_is_configurable() {
        let options = RenderOptions {
            runtime_crate: "crate::runtime".to_string(),
            indent: 2,
            ..RenderOptions::default()
        };
        let rendered = render_source("logic: conclude true;;", &options);
        assert!(rendered.contains("use crate::runtime::{Context"));
        assert!(rendered.contains("\n  return true;\n"));
    }

    #[test]
    fn test_multiline_text_stays_commented() {
        let rendered = render_source(
            "title: Potassium check\n  for renal patients;; \
             data: X := 1 seqto\n  5;; logic: conclude true;;",
            &RenderOptions::default(),
        );
        let header: Vec<&str> = rendered.lines().take_while(|line| !line.is_empty()).collect();
        assert_eq!(
            header,
            vec![
                "//! Generated from MLM `Potassium check for renal patients`",
                "//! Potassium check for renal patients",
            ]
        );
        assert!(rendered.contains("    // unsupported: 1 seqto 5\n"), "{}", rendered);
        for line in rendered.lines() {
            let code = line.trim_start();
            assert!(
                !code.starts_with("for renal") && !code.starts_with("5"),
                "uncommented text line: {:?}",
                line
            );
        }
    }
}
