//! Behavioral guarantees of the whole pipeline
//!
//! Each test compiles a small MLM through `Compiler` and checks one property of the
//! result, independent of how the stages split the work between them.

use arden::mlm::ast::BinaryOp;
use arden::mlm::building::{
    DurationUnit, Literal, Lookback, Operand, Operator, Outcome, ReadType, Section,
};
use arden::mlm::diagnostics::codes;
use arden::mlm::pipeline::{Compilation, Compiler};
use rstest::rstest;

fn compile(source: &str) -> Compilation {
    Compiler::new().compile(source).unwrap()
}

#[test]
fn test_one_read_per_concept_reference() {
    let compilation = compile(
        "data: A := {alpha}; B := read last 3 from {beta}; C := count of read {gamma}; \
         D := A + 1;;",
    );
    let concepts: Vec<&str> = compilation
        .model
        .reads
        .iter()
        .map(|read| read.concept.as_str())
        .collect();
    assert_eq!(concepts, vec!["alpha", "beta", "gamma"]);
    assert_eq!(compilation.model.assignments.len(), 1);
}

#[test]
fn test_reads_nested_in_values_are_retrieved() {
    let compilation = compile("data: D := last {weight} * 2; E := (read {creat}) + 1;;");
    assert!(compilation.diagnostics.is_empty(), "{}", compilation.render_diagnostics());

    let model = &compilation.model;
    let reads: Vec<(&str, &str)> = model
        .reads
        .iter()
        .map(|read| (read.concept.as_str(), read.variable.as_str()))
        .collect();
    assert_eq!(reads, vec![("weight", "D.read1"), ("creat", "E.read1")]);
    let elements: Vec<String> = model.data.elements.iter().map(|e| e.to_string()).collect();
    assert_eq!(elements, vec!["READ", "ASSIGN", "READ", "ASSIGN"]);
    assert_eq!(
        model.assignments[0].value,
        Operand::Binary {
            op: BinaryOp::Multiply,
            lhs: Box::new(Operand::Variable("D.read1".to_string())),
            rhs: Box::new(Operand::Literal(Literal::Number(2.0))),
        }
    );

    let rust = compilation.render_rust();
    assert!(
        rust.contains("eval.set(\"D.read1\", ctx.read(&Read { concept: \"weight\""),
        "{}",
        rust
    );
    assert!(rust.contains("eval.set(\"D\", eval.get(\"D.read1\").mul(&Value::from(2.0)));"));
    assert!(!rust.contains("Value::Null"));
}

#[rstest]
#[case("{CD4 Count}", ReadType::Last, 1)]
#[case("read {CD4 Count}", ReadType::Last, 1)]
#[case("read last 3 from {CD4 Count}", ReadType::Last, 3)]
#[case("read first 2 from {CD4 Count}", ReadType::First, 2)]
#[case("min of read {CD4 Count}", ReadType::Min, 1)]
#[case("average of read {CD4 Count}", ReadType::Avg, 1)]
fn test_modifier_sets_read_type_and_count(
    #[case] expression: &str,
    #[case] read_type: ReadType,
    #[case] how_many: u32,
) {
    let compilation = compile(&format!("data: C := {};;", expression));
    let read = &compilation.model.reads[0];
    assert_eq!(read.concept, "CD4 Count");
    assert_eq!(read.read_type, read_type);
    assert_eq!(read.how_many, how_many);
}

#[rstest]
#[case("6 months", 6.0, DurationUnit::Months)]
#[case("6 Month", 6.0, DurationUnit::Months)]
#[case("10 DAYS", 10.0, DurationUnit::Days)]
#[case("2 years", 2.0, DurationUnit::Years)]
fn test_lookback_window(#[case] window: &str, #[case] value: f64, #[case] unit: DurationUnit) {
    let compilation = compile(&format!(
        "data: K := read {{potassium}} where it occurred within the past {};;",
        window
    ));
    assert!(compilation.diagnostics.is_empty(), "{:?}", compilation.diagnostics);
    assert_eq!(
        compilation.model.reads[0].duration,
        Some(Lookback::past(value, unit))
    );
}

#[rstest]
#[case("if a > 1 then conclude true; endif")]
#[case("if a > 1 then conclude true; else conclude false; endif")]
#[case("if a > 1 then conclude true; elseif a < 0 then conclude false; else conclude false; endif")]
#[case("if a > 1 then if b > 2 then conclude true; endif; conclude false; endif")]
#[case("if a > 1 then if b > 2 then conclude true; else conclude false; endif; endif")]
#[case("if a then x := 1; elseif b then y := 2; endif; if c then conclude true; endif")]
fn test_blocks_balance(#[case] logic: &str) {
    let compilation = compile(&format!("logic: {};;", logic));
    assert!(!compilation.is_degraded(), "{}", compilation.render_diagnostics());
    let stats = compilation.procedure.stats;
    assert!(stats.blocks_opened > 0);
    assert!(stats.is_balanced(), "{:?}", stats);
}

#[rstest]
#[case("=", "equals", Operator::Equals)]
#[case(">", "is greater than", Operator::GreaterThan)]
#[case("<", "is less than", Operator::LessThan)]
#[case(">=", "ge", Operator::GreaterOrEqual)]
#[case("<=", "le", Operator::LessOrEqual)]
#[case("<>", "ne", Operator::NotEquals)]
fn test_symbolic_and_worded_operators_agree(
    #[case] symbol: &str,
    #[case] word: &str,
    #[case] expected: Operator,
) {
    let symbolic = compile(&format!("logic: if X {} 1 then conclude true; endif;;", symbol));
    let worded = compile(&format!("logic: if X {} 1 then conclude true; endif;;", word));
    assert_eq!(symbolic.model.logic.comparisons["X"].operator, expected);
    assert_eq!(worded.model.logic.comparisons["X"].operator, expected);
    assert_eq!(symbolic.render_rust(), worded.render_rust());
}

#[test]
fn test_range_check_makes_two_comparisons() {
    let compilation = compile("logic: if A > 1 AND A < 10 then conclude true; endif;;");
    let comparisons = &compilation.model.logic.comparisons;
    assert_eq!(comparisons.len(), 2);
    assert_eq!(comparisons["A"].operator, Operator::GreaterThan);
    assert_eq!(comparisons["A#1"].operator, Operator::LessThan);
    assert_eq!(comparisons["A#1"].variable, "A");
}

#[test]
fn test_non_numeric_priority_is_reported_and_later_slots_parse() {
    let compilation = compile(
        "knowledge: priority: high;; data: X := {X_concept};; \
         logic: if X > 5 then conclude true; endif;; end:",
    );
    assert!(compilation.is_degraded());
    assert_eq!(compilation.diagnostics.len(), 1);
    assert_eq!(compilation.diagnostics[0].code, codes::MALFORMED_SLOT);
    assert_eq!(compilation.model.metadata.priority, None);
    assert_eq!(compilation.model.reads.len(), 1);
    assert_eq!(compilation.model.logic.elements.len(), 1);
}

#[test]
fn test_end_to_end_example() {
    let compilation = compile(
        "data: X := {X_concept};; \
         logic: if X > 5 then conclude true; else conclude false; endif;;",
    );
    assert!(compilation.diagnostics.is_empty());
    let model = &compilation.model;
    assert_eq!(model.reads.len(), 1);
    assert_eq!(model.reads[0].concept, "X_concept");
    assert_eq!(model.reads[0].variable, "X");
    assert_eq!(
        model.section(Section::Logic).elements[0].to_string(),
        "IF COMPARE(X) THEN CONCLUDE ELSE CONCLUDE ENDIF"
    );
    let outcomes: Vec<&Outcome> = model.conclusions.iter().map(|c| &c.outcome).collect();
    assert_eq!(
        outcomes,
        vec![&Outcome::Literal(true), &Outcome::Literal(false)]
    );

    let rust = compilation.render_rust();
    assert!(rust.contains("if eval.get(\"X\").gt(&Value::from(5.0)) {"), "{}", rust);
    assert!(rust.contains("return true;"));
    assert!(rust.contains("return false;"));
}

#[test]
fn test_recovery_keeps_later_statements() {
    let compilation = compile("logic: x := ; if y > 1 then conclude true; endif;;");
    assert_eq!(compilation.count(arden::mlm::diagnostics::Severity::Error), 1);
    assert_eq!(compilation.diagnostics[0].code, codes::UNEXPECTED_TOKEN);
    assert_eq!(
        compilation.model.logic.elements[0].to_string(),
        "IF COMPARE(y) THEN CONCLUDE ENDIF"
    );
}
