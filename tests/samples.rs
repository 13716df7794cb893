//! End-to-end compilation of the verified sample corpus
//!
//! Every sample must compile cleanly; the per-sample tests pin down the rule model and
//! the generated procedure for each one.

use arden::mlm::building::{
    Answer, CallParam, DurationUnit, Literal, Operand, Operator, Outcome, ReadType, Section,
};
use arden::mlm::generation::Stmt;
use arden::mlm::testing::{assert_model, MlmSamples};

#[test]
fn test_every_sample_compiles_cleanly() {
    let names = MlmSamples::names().unwrap();
    assert!(names.len() >= 4, "{:?}", names);
    for name in names {
        let compilation = MlmSamples::named(&name).compile().unwrap();
        assert!(
            compilation.diagnostics.is_empty(),
            "{}:\n{}",
            name,
            compilation.render_diagnostics()
        );
        assert!(compilation.procedure.stats.is_balanced(), "{}", name);
        assert_eq!(compilation.procedure.name, name);
    }
}

#[test]
fn test_end_to_end() {
    let compilation = MlmSamples::named("end_to_end").compile().unwrap();
    assert_model(&compilation.model)
        .title("End to end example")
        .read_count(1)
        .read(0, |read| {
            read.concept("X_concept")
                .variable("X")
                .read_type(ReadType::Last)
                .how_many(1)
                .no_lookback()
        })
        .element(Section::Data, 0, "READ")
        .element(
            Section::Logic,
            0,
            "IF COMPARE(X) THEN CONCLUDE ELSE CONCLUDE ENDIF",
        )
        .element(Section::Action, 0, "WRITE")
        .comparison_count(Section::Logic, 1)
        .conclusions(&[Outcome::Literal(true), Outcome::Literal(false)]);

    let comparison = &compilation.model.logic.comparisons["X"];
    assert_eq!(comparison.operator, Operator::GreaterThan);
    assert_eq!(
        comparison.answer,
        Answer::Single(Operand::Literal(Literal::Number(5.0)))
    );

    let procedure = &compilation.procedure;
    assert_eq!(procedure.stats.blocks_opened, 2);
    match procedure.section(Section::Logic).map(|code| code.body.as_slice()) {
        Some([Stmt::If { branches, otherwise }]) => {
            assert_eq!(branches.len(), 1);
            assert_eq!(branches[0].condition.outline(), "X GT");
            assert!(otherwise.is_some());
        }
        other => panic!("expected a single conditional, got {:?}", other),
    }
}

#[test]
fn test_potassium_check() {
    let compilation = MlmSamples::named("potassium_check").compile().unwrap();
    assert_model(&compilation.model)
        .read_count(1)
        .read(0, |read| {
            read.concept("potassium")
                .variable("K")
                .read_type(ReadType::Last)
                .how_many(1)
                .lookback(6.0, DurationUnit::Months)
        })
        .element(
            Section::Logic,
            0,
            "IF COMPARE(K) THEN CONCLUDE ELSE CONCLUDE ENDIF",
        );

    let model = &compilation.model;
    assert_eq!(model.metadata.priority, Some(60.0));
    assert_eq!(model.destinations["clinician"].name, "pharmacy_email");
    // The destination binding is not an element of its own
    assert_eq!(model.data.elements.len(), 1);
    assert_eq!(model.actions[0].destination.as_deref(), Some("clinician"));

    let rust = compilation.render_rust();
    assert!(rust.contains("within: Some(Within::past(6.0, Unit::Months))"), "{}", rust);
    assert!(rust.contains("Some(\"clinician\")"), "{}", rust);
}

#[test]
fn test_cd4_monitoring() {
    let compilation = MlmSamples::named("cd4_monitoring").compile().unwrap();
    assert_model(&compilation.model)
        .read_count(2)
        .read(0, |read| {
            read.concept("CD4 Count")
                .variable("C")
                .read_type(ReadType::Last)
                .how_many(3)
                .lookback(6.0, DurationUnit::Months)
        })
        .read(1, |read| {
            read.concept("viral load")
                .variable("V")
                .read_type(ReadType::Max)
                .how_many(4)
                .no_lookback()
        })
        .element(
            Section::Logic,
            0,
            "IF AND COMPARE(C) COMPARE(V) THEN CONCLUDE ELSEIF COMPARE(C#1) THEN CONCLUDE ENDIF",
        )
        .comparison_count(Section::Logic, 3);

    let model = &compilation.model;
    assert_eq!(model.reads[1].datasource.as_deref(), Some("labs"));
    assert_eq!(model.logic.comparisons["C#1"].operator, Operator::IsNull);
    assert_eq!(model.logic.comparisons["C#1"].variable, "C");
}

#[test]
fn test_dose_alert() {
    let compilation = MlmSamples::named("dose_alert").compile().unwrap();
    assert_model(&compilation.model)
        .read_count(2)
        .element(Section::Data, 2, "ASSIGN")
        .element(Section::Data, 3, "CALL")
        .element(
            Section::Logic,
            0,
            "IF OR COMPARE(dose) COMPARE(clearance) THEN CONCLUDE ENDIF",
        )
        .conclusions(&[Outcome::Literal(true)]);

    let model = &compilation.model;
    assert_eq!(model.assignments[0].text, "weight * 15");
    let call = &model.data.calls[0];
    assert_eq!(call.module.as_deref(), Some("renal_function"));
    assert_eq!(call.result.as_deref(), Some("clearance"));
    assert_eq!(call.params, vec![CallParam::Variable("weight".to_string())]);
    assert_eq!(
        model.logic.comparisons["dose"].answer,
        Answer::Single(Operand::Variable("limit".to_string()))
    );

    // No else branch, so logic can fall through
    let rust = compilation.render_rust();
    assert!(rust.contains("ctx.call("), "{}", rust);
    assert!(rust.contains("    false\n}"), "{}", rust);
}
