//! Test support
//!
//! The Sample Files
//!
//!     Tests that need a complete MLM load it from the verified sample corpus in
//!     `samples/` instead of writing one inline. The samples are reviewed together with
//!     the grammar, so a test built on them checks the language as it is meant to be
//!     written rather than whatever happened to be typed into the test.
//!
//!     [`MlmSamples`] finds and loads them and can run them through the pipeline:
//!
//!     ```rust,ignore
//!     let compilation = MlmSamples::named("potassium_check").compile().unwrap();
//!     assert_model(&compilation.model)
//!         .read_count(1)
//!         .read(0, |read| read.concept("potassium").how_many(1));
//!     ```
//!
//! Assertions
//!
//!     [`assert_model`] starts a fluent chain over a [`RuleModel`]. Each step panics with
//!     a message naming what was expected and what was found.

use crate::mlm::building::{
    DurationUnit, Lookback, Outcome, ReadDescriptor, ReadType, RuleModel, Section,
};
use crate::mlm::pipeline::{Compilation, CompileError, Compiler};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("no sample named '{0}' in {}", MlmSamples::dir().display())]
    NotFound(String),
    #[error("cannot read sample: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Loader for the sample corpus.
pub struct MlmSamples;

impl MlmSamples {
    pub fn dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("samples")
    }

    /// Names of all samples, sorted.
    pub fn names() -> Result<Vec<String>, SampleError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(Self::dir())? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("mlm") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn named(name: &str) -> SampleLoader {
        SampleLoader {
            name: name.to_string(),
            path: Self::dir().join(format!("{}.mlm", name)),
        }
    }
}

/// One sample, ready to be read or compiled.
pub struct SampleLoader {
    name: String,
    path: PathBuf,
}

impl SampleLoader {
    pub fn source(&self) -> Result<String, SampleError> {
        if !self.path.exists() {
            return Err(SampleError::NotFound(self.name.clone()));
        }
        Ok(fs::read_to_string(&self.path)?)
    }

    pub fn compile(&self) -> Result<Compilation, SampleError> {
        let source = self.source()?;
        Ok(Compiler::new().compile(&source)?)
    }
}

/// Start an assertion chain over a rule model.
pub fn assert_model(model: &RuleModel) -> ModelAssertion<'_> {
    ModelAssertion { model }
}

pub struct ModelAssertion<'a> {
    model: &'a RuleModel,
}

impl<'a> ModelAssertion<'a> {
    pub fn read_count(self, expected: usize) -> Self {
        let concepts: Vec<&str> = self.model.reads.iter().map(|r| r.concept.as_str()).collect();
        assert_eq!(
            self.model.reads.len(),
            expected,
            "Expected {} reads, found {}: {:?}",
            expected,
            self.model.reads.len(),
            concepts
        );
        self
    }

    pub fn read<F>(self, index: usize, assertion: F) -> Self
    where
        F: FnOnce(ReadAssertion<'a>) -> ReadAssertion<'a>,
    {
        let read = self.model.reads.get(index).unwrap_or_else(|| {
            panic!(
                "Read index {} out of bounds (model has {} reads)",
                index,
                self.model.reads.len()
            )
        });
        assertion(ReadAssertion {
            read,
            context: format!("reads[{}]", index),
        });
        self
    }

    /// Assert the flattened tokens of one element, e.g. `"IF COMPARE(X) THEN CONCLUDE ENDIF"`.
    pub fn element(self, section: Section, index: usize, expected: &str) -> Self {
        let elements = &self.model.section(section).elements;
        let actual = elements
            .get(index)
            .map(|element| element.to_string())
            .unwrap_or_else(|| {
                panic!(
                    "{} element {} out of bounds ({} elements)",
                    section,
                    index,
                    elements.len()
                )
            });
        assert_eq!(actual, expected, "{} element {}", section, index);
        self
    }

    pub fn comparison_count(self, section: Section, expected: usize) -> Self {
        let keys: Vec<&String> = self.model.section(section).comparisons.keys().collect();
        assert_eq!(
            keys.len(),
            expected,
            "Expected {} comparisons in {}, found {:?}",
            expected,
            section,
            keys
        );
        self
    }

    pub fn conclusions(self, expected: &[Outcome]) -> Self {
        let actual: Vec<&Outcome> = self.model.conclusions.iter().map(|c| &c.outcome).collect();
        let expected: Vec<&Outcome> = expected.iter().collect();
        assert_eq!(actual, expected, "conclusions");
        self
    }

    pub fn title(self, expected: &str) -> Self {
        assert_eq!(self.model.metadata.title.as_deref(), Some(expected), "title");
        self
    }
}

pub struct ReadAssertion<'a> {
    read: &'a ReadDescriptor,
    context: String,
}

impl<'a> ReadAssertion<'a> {
    pub fn concept(self, expected: &str) -> Self {
        assert_eq!(self.read.concept, expected, "{}: concept", self.context);
        self
    }

    pub fn variable(self, expected: &str) -> Self {
        assert_eq!(self.read.variable, expected, "{}: variable", self.context);
        self
    }

    pub fn read_type(self, expected: ReadType) -> Self {
        assert_eq!(self.read.read_type, expected, "{}: read type", self.context);
        self
    }

    pub fn how_many(self, expected: u32) -> Self {
        assert_eq!(self.read.how_many, expected, "{}: how many", self.context);
        self
    }

    pub fn lookback(self, value: f64, unit: DurationUnit) -> Self {
        assert_eq!(
            self.read.duration,
            Some(Lookback::past(value, unit)),
            "{}: lookback",
            self.context
        );
        self
    }

    pub fn no_lookback(self) -> Self {
        assert_eq!(self.read.duration, None, "{}: lookback", self.context);
        self
    }
}
