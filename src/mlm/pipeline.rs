//! Compilation pipeline
//!
//!     source ──tokenize──▶ tokens ──parse──▶ Mlm ──build──▶ RuleModel ──generate──▶ Procedure
//!
//!     [`Compiler`] runs every stage in order and returns a [`Compilation`] holding each
//!     stage's product together with all diagnostics. Only a lexical error aborts; every
//!     later problem is recorded and the remaining stages still run, so a caller always
//!     gets the best output the input allows and can check [`Compilation::is_degraded`].
//!
//! Usage
//!
//!     ```rust,ignore
//!     let compilation = Compiler::new().compile(source)?;
//!     if compilation.is_degraded() {
//!         eprintln!("{}", compilation.render_diagnostics());
//!     }
//!     println!("{}", compilation.render_rust());
//!     ```

use crate::mlm::ast::Mlm;
use crate::mlm::building::{build, RuleModel};
use crate::mlm::diagnostics::{render_all, Diagnostic, Severity};
use crate::mlm::generation::{generate, render_rust, Procedure, RenderOptions};
use crate::mlm::lexing::LexError;
use crate::mlm::parsing::{Parser, DEFAULT_MAX_ERRORS};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Runs the compilation stages with one set of options.
#[derive(Debug, Clone)]
pub struct Compiler {
    max_errors: usize,
    render: RenderOptions,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            max_errors: DEFAULT_MAX_ERRORS,
            render: RenderOptions::default(),
        }
    }

    /// Stop parsing after this many syntax errors.
    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.render
    }

    pub fn compile(&self, source: &str) -> Result<Compilation, CompileError> {
        let tokens = crate::mlm::lexing::tokenize(source)?;
        let parsed = Parser::new(tokens, source)
            .with_max_errors(self.max_errors)
            .parse();
        let built = build(&parsed.mlm, source);
        let generated = generate(&built.model);

        let mut diagnostics = parsed.diagnostics;
        diagnostics.extend(built.diagnostics);
        diagnostics.extend(generated.diagnostics);

        let compilation = Compilation {
            source: source.to_string(),
            mlm: parsed.mlm,
            model: built.model,
            procedure: generated.procedure,
            diagnostics,
            render: self.render.clone(),
        };
        if compilation.diagnostics.is_empty() {
            debug!(name = %compilation.procedure.name, "compiled cleanly");
        } else {
            warn!(
                name = %compilation.procedure.name,
                errors = compilation.count(Severity::Error),
                warnings = compilation.count(Severity::Warning),
                "compiled with diagnostics"
            );
        }
        Ok(compilation)
    }

    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<Compilation, CompileError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.compile(&source)
    }
}

/// Everything one compilation produced.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub source: String,
    pub mlm: Mlm,
    pub model: RuleModel,
    pub procedure: Procedure,
    /// Parse, then build, then generation diagnostics
    pub diagnostics: Vec<Diagnostic>,
    render: RenderOptions,
}

impl Compilation {
    /// Whether any error-level diagnostic was produced.
    pub fn is_degraded(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == severity)
            .count()
    }

    pub fn render_rust(&self) -> String {
        render_rust(&self.procedure, &self.render)
    }

    pub fn render_diagnostics(&self) -> String {
        render_all(&self.diagnostics, &self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlm::diagnostics::codes;

    #[test]
    fn test_clean_compilation() {
        let compilation = Compiler::new()
            .compile("data: X := {X_concept};; logic: if X > 5 then conclude true; endif;;")
            .unwrap();
        assert!(!compilation.is_degraded());
        assert!(compilation.diagnostics.is_empty());
        assert!(compilation.render_rust().contains("ReadType::Last"));
    }

    #[test]
    fn test_lex_error_is_fatal() {
        let result = Compiler::new().compile("logic: x := 1 ^ 2;;");
        assert!(matches!(result, Err(CompileError::Lex(_))));
    }

    #[test]
    fn test_syntax_error_degrades_but_still_generates() {
        let compilation = Compiler::new()
            .compile("priority: high;; logic: conclude true;;")
            .unwrap();
        assert!(compilation.is_degraded());
        assert_eq!(compilation.diagnostics[0].code, codes::MALFORMED_SLOT);
        assert_eq!(compilation.model.conclusions.len(), 1);
        assert!(compilation
            .render_diagnostics()
            .starts_with("error[P003] 1:11:"));
    }

    #[test]
    fn test_missing_file() {
        let result = Compiler::new().compile_file("/nonexistent/rule.mlm");
        assert!(matches!(result, Err(CompileError::Io { .. })));
    }
}
