//! Output formats
//!
//!     Every artifact of a compilation can be printed. A format name is `<stage>-<kind>`
//!     for the intermediate stages and a plain name for compiled output:
//!
//!         token-simple   one token per line with its byte span
//!         token-json     the token stream as JSON
//!         ast-treeviz    the syntax tree as an indented outline
//!         ast-json       the syntax tree as JSON
//!         model-json     the rule model as JSON
//!         model-yaml     the rule model as YAML
//!         ir-json        the generated procedure as JSON
//!         rust           the generated Rust module
//!
//!     [`process_source`] runs only as far as the format needs: token formats never
//!     parse, ast formats never build.

pub mod treeviz;

use crate::mlm::ast::range::Span;
use crate::mlm::ast::Mlm;
use crate::mlm::lexing::{tokenize, Spanned};
use crate::mlm::parsing::Parser;
use crate::mlm::pipeline::{Compilation, CompileError, Compiler};
use crate::mlm::token::{Token, TokenKind};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("unknown format '{0}', run `arden formats` for the list")]
    InvalidFormat(String),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ProcessingError {
    fn from(error: serde_json::Error) -> Self {
        ProcessingError::Serialization(error.to_string())
    }
}

impl From<serde_yaml::Error> for ProcessingError {
    fn from(error: serde_yaml::Error) -> Self {
        ProcessingError::Serialization(error.to_string())
    }
}

/// How far the pipeline has to run for a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStage {
    Token,
    Ast,
    Compile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    TokenSimple,
    TokenJson,
    AstTreeviz,
    AstJson,
    ModelJson,
    ModelYaml,
    IrJson,
    Rust,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 8] = [
        OutputFormat::TokenSimple,
        OutputFormat::TokenJson,
        OutputFormat::AstTreeviz,
        OutputFormat::AstJson,
        OutputFormat::ModelJson,
        OutputFormat::ModelYaml,
        OutputFormat::IrJson,
        OutputFormat::Rust,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::TokenSimple => "token-simple",
            OutputFormat::TokenJson => "token-json",
            OutputFormat::AstTreeviz => "ast-treeviz",
            OutputFormat::AstJson => "ast-json",
            OutputFormat::ModelJson => "model-json",
            OutputFormat::ModelYaml => "model-yaml",
            OutputFormat::IrJson => "ir-json",
            OutputFormat::Rust => "rust",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OutputFormat::TokenSimple => "one token per line with its byte span",
            OutputFormat::TokenJson => "token stream as JSON",
            OutputFormat::AstTreeviz => "syntax tree as an indented outline",
            OutputFormat::AstJson => "syntax tree as JSON",
            OutputFormat::ModelJson => "rule model as JSON",
            OutputFormat::ModelYaml => "rule model as YAML",
            OutputFormat::IrJson => "generated procedure as JSON",
            OutputFormat::Rust => "generated Rust module",
        }
    }

    pub fn stage(&self) -> FormatStage {
        match self {
            OutputFormat::TokenSimple | OutputFormat::TokenJson => FormatStage::Token,
            OutputFormat::AstTreeviz | OutputFormat::AstJson => FormatStage::Ast,
            _ => FormatStage::Compile,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = ProcessingError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|format| format.name() == name)
            .ok_or_else(|| ProcessingError::InvalidFormat(name.to_string()))
    }
}

/// Run `source` through the pipeline as far as `format` needs and print the result.
pub fn process_source(
    source: &str,
    format: OutputFormat,
    compiler: &Compiler,
) -> Result<String, ProcessingError> {
    match format.stage() {
        FormatStage::Token => {
            let tokens = tokenize(source).map_err(CompileError::from)?;
            format_tokens(&tokens, format)
        }
        FormatStage::Ast => {
            let tokens = tokenize(source).map_err(CompileError::from)?;
            let parsed = Parser::new(tokens, source).parse();
            format_ast(&parsed.mlm, source, format)
        }
        FormatStage::Compile => format_compilation(&compiler.compile(source)?, format),
    }
}

#[derive(Serialize)]
struct TokenRecord<'a> {
    kind: TokenKind,
    token: &'a Token,
    span: &'a Span,
}

pub fn format_tokens(tokens: &[Spanned], format: OutputFormat) -> Result<String, ProcessingError> {
    match format {
        OutputFormat::TokenSimple => Ok(tokens
            .iter()
            .map(|(token, span)| {
                format!(
                    "{:<14} {:<24} {}..{}",
                    kind_label(token),
                    token.to_string(),
                    span.start,
                    span.end
                )
            })
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::TokenJson => {
            let records: Vec<TokenRecord> = tokens
                .iter()
                .map(|(token, span)| TokenRecord {
                    kind: token.kind(),
                    token,
                    span,
                })
                .collect();
            Ok(serde_json::to_string_pretty(&records)?)
        }
        other => Err(ProcessingError::InvalidFormat(other.name().to_string())),
    }
}

fn kind_label(token: &Token) -> String {
    match token.kind() {
        TokenKind::Keyword(_) => "keyword".to_string(),
        kind => kind.to_string().trim_matches('\'').to_string(),
    }
}

pub fn format_ast(mlm: &Mlm, source: &str, format: OutputFormat) -> Result<String, ProcessingError> {
    match format {
        OutputFormat::AstTreeviz => Ok(treeviz::to_treeviz(mlm, source)),
        OutputFormat::AstJson => Ok(serde_json::to_string_pretty(mlm)?),
        other => Err(ProcessingError::InvalidFormat(other.name().to_string())),
    }
}

pub fn format_compilation(
    compilation: &Compilation,
    format: OutputFormat,
) -> Result<String, ProcessingError> {
    match format {
        OutputFormat::Rust => Ok(compilation.render_rust()),
        OutputFormat::IrJson => Ok(serde_json::to_string_pretty(&compilation.procedure)?),
        OutputFormat::ModelJson => Ok(serde_json::to_string_pretty(&compilation.model)?),
        // Through a JSON value: serde_yaml cannot tag nested enum variants
        OutputFormat::ModelYaml => Ok(serde_yaml::to_string(&serde_json::to_value(
            &compilation.model,
        )?)?),
        OutputFormat::AstTreeviz | OutputFormat::AstJson => {
            format_ast(&compilation.mlm, &compilation.source, format)
        }
        other => Err(ProcessingError::InvalidFormat(other.name().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SOURCE: &str = "data: X := {X_concept};; logic: if X > 5 then conclude true; endif;;";

    #[rstest]
    #[case("token-simple", OutputFormat::TokenSimple)]
    #[case("ast-treeviz", OutputFormat::AstTreeviz)]
    #[case("ir-json", OutputFormat::IrJson)]
    #[case("rust", OutputFormat::Rust)]
    fn test_format_names_round_trip(#[case] name: &str, #[case] expected: OutputFormat) {
        assert_eq!(name.parse::<OutputFormat>().unwrap(), expected);
        assert_eq!(expected.to_string(), name);
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(
            "xml".parse::<OutputFormat>(),
            Err(ProcessingError::InvalidFormat(name)) if name == "xml"
        ));
    }

    #[test]
    fn test_token_simple() {
        let output = process_source("X := 5;", OutputFormat::TokenSimple, &Compiler::new()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("identifier"));
        assert!(lines[0].ends_with("0..1"));
        assert!(lines[1].starts_with(":="));
    }

    #[test]
    fn test_json_outputs_parse_back() {
        let compiler = Compiler::new();
        for format in [
            OutputFormat::TokenJson,
            OutputFormat::AstJson,
            OutputFormat::ModelJson,
            OutputFormat::IrJson,
        ] {
            let output = process_source(SOURCE, format, &compiler).unwrap();
            let value: serde_json::Value = serde_json::from_str(&output).unwrap();
            assert!(!value.is_null(), "{}", format);
        }
    }

    #[test]
    fn test_model_yaml_names_the_concept() {
        let output = process_source(SOURCE, OutputFormat::ModelYaml, &Compiler::new()).unwrap();
        assert!(output.contains("concept: X_concept"));
        assert!(output.contains("operator: GT"));
    }

    #[test]
    fn test_token_formats_fail_on_lex_error() {
        let result = process_source("x := 1 ^ 2", OutputFormat::TokenJson, &Compiler::new());
        assert!(matches!(
            result,
            Err(ProcessingError::Compile(CompileError::Lex(_)))
        ));
    }
}
