//! Configuration loading
//!
//! `defaults/arden.default.toml` is embedded into the binary so that the documented
//! defaults and runtime behavior stay in sync. User files and command-line overrides are
//! layered on top via [`Loader`] before deserializing into [`ArdenConfig`].

use crate::mlm::generation::RenderOptions;
use crate::mlm::pipeline::Compiler;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/arden.default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct ArdenConfig {
    pub parsing: ParsingConfig,
    pub diagnostics: DiagnosticsConfig,
    pub codegen: RenderOptions,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsingConfig {
    pub max_errors: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsConfig {
    /// Fail on warnings as well as errors
    pub deny_warnings: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub default_format: String,
}

impl ArdenConfig {
    /// A compiler using these settings.
    pub fn compiler(&self) -> Compiler {
        Compiler::new()
            .with_max_errors(self.parsing.max_errors)
            .with_render_options(self.codegen.clone())
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file, ignored if absent.
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override, e.g. from a command-line flag.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<ArdenConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn load_defaults() -> Result<ArdenConfig, ConfigError> {
    Loader::new().build()
}
