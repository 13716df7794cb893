//! Main module for the MLM compiler

pub mod ast;
pub mod building;
pub mod diagnostics;
pub mod formats;
pub mod generation;
pub mod lexing;
pub mod parsing;
pub mod pipeline;
pub mod testing;
pub mod token;
