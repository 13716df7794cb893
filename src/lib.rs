//! # arden
//!
//! A compiler for Arden Syntax medical logic modules (MLMs).
//!
//! An MLM is tokenized, parsed into a syntax tree with error recovery, reduced to a rule
//! model of concept reads, comparisons and conclusions, and finally reconstructed into a
//! structured procedure that renders as Rust source. See [`mlm::pipeline`] for the entry
//! point and [`config`] for the settings the command-line tool reads.
//!
//! ## Testing
//!
//! Tests that need a whole MLM use the verified sample corpus through
//! [`mlm::testing::MlmSamples`] rather than inline sources.

pub mod config;
pub mod mlm;
