//! A library for categorizing crashes that happen inside JIT-generated code
//!
//! This crate reads a minidump, decides from region metadata whether the fault
//! is in JIT code at all, and if so decodes the surrounding machine code to
//! label the crash with one of a small set of categories.

pub mod analyzer;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod errors;
pub mod models;
pub mod snapshot;
pub mod utils;

use std::path::Path;

use crate::analyzer::Analyzer;
use crate::config::CategorizerConfig;
use crate::errors::CategorizerResult;
use crate::models::Categorization;
use crate::snapshot::Snapshot;

/// Main entry point for categorizing a crash from a minidump file
///
/// `pc_override` replaces the program counter found in the exception context.
/// Errors are only returned when the snapshot or configuration cannot be used;
/// every analysis outcome is a [`Categorization`].
pub fn categorize_file(
    path: &Path,
    config: CategorizerConfig,
    pc_override: Option<u64>,
) -> CategorizerResult<Categorization> {
    let analyzer = Analyzer::new(config)?;
    let snapshot = Snapshot::from_file(path)?;
    Ok(analyzer.categorize_snapshot(&snapshot, pc_override))
}

/// Version of the categorizer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
