//! pack-check library.
//!
//! This crate packs an npm package with `npm pack` and verifies the
//! resulting tarball before it is published: every file the manifest
//! declares must be present, and every relative `require` in a packaged
//! JavaScript file should resolve to a packaged file. It is used by the
//! `pack-check` CLI binary and can be driven programmatically for testing.
//!
//! # Modules
//!
//! - [`archive`] - Single-pass tarball reading and package contents
//! - [`check`] - Pack, verify, and finalize pipeline
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Layered configuration from defaults, file, and flags
//! - [`error`] - Semantic error types and exit codes
//! - [`manifest`] - `package.json` fields used for validation
//! - [`output`] - Status block rendering
//! - [`packer`] - Packer invocation behind a mockable executor
//! - [`reconcile`] - Cross-checking declared files and requires
//! - [`resolution`] - Candidate paths for a relative `require`
//! - [`scanner`] - Lexer that finds relative `require` calls

pub mod archive;
pub mod check;
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod output;
pub mod packer;
pub mod reconcile;
pub mod resolution;
pub mod scanner;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
