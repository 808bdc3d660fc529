//! Top-level module for the story session system.
//!
//! This module groups the deterministic pieces of a generation session:
//! - The seed catalog and its sampling helpers (`SeedCatalog`)
//! - The per-user accumulated history (`SessionState`)
//! - The keyword-based scare score (`score`)

/// Seed records, intensity filtering and random sampling.
///
/// Supports loading from JSON, JSON Lines, or scored datasets that are
/// binned into intensity levels.
pub mod catalog;

/// Append-only session history and prompt composition.
pub mod session;

/// Lexicon-based scare score.
pub mod score;
