//! Session-based horror story generation library.
//!
//! This crate provides the core of an interactive "pick a seed, get a
//! continuation" generator, including:
//! - A seed catalog with intensity filtering and random sampling
//! - Per-user session state that accumulates generated segments into a prompt
//! - A keyword-based scare score
//! - A generation gateway abstraction with HTTP and offline implementations
//!
//! Presentation (web server, terminal) lives in the sibling crates.

/// Seeds, sessions and scoring.
///
/// Everything here is deterministic given its inputs; randomness is always
/// passed in by the caller.
pub mod story;

/// Text-completion backends.
///
/// Exposes the `GenerationGateway` trait, generation parameters and the
/// concrete gateways.
pub mod gateway;

/// Environment-driven configuration shared by the binaries.
pub mod config;

/// I/O utilities (file loading, path helpers).
///
/// Not exposed
pub(crate) mod io;
