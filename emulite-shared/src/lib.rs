//! Emulite shared types
//!
//! Error types used across the launcher crates, plus the newline-delimited
//! test result format that test harnesses built on top of emulite emit.

pub mod errors;
pub mod results;

pub use errors::{EmuliteError, EmuliteResult};
