//! Runtime configuration and wiring of the default collaborators.

pub mod constants;
mod core;
pub mod layout;
pub mod options;

pub use core::EmuliteRuntime;
