//! Emulator process management.
//!
//! [`EmulatorProcess`] spawns a built [`crate::QemuCommand`] with stdin
//! detached. Console output either goes to a system log file or is forwarded
//! line by line into tracing.

mod log_stream;
mod process;

pub use process::EmulatorProcess;
