//! Error types shared by every emulite crate.
//!
//! Variants follow how a launch attempt can fail:
//! - [`EmuliteError::NotFound`]: a boot artifact or source volume is missing
//! - [`EmuliteError::ToolExecution`]: a subprocess exited unsuccessfully
//! - [`EmuliteError::ResourceUnavailable`]: no free host port could be obtained
//!
//! Degraded acceleration is never an error; it is logged and the launch goes on
//! in software emulation mode.

use thiserror::Error;

/// Errors that can occur while preparing or running an emulator instance.
#[derive(Debug, Error)]
pub enum EmuliteError {
    /// A required file (kernel, boot image, storage volume, tool) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An external tool exited non-zero or could not be spawned.
    #[error("command `{command}` failed ({status}){}", format_stderr(.stderr))]
    ToolExecution {
        /// The failing command line, program first.
        command: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Captured standard error, possibly empty.
        stderr: String,
    },

    /// A host resource such as a TCP port could not be obtained.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Filesystem operation failed (cache files, temporary copies).
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration file or option is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied an argument outside the accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Result alias used throughout emulite.
pub type EmuliteResult<T> = Result<T, EmuliteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_execution_display_includes_command_and_stderr() {
        let err = EmuliteError::ToolExecution {
            command: "qemu-img convert -f raw".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "disk full\n".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "command `qemu-img convert -f raw` failed (exit status: 1): disk full"
        );
    }

    #[test]
    fn test_tool_execution_display_without_stderr() {
        let err = EmuliteError::ToolExecution {
            command: "fvm".to_string(),
            status: "exit status: 2".to_string(),
            stderr: "   ".to_string(),
        };

        assert_eq!(err.to_string(), "command `fvm` failed (exit status: 2)");
    }
}
