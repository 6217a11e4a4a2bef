//! Spawning and supervising the emulator subprocess.

use std::fs::File;
use std::path::Path;
use std::process::{Child, ExitStatus, Stdio};

use emulite_shared::errors::{EmuliteError, EmuliteResult};

use super::log_stream::LogStreamHandler;
use crate::vmm::QemuCommand;

/// A running emulator.
pub struct EmulatorProcess {
    child: Child,
    command: String,
    log_stream: Option<LogStreamHandler>,
}

impl EmulatorProcess {
    /// Spawn `command` with stdin detached.
    ///
    /// With `system_log_file`, stdout and stderr are both written to that file
    /// (truncated first). Without it they are forwarded into tracing.
    pub fn spawn(command: &QemuCommand, system_log_file: Option<&Path>) -> EmuliteResult<Self> {
        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null());

        if let Some(path) = system_log_file {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EmuliteError::Storage(format!(
                        "Failed to create log directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            let stdout = File::create(path).map_err(|e| {
                EmuliteError::Storage(format!(
                    "Failed to open system log {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let stderr = stdout.try_clone().map_err(|e| {
                EmuliteError::Storage(format!(
                    "Failed to duplicate system log handle {}: {}",
                    path.display(),
                    e
                ))
            })?;
            cmd.stdout(stdout).stderr(stderr);
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EmuliteError::NotFound(format!(
                    "emulator binary {} not found",
                    command.program().display()
                ))
            } else {
                EmuliteError::ToolExecution {
                    command: command.to_string(),
                    status: format!("failed to spawn: {}", e),
                    stderr: String::new(),
                }
            }
        })?;

        let log_stream = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => match LogStreamHandler::new(stdout, stderr) {
                Ok(handler) => Some(handler),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e);
                }
            },
            _ => None,
        };

        tracing::info!(
            pid = child.id(),
            program = %command.program().display(),
            system_log = ?system_log_file,
            "Emulator started"
        );

        Ok(Self {
            child,
            command: command.to_string(),
            log_stream,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Exit status if the emulator has already exited.
    pub fn try_wait(&mut self) -> EmuliteResult<Option<ExitStatus>> {
        self.child
            .try_wait()
            .map_err(|e| EmuliteError::Internal(format!("Failed to poll emulator: {}", e)))
    }

    /// Block until the emulator exits. A non-zero exit is a `ToolExecution`
    /// error.
    pub fn wait(mut self) -> EmuliteResult<()> {
        let status = self
            .child
            .wait()
            .map_err(|e| EmuliteError::Internal(format!("Failed to wait for emulator: {}", e)))?;

        if let Some(handler) = self.log_stream.take() {
            handler.shutdown();
        }

        tracing::info!(pid = self.child.id(), %status, "Emulator exited");

        if status.success() {
            Ok(())
        } else {
            Err(EmuliteError::ToolExecution {
                command: self.command.clone(),
                status: status.to_string(),
                stderr: String::new(),
            })
        }
    }

    /// Kill the emulator and reap it.
    pub fn kill(mut self) -> EmuliteResult<()> {
        if let Err(e) = self.child.kill()
            && e.kind() != std::io::ErrorKind::InvalidInput
        {
            return Err(EmuliteError::Internal(format!(
                "Failed to kill emulator {}: {}",
                self.child.id(),
                e
            )));
        }
        let _ = self.child.wait();
        if let Some(handler) = self.log_stream.take() {
            handler.shutdown();
        }
        tracing::info!(pid = self.child.id(), "Emulator killed");
        Ok(())
    }
}

impl Drop for EmulatorProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sh(script: &str) -> QemuCommand {
        QemuCommand::new(
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), script.to_string()],
        )
    }

    #[test]
    fn test_successful_exit() {
        let process = EmulatorProcess::spawn(&sh("echo booted; echo oops >&2"), None).unwrap();
        process.wait().unwrap();
    }

    #[test]
    fn test_non_zero_exit_is_tool_execution() {
        let process = EmulatorProcess::spawn(&sh("exit 3"), None).unwrap();
        match process.wait() {
            Err(EmuliteError::ToolExecution { command, status, .. }) => {
                assert!(command.starts_with("/bin/sh"));
                assert!(status.contains('3'));
            }
            other => panic!("expected ToolExecution, got {:?}", other),
        }
    }

    #[test]
    fn test_output_goes_to_system_log() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("logs").join("system.log");

        let process =
            EmulatorProcess::spawn(&sh("echo console; echo diag >&2"), Some(&log)).unwrap();
        process.wait().unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("console"));
        assert!(content.contains("diag"));
    }

    #[test]
    fn test_stdin_is_detached() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("system.log");

        let process =
            EmulatorProcess::spawn(&sh("cat; echo done"), Some(&log)).unwrap();
        process.wait().unwrap();

        assert_eq!(std::fs::read_to_string(&log).unwrap(), "done\n");
    }

    #[test]
    fn test_missing_binary() {
        let command = QemuCommand::new(PathBuf::from("/nonexistent/qemu-system-x86_64"), vec![]);
        assert!(matches!(
            EmulatorProcess::spawn(&command, None),
            Err(EmuliteError::NotFound(_))
        ));
    }

    #[test]
    fn test_kill_running_emulator() {
        let mut process = EmulatorProcess::spawn(&sh("exec sleep 30"), None).unwrap();
        assert!(process.try_wait().unwrap().is_none());
        process.kill().unwrap();
    }
}
