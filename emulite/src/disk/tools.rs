//! External volume tools (`fvm`, `qemu-img`).
//!
//! The cache only talks to these through [`VolumeTools`], so tests can swap
//! in recording fakes instead of real SDK binaries.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use emulite_shared::errors::{EmuliteError, EmuliteResult};

/// Operations the volume cache needs from the outside world.
pub trait VolumeTools {
    /// Grow `volume` in place to `length` bytes.
    ///
    /// `original` is the untouched source volume the copy was made from.
    fn extend(&self, volume: &Path, length: u64, original: &Path) -> EmuliteResult<()>;

    /// Write a compressed qcow2 image of the raw volume `source` to `dest`.
    fn convert_to_qcow2(&self, source: &Path, dest: &Path) -> EmuliteResult<()>;
}

/// [`VolumeTools`] backed by the SDK `fvm` binary and `qemu-img`.
#[derive(Debug, Clone)]
pub struct ExternalVolumeTools {
    fvm: PathBuf,
    qemu_img: PathBuf,
}

impl ExternalVolumeTools {
    pub fn new(fvm: impl Into<PathBuf>, qemu_img: impl Into<PathBuf>) -> Self {
        Self {
            fvm: fvm.into(),
            qemu_img: qemu_img.into(),
        }
    }

    /// `<fvm> <volume> extend --length <bytes> <original>`
    pub fn extend_command(&self, volume: &Path, length: u64, original: &Path) -> Command {
        let mut cmd = Command::new(&self.fvm);
        cmd.arg(volume)
            .arg("extend")
            .arg("--length")
            .arg(length.to_string())
            .arg(original);
        cmd
    }

    /// `<qemu-img> convert -f raw -O qcow2 -c <source> <dest>`
    pub fn convert_command(&self, source: &Path, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.qemu_img);
        cmd.args(["convert", "-f", "raw", "-O", "qcow2", "-c"])
            .arg(source)
            .arg(dest);
        cmd
    }
}

impl VolumeTools for ExternalVolumeTools {
    fn extend(&self, volume: &Path, length: u64, original: &Path) -> EmuliteResult<()> {
        run_tool(&mut self.extend_command(volume, length, original))
    }

    fn convert_to_qcow2(&self, source: &Path, dest: &Path) -> EmuliteResult<()> {
        run_tool(&mut self.convert_command(source, dest))
    }
}

/// Render a command as a single line, program first.
pub fn describe_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a tool to completion, mapping spawn failures and non-zero exits.
pub(crate) fn run_tool(cmd: &mut Command) -> EmuliteResult<()> {
    let command = describe_command(cmd);
    tracing::debug!(command = %command, "Running tool");

    let output = cmd.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            EmuliteError::NotFound(format!(
                "tool '{}' not found",
                cmd.get_program().to_string_lossy()
            ))
        } else {
            EmuliteError::ToolExecution {
                command: command.clone(),
                status: format!("failed to spawn: {}", e),
                stderr: String::new(),
            }
        }
    })?;

    if !output.status.success() {
        return Err(EmuliteError::ToolExecution {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(())
}
