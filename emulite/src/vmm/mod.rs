//! Emulator launch configuration.

use std::path::{Path, PathBuf};

use emulite_shared::errors::{EmuliteError, EmuliteResult};
use serde::{Deserialize, Serialize};

pub mod arch;
pub mod cmdline;
pub mod host_check;
pub mod qemu;

pub use arch::{ArchProfile, TargetArch};
pub use cmdline::{EpochKernelArgs, KernelArgsProvider, StaticKernelArgs};
pub use host_check::{Acceleration, HostProbe, SystemHost, decide_acceleration};
pub use qemu::{LaunchPlan, QemuCommand, QemuCommandBuilder};

/// Default emulator variant.
pub const DEFAULT_EMU_TYPE: &str = "qemu";

/// Default number of guest CPU cores.
pub const DEFAULT_CPU_CORES: u8 = 4;

/// Default guest memory in MiB.
pub const DEFAULT_RAM_SIZE_MB: u32 = 2048;

/// Everything needed to build one emulator command line.
///
/// Built once per launch and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Guest CPU architecture
    pub target_arch: TargetArch,
    /// Emulator variant, also the name of its install directory
    pub emu_type: String,
    /// Number of guest CPU cores
    pub cpu_cores: u8,
    /// Guest memory in MiB
    pub ram_size_mb: u32,
    /// Use KVM when the host allows it
    pub require_kvm: bool,
    /// Where the emulator's console output goes (None: the tracing log)
    pub system_log_file: Option<PathBuf>,
    /// Build output directory; holds the boot image and the disk cache
    pub output_dir: PathBuf,
}

impl LaunchSpec {
    pub fn new(target_arch: TargetArch, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_arch,
            emu_type: DEFAULT_EMU_TYPE.to_string(),
            cpu_cores: DEFAULT_CPU_CORES,
            ram_size_mb: DEFAULT_RAM_SIZE_MB,
            require_kvm: true,
            system_log_file: None,
            output_dir: output_dir.into(),
        }
    }

    pub fn with_emu_type(mut self, emu_type: impl Into<String>) -> Self {
        self.emu_type = emu_type.into();
        self
    }

    pub fn with_cpu_cores(mut self, cpu_cores: u8) -> Self {
        self.cpu_cores = cpu_cores;
        self
    }

    pub fn with_ram_size_mb(mut self, ram_size_mb: u32) -> Self {
        self.ram_size_mb = ram_size_mb;
        self
    }

    pub fn with_require_kvm(mut self, require_kvm: bool) -> Self {
        self.require_kvm = require_kvm;
        self
    }

    pub fn with_system_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_log_file = Some(path.into());
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Reject sizes QEMU would refuse.
    pub fn validate(&self) -> EmuliteResult<()> {
        if self.cpu_cores == 0 {
            return Err(EmuliteError::InvalidArgument(
                "cpu_cores must be at least 1".to_string(),
            ));
        }
        if self.ram_size_mb == 0 {
            return Err(EmuliteError::InvalidArgument(
                "ram_size_mb must be at least 1".to_string(),
            ));
        }
        if self.emu_type.is_empty() {
            return Err(EmuliteError::InvalidArgument(
                "emu_type must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
