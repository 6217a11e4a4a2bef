//! Guest architectures and their QEMU machine profiles.

use std::fmt;
use std::str::FromStr;

use emulite_shared::errors::EmuliteError;
use serde::{Deserialize, Serialize};

/// Guest CPU architecture, named the way the SDK names it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetArch {
    Arm64,
    X64,
}

/// Everything that differs between architectures when building the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchProfile {
    /// Value for `-machine`
    pub machine: &'static str,
    /// NIC model for the guest network `-device`
    pub net_model: &'static str,
    /// `-cpu` value under KVM
    pub cpu_accelerated: &'static str,
    /// `-cpu` value under software emulation
    pub cpu_software: &'static str,
    /// Kernel-style arch name: QEMU binary suffix and host `uname -m`
    pub legacy_arch: &'static str,
}

const PROFILES: &[(TargetArch, ArchProfile)] = &[
    (
        TargetArch::Arm64,
        ArchProfile {
            machine: "virt",
            net_model: "virtio-net-pci",
            cpu_accelerated: "host,migratable=no",
            cpu_software: "cortex-a53",
            legacy_arch: "aarch64",
        },
    ),
    (
        TargetArch::X64,
        ArchProfile {
            machine: "q35",
            net_model: "e1000",
            cpu_accelerated: "host,migratable=no",
            cpu_software: "Haswell,+smap,-check,-fsgsbase",
            legacy_arch: "x86_64",
        },
    ),
];

impl TargetArch {
    pub const ALL: [TargetArch; 2] = [TargetArch::Arm64, TargetArch::X64];

    /// SDK directory name (`arm64`, `x64`).
    pub fn sdk_arch(&self) -> &'static str {
        match self {
            TargetArch::Arm64 => "arm64",
            TargetArch::X64 => "x64",
        }
    }

    /// Kernel-style name (`aarch64`, `x86_64`).
    pub fn legacy_arch(&self) -> &'static str {
        self.profile().legacy_arch
    }

    pub fn profile(&self) -> &'static ArchProfile {
        PROFILES
            .iter()
            .find(|(arch, _)| arch == self)
            .map(|(_, profile)| profile)
            .unwrap_or_else(|| unreachable!("every TargetArch has a profile"))
    }

    /// Whether a host reporting `machine` (as `uname -m`) runs this arch natively.
    pub fn matches_host(&self, machine: &str) -> bool {
        self.legacy_arch() == machine
    }
}

impl fmt::Display for TargetArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sdk_arch())
    }
}

impl FromStr for TargetArch {
    type Err = EmuliteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arm64" | "aarch64" => Ok(TargetArch::Arm64),
            "x64" | "x86_64" => Ok(TargetArch::X64),
            _ => Err(EmuliteError::InvalidArgument(format!(
                "Unknown target cpu: '{}'. Supported: arm64, x64",
                s
            ))),
        }
    }
}
