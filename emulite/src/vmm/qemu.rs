//! QEMU command line construction.
//!
//! [`QemuCommandBuilder::build`] resolves the boot artifacts, obtains the
//! cached blobstore image, allocates the SSH forward port and decides the
//! acceleration mode, then returns the full argument list. The result is
//! plain data: nothing is spawned, so it can be printed or inspected first.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use emulite_shared::errors::EmuliteResult;

use super::LaunchSpec;
use super::arch::TargetArch;
use super::cmdline::{EpochKernelArgs, KernelArgsProvider, build_kernel_cmdline};
use super::host_check::{Acceleration, HostProbe, SystemHost, decide_acceleration};
use crate::disk::{BlobstoreCache, DiskFormat, VolumeTools};
use crate::net::{EphemeralPortAllocator, NetworkConfig, PortAllocator};
use crate::runtime::layout::{ArtifactResolver, BootArtifacts, dirs};

/// Drive id linking `-drive` to its `-device`.
const BLOBSTORE_DRIVE_ID: &str = "blobstore";

/// Path of the system emulator binary for `arch` under `emu_root`.
pub fn emulator_binary(emu_root: &Path, arch: TargetArch) -> PathBuf {
    emu_root
        .join(dirs::BIN_DIR)
        .join(format!("qemu-system-{}", arch.legacy_arch()))
}

/// An emulator program and its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QemuCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl QemuCommand {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Values following every occurrence of `flag`, in order.
    pub fn values_of(&self, flag: &str) -> Vec<&str> {
        self.args
            .windows(2)
            .filter(|pair| pair[0] == flag)
            .map(|pair| pair[1].as_str())
            .collect()
    }

    /// Value following the first occurrence of `flag`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.values_of(flag).into_iter().next()
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| arg == flag)
    }

    /// A `std::process::Command` ready for stdio configuration and spawning.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for QemuCommand {
    /// Shell-quoted single line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-+=/.,:@%".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Output of a successful build.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub command: QemuCommand,
    /// Host side of the SSH forward to the guest's port 22
    pub host_ssh_port: u16,
    pub acceleration: Acceleration,
    pub artifacts: BootArtifacts,
    /// Extended qcow2 image attached as the blobstore drive
    pub blobstore_image: PathBuf,
}

/// Builds QEMU command lines from a [`LaunchSpec`].
pub struct QemuCommandBuilder<'a> {
    emu_root: PathBuf,
    artifacts: &'a dyn ArtifactResolver,
    volume_tools: &'a dyn VolumeTools,
    ports: &'a dyn PortAllocator,
    host: &'a dyn HostProbe,
    kernel_args: &'a dyn KernelArgsProvider,
    network: NetworkConfig,
}

impl<'a> QemuCommandBuilder<'a> {
    /// Builder with system defaults for ports, host probing and kernel args.
    pub fn new(
        emu_root: impl Into<PathBuf>,
        artifacts: &'a dyn ArtifactResolver,
        volume_tools: &'a dyn VolumeTools,
    ) -> Self {
        Self {
            emu_root: emu_root.into(),
            artifacts,
            volume_tools,
            ports: &EphemeralPortAllocator,
            host: &SystemHost,
            kernel_args: &EpochKernelArgs,
            network: NetworkConfig::default(),
        }
    }

    pub fn with_port_allocator(mut self, ports: &'a dyn PortAllocator) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_host_probe(mut self, host: &'a dyn HostProbe) -> Self {
        self.host = host;
        self
    }

    pub fn with_kernel_args(mut self, kernel_args: &'a dyn KernelArgsProvider) -> Self {
        self.kernel_args = kernel_args;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Build the emulator command for `spec`.
    pub fn build(&self, spec: &LaunchSpec) -> EmuliteResult<LaunchPlan> {
        spec.validate()?;

        let arch = spec.target_arch;
        let profile = arch.profile();
        let artifacts = self.artifacts.resolve(arch, spec.output_dir())?;

        let mut args = CommandArgs::default();
        args.flag_value("-kernel", artifacts.kernel.display());
        args.flag_value("-initrd", artifacts.initrd.display());
        args.flag_value("-m", spec.ram_size_mb);
        args.flag_value("-smp", spec.cpu_cores);

        // Snapshot mode discards guest writes to the cached image.
        let blobstore_image =
            BlobstoreCache::new(spec.output_dir(), self.volume_tools).ensure(&artifacts.blobstore)?;
        args.flag("-snapshot");
        args.flag_value(
            "-drive",
            format!(
                "file={},format={},if=none,id={},snapshot=on",
                blobstore_image.display(),
                DiskFormat::Qcow2.as_str(),
                BLOBSTORE_DRIVE_ID
            ),
        );
        args.flag_value(
            "-device",
            format!("virtio-blk-pci,drive={}", BLOBSTORE_DRIVE_ID),
        );

        // Guest console on stdio; no interactive monitor.
        args.flag_value("-serial", "stdio");
        args.flag_value("-monitor", "none");

        args.flag_value("-machine", profile.machine);

        let host_ssh_port = self.ports.allocate()?;
        args.flag_value("-netdev", self.network.netdev_arg(host_ssh_port));
        args.flag_value("-device", self.network.device_arg(profile.net_model));

        let acceleration = decide_acceleration(spec.require_kvm, arch, &spec.emu_type, self.host);
        args.extend(acceleration.cpu_args(arch));

        args.flag_value(
            "-append",
            build_kernel_cmdline(self.kernel_args.kernel_args()),
        );
        args.flag("-nographic");

        let command = QemuCommand::new(emulator_binary(&self.emu_root, arch), args.into_inner());
        tracing::debug!(command = %command, "Built emulator command");
        tracing::info!(
            arch = %arch,
            acceleration = %acceleration.describe(),
            host_ssh_port,
            "Emulator command ready"
        );

        Ok(LaunchPlan {
            command,
            host_ssh_port,
            acceleration,
            artifacts,
            blobstore_image,
        })
    }
}

/// Ordered argument accumulator.
#[derive(Default)]
struct CommandArgs(Vec<String>);

impl CommandArgs {
    fn flag(&mut self, flag: &str) {
        self.0.push(flag.to_string());
    }

    fn flag_value(&mut self, flag: &str, value: impl fmt::Display) {
        self.0.push(flag.to_string());
        self.0.push(value.to_string());
    }

    fn extend(&mut self, args: Vec<String>) {
        self.0.extend(args);
    }

    fn into_inner(self) -> Vec<String> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emulator_binary_uses_legacy_arch() {
        assert_eq!(
            emulator_binary(Path::new("/qemu"), TargetArch::Arm64),
            PathBuf::from("/qemu/bin/qemu-system-aarch64")
        );
        assert_eq!(
            emulator_binary(Path::new("/qemu"), TargetArch::X64),
            PathBuf::from("/qemu/bin/qemu-system-x86_64")
        );
    }

    #[test]
    fn test_values_of_keeps_order() {
        let command = QemuCommand::new(
            PathBuf::from("qemu"),
            vec![
                "-device".into(),
                "a".into(),
                "-m".into(),
                "1".into(),
                "-device".into(),
                "b".into(),
            ],
        );

        assert_eq!(command.values_of("-device"), vec!["a", "b"]);
        assert_eq!(command.value_of("-m"), Some("1"));
        assert_eq!(command.value_of("-smp"), None);
        assert!(command.has_flag("-m"));
    }

    #[test]
    fn test_display_quotes_when_needed() {
        let command = QemuCommand::new(
            PathBuf::from("/qemu/bin/qemu-system-x86_64"),
            vec![
                "-append".into(),
                "TERM=dumb kernel.serial=legacy".into(),
                "-cpu".into(),
                "Haswell,+smap,-check,-fsgsbase".into(),
                "it's".into(),
            ],
        );

        assert_eq!(
            command.to_string(),
            "/qemu/bin/qemu-system-x86_64 -append 'TERM=dumb kernel.serial=legacy' \
             -cpu Haswell,+smap,-check,-fsgsbase 'it'\\''s'"
        );
    }

    #[test]
    fn test_to_command_preserves_args() {
        let command = QemuCommand::new(PathBuf::from("qemu"), vec!["-m".into(), "64".into()]);
        let cmd = command.to_command();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["-m", "64"]);
        assert_eq!(cmd.get_program(), "qemu");
    }
}
