//! Shared fixtures for emulite integration tests.
//!
//! [`SdkFixture`] lays out a throwaway SDK tree with fake `fvm`, `qemu-img`
//! and `qemu-system-*` shell scripts, so the real launch pipeline can run
//! end to end without an SDK or QEMU installed. The in-process fakes stand in
//! for the collaborator traits when no subprocess is wanted.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use emulite::disk::VolumeTools;
use emulite::net::PortAllocator;
use emulite::vmm::HostProbe;
use emulite::{EmuliteError, EmuliteOptions, EmuliteResult, TargetArch};
use parking_lot::Mutex;
use tempfile::TempDir;

pub use emulite::vmm::StaticKernelArgs;

/// Contents written to every fake `storage-full.blk`.
pub const BLOBSTORE_CONTENTS: &[u8] = b"fake fvm blobstore\n";

// Each script appends `<tool> <args...>` to the log file substituted for
// `@LOG@`.
const FAKE_FVM: &str = r#"#!/bin/sh
echo "fvm $*" >> '@LOG@'
printf 'extended %s\n' "$4" >> "$1"
"#;

const FAKE_QEMU_IMG: &str = r#"#!/bin/sh
echo "qemu-img $*" >> '@LOG@'
cp "$7" "$8"
"#;

const FAILING_QEMU_IMG: &str = r#"#!/bin/sh
echo "qemu-img $*" >> '@LOG@'
echo "qemu-img: Could not open '$7': Invalid argument" >&2
exit 1
"#;

/// Prints its arguments and exits with `$EMULITE_FAKE_QEMU_EXIT` (default 0).
const FAKE_EMULATOR: &str = r#"#!/bin/sh
echo "qemu-system $*"
exit ${EMULITE_FAKE_QEMU_EXIT:-0}
"#;

/// A temporary SDK, emulator install and output directory.
pub struct SdkFixture {
    dir: TempDir,
}

impl SdkFixture {
    /// Fixture with boot artifacts for every architecture and working tools.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let fixture = Self { dir };

        for arch in TargetArch::ALL {
            fixture.write_file(&fixture.kernel(arch), b"kernel");
            fixture.write_file(&fixture.blobstore_source(arch), BLOBSTORE_CONTENTS);
            fixture.write_script(
                &fixture.emu_root().join("bin").join(format!("qemu-system-{}", arch.legacy_arch())),
                FAKE_EMULATOR,
            );
        }
        fixture.write_file(&fixture.boot_image(), b"zbi");
        fixture.write_script(&fixture.fvm_path(), FAKE_FVM);
        fixture.write_script(&fixture.qemu_img_path(), FAKE_QEMU_IMG);
        fixture.write_file(&fixture.tool_log(), b"");

        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn sdk_root(&self) -> PathBuf {
        self.root().join("sdk")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("out")
    }

    pub fn emu_root(&self) -> PathBuf {
        self.root().join("qemu")
    }

    pub fn fvm_path(&self) -> PathBuf {
        self.sdk_root().join("tools").join("fvm")
    }

    pub fn qemu_img_path(&self) -> PathBuf {
        self.emu_root().join("bin").join("qemu-img")
    }

    /// Log of fake tool invocations.
    pub fn tool_log(&self) -> PathBuf {
        self.root().join("tool-calls.log")
    }

    fn target_dir(&self, arch: TargetArch) -> PathBuf {
        self.sdk_root()
            .join("images")
            .join(arch.sdk_arch())
            .join("qemu")
    }

    pub fn kernel(&self, arch: TargetArch) -> PathBuf {
        self.target_dir(arch).join("qemu-kernel.kernel")
    }

    pub fn blobstore_source(&self, arch: TargetArch) -> PathBuf {
        self.target_dir(arch).join("storage-full.blk")
    }

    pub fn boot_image(&self) -> PathBuf {
        self.output_dir().join("gen").join("fuchsia-qemu.zbi")
    }

    pub fn cached_image(&self) -> PathBuf {
        self.output_dir().join("gen").join("blobstore.qcow")
    }

    pub fn cached_hash(&self) -> PathBuf {
        self.output_dir().join("gen").join("blobstore.hash")
    }

    /// Options pointing at this fixture, with KVM left off.
    pub fn options(&self) -> EmuliteOptions {
        let mut options = EmuliteOptions::new(self.sdk_root(), self.output_dir());
        options.emu_root = Some(self.emu_root());
        options.fvm_tool = Some(self.fvm_path());
        options.qemu_img_tool = Some(self.qemu_img_path());
        options.require_kvm = false;
        options
    }

    /// Write a YAML config file equivalent to [`Self::options`]; returns its path.
    pub fn write_config(&self) -> PathBuf {
        let path = self.root().join("config.yaml");
        let yaml = format!(
            "sdk_root: {}\noutput_dir: {}\nemu_root: {}\nfvm_tool: {}\nqemu_img_tool: {}\nrequire_kvm: false\n",
            self.sdk_root().display(),
            self.output_dir().display(),
            self.emu_root().display(),
            self.fvm_path().display(),
            self.qemu_img_path().display(),
        );
        self.write_file(&path, yaml.as_bytes());
        path
    }

    /// Replace the source volume contents for `arch`.
    pub fn write_blobstore(&self, arch: TargetArch, contents: &[u8]) {
        self.write_file(&self.blobstore_source(arch), contents);
    }

    /// Make every subsequent `qemu-img` call fail.
    pub fn break_qemu_img(&self) {
        self.write_script(&self.qemu_img_path(), FAILING_QEMU_IMG);
    }

    /// Logged invocations, oldest first.
    pub fn tool_calls(&self) -> Vec<String> {
        fs::read_to_string(self.tool_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Number of logged invocations of `tool` (`"fvm"` or `"qemu-img"`).
    pub fn call_count(&self, tool: &str) -> usize {
        let prefix = format!("{} ", tool);
        self.tool_calls()
            .iter()
            .filter(|line| line.starts_with(&prefix))
            .count()
    }

    fn write_file(&self, path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().expect("fixture paths have a parent"))
            .expect("Failed to create fixture directory");
        fs::write(path, contents).expect("Failed to write fixture file");
    }

    fn write_script(&self, path: &Path, body: &str) {
        let body = body.replace("@LOG@", &self.tool_log().to_string_lossy());
        self.write_file(path, body.as_bytes());
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
    }
}

impl Default for SdkFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// One call made to [`RecordingVolumeTools`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Extend {
        volume: PathBuf,
        length: u64,
        original: PathBuf,
    },
    Convert {
        source: PathBuf,
        dest: PathBuf,
    },
}

/// In-process [`VolumeTools`] that records calls and copies files.
#[derive(Default)]
pub struct RecordingVolumeTools {
    calls: Mutex<Vec<ToolCall>>,
    fail_convert: bool,
}

impl RecordingVolumeTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tools whose conversion always fails.
    pub fn failing_convert() -> Self {
        Self {
            fail_convert: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().clone()
    }

    pub fn convert_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ToolCall::Convert { .. }))
            .count()
    }
}

impl VolumeTools for RecordingVolumeTools {
    fn extend(&self, volume: &Path, length: u64, original: &Path) -> EmuliteResult<()> {
        self.calls.lock().push(ToolCall::Extend {
            volume: volume.to_path_buf(),
            length,
            original: original.to_path_buf(),
        });
        Ok(())
    }

    fn convert_to_qcow2(&self, source: &Path, dest: &Path) -> EmuliteResult<()> {
        self.calls.lock().push(ToolCall::Convert {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
        });
        if self.fail_convert {
            return Err(EmuliteError::ToolExecution {
                command: format!("qemu-img convert {}", source.display()),
                status: "exit status: 1".to_string(),
                stderr: "conversion failed".to_string(),
            });
        }
        fs::copy(source, dest)
            .map(|_| ())
            .map_err(|e| EmuliteError::Storage(e.to_string()))
    }
}

/// Always hands out the same port.
#[derive(Debug, Clone, Copy)]
pub struct FixedPortAllocator(pub u16);

impl PortAllocator for FixedPortAllocator {
    fn allocate(&self) -> EmuliteResult<u16> {
        Ok(self.0)
    }
}

/// Never has a port to give.
#[derive(Debug, Clone, Copy)]
pub struct ExhaustedPortAllocator;

impl PortAllocator for ExhaustedPortAllocator {
    fn allocate(&self) -> EmuliteResult<u16> {
        Err(EmuliteError::ResourceUnavailable(
            "no free host TCP port".to_string(),
        ))
    }
}

/// Host with fixed OS, machine and `/dev/kvm` accessibility.
#[derive(Debug, Clone)]
pub struct FakeHost {
    pub os: String,
    pub machine: String,
    pub kvm_error: Option<String>,
}

impl FakeHost {
    /// Linux host of the given machine arch with usable KVM.
    pub fn linux(machine: &str) -> Self {
        Self {
            os: "linux".to_string(),
            machine: machine.to_string(),
            kvm_error: None,
        }
    }

    pub fn macos(machine: &str) -> Self {
        Self {
            os: "macos".to_string(),
            ..Self::linux(machine)
        }
    }

    pub fn without_kvm_access(mut self, reason: &str) -> Self {
        self.kvm_error = Some(reason.to_string());
        self
    }
}

impl HostProbe for FakeHost {
    fn os(&self) -> &str {
        &self.os
    }

    fn machine(&self) -> &str {
        &self.machine
    }

    fn kvm_access(&self) -> Result<(), String> {
        match &self.kvm_error {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }
}

/// Kernel args with a fixed epoch, for exact command comparisons.
pub fn fixed_epoch_args() -> StaticKernelArgs {
    StaticKernelArgs(vec!["devmgr.epoch=1700000000".to_string()])
}
