//! KVM acceleration detection.
//!
//! KVM is only usable on a Linux host whose `/dev/kvm` is readable and
//! writable by the current user, and only when the guest architecture matches
//! the host's. Anything else falls back to software emulation; that fallback
//! is logged but never fails the launch.

use std::ffi::CStr;
use std::path::Path;
use std::sync::OnceLock;

use super::arch::TargetArch;

const KVM_DEVICE: &str = "/dev/kvm";

/// Facts about the host that decide whether KVM can be used.
pub trait HostProbe {
    /// Operating system name, as in `std::env::consts::OS`.
    fn os(&self) -> &str;

    /// Machine architecture, as reported by `uname -m` at runtime.
    fn machine(&self) -> &str;

    /// `Ok` when `/dev/kvm` can be opened read-write, else a diagnostic.
    fn kvm_access(&self) -> Result<(), String>;
}

/// The machine this process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostProbe for SystemHost {
    fn os(&self) -> &str {
        std::env::consts::OS
    }

    fn machine(&self) -> &str {
        static MACHINE: OnceLock<String> = OnceLock::new();
        MACHINE.get_or_init(|| uname_machine().unwrap_or_else(|| std::env::consts::ARCH.to_string()))
    }

    fn kvm_access(&self) -> Result<(), String> {
        check_kvm_device(Path::new(KVM_DEVICE))
    }
}

/// Machine field of `uname(2)`. Differs from the build target when the
/// binary runs under user-mode emulation.
fn uname_machine() -> Option<String> {
    let mut name: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut name) } != 0 {
        return None;
    }
    let machine = unsafe { CStr::from_ptr(name.machine.as_ptr()) };
    Some(machine.to_string_lossy().into_owned())
}

/// Verify that the KVM device at `kvm_path` exists and is accessible.
fn check_kvm_device(kvm_path: &Path) -> Result<(), String> {
    if !kvm_path.exists() {
        return Err(format!(
            "{} does not exist\n\n\
             Suggestions:\n\
             - Enable KVM in your BIOS/UEFI settings (VT-x for Intel, AMD-V for AMD)\n\
             - Check if kvm module is loaded: lsmod | grep kvm",
            kvm_path.display()
        ));
    }

    match std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(kvm_path)
    {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(format!(
            "{} exists but access denied (permissions)\n\n\
             Suggestions:\n\
             - Add your user to the kvm group: sudo usermod -aG kvm $USER\n\
             - Log out and log back in for group changes to take effect",
            kvm_path.display()
        )),
        Err(e) => Err(format!(
            "{} exists but couldn't be accessed: {}",
            kvm_path.display(),
            e
        )),
    }
}

/// How the guest CPU will run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceleration {
    /// KVM was not requested.
    Disabled,
    /// KVM was requested but cannot be used; the guest will be slow.
    Unavailable { reason: String },
    /// Hardware-assisted virtualization with host CPU passthrough.
    Kvm,
}

impl Acceleration {
    pub fn is_kvm(&self) -> bool {
        matches!(self, Acceleration::Kvm)
    }

    /// CPU flags for `arch` under this mode.
    pub fn cpu_args(&self, arch: TargetArch) -> Vec<String> {
        let profile = arch.profile();
        match self {
            Acceleration::Kvm => vec![
                "-enable-kvm".to_string(),
                "-cpu".to_string(),
                profile.cpu_accelerated.to_string(),
            ],
            Acceleration::Disabled | Acceleration::Unavailable { .. } => {
                vec!["-cpu".to_string(), profile.cpu_software.to_string()]
            }
        }
    }

    /// Short human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Acceleration::Disabled => "software emulation (KVM not requested)".to_string(),
            Acceleration::Unavailable { reason } => {
                format!("software emulation (KVM unavailable: {})", reason)
            }
            Acceleration::Kvm => "KVM".to_string(),
        }
    }
}

/// Decide the acceleration mode for a guest of `arch` on `host`.
///
/// Logs a warning when KVM was requested but cannot be used.
pub fn decide_acceleration(
    require_kvm: bool,
    arch: TargetArch,
    emu_type: &str,
    host: &dyn HostProbe,
) -> Acceleration {
    if !require_kvm {
        return Acceleration::Disabled;
    }

    let unavailable = if host.os() != "linux" {
        Some(format!("KVM requires a Linux host, not {}", host.os()))
    } else if let Err(reason) = host.kvm_access() {
        Some(reason)
    } else if !arch.matches_host(host.machine()) {
        Some(format!(
            "guest arch {} does not match host arch {}",
            arch.legacy_arch(),
            host.machine()
        ))
    } else {
        None
    };

    match unavailable {
        None => Acceleration::Kvm,
        Some(reason) => {
            tracing::warn!(
                emulator = %emu_type,
                reason = %reason,
                "Unable to launch {} with KVM acceleration. The guest VM will be slow.",
                emu_type
            );
            Acceleration::Unavailable { reason }
        }
    }
}
