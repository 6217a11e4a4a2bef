//! Configuration for Emulite.

use std::path::{Path, PathBuf};

use emulite_shared::errors::{EmuliteError, EmuliteResult};
use serde::{Deserialize, Serialize};

use crate::disk::ExternalVolumeTools;
use crate::net::NetworkConfig;
use crate::runtime::constants::{CONFIG_FILE, envs};
use crate::runtime::layout::{SdkLayout, dirs, files};
use crate::vmm::{DEFAULT_CPU_CORES, DEFAULT_EMU_TYPE, DEFAULT_RAM_SIZE_MB};

/// Paths and defaults shared by every launch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmuliteOptions {
    /// Root of the SDK (images and tools).
    pub sdk_root: PathBuf,

    /// Build output directory holding the boot image and disk cache.
    pub output_dir: PathBuf,

    /// SDK images directory. Default: `<sdk_root>/images`
    #[serde(default)]
    pub images_root: Option<PathBuf>,

    /// Directory containing the emulator install directories.
    ///
    /// Default: parent of `sdk_root`
    #[serde(default)]
    pub emulators_root: Option<PathBuf>,

    /// Explicit emulator install directory, overriding the derived one.
    #[serde(default)]
    pub emu_root: Option<PathBuf>,

    /// `fvm` binary. Default: `<sdk_root>/tools/fvm`
    #[serde(default)]
    pub fvm_tool: Option<PathBuf>,

    /// `qemu-img` binary. Default: `bin/qemu-img` under the qemu install
    #[serde(default)]
    pub qemu_img_tool: Option<PathBuf>,

    /// Boot image file name inside `<output_dir>/gen`.
    #[serde(default = "default_boot_image_name")]
    pub boot_image_name: String,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default = "default_emu_type")]
    pub emu_type: String,

    #[serde(default = "default_cpu_cores")]
    pub cpu_cores: u8,

    #[serde(default = "default_ram_size_mb")]
    pub ram_size_mb: u32,

    #[serde(default = "default_require_kvm")]
    pub require_kvm: bool,
}

fn default_boot_image_name() -> String {
    files::BOOT_IMAGE.to_string()
}

fn default_emu_type() -> String {
    DEFAULT_EMU_TYPE.to_string()
}

fn default_cpu_cores() -> u8 {
    DEFAULT_CPU_CORES
}

fn default_ram_size_mb() -> u32 {
    DEFAULT_RAM_SIZE_MB
}

fn default_require_kvm() -> bool {
    true
}

impl EmuliteOptions {
    pub fn new(sdk_root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            sdk_root: sdk_root.into(),
            output_dir: output_dir.into(),
            images_root: None,
            emulators_root: None,
            emu_root: None,
            fvm_tool: None,
            qemu_img_tool: None,
            boot_image_name: default_boot_image_name(),
            network: NetworkConfig::default(),
            emu_type: default_emu_type(),
            cpu_cores: default_cpu_cores(),
            ram_size_mb: default_ram_size_mb(),
            require_kvm: default_require_kvm(),
        }
    }

    /// Default config file location (`~/.config/emulite/config.yaml`), or the
    /// path in `EMULITE_CONFIG` when set.
    pub fn default_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(envs::EMULITE_CONFIG) {
            return Some(PathBuf::from(path));
        }
        ::dirs::config_dir().map(|dir| dir.join("emulite").join(CONFIG_FILE))
    }

    pub fn images_root(&self) -> PathBuf {
        self.images_root
            .clone()
            .unwrap_or_else(|| self.sdk_root.join(dirs::IMAGES_DIR))
    }

    /// Install directory for the emulator variant `emu_type`.
    ///
    /// `emu_root` wins for the configured variant; otherwise
    /// `<emulators_root>/<emu_type>-<host os>-<host arch>`.
    pub fn emu_root_for(&self, emu_type: &str) -> PathBuf {
        if emu_type == self.emu_type
            && let Some(root) = &self.emu_root
        {
            return root.clone();
        }

        let emulators_root = self.emulators_root.clone().unwrap_or_else(|| {
            self.sdk_root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.sdk_root.clone())
        });
        emulators_root.join(format!("{}-{}-{}", emu_type, host_os_tag(), host_arch_tag()))
    }

    pub fn fvm_tool(&self) -> PathBuf {
        self.fvm_tool
            .clone()
            .unwrap_or_else(|| self.sdk_root.join(dirs::TOOLS_DIR).join("fvm"))
    }

    /// `qemu-img` always comes from the plain qemu install.
    pub fn qemu_img_tool(&self) -> PathBuf {
        self.qemu_img_tool.clone().unwrap_or_else(|| {
            self.emu_root_for(DEFAULT_EMU_TYPE)
                .join(dirs::BIN_DIR)
                .join("qemu-img")
        })
    }

    pub fn sdk_layout(&self) -> SdkLayout {
        SdkLayout::new(self.images_root()).with_boot_image_name(self.boot_image_name.clone())
    }

    pub fn volume_tools(&self) -> ExternalVolumeTools {
        ExternalVolumeTools::new(self.fvm_tool(), self.qemu_img_tool())
    }

    pub fn validate(&self) -> EmuliteResult<()> {
        if self.sdk_root.as_os_str().is_empty() {
            return Err(EmuliteError::Config("sdk_root must be set".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(EmuliteError::Config("output_dir must be set".to_string()));
        }
        if self.boot_image_name.is_empty() {
            return Err(EmuliteError::Config(
                "boot_image_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Host OS as used in emulator directory names.
fn host_os_tag() -> &'static str {
    match std::env::consts::OS {
        "macos" => "mac",
        other => other,
    }
}

/// Host arch as used in emulator directory names.
fn host_arch_tag() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let options = EmuliteOptions::new("/src/third_party/sdk", "/src/out/Release");

        assert_eq!(options.images_root(), PathBuf::from("/src/third_party/sdk/images"));
        assert_eq!(options.fvm_tool(), PathBuf::from("/src/third_party/sdk/tools/fvm"));

        let emu_root = options.emu_root_for("qemu");
        assert_eq!(emu_root.parent().unwrap(), Path::new("/src/third_party"));
        let name = emu_root.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("qemu-"));

        assert_eq!(options.qemu_img_tool(), emu_root.join("bin").join("qemu-img"));
    }

    #[test]
    fn test_explicit_paths_win() {
        let mut options = EmuliteOptions::new("/sdk", "/out");
        options.emu_root = Some(PathBuf::from("/opt/qemu"));
        options.fvm_tool = Some(PathBuf::from("/usr/bin/fvm"));

        assert_eq!(options.emu_root_for("qemu"), PathBuf::from("/opt/qemu"));
        assert_eq!(options.qemu_img_tool(), PathBuf::from("/opt/qemu/bin/qemu-img"));
        assert_eq!(options.fvm_tool(), PathBuf::from("/usr/bin/fvm"));
    }

    #[test]
    fn test_emu_root_override_only_for_configured_variant() {
        let mut options = EmuliteOptions::new("/src/sdk", "/out");
        options.emu_type = "aemu".to_string();
        options.emu_root = Some(PathBuf::from("/opt/aemu"));

        assert_eq!(options.emu_root_for("aemu"), PathBuf::from("/opt/aemu"));
        assert_ne!(options.emu_root_for("qemu"), PathBuf::from("/opt/aemu"));
    }

    #[test]
    fn test_deserialize_minimal() {
        let options: EmuliteOptions =
            serde_json::from_str(r#"{"sdk_root":"/sdk","output_dir":"/out"}"#).unwrap();

        assert_eq!(options, EmuliteOptions::new("/sdk", "/out"));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_paths() {
        let options = EmuliteOptions::new("", "/out");
        assert!(matches!(options.validate(), Err(EmuliteError::Config(_))));
    }
}
