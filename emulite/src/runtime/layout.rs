//! Where boot artifacts live on disk.
//!
//! SDK images are laid out as `<images_root>/<sdk arch>/qemu/<file>`; the boot
//! image is generated into the build output directory.

use std::path::{Path, PathBuf};

use emulite_shared::errors::{EmuliteError, EmuliteResult};

use crate::disk::constants::blobstore::{GEN_DIR, SOURCE_FILE};
use crate::vmm::TargetArch;

/// Directory structure constants
pub mod dirs {
    /// Images directory under the SDK root
    pub const IMAGES_DIR: &str = "images";

    /// Tools directory under the SDK root
    pub const TOOLS_DIR: &str = "tools";

    /// Target type subdirectory for emulator images
    pub const TARGET_TYPE_QEMU: &str = "qemu";

    /// Binaries directory under an emulator root
    pub const BIN_DIR: &str = "bin";
}

/// File names of the boot artifacts
pub mod files {
    /// Guest kernel
    pub const KERNEL: &str = "qemu-kernel.kernel";

    /// Default boot image name inside `<output_dir>/gen`
    pub const BOOT_IMAGE: &str = "fuchsia-qemu.zbi";
}

/// Paths of the files needed to boot a guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootArtifacts {
    pub kernel: PathBuf,
    pub initrd: PathBuf,
    pub blobstore: PathBuf,
}

/// Locates boot artifacts for a target architecture.
pub trait ArtifactResolver {
    /// Resolve all artifacts for a launch writing into `output_dir`, failing
    /// with `NotFound` if any is missing.
    fn resolve(&self, arch: TargetArch, output_dir: &Path) -> EmuliteResult<BootArtifacts>;
}

/// Resolves artifacts from an SDK images tree and a build output directory.
#[derive(Debug, Clone)]
pub struct SdkLayout {
    images_root: PathBuf,
    boot_image_name: String,
}

impl SdkLayout {
    pub fn new(images_root: PathBuf) -> Self {
        Self {
            images_root,
            boot_image_name: files::BOOT_IMAGE.to_string(),
        }
    }

    pub fn with_boot_image_name(mut self, name: impl Into<String>) -> Self {
        self.boot_image_name = name.into();
        self
    }

    /// `<images_root>/<arch>/qemu/<filename>`
    pub fn target_file(&self, arch: TargetArch, filename: &str) -> PathBuf {
        self.images_root
            .join(arch.sdk_arch())
            .join(dirs::TARGET_TYPE_QEMU)
            .join(filename)
    }

    /// `<output_dir>/gen/<boot image>`
    pub fn boot_image(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(GEN_DIR).join(&self.boot_image_name)
    }

    /// Artifact paths for `arch`, without checking they exist.
    pub fn artifacts(&self, arch: TargetArch, output_dir: &Path) -> BootArtifacts {
        BootArtifacts {
            kernel: self.target_file(arch, files::KERNEL),
            initrd: self.boot_image(output_dir),
            blobstore: self.target_file(arch, SOURCE_FILE),
        }
    }
}

impl ArtifactResolver for SdkLayout {
    fn resolve(&self, arch: TargetArch, output_dir: &Path) -> EmuliteResult<BootArtifacts> {
        let artifacts = self.artifacts(arch, output_dir);

        let missing: Vec<String> = [&artifacts.kernel, &artifacts.initrd, &artifacts.blobstore]
            .into_iter()
            .filter(|path| !path.is_file())
            .map(|path| format!("  - {}", path.display()))
            .collect();

        if !missing.is_empty() {
            return Err(EmuliteError::NotFound(format!(
                "Boot images for {} are missing:\n{}",
                arch,
                missing.join("\n")
            )));
        }

        tracing::debug!(arch = %arch, ?artifacts, "Resolved boot artifacts");
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_paths() {
        let layout = SdkLayout::new(PathBuf::from("/sdk/images"));
        let artifacts = layout.artifacts(TargetArch::Arm64, Path::new("/out"));

        assert_eq!(
            artifacts.kernel,
            PathBuf::from("/sdk/images/arm64/qemu/qemu-kernel.kernel")
        );
        assert_eq!(artifacts.initrd, PathBuf::from("/out/gen/fuchsia-qemu.zbi"));
        assert_eq!(
            artifacts.blobstore,
            PathBuf::from("/sdk/images/arm64/qemu/storage-full.blk")
        );
    }

    #[test]
    fn test_custom_boot_image_name() {
        let layout = SdkLayout::new(PathBuf::from("/sdk/images")).with_boot_image_name("custom.zbi");
        assert_eq!(
            layout.boot_image(Path::new("/out")),
            PathBuf::from("/out/gen/custom.zbi")
        );
    }

    #[test]
    fn test_resolve_all_present() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let layout = SdkLayout::new(dir.path().join("images"));
        let expected = layout.artifacts(TargetArch::X64, &out);
        touch(&expected.kernel);
        touch(&expected.initrd);
        touch(&expected.blobstore);

        assert_eq!(layout.resolve(TargetArch::X64, &out).unwrap(), expected);
    }

    #[test]
    fn test_resolve_reports_every_missing_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let layout = SdkLayout::new(dir.path().join("images"));
        touch(&layout.artifacts(TargetArch::X64, &out).kernel);

        match layout.resolve(TargetArch::X64, &out) {
            Err(EmuliteError::NotFound(msg)) => {
                assert!(msg.contains("fuchsia-qemu.zbi"));
                assert!(msg.contains("storage-full.blk"));
                assert!(!msg.contains("qemu-kernel.kernel"));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
