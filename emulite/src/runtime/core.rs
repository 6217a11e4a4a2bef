//! Entry point tying configuration to the launch pipeline.

use std::path::PathBuf;

use emulite_shared::errors::EmuliteResult;

use crate::controller::EmulatorProcess;
use crate::disk::{BlobstoreCache, ExternalVolumeTools};
use crate::net::{EphemeralPortAllocator, PortAllocator};
use crate::runtime::layout::SdkLayout;
use crate::runtime::options::EmuliteOptions;
use crate::vmm::{
    Acceleration, EpochKernelArgs, HostProbe, KernelArgsProvider, LaunchPlan, LaunchSpec,
    QemuCommandBuilder, SystemHost, TargetArch, decide_acceleration,
};

/// Builds and runs emulator launches from [`EmuliteOptions`].
///
/// Host probing, port allocation and kernel arguments default to the system
/// implementations and can be swapped out with the `with_*` methods.
pub struct EmuliteRuntime {
    options: EmuliteOptions,
    layout: SdkLayout,
    volume_tools: ExternalVolumeTools,
    host: Box<dyn HostProbe>,
    ports: Box<dyn PortAllocator>,
    kernel_args: Box<dyn KernelArgsProvider>,
}

impl EmuliteRuntime {
    pub fn new(options: EmuliteOptions) -> EmuliteResult<Self> {
        options.validate()?;

        let layout = options.sdk_layout();
        let volume_tools = options.volume_tools();
        tracing::debug!(
            sdk_root = %options.sdk_root.display(),
            output_dir = %options.output_dir.display(),
            "Runtime configured"
        );

        Ok(Self {
            options,
            layout,
            volume_tools,
            host: Box::new(SystemHost),
            ports: Box::new(EphemeralPortAllocator),
            kernel_args: Box::new(EpochKernelArgs),
        })
    }

    pub fn with_host_probe(mut self, host: impl HostProbe + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn with_port_allocator(mut self, ports: impl PortAllocator + 'static) -> Self {
        self.ports = Box::new(ports);
        self
    }

    pub fn with_kernel_args(mut self, kernel_args: impl KernelArgsProvider + 'static) -> Self {
        self.kernel_args = Box::new(kernel_args);
        self
    }

    pub fn options(&self) -> &EmuliteOptions {
        &self.options
    }

    pub fn layout(&self) -> &SdkLayout {
        &self.layout
    }

    /// A spec for `arch` carrying the configured defaults.
    pub fn launch_spec(&self, arch: TargetArch) -> LaunchSpec {
        LaunchSpec::new(arch, self.options.output_dir.clone())
            .with_emu_type(self.options.emu_type.clone())
            .with_cpu_cores(self.options.cpu_cores)
            .with_ram_size_mb(self.options.ram_size_mb)
            .with_require_kvm(self.options.require_kvm)
    }

    /// Ensure the extended blobstore image for `arch` exists; returns its path.
    pub fn prepare_disk(&self, arch: TargetArch) -> EmuliteResult<PathBuf> {
        let source = self.layout.artifacts(arch, &self.options.output_dir).blobstore;
        BlobstoreCache::new(&self.options.output_dir, &self.volume_tools).ensure(&source)
    }

    /// Acceleration mode a launch of `spec` would use on this host.
    pub fn acceleration(&self, spec: &LaunchSpec) -> Acceleration {
        decide_acceleration(
            spec.require_kvm,
            spec.target_arch,
            &spec.emu_type,
            self.host.as_ref(),
        )
    }

    /// Build the full emulator command for `spec` without starting it.
    ///
    /// Boot image and disk cache both come from `spec.output_dir`.
    pub fn plan(&self, spec: &LaunchSpec) -> EmuliteResult<LaunchPlan> {
        QemuCommandBuilder::new(
            self.options.emu_root_for(&spec.emu_type),
            &self.layout,
            &self.volume_tools,
        )
        .with_host_probe(self.host.as_ref())
        .with_port_allocator(self.ports.as_ref())
        .with_kernel_args(self.kernel_args.as_ref())
        .with_network(self.options.network.clone())
        .build(spec)
    }

    /// Start the emulator for a plan built from `spec`.
    pub fn spawn(&self, plan: &LaunchPlan, spec: &LaunchSpec) -> EmuliteResult<EmulatorProcess> {
        let process = EmulatorProcess::spawn(&plan.command, spec.system_log_file.as_deref())?;
        tracing::info!(
            pid = process.pid(),
            host_ssh_port = plan.host_ssh_port,
            "Emulator launched"
        );
        Ok(process)
    }

    /// Build the command for `spec` and start the emulator.
    pub fn launch(&self, spec: &LaunchSpec) -> EmuliteResult<(LaunchPlan, EmulatorProcess)> {
        let plan = self.plan(spec)?;
        let process = self.spawn(&plan, spec)?;
        Ok((plan, process))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_spec_uses_configured_defaults() {
        let mut options = EmuliteOptions::new("/sdk", "/out");
        options.cpu_cores = 8;
        options.ram_size_mb = 4096;
        options.require_kvm = false;
        options.emu_type = "aemu".to_string();

        let runtime = EmuliteRuntime::new(options).unwrap();
        let spec = runtime.launch_spec(TargetArch::Arm64);

        assert_eq!(spec.target_arch, TargetArch::Arm64);
        assert_eq!(spec.cpu_cores, 8);
        assert_eq!(spec.ram_size_mb, 4096);
        assert!(!spec.require_kvm);
        assert_eq!(spec.emu_type, "aemu");
        assert_eq!(spec.output_dir, PathBuf::from("/out"));
    }

    #[test]
    fn test_new_rejects_invalid_options() {
        assert!(EmuliteRuntime::new(EmuliteOptions::new("", "/out")).is_err());
    }

    #[test]
    fn test_acceleration_disabled_when_not_requested() {
        let runtime = EmuliteRuntime::new(EmuliteOptions::new("/sdk", "/out")).unwrap();
        let spec = runtime.launch_spec(TargetArch::X64).with_require_kvm(false);
        assert_eq!(runtime.acceleration(&spec), Acceleration::Disabled);
    }
}
