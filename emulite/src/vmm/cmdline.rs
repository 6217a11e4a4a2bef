//! Guest kernel command line.

/// Source of the base kernel arguments for a launch.
pub trait KernelArgsProvider {
    fn kernel_args(&self) -> Vec<String>;
}

/// Seeds the guest clock with the host's current time.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochKernelArgs;

impl KernelArgsProvider for EpochKernelArgs {
    fn kernel_args(&self) -> Vec<String> {
        vec![format!("devmgr.epoch={}", chrono::Utc::now().timestamp())]
    }
}

/// A fixed list of arguments.
#[derive(Debug, Clone, Default)]
pub struct StaticKernelArgs(pub Vec<String>);

impl KernelArgsProvider for StaticKernelArgs {
    fn kernel_args(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Arguments always appended after the base arguments.
pub const KERNEL_ARG_OVERRIDES: &[&str] = &[
    // Keep the guest from emitting ANSI sequences into the host terminal.
    "TERM=dumb",
    "kernel.serial=legacy",
    // Halt rather than reboot the emulator on a kernel panic.
    "kernel.halt-on-panic=true",
];

/// Join base arguments and the fixed overrides into the `-append` value.
pub fn build_kernel_cmdline(base: Vec<String>) -> String {
    base.into_iter()
        .chain(KERNEL_ARG_OVERRIDES.iter().map(|s| s.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_follow_base_args() {
        let cmdline = build_kernel_cmdline(vec!["devmgr.epoch=1".to_string()]);
        assert_eq!(
            cmdline,
            "devmgr.epoch=1 TERM=dumb kernel.serial=legacy kernel.halt-on-panic=true"
        );
    }

    #[test]
    fn test_empty_base_args() {
        let cmdline = build_kernel_cmdline(Vec::new());
        assert_eq!(cmdline, "TERM=dumb kernel.serial=legacy kernel.halt-on-panic=true");
    }

    #[test]
    fn test_epoch_args_are_numeric() {
        let args = EpochKernelArgs.kernel_args();
        assert_eq!(args.len(), 1);
        let value = args[0].strip_prefix("devmgr.epoch=").unwrap();
        assert!(value.parse::<i64>().unwrap() > 0);
    }
}
