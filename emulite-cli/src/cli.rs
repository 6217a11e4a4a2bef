use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use emulite::runtime::constants::envs;
use emulite::{EmuliteOptions, EmuliteRuntime, LaunchSpec, TargetArch};
use serde_yaml::{Mapping, Value};

use crate::commands;

#[derive(Parser, Debug)]
#[command(name = "emulite", version, about = "Prepare and launch QEMU guests")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the emulator command and run it until the guest exits
    Run(commands::run::RunArgs),
    /// Print the emulator command without running it
    PrintCommand(commands::print_command::PrintCommandArgs),
    /// Build or reuse the extended blobstore image and print its path
    PrepareDisk(commands::prepare_disk::PrepareDiskArgs),
    /// Report whether KVM acceleration is usable for the target
    CheckKvm(commands::check_kvm::CheckKvmArgs),
}

/// Flags shared by every subcommand. Flags override the config file.
#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// Config file (YAML). Default: ~/.config/emulite/config.yaml
    #[arg(long, global = true, env = envs::EMULITE_CONFIG)]
    pub config: Option<PathBuf>,

    /// SDK root containing images/ and tools/
    #[arg(long, global = true, env = envs::EMULITE_SDK_ROOT)]
    pub sdk_root: Option<PathBuf>,

    /// Build output directory (boot image and disk cache)
    #[arg(long, global = true, env = envs::EMULITE_OUTPUT_DIR)]
    pub output_dir: Option<PathBuf>,

    /// Emulator install directory
    #[arg(long, global = true, env = envs::EMULITE_EMU_ROOT)]
    pub emu_root: Option<PathBuf>,

    /// Write logs to daily-rotated files in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Guest architecture (arm64 or x64)
    #[arg(long, global = true, default_value = "x64")]
    pub target_cpu: TargetArch,

    /// Emulator variant
    #[arg(long, global = true)]
    pub emu_type: Option<String>,

    /// Number of guest CPU cores
    #[arg(long, global = true)]
    pub cpu_cores: Option<u8>,

    /// Guest memory in MiB
    #[arg(long, global = true)]
    pub ram_size_mb: Option<u32>,

    /// Use KVM when the host allows it
    #[arg(long, global = true)]
    pub require_kvm: Option<bool>,

    /// Send the emulator's console output to this file
    #[arg(long, global = true)]
    pub system_log_file: Option<PathBuf>,
}

impl GlobalFlags {
    /// Options from the config file with command-line overrides applied.
    pub fn load_options(&self) -> anyhow::Result<EmuliteOptions> {
        let mut config = match self.config_file()? {
            Some(path) => read_config(&path)?,
            None => Mapping::new(),
        };

        overlay(&mut config, "sdk_root", &self.sdk_root)?;
        overlay(&mut config, "output_dir", &self.output_dir)?;
        overlay(&mut config, "emu_root", &self.emu_root)?;
        overlay(&mut config, "emu_type", &self.emu_type)?;
        overlay(&mut config, "cpu_cores", &self.cpu_cores)?;
        overlay(&mut config, "ram_size_mb", &self.ram_size_mb)?;
        overlay(&mut config, "require_kvm", &self.require_kvm)?;

        for key in ["sdk_root", "output_dir"] {
            if !config.contains_key(key) {
                anyhow::bail!(
                    "{} is not set (pass --{}, or set it in the config file)",
                    key,
                    key.replace('_', "-")
                );
            }
        }

        let options: EmuliteOptions =
            serde_yaml::from_value(Value::Mapping(config)).context("Invalid configuration")?;
        options.validate()?;
        Ok(options)
    }

    pub fn create_runtime(&self) -> anyhow::Result<EmuliteRuntime> {
        let options = self.load_options()?;
        Ok(EmuliteRuntime::new(options)?)
    }

    /// Launch spec for the selected target with the configured defaults.
    pub fn launch_spec(&self, runtime: &EmuliteRuntime) -> LaunchSpec {
        let spec = runtime.launch_spec(self.target_cpu);
        match &self.system_log_file {
            Some(path) => spec.with_system_log_file(path.clone()),
            None => spec,
        }
    }

    /// An explicit config must exist; the default location is optional.
    fn config_file(&self) -> anyhow::Result<Option<PathBuf>> {
        if let Some(path) = &self.config {
            if !path.is_file() {
                anyhow::bail!("Config file {} not found", path.display());
            }
            return Ok(Some(path.clone()));
        }
        Ok(EmuliteOptions::default_config_path().filter(|path| path.is_file()))
    }
}

fn read_config(path: &Path) -> anyhow::Result<Mapping> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    match value {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => anyhow::bail!("Config file {} must be a YAML mapping", path.display()),
    }
}

fn overlay<T: serde::Serialize>(
    config: &mut Mapping,
    key: &str,
    value: &Option<T>,
) -> anyhow::Result<()> {
    if let Some(value) = value {
        config.insert(Value::from(key), serde_yaml::to_value(value)?);
    }
    Ok(())
}
