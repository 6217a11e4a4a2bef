use clap::Args;

#[derive(Args, Debug)]
pub struct CheckKvmArgs {
    /// Exit non-zero when KVM cannot be used
    #[arg(long)]
    pub strict: bool,
}

/// Always evaluates as if KVM were requested, regardless of `--require-kvm`.
pub fn execute(args: CheckKvmArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;
    let spec = global.launch_spec(&runtime).with_require_kvm(true);
    let acceleration = runtime.acceleration(&spec);

    println!("{}: {}", spec.target_arch, acceleration.describe());

    if args.strict && !acceleration.is_kvm() {
        anyhow::bail!("KVM is not usable for {} guests on this host", spec.target_arch);
    }
    Ok(())
}
