use clap::Args;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Print the emulator command before starting it
    #[arg(long)]
    pub print_command: bool,
}

pub fn execute(args: RunArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;
    let spec = global.launch_spec(&runtime);
    let plan = runtime.plan(&spec)?;

    if args.print_command {
        eprintln!("{}", plan.command);
    }

    let process = runtime.spawn(&plan, &spec)?;
    eprintln!(
        "Emulator running (pid {}), guest SSH forwarded to 127.0.0.1:{}",
        process.pid(),
        plan.host_ssh_port
    );

    process.wait()?;
    Ok(())
}
