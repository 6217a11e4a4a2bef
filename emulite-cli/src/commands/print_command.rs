use clap::Args;
use serde_json::json;

#[derive(Args, Debug)]
pub struct PrintCommandArgs {
    /// Print a JSON object (program, args, host SSH port, acceleration)
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: PrintCommandArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;
    let spec = global.launch_spec(&runtime);
    let plan = runtime.plan(&spec)?;

    if args.json {
        let value = json!({
            "program": plan.command.program(),
            "args": plan.command.args(),
            "host_ssh_port": plan.host_ssh_port,
            "kvm": plan.acceleration.is_kvm(),
            "acceleration": plan.acceleration.describe(),
            "blobstore_image": plan.blobstore_image,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", plan.command);
    }
    Ok(())
}
