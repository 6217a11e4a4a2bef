use clap::Args;

#[derive(Args, Debug)]
pub struct PrepareDiskArgs {}

pub fn execute(_args: PrepareDiskArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;
    let image = runtime.prepare_disk(global.target_cpu)?;
    println!("{}", image.display());
    Ok(())
}
