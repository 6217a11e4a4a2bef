use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Keep the guard alive until exit so buffered log lines are flushed.
    let log_guard = match emulite::util::init_logging(cli.global.log_dir.as_deref(), "info") {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: failed to initialise logging: {}", e);
            None
        }
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.global),
        Commands::PrintCommand(args) => commands::print_command::execute(args, &cli.global),
        Commands::PrepareDisk(args) => commands::prepare_disk::execute(args, &cli.global),
        Commands::CheckKvm(args) => commands::check_kvm::execute(args, &cli.global),
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "Command failed");
        eprintln!("Error: {:#}", e);
        drop(log_guard);
        std::process::exit(1);
    }
}
