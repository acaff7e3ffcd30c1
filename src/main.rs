use anyhow::Context as _;
use clap::Parser;
use wit_migrate::cli::{Cli, Commands, commands};
use wit_migrate::logging::init_logging;
use wit_migrate::{MigrateError, StructuredError};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())
        .context("failed to initialize logging")?;

    if let Err(err) = commands::run(&cli.command) {
        report(&cli.command, &err);
        std::process::exit(1);
    }
    Ok(())
}

fn report(command: &Commands, err: &MigrateError) {
    tracing::debug!(code = %err.code(), "Command failed");
    match command {
        Commands::Migrate(args) if args.json => {
            match serde_json::to_string_pretty(&StructuredError::from(err)) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("Error: {err}"),
            }
        }
        _ => eprintln!("Error: {err}"),
    }
}
