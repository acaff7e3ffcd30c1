//! Subcommand implementations.

pub mod identity;
pub mod init;
pub mod migrate;

use super::Commands;
use crate::error::Result;

/// Dispatch a parsed subcommand.
///
/// # Errors
///
/// Returns whatever the subcommand fails with.
pub fn run(command: &Commands) -> Result<()> {
    match command {
        Commands::Init(args) => init::execute(args),
        Commands::Migrate(args) => migrate::execute(args),
        Commands::Identity(args) => identity::execute(args),
    }
}
