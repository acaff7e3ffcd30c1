//! Init command implementation.

use crate::cli::InitArgs;
use crate::error::Result;
use crate::storage::{ProjectStore, SqliteStore};
use tracing::info;

/// Create an empty project store with its classification roots and root
/// query folders.
///
/// # Errors
///
/// Returns an error if the file cannot be created or already holds a project.
pub fn execute(args: &InitArgs) -> Result<()> {
    let store = SqliteStore::create(&args.db, &args.endpoint, &args.project)?;
    info!(
        path = %args.db.display(),
        project = %args.project,
        "Initialized project store"
    );
    println!(
        "Initialized project '{}' at {}",
        store.project_name(),
        args.db.display()
    );
    Ok(())
}
