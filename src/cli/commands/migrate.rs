//! Migrate command implementation.

use crate::cli::MigrateArgs;
use crate::config::{MigrationConfig, load_config};
use crate::error::{MigrateError, Result};
use crate::format::print_summaries;
use crate::migrate::MigrationEngine;
use crate::storage::SqliteStore;
use std::path::Path;
use tracing::{debug, info, warn};

/// Run one migration kind, or all of them, and print the summaries.
///
/// # Errors
///
/// Returns an error if configuration is invalid or either store cannot be
/// opened. Per-entity failures are reported in the summary instead.
pub fn execute(args: &MigrateArgs) -> Result<()> {
    let layer = load_config(args.config.as_deref(), &args.overrides())?;
    let config = MigrationConfig::from_layer(&layer)?;
    debug!(?config, "Resolved configuration");

    let (source_path, target_path) = config.store_paths()?;
    let source = open_store(source_path)?;
    let target = open_store(target_path)?;
    info!(
        source = %source_path.display(),
        target = %target_path.display(),
        "Opened project stores"
    );

    let mut engine = MigrationEngine::new(source, target, config)?;
    let summaries = match args.kind.kind() {
        Some(kind) => vec![engine.run(kind)?],
        None => engine.run_all()?,
    };
    for summary in summaries.iter().filter(|summary| summary.has_failures()) {
        warn!(kind = %summary.kind, failed = summary.failed, "Run finished with failures");
    }
    print_summaries(&summaries, args.json)
}

fn open_store(path: &Path) -> Result<SqliteStore> {
    if !path.exists() {
        return Err(MigrateError::Setup(format!(
            "project store not found: {}",
            path.display()
        )));
    }
    SqliteStore::open(path)
}
