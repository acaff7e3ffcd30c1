//! Run coordination.
//!
//! A run migrates one [`MigrationKind`] from a source project store into a
//! target project store. Entities are processed strictly one at a time, and
//! anything that already exists on the target is detected and skipped, so an
//! interrupted run is restarted from the top.
//!
//! # Submodules
//!
//! - [`nodes`] - Area and iteration trees
//! - [`test_configurations`] - Test configuration catalog
//! - [`work_items`] - Work items and their history
//! - [`queries`] - Shared query folders and definitions
//! - [`test_plans`] - Test plans, suites and suite entries
//! - [`state`] - Counters and the completion estimate

pub mod nodes;
pub mod queries;
pub mod state;
pub mod test_configurations;
pub mod test_plans;
pub mod work_items;

pub use nodes::NodeStructureMigration;
pub use queries::QueryMigration;
pub use state::{ItemOutcome, RunState, RunSummary};
pub use test_configurations::TestConfigurationMigration;
pub use test_plans::TestPlanMigration;
pub use work_items::WorkItemMigration;

use crate::config::MigrationConfig;
use crate::error::{MigrateError, Result};
use crate::format::format_duration;
use crate::storage::MigrationStore;
use serde::Serialize;
use std::fmt;
use tracing::info;

/// What a run migrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationKind {
    Nodes,
    TestConfigurations,
    WorkItems,
    Queries,
    TestPlans,
}

impl MigrationKind {
    /// Every kind, in dependency order.
    pub const ALL: [Self; 5] = [
        Self::Nodes,
        Self::TestConfigurations,
        Self::WorkItems,
        Self::Queries,
        Self::TestPlans,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::TestConfigurations => "test-configurations",
            Self::WorkItems => "work-items",
            Self::Queries => "queries",
            Self::TestPlans => "test-plans",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns both stores for the duration of one or more runs.
pub struct MigrationEngine<S, T> {
    source: S,
    target: T,
    config: MigrationConfig,
}

impl<S: MigrationStore, T: MigrationStore> MigrationEngine<S, T> {
    /// Bind a source and a target store.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Setup`] when either store has no project or
    /// both stores are the same project.
    pub fn new(source: S, target: T, config: MigrationConfig) -> Result<Self> {
        if source.project_name().trim().is_empty() {
            return Err(MigrateError::Setup("source store has no project".into()));
        }
        if target.project_name().trim().is_empty() {
            return Err(MigrateError::Setup("target store has no project".into()));
        }
        if source.endpoint() == target.endpoint() && source.project_name() == target.project_name()
        {
            return Err(MigrateError::Setup(format!(
                "source and target are the same project '{}'",
                source.project_name()
            )));
        }
        Ok(Self {
            source,
            target,
            config,
        })
    }

    /// Execute one full pass of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the pass cannot start, e.g. the source
    /// entities cannot be enumerated. Per-entity failures are counted.
    pub fn run(&mut self, kind: MigrationKind) -> Result<RunSummary> {
        info!(
            kind = %kind,
            source = %self.source.project_name(),
            target = %self.target.project_name(),
            "Starting migration"
        );

        let summary = match kind {
            MigrationKind::Nodes => NodeStructureMigration::new(
                &self.source,
                &mut self.target,
                self.config.prefix_project_to_nodes,
            )
            .execute()?,
            MigrationKind::TestConfigurations => {
                TestConfigurationMigration::new(&self.source, &mut self.target).execute()?
            }
            MigrationKind::WorkItems => {
                WorkItemMigration::new(&mut self.source, &mut self.target, &self.config)
                    .execute()?
            }
            MigrationKind::Queries => {
                QueryMigration::new(&self.source, &mut self.target).execute()?
            }
            MigrationKind::TestPlans => {
                TestPlanMigration::new(&self.source, &mut self.target, &self.config).execute()?
            }
        };

        info!(
            kind = %kind,
            attempted = summary.attempted,
            migrated = summary.migrated,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed = %format_duration(summary.elapsed),
            "Migration finished"
        );
        Ok(summary)
    }

    /// Run every kind in dependency order.
    ///
    /// # Errors
    ///
    /// Stops at the first kind that cannot start.
    pub fn run_all(&mut self) -> Result<Vec<RunSummary>> {
        MigrationKind::ALL
            .into_iter()
            .map(|kind| self.run(kind))
            .collect()
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub const fn target(&self) -> &T {
        &self.target
    }

    #[must_use]
    pub const fn config(&self) -> &MigrationConfig {
        &self.config
    }
}
