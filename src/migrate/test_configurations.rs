//! Test configuration catalog migration.

use super::{ItemOutcome, MigrationKind, RunState, RunSummary};
use crate::error::Result;
use crate::model::TestConfiguration;
use crate::storage::TestManagementStore;
use crate::sync::path::replace_project;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Copies configurations whose name is missing on the target.
pub struct TestConfigurationMigration<'a, S: ?Sized, T: ?Sized> {
    source: &'a S,
    target: &'a mut T,
}

impl<'a, S, T> TestConfigurationMigration<'a, S, T>
where
    S: TestManagementStore + ?Sized,
    T: TestManagementStore + ?Sized,
{
    pub const fn new(source: &'a S, target: &'a mut T) -> Self {
        Self { source, target }
    }

    /// # Errors
    ///
    /// Returns an error if either catalog cannot be read.
    pub fn execute(self) -> Result<RunSummary> {
        let configurations = self.source.test_configurations()?;
        let mut existing: HashSet<String> = self
            .target
            .test_configurations()?
            .into_iter()
            .map(|configuration| configuration.name)
            .collect();
        let source_project = self.source.project_name().to_string();
        let target_project = self.target.project_name().to_string();
        info!(count = configurations.len(), "Found test configurations");

        let mut state = RunState::new(MigrationKind::TestConfigurations, configurations.len());
        for configuration in &configurations {
            let started = Instant::now();
            let outcome = if existing.contains(&configuration.name) {
                debug!(name = %configuration.name, "Configuration already exists");
                ItemOutcome::Skipped
            } else {
                let copy = TestConfiguration {
                    id: 0,
                    area_path: replace_project(
                        &configuration.area_path,
                        &source_project,
                        &target_project,
                    ),
                    ..configuration.clone()
                };
                match self.target.create_test_configuration(&copy) {
                    Ok(id) => {
                        info!(name = %configuration.name, id, "Created configuration");
                        existing.insert(configuration.name.clone());
                        ItemOutcome::Migrated
                    }
                    Err(err) if err.is_already_exists() => ItemOutcome::Skipped,
                    Err(err) => {
                        warn!(name = %configuration.name, error = %err, "Failed to create configuration");
                        ItemOutcome::Failed
                    }
                }
            };
            state.record(outcome, started.elapsed());
        }
        Ok(state.summary())
    }
}
