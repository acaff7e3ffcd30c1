//! Work item migration.

use super::{ItemOutcome, MigrationKind, RunState, RunSummary};
use crate::config::MigrationConfig;
use crate::error::{MigrateError, Result};
use crate::identity::{IdentityResolver, identity_of};
use crate::model::{WorkItem, WorkItemQuery};
use crate::replicate::{ReplicationOutcome, WorkItemReplicator};
use crate::storage::WorkItemStore;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Replicates every matching source item that has not been migrated yet.
pub struct WorkItemMigration<'a, S: ?Sized, T: ?Sized> {
    source: &'a mut S,
    target: &'a mut T,
    config: &'a MigrationConfig,
}

impl<'a, S, T> WorkItemMigration<'a, S, T>
where
    S: WorkItemStore + ?Sized,
    T: WorkItemStore + ?Sized,
{
    pub const fn new(source: &'a mut S, target: &'a mut T, config: &'a MigrationConfig) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the source query fails.
    pub fn execute(mut self) -> Result<RunSummary> {
        let query = WorkItemQuery::in_project(self.source.project_name())
            .with_types(&self.config.work_item_types);
        let items = self.source.query_work_items(&query)?;
        info!(count = items.len(), "Found work items");

        let replicator = WorkItemReplicator::new(self.config.replication_options());
        let mut resolver = IdentityResolver::new(self.config.identity_field.clone());
        let mut state = RunState::new(MigrationKind::WorkItems, items.len());

        for mut item in items {
            let started = Instant::now();
            let outcome = match self.migrate_item(&replicator, &mut resolver, &mut item) {
                Ok(outcome) => outcome,
                Err(MigrateError::UnsupportedType { type_name }) => {
                    warn!(source = item.id_or_zero(), work_item_type = %type_name, "Unsupported type");
                    ItemOutcome::Skipped
                }
                Err(err) => {
                    error!(source = item.id_or_zero(), error = %err, "Failed to migrate work item");
                    ItemOutcome::Failed
                }
            };
            state.record(outcome, started.elapsed());
        }
        Ok(state.summary())
    }

    fn migrate_item(
        &mut self,
        replicator: &WorkItemReplicator,
        resolver: &mut IdentityResolver,
        item: &mut WorkItem,
    ) -> Result<ItemOutcome> {
        let identity = identity_of(&*self.source, item);
        if let Some(existing) = resolver.find_existing(&*self.target, &identity)? {
            debug!(
                source = item.id_or_zero(),
                target = existing.id_or_zero(),
                "Already migrated"
            );
            return Ok(ItemOutcome::Skipped);
        }

        let config = self.config;
        let target_type = config
            .map_type(&item.work_item_type)
            .ok_or_else(|| MigrateError::UnsupportedType {
                type_name: item.work_item_type.clone(),
            })?;
        info!(
            source = item.id_or_zero(),
            work_item_type = %item.work_item_type,
            target_type = %target_type,
            title = %item.title(),
            "Migrating"
        );

        let outcome = replicator.replicate(&mut *self.source, &mut *self.target, item, target_type)?;
        Ok(match outcome {
            ReplicationOutcome::Saved { .. } => ItemOutcome::Migrated,
            ReplicationOutcome::SaveFailed { .. } => ItemOutcome::Failed,
        })
    }
}
