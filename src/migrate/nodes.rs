//! Area and iteration tree migration.

use super::{MigrationKind, RunState, RunSummary};
use crate::error::{MigrateError, Result};
use crate::model::{ClassificationNode, DateRange, NodeKind, join_path};
use crate::storage::ClassificationStore;
use crate::sync::{TreeTarget, sync_tree};
use std::time::Instant;
use tracing::{info, warn};

/// Target classification tree addressed by path.
struct ClassificationTarget<'a, T: ?Sized> {
    store: &'a mut T,
    kind: NodeKind,
}

impl<T: ClassificationStore + ?Sized> TreeTarget<ClassificationNode> for ClassificationTarget<'_, T> {
    type Handle = String;

    fn lookup_child(
        &mut self,
        parent: &String,
        source: &ClassificationNode,
    ) -> Result<Option<String>> {
        let path = join_path(parent, &source.name);
        Ok(self.store.lookup_node(self.kind, &path)?.map(|node| node.path))
    }

    fn create_child(
        &mut self,
        parent: &String,
        source: &ClassificationNode,
        dates: Option<DateRange>,
    ) -> Result<()> {
        self.store.create_node(self.kind, parent, &source.name, dates)
    }
}

/// Mirrors both classification trees into the target project.
pub struct NodeStructureMigration<'a, S: ?Sized, T: ?Sized> {
    source: &'a S,
    target: &'a mut T,
    prefix_project: bool,
}

impl<'a, S, T> NodeStructureMigration<'a, S, T>
where
    S: ClassificationStore + ?Sized,
    T: ClassificationStore + ?Sized,
{
    /// With `prefix_project`, the source tree is grafted under a node named
    /// after the source project.
    pub const fn new(source: &'a S, target: &'a mut T, prefix_project: bool) -> Self {
        Self {
            source,
            target,
            prefix_project,
        }
    }

    /// # Errors
    ///
    /// Returns an error if a source tree cannot be read or the target has no
    /// root node for it.
    pub fn execute(self) -> Result<RunSummary> {
        let mut state = RunState::new(MigrationKind::Nodes, NodeKind::ALL.len());
        let target_root = self.target.project_name().to_string();

        for kind in NodeKind::ALL {
            let started = Instant::now();
            let tree = self.source.classification_tree(kind)?;
            if self.target.lookup_node(kind, &target_root)?.is_none() {
                return Err(MigrateError::Setup(format!(
                    "target has no {kind} root '{target_root}'"
                )));
            }
            info!(
                kind = %kind,
                nodes = tree.descendant_count(),
                prefix = self.prefix_project,
                "Migrating tree"
            );

            let mut target = ClassificationTarget {
                store: &mut *self.target,
                kind,
            };
            let report = sync_tree(&mut target, &tree, &target_root, self.prefix_project);
            if report.failed > 0 {
                warn!(kind = %kind, failed = report.failed, "Some nodes were not migrated");
            }
            state.tally(&report);
            state.finish(started.elapsed());
        }
        Ok(state.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use chrono::{TimeZone, Utc};

    fn stores() -> (SqliteStore, SqliteStore) {
        let mut source = SqliteStore::open_memory("https://src.example.com/tfs", "ProjectA").unwrap();
        source
            .create_node(NodeKind::Area, "ProjectA", "Team1", None)
            .unwrap();
        source
            .create_node(NodeKind::Area, "ProjectA\\Team1", "SubTeam", None)
            .unwrap();
        let sprint = DateRange {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            finish: Utc.with_ymd_and_hms(2024, 1, 14, 0, 0, 0).unwrap(),
        };
        source
            .create_node(NodeKind::Iteration, "ProjectA", "Sprint 1", Some(sprint))
            .unwrap();
        let target = SqliteStore::open_memory("https://dst.example.com/tfs", "ProjectB").unwrap();
        (source, target)
    }

    #[test]
    fn substitute_policy_mirrors_under_target_root() {
        let (source, mut target) = stores();
        let summary = NodeStructureMigration::new(&source, &mut target, false)
            .execute()
            .unwrap();

        assert_eq!(summary.migrated, 3);
        assert!(
            target
                .lookup_node(NodeKind::Area, "ProjectB\\Team1\\SubTeam")
                .unwrap()
                .is_some()
        );
        let sprint = target
            .lookup_node(NodeKind::Iteration, "ProjectB\\Sprint 1")
            .unwrap()
            .unwrap();
        assert!(sprint.date_range().is_some());
    }

    #[test]
    fn prefix_policy_grafts_under_source_project_node() {
        let (source, mut target) = stores();
        let first = NodeStructureMigration::new(&source, &mut target, true)
            .execute()
            .unwrap();
        // Two prefix roots plus three nodes.
        assert_eq!(first.migrated, 5);
        assert!(
            target
                .lookup_node(NodeKind::Area, "ProjectB\\ProjectA\\Team1\\SubTeam")
                .unwrap()
                .is_some()
        );

        let before = target.count_classification_nodes(NodeKind::Area).unwrap();
        let second = NodeStructureMigration::new(&source, &mut target, true)
            .execute()
            .unwrap();
        assert_eq!(second.migrated, 0);
        assert_eq!(
            target.count_classification_nodes(NodeKind::Area).unwrap(),
            before
        );
    }
}
