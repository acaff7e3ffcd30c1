//! Shared query hierarchy migration.

use super::{ItemOutcome, MigrationKind, RunState, RunSummary};
use crate::error::Result;
use crate::model::{DateRange, QueryItem, join_query_path};
use crate::storage::QueryStore;
use crate::sync::path::rewrite_query_text;
use crate::sync::{SyncReport, TreeTarget, sync_node};
use std::time::Instant;
use tracing::{info, warn};

/// Target query hierarchy addressed by path, counting into the run state.
struct QueryTarget<'a, T: ?Sized> {
    store: &'a mut T,
    source_project: &'a str,
    target_project: &'a str,
    state: &'a mut RunState,
}

impl<T: QueryStore + ?Sized> TreeTarget<QueryItem> for QueryTarget<'_, T> {
    type Handle = String;

    fn lookup_child(&mut self, parent: &String, source: &QueryItem) -> Result<Option<String>> {
        let path = join_query_path(parent, source.name());
        Ok(self
            .store
            .lookup_query_item(&path)?
            .map(|item| item.path().to_string()))
    }

    fn create_child(
        &mut self,
        parent: &String,
        source: &QueryItem,
        _dates: Option<DateRange>,
    ) -> Result<()> {
        match source {
            QueryItem::Folder(folder) => {
                info!(folder = %folder.name, parent = %parent, "Migrating folder");
                let result = self.store.create_query_folder(parent, &folder.name);
                if let Err(err) = &result {
                    if !err.is_already_exists() {
                        warn!(folder = %folder.name, error = %err, "Error saving query folder");
                        self.state.count(ItemOutcome::Failed);
                    }
                }
                result
            }
            QueryItem::Definition(definition) => {
                let text =
                    rewrite_query_text(&definition.text, self.source_project, self.target_project);
                let result = self
                    .store
                    .create_query_definition(parent, &definition.name, &text);
                if let Err(err) = &result {
                    if !err.is_already_exists() {
                        warn!(
                            query = %definition.name,
                            error = %err,
                            "Error saving query, probably due to invalid area or iteration paths"
                        );
                        self.state.count(ItemOutcome::Failed);
                    }
                }
                result
            }
        }
    }

    fn skip_reason(&self, source: &QueryItem) -> Option<String> {
        match source {
            QueryItem::Folder(folder) if folder.is_personal => Some(format!(
                "personal folder '{}'; only shared folders are migrated",
                folder.name
            )),
            _ => None,
        }
    }

    fn on_resolved(&mut self, source: &QueryItem, _handle: &String, created: bool) -> Result<()> {
        match source {
            QueryItem::Folder(_) => self.state.add_folders(1),
            QueryItem::Definition(_) => self.state.count(if created {
                ItemOutcome::Migrated
            } else {
                ItemOutcome::Skipped
            }),
        }
        Ok(())
    }
}

/// Mirrors shared query folders and definitions.
pub struct QueryMigration<'a, S: ?Sized, T: ?Sized> {
    source: &'a S,
    target: &'a mut T,
}

impl<'a, S, T> QueryMigration<'a, S, T>
where
    S: QueryStore + ?Sized,
    T: QueryStore + ?Sized,
{
    pub const fn new(source: &'a S, target: &'a mut T) -> Self {
        Self { source, target }
    }

    /// # Errors
    ///
    /// Returns an error if the source hierarchy cannot be read.
    pub fn execute(self) -> Result<RunSummary> {
        let roots = self.source.query_hierarchy()?;
        info!(count = roots.len(), "Found root query folders");

        let source_project = self.source.project_name().to_string();
        let target_project = self.target.project_name().to_string();
        let mut state = RunState::new(MigrationKind::Queries, roots.len());
        // Query runs report a folder count even when nothing was scanned.
        state.add_folders(0);

        for root in &roots {
            let started = Instant::now();
            let personal = matches!(root, QueryItem::Folder(folder) if folder.is_personal);
            if personal {
                info!(folder = %root.name(), "Skipping personal folder");
                state.finish(started.elapsed());
                continue;
            }
            state.add_folders(1);

            let target_root = join_query_path(&target_project, root.name());
            match self.target.lookup_query_item(&target_root)? {
                Some(_) => {
                    let mut target = QueryTarget {
                        store: &mut *self.target,
                        source_project: &source_project,
                        target_project: &target_project,
                        state: &mut state,
                    };
                    let mut report = SyncReport::default();
                    for child in root.children() {
                        sync_node(&mut target, child, &target_root, &mut report);
                    }
                    if report.failed > 0 {
                        warn!(folder = %root.name(), failed = report.failed, "Some queries were not migrated");
                    }
                }
                None => warn!(folder = %target_root, "Target has no matching root folder"),
            }
            state.finish(started.elapsed());
        }

        let summary = state.summary();
        info!(
            folders = summary.folders.unwrap_or(0),
            found = summary.attempted,
            skipped = summary.skipped,
            migrated = summary.migrated,
            failed = summary.failed,
            "Queries"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;
    use crate::storage::sqlite::{MY_QUERIES, SHARED_QUERIES};
    use crate::storage::{ClassificationStore, SqliteStore};

    fn shared(project: &str) -> String {
        join_query_path(project, SHARED_QUERIES)
    }

    #[test]
    fn shared_queries_are_mirrored_with_rewritten_text() {
        let mut source = SqliteStore::open_memory("https://src.example.com/tfs", "ProjectA").unwrap();
        source
            .create_node(NodeKind::Area, "ProjectA", "Web", None)
            .unwrap();
        source
            .create_query_folder(&shared("ProjectA"), "Triage")
            .unwrap();
        let triage = join_query_path(&shared("ProjectA"), "Triage");
        source
            .create_query_definition(
                &triage,
                "Web bugs",
                "SELECT [System.Id] FROM WorkItems WHERE [System.AreaPath] UNDER 'ProjectA\\Web'",
            )
            .unwrap();
        source
            .create_query_definition(
                &join_query_path("ProjectA", MY_QUERIES),
                "Mine",
                "SELECT [System.Id] FROM WorkItems",
            )
            .unwrap();

        let mut target = SqliteStore::open_memory("https://dst.example.com/tfs", "ProjectB").unwrap();
        target
            .create_node(NodeKind::Area, "ProjectB", "Web", None)
            .unwrap();

        let summary = QueryMigration::new(&source, &mut target).execute().unwrap();
        assert_eq!(summary.migrated, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.folders, Some(2));

        let copied = target
            .lookup_query_item(&join_query_path(
                &join_query_path(&shared("ProjectB"), "Triage"),
                "Web bugs",
            ))
            .unwrap()
            .unwrap();
        match copied {
            QueryItem::Definition(definition) => {
                assert!(definition.text.contains("UNDER 'ProjectB\\Web'"));
            }
            QueryItem::Folder(_) => panic!("expected a definition"),
        }
        assert!(
            target
                .lookup_query_item(&join_query_path(&join_query_path("ProjectB", MY_QUERIES), "Mine"))
                .unwrap()
                .is_none()
        );

        let rerun = QueryMigration::new(&source, &mut target).execute().unwrap();
        assert_eq!(rerun.migrated, 0);
        assert_eq!(rerun.skipped, 1);
    }

    #[test]
    fn rejected_definition_counts_as_failed() {
        let mut source = SqliteStore::open_memory("https://src.example.com/tfs", "ProjectA").unwrap();
        source
            .create_node(NodeKind::Area, "ProjectA", "Legacy", None)
            .unwrap();
        source
            .create_query_definition(
                &shared("ProjectA"),
                "Legacy bugs",
                "SELECT [System.Id] FROM WorkItems WHERE [System.AreaPath] = 'ProjectA\\Legacy'",
            )
            .unwrap();
        let mut target = SqliteStore::open_memory("https://dst.example.com/tfs", "ProjectB").unwrap();

        let summary = QueryMigration::new(&source, &mut target).execute().unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.migrated, 0);
    }

    #[test]
    fn rejected_folder_counts_as_failed() {
        let mut source = SqliteStore::open_memory("https://src.example.com/tfs", "ProjectA").unwrap();
        source
            .create_query_folder(&shared("ProjectA"), "Triage")
            .unwrap();
        let triage = join_query_path(&shared("ProjectA"), "Triage");
        source.create_query_folder(&triage, "Nested").unwrap();
        source
            .create_query_definition(
                &join_query_path(&triage, "Nested"),
                "Everything",
                "SELECT [System.Id] FROM WorkItems",
            )
            .unwrap();

        // A definition occupies the folder's name, so nothing can be created under it.
        let mut target = SqliteStore::open_memory("https://dst.example.com/tfs", "ProjectB").unwrap();
        target
            .create_query_definition(&shared("ProjectB"), "Triage", "SELECT [System.Id] FROM WorkItems")
            .unwrap();

        let summary = QueryMigration::new(&source, &mut target).execute().unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.migrated, 0);
        assert!(
            target
                .lookup_query_item(&join_query_path(
                    &join_query_path(&shared("ProjectB"), "Triage"),
                    "Nested"
                ))
                .unwrap()
                .is_none()
        );
    }
}
