//! Test plan migration.
//!
//! Each source plan maps to a target plan named `{source project}-{plan}`.
//! Suites are mirrored by title with the tree synchronizer; requirement
//! suites are only created once their requirement has been migrated, and
//! test case entries are added for test cases that have been migrated.
//! Configuration references are translated by name through the target
//! catalog, which is snapshotted once per run.

use super::{ItemOutcome, MigrationKind, RunState, RunSummary};
use crate::config::MigrationConfig;
use crate::error::{MigrateError, Result};
use crate::identity::{IdentityResolver, compute_identity};
use crate::model::{DateRange, SuiteKind, TestCaseEntry, TestPlan, TestSuite};
use crate::reconcile::{self, ConfigurationCatalog, ReconcileOutcome};
use crate::storage::{TestManagementStore, WorkItemStore};
use crate::sync::{TreeTarget, sync_tree};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Counters for test case entries across one plan.
#[derive(Debug, Clone, Copy, Default)]
struct EntryCounts {
    added: usize,
    reused: usize,
    missing: usize,
    failed: usize,
}

/// Target suite tree addressed by suite id.
struct SuiteTarget<'a, S: ?Sized, T: ?Sized> {
    source: &'a S,
    store: &'a mut T,
    catalog: &'a ConfigurationCatalog,
    resolver: &'a mut IdentityResolver,
    entries: EntryCounts,
}

impl<S, T> SuiteTarget<'_, S, T>
where
    S: WorkItemStore + ?Sized,
    T: WorkItemStore + TestManagementStore + ?Sized,
{
    /// Target id of the requirement behind a requirement suite.
    fn migrated_requirement(&self, requirement_id: i64) -> Result<Option<i64>> {
        let identity =
            compute_identity(self.source.endpoint(), self.source.project_name(), requirement_id);
        Ok(self
            .resolver
            .find_by_exact_identity(&*self.store, &identity)?
            .and_then(|item| item.id))
    }

    /// Add the migrated counterparts of `source`'s test cases to `suite_id`
    /// and reconcile their configurations.
    fn migrate_test_cases(&mut self, source: &TestSuite, suite_id: i64) -> Result<()> {
        if source.test_cases.is_empty() {
            return Ok(());
        }
        let mut existing = self.store.test_case_entries(suite_id)?;

        for entry in &source.test_cases {
            let identity = compute_identity(
                self.source.endpoint(),
                self.source.project_name(),
                entry.work_item_id,
            );
            let target_id = match self.resolver.find_existing(&*self.store, &identity) {
                Ok(Some(item)) => item.id_or_zero(),
                Ok(None) => {
                    debug!(
                        suite = %source.title,
                        test_case = entry.work_item_id,
                        "Test case not migrated yet"
                    );
                    self.entries.missing += 1;
                    // Later entries of the suite are still added.
                    continue;
                }
                Err(err) => {
                    warn!(test_case = entry.work_item_id, error = %err, "Test case lookup failed");
                    self.entries.failed += 1;
                    continue;
                }
            };

            if existing.iter().any(|e| e.work_item_id == target_id) {
                self.entries.reused += 1;
            } else {
                if let Err(err) = self
                    .store
                    .add_test_cases(suite_id, &[TestCaseEntry::new(target_id)])
                {
                    warn!(suite = suite_id, test_case = target_id, error = %err, "Failed to add test case");
                    self.entries.failed += 1;
                    continue;
                }
                self.entries.added += 1;
                existing = self.store.test_case_entries(suite_id)?;
            }

            if let Some(target_entry) = existing.iter().find(|e| e.work_item_id == target_id) {
                if let ReconcileOutcome::Applied(configs) =
                    reconcile::apply_to_entry(&mut *self.store, suite_id, entry, target_entry, self.catalog)
                {
                    debug!(test_case = target_id, count = configs.len(), "Entry configurations set");
                }
            }
        }
        Ok(())
    }
}

impl<S, T> TreeTarget<TestSuite> for SuiteTarget<'_, S, T>
where
    S: WorkItemStore + ?Sized,
    T: WorkItemStore + TestManagementStore + ?Sized,
{
    type Handle = i64;

    fn lookup_child(&mut self, parent: &i64, source: &TestSuite) -> Result<Option<i64>> {
        Ok(self
            .store
            .child_suites(*parent)?
            .into_iter()
            .find(|suite| suite.title == source.title)
            .map(|suite| suite.id))
    }

    fn create_child(
        &mut self,
        parent: &i64,
        source: &TestSuite,
        _dates: Option<DateRange>,
    ) -> Result<()> {
        let kind = match &source.kind {
            SuiteKind::Requirement { requirement_id } => {
                let target_id = self.migrated_requirement(*requirement_id)?.ok_or_else(|| {
                    MigrateError::not_found("requirement", requirement_id.to_string())
                })?;
                SuiteKind::Requirement {
                    requirement_id: target_id,
                }
            }
            kind @ (SuiteKind::Static | SuiteKind::Dynamic { .. }) => kind.clone(),
        };
        info!(suite = %source.title, kind = kind.as_str(), parent = *parent, "Creating suite");
        self.store.create_suite(*parent, &source.title, &kind).map(|_| ())
    }

    fn skip_reason(&self, source: &TestSuite) -> Option<String> {
        let SuiteKind::Requirement { requirement_id } = source.kind else {
            return None;
        };
        match self.migrated_requirement(requirement_id) {
            Ok(Some(_)) => None,
            Ok(None) => Some(format!("requirement {requirement_id} has not been migrated")),
            Err(err) => Some(format!("requirement {requirement_id} lookup failed: {err}")),
        }
    }

    fn on_resolved(&mut self, source: &TestSuite, handle: &i64, _created: bool) -> Result<()> {
        let target = self
            .store
            .suite_tree(*handle)?
            .ok_or_else(|| MigrateError::not_found("test suite", handle.to_string()))?;
        reconcile::apply_to_suite(&mut *self.store, source, &target, false, self.catalog);

        if source.kind.is_static() {
            self.migrate_test_cases(source, *handle)?;
        }
        Ok(())
    }
}

/// Mirrors plans, suites and suite entries.
pub struct TestPlanMigration<'a, S: ?Sized, T: ?Sized> {
    source: &'a S,
    target: &'a mut T,
    config: &'a MigrationConfig,
}

impl<'a, S, T> TestPlanMigration<'a, S, T>
where
    S: WorkItemStore + TestManagementStore + ?Sized,
    T: WorkItemStore + TestManagementStore + ?Sized,
{
    pub const fn new(source: &'a S, target: &'a mut T, config: &'a MigrationConfig) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the source plans or the target catalog cannot be
    /// read.
    pub fn execute(mut self) -> Result<RunSummary> {
        let plans = self.source.test_plans()?;
        let catalog = ConfigurationCatalog::load(&*self.target)?;
        info!(
            plans = plans.len(),
            configurations = catalog.len(),
            "Found test plans"
        );

        let mut resolver = IdentityResolver::new(self.config.identity_field.clone());
        let mut state = RunState::new(MigrationKind::TestPlans, plans.len());
        for plan in &plans {
            let started = Instant::now();
            let outcome = match self.migrate_plan(plan, &catalog, &mut resolver) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(plan = %plan.name, error = %err, "Failed to migrate test plan");
                    ItemOutcome::Failed
                }
            };
            state.record(outcome, started.elapsed());
        }
        Ok(state.summary())
    }

    fn migrate_plan(
        &mut self,
        plan: &TestPlan,
        catalog: &ConfigurationCatalog,
        resolver: &mut IdentityResolver,
    ) -> Result<ItemOutcome> {
        let name = format!("{}-{}", self.source.project_name(), plan.name);
        let source_root = self
            .source
            .suite_tree(plan.root_suite_id)?
            .ok_or_else(|| MigrateError::not_found("test suite", plan.root_suite_id.to_string()))?;

        let existing = self
            .target
            .test_plans()?
            .into_iter()
            .find(|candidate| candidate.name == name);
        let (target_plan, created) = match existing {
            Some(found) => {
                info!(plan = %name, "Test plan already exists");
                (found, false)
            }
            None => {
                let copy = self.plan_copy(plan, &name);
                let saved = self.target.create_test_plan(&copy)?;
                info!(plan = %name, id = saved.id, "Created test plan");
                let target_root = self
                    .target
                    .suite_tree(saved.root_suite_id)?
                    .ok_or_else(|| MigrateError::not_found("test suite", saved.root_suite_id.to_string()))?;
                reconcile::apply_to_suite(&mut *self.target, &source_root, &target_root, true, catalog);
                (saved, true)
            }
        };

        let mut suites = SuiteTarget {
            source: self.source,
            store: &mut *self.target,
            catalog,
            resolver,
            entries: EntryCounts::default(),
        };
        let report = sync_tree(&mut suites, &source_root, &target_plan.root_suite_id, false);
        suites.migrate_test_cases(&source_root, target_plan.root_suite_id)?;

        let entries = suites.entries;
        info!(
            plan = %name,
            suites_created = report.created,
            suites_reused = report.reused,
            suites_skipped = report.skipped,
            suites_failed = report.failed,
            test_cases_added = entries.added,
            test_cases_reused = entries.reused,
            test_cases_missing = entries.missing,
            test_cases_failed = entries.failed,
            "Test plan synchronized"
        );
        Ok(if created || report.created > 0 || entries.added > 0 {
            ItemOutcome::Migrated
        } else {
            ItemOutcome::Skipped
        })
    }

    fn plan_copy(&self, plan: &TestPlan, name: &str) -> TestPlan {
        let policy = self.config.path_policy();
        let source_project = self.source.project_name();
        let target_project = self.target.project_name();
        let rewrite = |path: &str| {
            if path.is_empty() {
                String::new()
            } else {
                policy.rewrite(path, source_project, target_project)
            }
        };
        TestPlan {
            id: 0,
            name: name.to_string(),
            description: plan.description.clone(),
            area_path: rewrite(&plan.area_path),
            iteration: rewrite(&plan.iteration),
            start_date: plan.start_date,
            end_date: plan.end_date,
            root_suite_id: 0,
        }
    }
}
