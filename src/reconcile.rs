//! Configuration reconciliation.
//!
//! Source and target keep independent configuration catalogs, so references
//! are translated by name against a snapshot of the target catalog taken once
//! per run. Names the target does not know are dropped.

use crate::error::Result;
use crate::model::{ConfigRef, TestCaseEntry, TestConfiguration, TestSuite};
use crate::storage::TestManagementStore;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Snapshot of the target's named configurations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationCatalog {
    by_name: BTreeMap<String, ConfigRef>,
}

impl ConfigurationCatalog {
    /// Load the catalog from a target store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configurations cannot be read.
    pub fn load<S: TestManagementStore + ?Sized>(store: &S) -> Result<Self> {
        let catalog = Self::from_configurations(&store.test_configurations()?);
        debug!(count = catalog.len(), "Loaded configuration catalog");
        Ok(catalog)
    }

    #[must_use]
    pub fn from_configurations(configurations: &[TestConfiguration]) -> Self {
        let mut by_name = BTreeMap::new();
        for configuration in configurations {
            by_name
                .entry(configuration.name.clone())
                .or_insert_with(|| configuration.to_ref());
        }
        Self { by_name }
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&ConfigRef> {
        self.by_name.get(name)
    }

    #[must_use]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Translate source references into target references by exact name.
#[must_use]
pub fn reconcile(source: &[ConfigRef], catalog: &ConfigurationCatalog) -> Vec<ConfigRef> {
    let mut resolved: Vec<ConfigRef> = Vec::with_capacity(source.len());
    for reference in source {
        match catalog.resolve(&reference.name) {
            Some(found) if !resolved.contains(found) => resolved.push(found.clone()),
            Some(_) => {}
            None => debug!(name = %reference.name, "Configuration not in target catalog"),
        }
    }
    resolved
}

/// Whether a reconciliation pass is warranted.
#[must_use]
pub fn needs_reconcile(source: Option<&[ConfigRef]>, target_count: usize) -> bool {
    source.is_some_and(|configs| configs.len() != target_count)
}

/// What happened when a translated set was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Counts already matched; nothing was written.
    InSync,
    Applied(Vec<ConfigRef>),
    /// The target refused the update; whatever it committed stays.
    Rejected(String),
}

/// Reconcile the configurations of one suite entry.
pub fn apply_to_entry<S: TestManagementStore + ?Sized>(
    store: &mut S,
    suite_id: i64,
    source: &TestCaseEntry,
    target: &TestCaseEntry,
    catalog: &ConfigurationCatalog,
) -> ReconcileOutcome {
    let Some(source_configs) = source.configurations.as_deref() else {
        return ReconcileOutcome::InSync;
    };
    if !needs_reconcile(Some(source_configs), target.configuration_count()) {
        return ReconcileOutcome::InSync;
    }

    let resolved = reconcile(source_configs, catalog);
    let work_item_id = target.work_item_id;
    let result = store
        .clear_entry_configurations(suite_id, work_item_id)
        .and_then(|()| store.set_entry_configurations(suite_id, work_item_id, &resolved));
    finish(result, resolved, "entry", work_item_id)
}

/// Reconcile the default configurations of a suite.
///
/// A plan's root suite is never cleared first.
pub fn apply_to_suite<S: TestManagementStore + ?Sized>(
    store: &mut S,
    source: &TestSuite,
    target: &TestSuite,
    is_root: bool,
    catalog: &ConfigurationCatalog,
) -> ReconcileOutcome {
    let Some(source_configs) = source.default_configurations.as_deref() else {
        return ReconcileOutcome::InSync;
    };
    if !needs_reconcile(Some(source_configs), target.default_configuration_count()) {
        return ReconcileOutcome::InSync;
    }

    let resolved = reconcile(source_configs, catalog);
    let result = if is_root {
        store.set_default_configurations(target.id, &resolved)
    } else {
        store
            .clear_default_configurations(target.id)
            .and_then(|()| store.set_default_configurations(target.id, &resolved))
    };
    finish(result, resolved, "suite", target.id)
}

fn finish(
    result: Result<()>,
    resolved: Vec<ConfigRef>,
    scope: &str,
    id: i64,
) -> ReconcileOutcome {
    match result {
        Ok(()) => {
            debug!(scope, id, count = resolved.len(), "Applied configurations");
            ReconcileOutcome::Applied(resolved)
        }
        Err(err) => {
            warn!(scope, id, error = %err, "Configuration update rejected");
            ReconcileOutcome::Rejected(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDefinition, SuiteKind, TestPlan, WorkItemType, fields};
    use crate::storage::{SqliteStore, WorkItemStore};
    use proptest::prelude::*;

    fn catalog(names: &[&str]) -> ConfigurationCatalog {
        let configurations: Vec<TestConfiguration> = names
            .iter()
            .zip(1..)
            .map(|(name, id)| {
                let mut config = TestConfiguration::new(*name);
                config.id = id;
                config
            })
            .collect();
        ConfigurationCatalog::from_configurations(&configurations)
    }

    #[test]
    fn unresolved_names_are_dropped() {
        let source = vec![
            ConfigRef::new(7, "Windows-x64"),
            ConfigRef::new(8, "Linux-x64"),
        ];
        let resolved = reconcile(&source, &catalog(&["Windows-x64"]));
        assert_eq!(resolved, vec![ConfigRef::new(1, "Windows-x64")]);
    }

    #[test]
    fn matching_is_exact() {
        let source = vec![ConfigRef::new(7, "windows-x64")];
        assert!(reconcile(&source, &catalog(&["Windows-x64"])).is_empty());
    }

    #[test]
    fn gate_requires_source_and_count_difference() {
        let configs = vec![ConfigRef::new(1, "A")];
        assert!(!needs_reconcile(None, 3));
        assert!(!needs_reconcile(Some(&configs), 1));
        assert!(needs_reconcile(Some(&configs), 0));
    }

    /// Store with one plan whose root suite holds one test case entry
    /// configured for `Win`; returns the root suite id and the test case id.
    fn store_with_entry() -> (SqliteStore, i64, i64) {
        let mut store = SqliteStore::open_memory("http://tfs:8080/tfs/Coll", "Beta").unwrap();
        store
            .define_work_item_type(&WorkItemType::new(
                "Test Case",
                [FieldDefinition::editable(fields::TITLE, "Title").required()],
            ))
            .unwrap();
        let mut test_case = store.new_work_item("Test Case").unwrap();
        test_case.set_field(fields::TITLE, "Login works");
        let test_case_id = store.save_work_item(&mut test_case).unwrap();

        let win_id = store
            .create_test_configuration(&TestConfiguration::new("Win"))
            .unwrap();
        let plan = store.create_test_plan(&TestPlan::new("Release")).unwrap();
        store
            .add_test_cases(
                plan.root_suite_id,
                &[TestCaseEntry {
                    work_item_id: test_case_id,
                    configurations: Some(vec![ConfigRef::new(win_id, "Win")]),
                }],
            )
            .unwrap();
        (store, plan.root_suite_id, test_case_id)
    }

    fn stale_catalog() -> ConfigurationCatalog {
        let mut win = TestConfiguration::new("Win");
        win.id = 99;
        let mut linux = TestConfiguration::new("Linux");
        linux.id = 98;
        ConfigurationCatalog::from_configurations(&[win, linux])
    }

    #[test]
    fn rejected_suite_update_is_swallowed() {
        let (mut store, root, _) = store_with_entry();
        let target = store.suite_tree(root).unwrap().unwrap();
        let mut source = TestSuite::new("Smoke", SuiteKind::Static);
        source.default_configurations = Some(vec![ConfigRef::new(1, "Win")]);

        let outcome = apply_to_suite(&mut store, &source, &target, false, &stale_catalog());
        assert!(
            matches!(&outcome, ReconcileOutcome::Rejected(message) if message.contains("99")),
            "{outcome:?}"
        );
    }

    #[test]
    fn rejected_entry_update_leaves_list_cleared() {
        let (mut store, root, test_case_id) = store_with_entry();
        let target = store.test_case_entries(root).unwrap().remove(0);
        let source = TestCaseEntry {
            work_item_id: 5,
            configurations: Some(vec![ConfigRef::new(1, "Win"), ConfigRef::new(2, "Linux")]),
        };

        let outcome = apply_to_entry(&mut store, root, &source, &target, &stale_catalog());
        assert!(matches!(outcome, ReconcileOutcome::Rejected(_)), "{outcome:?}");

        let entries = store.test_case_entries(root).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].work_item_id, test_case_id);
        assert_eq!(entries[0].configurations, Some(Vec::new()));
    }

    proptest! {
        #[test]
        fn reconciled_names_are_in_both_sets(
            source in proptest::collection::vec("[A-D]", 0..6),
            target in proptest::collection::vec("[A-D]", 0..6),
        ) {
            let refs: Vec<ConfigRef> = source.iter().map(|n| ConfigRef::new(0, n.clone())).collect();
            let target_names: Vec<&str> = target.iter().map(String::as_str).collect();
            let catalog = catalog(&target_names);
            for resolved in reconcile(&refs, &catalog) {
                prop_assert!(source.contains(&resolved.name));
                prop_assert!(target.contains(&resolved.name));
                prop_assert_eq!(catalog.resolve(&resolved.name), Some(&resolved));
            }
        }
    }
}
