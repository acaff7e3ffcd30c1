//! Project store collaborators.
//!
//! The migration engine never talks to a concrete backend. It consumes the
//! capabilities below, each scoped to a single project:
//!
//! - [`WorkItemStore`] - query, factory, field definitions, validation, save
//! - [`ClassificationStore`] - area/iteration lookup and creation
//! - [`TestManagementStore`] - configurations, plans, suites, suite entries
//! - [`QueryStore`] - shared query folders and definitions
//!
//! Lookups return `Option` for "does not exist"; creation of something that
//! already exists fails with [`MigrateError::AlreadyExists`].
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - `SQLite` implementation of every capability

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::{MigrateError, Result};
use crate::model::{
    ClassificationNode, ConfigRef, DateRange, NodeKind, QueryItem, SuiteKind, TestCaseEntry,
    TestConfiguration, TestPlan, TestSuite, WorkItem, WorkItemQuery, WorkItemType, fields,
};

/// Identity of the project a store is bound to.
pub trait ProjectStore {
    /// Collection endpoint, e.g. `https://dev.example.com/tfs/DefaultCollection`.
    fn endpoint(&self) -> &str;
    fn project_name(&self) -> &str;
}

/// Work item capabilities.
pub trait WorkItemStore: ProjectStore {
    /// Items matching the filter, most recently changed first.
    fn query_work_items(&self, query: &WorkItemQuery) -> Result<Vec<WorkItem>>;

    /// Fully loaded item (fields, links, revisions).
    fn get_work_item(&self, id: i64) -> Result<Option<WorkItem>>;

    fn work_item_type(&self, name: &str) -> Result<Option<WorkItemType>>;

    /// Reference names of fields that fail the type's rules.
    fn validate_work_item(&self, item: &WorkItem) -> Result<Vec<String>>;

    /// Commit the item, assigning `id` on first save. Returns the id.
    fn save_work_item(&mut self, item: &mut WorkItem) -> Result<i64>;

    /// New unsaved item of `type_name` within this project.
    fn new_work_item(&self, type_name: &str) -> Result<WorkItem> {
        if self.work_item_type(type_name)?.is_none() {
            return Err(MigrateError::not_found("work item type", type_name));
        }
        let mut item = WorkItem::new(type_name);
        item.set_field(fields::TEAM_PROJECT, self.project_name());
        Ok(item)
    }
}

/// Area and iteration tree capabilities.
pub trait ClassificationStore: ProjectStore {
    /// Full tree rooted at the project node.
    fn classification_tree(&self, kind: NodeKind) -> Result<ClassificationNode>;

    /// Node at `path` without its children.
    fn lookup_node(&self, kind: NodeKind, path: &str) -> Result<Option<ClassificationNode>>;

    fn create_node(
        &mut self,
        kind: NodeKind,
        parent_path: &str,
        name: &str,
        dates: Option<DateRange>,
    ) -> Result<()>;
}

/// Test management capabilities.
pub trait TestManagementStore: ProjectStore {
    fn test_configurations(&self) -> Result<Vec<TestConfiguration>>;

    /// Returns the new catalog id.
    fn create_test_configuration(&mut self, configuration: &TestConfiguration) -> Result<i64>;

    fn test_plans(&self) -> Result<Vec<TestPlan>>;

    /// Creates the plan and its root suite; returns the saved plan.
    fn create_test_plan(&mut self, plan: &TestPlan) -> Result<TestPlan>;

    /// Suite with its full subtree and test case entries.
    fn suite_tree(&self, suite_id: i64) -> Result<Option<TestSuite>>;

    /// Direct children, without their subtrees.
    fn child_suites(&self, parent_id: i64) -> Result<Vec<TestSuite>>;

    /// Returns the new suite id.
    fn create_suite(&mut self, parent_id: i64, title: &str, kind: &SuiteKind) -> Result<i64>;

    fn clear_default_configurations(&mut self, suite_id: i64) -> Result<()>;

    fn set_default_configurations(&mut self, suite_id: i64, configs: &[ConfigRef]) -> Result<()>;

    fn test_case_entries(&self, suite_id: i64) -> Result<Vec<TestCaseEntry>>;

    fn add_test_cases(&mut self, suite_id: i64, entries: &[TestCaseEntry]) -> Result<()>;

    fn clear_entry_configurations(&mut self, suite_id: i64, work_item_id: i64) -> Result<()>;

    fn set_entry_configurations(
        &mut self,
        suite_id: i64,
        work_item_id: i64,
        configs: &[ConfigRef],
    ) -> Result<()>;
}

/// Every capability a migration run needs from one side.
pub trait MigrationStore:
    WorkItemStore + ClassificationStore + TestManagementStore + QueryStore
{
}

impl<S> MigrationStore for S where
    S: WorkItemStore + ClassificationStore + TestManagementStore + QueryStore
{
}

/// Shared query hierarchy capabilities.
pub trait QueryStore: ProjectStore {
    /// Root folders with their full subtrees.
    fn query_hierarchy(&self) -> Result<Vec<QueryItem>>;

    /// Item at `path` without its children.
    fn lookup_query_item(&self, path: &str) -> Result<Option<QueryItem>>;

    fn create_query_folder(&mut self, parent_path: &str, name: &str) -> Result<()>;

    fn create_query_definition(&mut self, parent_path: &str, name: &str, text: &str)
    -> Result<()>;
}
