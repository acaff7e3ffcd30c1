//! Core data types for `wit_migrate`.
//!
//! - [`WorkItem`] with its field bag, links and full revision history
//! - [`ClassificationNode`] trees for areas and iterations
//! - Test management entities ([`TestConfiguration`], [`TestPlan`], [`TestSuite`])
//! - Shared query hierarchy items ([`QueryItem`])

mod classification;
mod query;
mod test_plan;
mod work_item;

pub use classification::{ClassificationNode, DateRange, NodeKind, PATH_SEPARATOR, join_path};
pub use query::{QUERY_PATH_SEPARATOR, QueryDefinition, QueryFolder, QueryItem, join_query_path};
pub use test_plan::{
    ConfigRef, SuiteKind, TestCaseEntry, TestConfiguration, TestPlan, TestSuite,
};
pub use work_item::{
    FieldDefinition, Link, LinkKind, Revision, WorkItem, WorkItemQuery, WorkItemType,
    display_value, fields, is_empty_value,
};
