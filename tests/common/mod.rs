#![allow(dead_code)]

use std::sync::Once;
use wit_migrate::config::MigrationConfig;
use wit_migrate::identity::DEFAULT_IDENTITY_FIELD;
use wit_migrate::model::{FieldDefinition, NodeKind, WorkItem, WorkItemQuery, WorkItemType, fields};
use wit_migrate::storage::{ClassificationStore, SqliteStore, WorkItemStore};

pub mod fixtures;

pub const SOURCE_ENDPOINT: &str = "https://source.example.com/tfs/DefaultCollection";
pub const TARGET_ENDPOINT: &str = "https://target.example.com/tfs/DefaultCollection";
pub const SOURCE_PROJECT: &str = "ProjectA";
pub const TARGET_PROJECT: &str = "ProjectB";

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        wit_migrate::logging::init_test_logging();
    });
}

/// A work item type with the common system fields and the identity field.
pub fn work_item_type(name: &str) -> WorkItemType {
    WorkItemType::new(
        name,
        [
            FieldDefinition::editable(fields::TITLE, "Title").required(),
            FieldDefinition::editable(fields::STATE, "State"),
            FieldDefinition::editable(fields::AREA_PATH, "Area Path"),
            FieldDefinition::editable(fields::ITERATION_PATH, "Iteration Path"),
            FieldDefinition::editable(fields::HISTORY, "History"),
            FieldDefinition::read_only(fields::CREATED_DATE, "Created Date"),
            FieldDefinition::read_only(fields::CREATED_BY, "Created By"),
            FieldDefinition::editable(fields::BACKLOG_PRIORITY, "Backlog Priority"),
            FieldDefinition::editable("System.Description", "Description"),
            FieldDefinition::read_only(fields::ID, "ID"),
            FieldDefinition::read_only(fields::REV, "Rev"),
            FieldDefinition::read_only(fields::CHANGED_DATE, "Changed Date"),
            FieldDefinition::editable(DEFAULT_IDENTITY_FIELD, "Reflected Work Item Id"),
        ],
    )
}

/// Source project with Bug, Epic, Requirement and Test Case types and a
/// small area/iteration tree.
pub fn source_store() -> SqliteStore {
    init_test_logging();
    let mut store =
        SqliteStore::open_memory(SOURCE_ENDPOINT, SOURCE_PROJECT).expect("source store");
    for name in ["Bug", "Epic", "Requirement", "Test Case"] {
        store
            .define_work_item_type(&work_item_type(name))
            .expect("define type");
    }
    store
        .create_node(NodeKind::Area, SOURCE_PROJECT, "Team1", None)
        .expect("area");
    store
        .create_node(NodeKind::Area, "ProjectA\\Team1", "SubTeam", None)
        .expect("area");
    store
        .create_node(NodeKind::Iteration, SOURCE_PROJECT, "Sprint 1", None)
        .expect("iteration");
    store
}

/// Empty target project that knows Bug, Requirement and Test Case.
pub fn target_store() -> SqliteStore {
    init_test_logging();
    let mut store =
        SqliteStore::open_memory(TARGET_ENDPOINT, TARGET_PROJECT).expect("target store");
    for name in ["Bug", "Requirement", "Test Case"] {
        store
            .define_work_item_type(&work_item_type(name))
            .expect("define type");
    }
    store
}

/// Save a work item with two revisions: created, then retitled.
pub fn add_work_item(store: &mut SqliteStore, type_name: &str, title: &str) -> WorkItem {
    let mut item = store.new_work_item(type_name).expect("new item");
    item.set_field(fields::TITLE, format!("{title} (draft)"));
    item.set_field(fields::STATE, "New");
    item.set_field(fields::AREA_PATH, "ProjectA\\Team1");
    item.set_field(fields::ITERATION_PATH, "ProjectA\\Sprint 1");
    item.set_field(fields::HISTORY, "Created from triage");
    item.set_field(fields::CHANGED_BY, "Ann Author");
    store.save_work_item(&mut item).expect("first save");

    item.set_field(fields::TITLE, title);
    item.set_field(fields::STATE, "Active");
    item.set_field(fields::CHANGED_BY, "Bob Builder");
    store.save_work_item(&mut item).expect("second save");
    item
}

/// Default configuration plus a source-to-target type mapping.
pub fn config_with_types(pairs: &[(&str, &str)]) -> MigrationConfig {
    let mut config = MigrationConfig::default();
    for (source, target) in pairs {
        config
            .type_map
            .insert((*source).to_string(), (*target).to_string());
    }
    config
}

/// Target items whose identity field is set.
pub fn migrated_items(store: &SqliteStore) -> Vec<WorkItem> {
    let query = WorkItemQuery::in_project(TARGET_PROJECT).field_not_empty(DEFAULT_IDENTITY_FIELD);
    store.query_work_items(&query).expect("query")
}
