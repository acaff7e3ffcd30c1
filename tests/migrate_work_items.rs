mod common;

use common::{
    SOURCE_ENDPOINT, SOURCE_PROJECT, TARGET_ENDPOINT, TARGET_PROJECT, add_work_item,
    config_with_types, migrated_items, source_store, target_store,
};
use wit_migrate::identity::{DEFAULT_IDENTITY_FIELD, compute_identity, parse_identity};
use wit_migrate::migrate::{MigrationEngine, MigrationKind};
use wit_migrate::model::{FieldDefinition, NodeKind, fields};
use wit_migrate::replicate::{ReplicationOutcome, WorkItemReplicator};
use wit_migrate::storage::{ClassificationStore, SqliteStore, WorkItemStore};
use wit_migrate::MigrationConfig;

fn engine(source: SqliteStore, config: MigrationConfig) -> MigrationEngine<SqliteStore, SqliteStore> {
    let mut engine = MigrationEngine::new(source, target_store(), config).expect("engine");
    engine.run(MigrationKind::Nodes).expect("nodes");
    engine
}

#[test]
fn mapped_type_is_migrated_and_unmapped_type_is_skipped() {
    let mut source = source_store();
    let bug = add_work_item(&mut source, "Bug", "Crash on start");
    add_work_item(&mut source, "Epic", "Platform rewrite");

    let mut engine = engine(source, config_with_types(&[("Bug", "Bug")]));
    let summary = engine.run(MigrationKind::WorkItems).expect("run");

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.migrated, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let items = migrated_items(engine.target());
    assert_eq!(items.len(), 1);
    let migrated = &items[0];
    let expected = compute_identity(SOURCE_ENDPOINT, SOURCE_PROJECT, bug.id_or_zero());
    assert_eq!(
        migrated.field_str(DEFAULT_IDENTITY_FIELD),
        Some(expected.as_str())
    );
    assert_eq!(
        parse_identity(expected.as_str()).unwrap(),
        bug.id_or_zero()
    );
    assert_eq!(migrated.title(), "Crash on start");
    assert_eq!(migrated.area_path(), "ProjectB\\Team1");
    assert_eq!(migrated.iteration_path(), "ProjectB\\Sprint 1");
    assert_eq!(migrated.project(), TARGET_PROJECT);
}

#[test]
fn second_run_creates_nothing() {
    let mut source = source_store();
    add_work_item(&mut source, "Bug", "Crash on start");
    add_work_item(&mut source, "Bug", "Slow login");
    add_work_item(&mut source, "Epic", "Platform rewrite");

    let mut engine = engine(source, config_with_types(&[("Bug", "Bug")]));
    let first = engine.run(MigrationKind::WorkItems).expect("first run");
    assert_eq!(first.migrated, 2);
    let count = engine.target().count_work_items().unwrap();

    let second = engine.run(MigrationKind::WorkItems).expect("second run");
    assert_eq!(second.migrated, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(engine.target().count_work_items().unwrap(), count);
}

#[test]
fn history_is_synthesized_into_first_revision() {
    let mut source = source_store();
    add_work_item(&mut source, "Bug", "Crash on start");

    let mut engine = engine(source, config_with_types(&[("Bug", "Bug")]));
    engine.run(MigrationKind::WorkItems).expect("run");

    let items = migrated_items(engine.target());
    let first_revision = &items[0].revisions[0];
    let history = first_revision
        .field(fields::HISTORY)
        .and_then(|value| value.as_str())
        .expect("history");
    let newest = history.find("Bob Builder on").expect("second revision");
    let oldest = history.find("Ann Author on").expect("first revision");
    assert!(newest < oldest);
    assert!(history.contains("<p>Created from triage</p>"));
    assert!(history.contains("Crash on start (draft)"));
}

#[test]
fn created_by_is_kept_only_when_requested() {
    let mut source = source_store();
    add_work_item(&mut source, "Bug", "Crash on start");
    let mut config = config_with_types(&[("Bug", "Bug")]);
    config.update_created_by = true;

    let mut engine = engine(source, config);
    engine.run(MigrationKind::WorkItems).expect("run");
    let items = migrated_items(engine.target());
    assert_eq!(items[0].field_str(fields::CREATED_BY), Some("Ann Author"));

    let mut source = source_store();
    add_work_item(&mut source, "Bug", "Crash on start");
    let mut engine = self::engine(source, config_with_types(&[("Bug", "Bug")]));
    engine.run(MigrationKind::WorkItems).expect("run");
    let items = migrated_items(engine.target());
    assert_ne!(items[0].field_str(fields::CREATED_BY), Some("Ann Author"));
}

#[test]
fn created_date_is_kept_only_when_requested() {
    const ORIGINAL: &str = "2020-01-02T03:04:05Z";
    let source_with_old_item = || {
        let mut source = source_store();
        let mut bug = add_work_item(&mut source, "Bug", "Crash on start");
        bug.set_field(fields::CREATED_DATE, ORIGINAL);
        source.save_work_item(&mut bug).unwrap();
        source
    };

    let mut config = config_with_types(&[("Bug", "Bug")]);
    config.update_created_date = true;
    let mut engine = engine(source_with_old_item(), config);
    engine.run(MigrationKind::WorkItems).expect("run");
    let items = migrated_items(engine.target());
    assert_eq!(items[0].field_str(fields::CREATED_DATE), Some(ORIGINAL));

    let mut engine = self::engine(source_with_old_item(), config_with_types(&[("Bug", "Bug")]));
    engine.run(MigrationKind::WorkItems).expect("run");
    let items = migrated_items(engine.target());
    let assigned = items[0].field_str(fields::CREATED_DATE).expect("created date");
    assert_ne!(assigned, ORIGINAL);
}

/// Target whose Bug type also requires a field no source item carries.
fn strict_target() -> SqliteStore {
    let mut target = target_store();
    let mut bug = common::work_item_type("Bug");
    let must = FieldDefinition::editable("Custom.Must", "Must").required();
    bug.fields.insert(must.reference_name.clone(), must);
    target.define_work_item_type(&bug).unwrap();
    target
}

#[test]
fn validation_failures_do_not_block_the_save() {
    let mut source = source_store();
    let mut bug = add_work_item(&mut source, "Bug", "Crash on start");
    let mut target = strict_target();
    target
        .create_node(NodeKind::Area, TARGET_PROJECT, "Team1", None)
        .unwrap();
    target
        .create_node(NodeKind::Iteration, TARGET_PROJECT, "Sprint 1", None)
        .unwrap();

    let config = config_with_types(&[("Bug", "Bug")]);
    let replicator = WorkItemReplicator::new(config.replication_options());
    let outcome = replicator
        .replicate(&mut source, &mut target, &mut bug, "Bug")
        .unwrap();
    match outcome {
        ReplicationOutcome::Saved {
            target_id,
            invalid_fields,
            ..
        } => {
            assert_eq!(invalid_fields, vec!["Custom.Must".to_string()]);
            assert!(target.get_work_item(target_id).unwrap().is_some());
        }
        other @ ReplicationOutcome::SaveFailed { .. } => panic!("expected a save: {other:?}"),
    }

    let mut source = source_store();
    add_work_item(&mut source, "Bug", "Slow login");
    let mut engine = MigrationEngine::new(source, strict_target(), config).unwrap();
    engine.run(MigrationKind::Nodes).unwrap();
    let summary = engine.run(MigrationKind::WorkItems).unwrap();
    assert_eq!(summary.migrated, 1);
    assert_eq!(summary.failed, 0);
}

#[test]
fn source_is_marked_with_target_identity() {
    let mut source = source_store();
    let bug = add_work_item(&mut source, "Bug", "Crash on start");
    let mut config = config_with_types(&[("Bug", "Bug")]);
    config.update_source_identity = true;

    let mut engine = engine(source, config);
    engine.run(MigrationKind::WorkItems).expect("run");

    let target_id = migrated_items(engine.target())[0].id_or_zero();
    let marked = engine
        .source()
        .get_work_item(bug.id_or_zero())
        .unwrap()
        .unwrap();
    let expected = compute_identity(TARGET_ENDPOINT, TARGET_PROJECT, target_id);
    assert_eq!(
        marked.field_str(DEFAULT_IDENTITY_FIELD),
        Some(expected.as_str())
    );

    let rerun = engine.run(MigrationKind::WorkItems).expect("rerun");
    assert_eq!(rerun.migrated, 0);
}

#[test]
fn non_numeric_backlog_priority_is_reset() {
    let mut source = source_store();
    let mut bug = add_work_item(&mut source, "Bug", "Crash on start");
    bug.set_field(fields::BACKLOG_PRIORITY, "high");
    source.save_work_item(&mut bug).unwrap();

    let mut engine = engine(source, config_with_types(&[("Bug", "Bug")]));
    engine.run(MigrationKind::WorkItems).expect("run");

    let items = migrated_items(engine.target());
    assert_eq!(
        items[0].field(fields::BACKLOG_PRIORITY),
        Some(&serde_json::Value::from(10))
    );
}

#[test]
fn save_failure_is_counted_and_run_continues() {
    let mut source = source_store();
    add_work_item(&mut source, "Bug", "Crash on start");
    add_work_item(&mut source, "Bug", "Slow login");

    // No node migration, so the rewritten area path does not exist.
    let mut engine =
        MigrationEngine::new(source, target_store(), config_with_types(&[("Bug", "Bug")]))
            .unwrap();
    let summary = engine.run(MigrationKind::WorkItems).expect("run");

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.migrated, 0);
    assert_eq!(engine.target().count_work_items().unwrap(), 0);
}

#[test]
fn prefix_policy_rewrites_paths_under_source_project() {
    let mut source = source_store();
    add_work_item(&mut source, "Bug", "Crash on start");
    let mut config = config_with_types(&[("Bug", "Bug")]);
    config.prefix_project_to_nodes = true;

    let mut engine = engine(source, config);
    engine.run(MigrationKind::WorkItems).expect("run");

    let items = migrated_items(engine.target());
    assert_eq!(items[0].area_path(), "ProjectB\\ProjectA\\Team1");
}

#[test]
fn type_filter_restricts_the_source_query() {
    let mut source = source_store();
    add_work_item(&mut source, "Bug", "Crash on start");
    add_work_item(&mut source, "Epic", "Platform rewrite");
    let mut config = config_with_types(&[("Bug", "Bug")]);
    config.work_item_types = vec!["Bug".to_string()];

    let mut engine = engine(source, config);
    let summary = engine.run(MigrationKind::WorkItems).expect("run");
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.migrated, 1);
}
