//! Test plan and query fixtures.

use wit_migrate::model::{
    ConfigRef, SuiteKind, TestCaseEntry, TestConfiguration, TestPlan, WorkItem, join_query_path,
};
use wit_migrate::storage::sqlite::{MY_QUERIES, SHARED_QUERIES};
use wit_migrate::storage::{QueryStore, SqliteStore, TestManagementStore};

pub struct PlanFixture {
    pub plan: TestPlan,
    pub windows: ConfigRef,
    pub linux: ConfigRef,
}

pub fn configuration(store: &mut SqliteStore, name: &str) -> ConfigRef {
    let id = store
        .create_test_configuration(&TestConfiguration::new(name))
        .expect("configuration");
    ConfigRef::new(id, name)
}

/// Plan "Release 1":
///
/// - root suite defaults to both configurations and holds `test_case`
/// - static "Smoke" with the same test case and a dynamic "Open bugs" child
/// - requirement suite "Login requirement" pointing at `requirement`
pub fn release_plan(
    store: &mut SqliteStore,
    test_case: &WorkItem,
    requirement: &WorkItem,
) -> PlanFixture {
    let windows = configuration(store, "Windows-x64");
    let linux = configuration(store, "Linux-x64");

    let plan = store
        .create_test_plan(&TestPlan::new("Release 1"))
        .expect("plan");
    let root = plan.root_suite_id;
    store
        .set_default_configurations(root, &[windows.clone(), linux.clone()])
        .expect("root defaults");
    store
        .add_test_cases(
            root,
            &[TestCaseEntry {
                work_item_id: test_case.id_or_zero(),
                configurations: Some(vec![windows.clone(), linux.clone()]),
            }],
        )
        .expect("root entries");

    let smoke = store
        .create_suite(root, "Smoke", &SuiteKind::Static)
        .expect("smoke suite");
    store
        .set_default_configurations(smoke, &[windows.clone(), linux.clone()])
        .expect("smoke defaults");
    store
        .add_test_cases(smoke, &[TestCaseEntry::new(test_case.id_or_zero())])
        .expect("smoke entries");
    store
        .create_suite(
            smoke,
            "Open bugs",
            &SuiteKind::Dynamic {
                query: "SELECT [System.Id] FROM WorkItems WHERE [System.WorkItemType] = 'Bug'"
                    .to_string(),
            },
        )
        .expect("dynamic suite");

    store
        .create_suite(
            root,
            "Login requirement",
            &SuiteKind::Requirement {
                requirement_id: requirement.id_or_zero(),
            },
        )
        .expect("requirement suite");

    PlanFixture {
        plan,
        windows,
        linux,
    }
}

/// `Shared Queries/Triage/Active bugs` plus one personal query.
pub fn shared_queries(store: &mut SqliteStore, project: &str) {
    let shared = join_query_path(project, SHARED_QUERIES);
    store.create_query_folder(&shared, "Triage").expect("folder");
    store
        .create_query_definition(
            &join_query_path(&shared, "Triage"),
            "Active bugs",
            &format!(
                "SELECT [System.Id] FROM WorkItems WHERE [System.AreaPath] UNDER '{project}\\Team1'"
            ),
        )
        .expect("definition");
    store
        .create_query_definition(
            &join_query_path(project, MY_QUERIES),
            "Assigned to me",
            "SELECT [System.Id] FROM WorkItems WHERE [System.AssignedTo] = @Me",
        )
        .expect("personal definition");
}
