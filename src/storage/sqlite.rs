//! `SQLite` project store.
//!
//! One database file holds exactly one project. Besides plain persistence the
//! store plays the part of the remote server: it assigns ids and revisions,
//! keeps revision snapshots, recomputes link counts, and enforces the rules a
//! real target enforces (known types, existing classification paths, unique
//! sibling names, configurations that exist in the catalog).

use crate::error::{MigrateError, Result};
use crate::model::{
    ClassificationNode, ConfigRef, DateRange, FieldDefinition, Link, LinkKind, NodeKind,
    QueryDefinition, QueryFolder, QueryItem, Revision, SuiteKind, TestCaseEntry,
    TestConfiguration, TestPlan, TestSuite, WorkItem, WorkItemQuery, WorkItemType, fields,
    join_path, join_query_path,
};
use crate::storage::schema::apply_schema;
use crate::storage::{
    ClassificationStore, ProjectStore, QueryStore, TestManagementStore, WorkItemStore,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

const META_ENDPOINT: &str = "endpoint";
const META_PROJECT: &str = "project";

/// Root query folder for team-visible queries.
pub const SHARED_QUERIES: &str = "Shared Queries";
/// Root query folder for per-user queries.
pub const MY_QUERIES: &str = "My Queries";

/// Actor recorded when a save does not name one.
const DEFAULT_ACTOR: &str = "Project Collection Service Accounts";

static QUERY_PATH_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\[System\.(AreaPath|IterationPath)\]\s*(?:=|<>|NOT\s+UNDER|UNDER)\s*'([^']*)'",
    )
    .expect("query path clause regex")
});

/// SQLite-backed store for a single project.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    endpoint: String,
    project: String,
}

impl SqliteStore {
    /// Open an initialized project store.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Setup`] if the database has never been
    /// initialized, or a database error if it cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Self::from_connection(conn).map_err(|err| match err {
            MigrateError::Setup(msg) => {
                MigrateError::Setup(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Create and initialize a new project store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Setup`] if the file already holds a project.
    pub fn create(path: &Path, endpoint: &str, project: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        if read_metadata(&conn, META_PROJECT)?.is_some() {
            return Err(MigrateError::Setup(format!(
                "{} is already initialized",
                path.display()
            )));
        }
        initialize(&conn, endpoint, project)?;
        Self::from_connection(conn)
    }

    /// Open an initialized in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory(endpoint: &str, project: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        initialize(&conn, endpoint, project)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let endpoint = read_metadata(&conn, META_ENDPOINT)?;
        let project = read_metadata(&conn, META_PROJECT)?;
        match (endpoint, project) {
            (Some(endpoint), Some(project)) => Ok(Self {
                conn,
                endpoint,
                project,
            }),
            _ => Err(MigrateError::Setup(
                "project store is not initialized (run `wit-migrate init`)".to_string(),
            )),
        }
    }

    /// Create or replace a work item type definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn define_work_item_type(&mut self, ty: &WorkItemType) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO work_item_types (name) VALUES (?)",
            [&ty.name],
        )?;
        tx.execute(
            "DELETE FROM work_item_type_fields WHERE type_name = ?",
            [&ty.name],
        )?;
        for def in ty.fields.values() {
            tx.execute(
                "INSERT INTO work_item_type_fields (type_name, reference_name, name, editable, required)
                 VALUES (?, ?, ?, ?, ?)",
                params![ty.name, def.reference_name, def.name, def.editable, def.required],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Count work items in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_work_items(&self) -> Result<usize> {
        self.count("SELECT count(*) FROM work_items", [])
    }

    /// Count nodes of one tree, including the project root.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_classification_nodes(&self, kind: NodeKind) -> Result<usize> {
        self.count(
            "SELECT count(*) FROM classification_nodes WHERE kind = ?",
            [kind.as_str()],
        )
    }

    /// Count query folders and definitions, including the root folders.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_query_items(&self) -> Result<usize> {
        self.count("SELECT count(*) FROM query_items", [])
    }

    /// Count suites, including plan root suites.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_suites(&self) -> Result<usize> {
        self.count("SELECT count(*) FROM test_suites", [])
    }

    fn count<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn load_revisions(&self, work_item_id: i64) -> Result<Vec<Revision>> {
        let mut stmt = self.conn.prepare(
            "SELECT rev, fields_json, links_json FROM work_item_revisions
             WHERE work_item_id = ? ORDER BY rev ASC",
        )?;
        let rows = stmt
            .query_map([work_item_id], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(rev, fields_json, links_json)| {
                Ok(Revision {
                    rev,
                    fields: serde_json::from_str(&fields_json)?,
                    links: serde_json::from_str(&links_json)?,
                })
            })
            .collect()
    }

    fn load_work_items(&self, where_clause: &str, id: Option<i64>) -> Result<Vec<WorkItem>> {
        let sql = format!(
            "SELECT id, work_item_type, fields_json, links_json FROM work_items {where_clause}
             ORDER BY changed_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        };
        let rows = match id {
            Some(id) => stmt.query_map([id], map_row)?,
            None => stmt.query_map([], map_row)?,
        }
        .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut items = Vec::with_capacity(rows.len());
        for (id, work_item_type, fields_json, links_json) in rows {
            items.push(WorkItem {
                id: Some(id),
                work_item_type,
                fields: serde_json::from_str(&fields_json)?,
                links: serde_json::from_str(&links_json)?,
                revisions: self.load_revisions(id)?,
            });
        }
        Ok(items)
    }

    fn persisted_fields(&self, id: i64) -> Result<Option<(u32, BTreeMap<String, Value>)>> {
        let row = self
            .conn
            .query_row(
                "SELECT rev, fields_json FROM work_items WHERE id = ?",
                [id],
                |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        match row {
            Some((rev, json)) => Ok(Some((rev, serde_json::from_str(&json)?))),
            None => Ok(None),
        }
    }

    fn check_classification_path(&self, kind: NodeKind, path: &str) -> Result<()> {
        if self.lookup_node(kind, path)?.is_none() {
            return Err(MigrateError::SaveFailed(format!(
                "{kind} path '{path}' does not exist"
            )));
        }
        Ok(())
    }

    fn check_catalog_refs(&self, configs: &[ConfigRef]) -> Result<()> {
        for config in configs {
            let known = self
                .conn
                .query_row(
                    "SELECT 1 FROM test_configurations WHERE id = ? AND name = ?",
                    params![config.id, config.name],
                    |_| Ok(()),
                )
                .optional()?;
            if known.is_none() {
                return Err(MigrateError::Reconciliation(format!(
                    "configuration {} '{}' is not in the catalog",
                    config.id, config.name
                )));
            }
        }
        Ok(())
    }

    fn suite_row(&self, suite_id: i64) -> Result<Option<(i64, TestSuite)>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, plan_id, title, suite_type, query_text, requirement_id, default_configs_json
                 FROM test_suites WHERE id = ?",
                [suite_id],
                suite_columns,
            )
            .optional()?;
        row.map(suite_from_columns).transpose()
    }

    fn load_suite_tree(&self, suite: &mut TestSuite) -> Result<()> {
        suite.test_cases = self.test_case_entries(suite.id)?;
        let mut children = self.child_suites(suite.id)?;
        for child in &mut children {
            self.load_suite_tree(child)?;
        }
        suite.children = children;
        Ok(())
    }

    fn query_children(&self, parent_path: &str) -> Result<Vec<QueryItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, name, is_folder, is_personal, query_text FROM query_items
             WHERE parent_path = ? ORDER BY id",
        )?;
        let rows = stmt
            .query_map([parent_path], query_item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut items = Vec::with_capacity(rows.len());
        for mut item in rows {
            if let QueryItem::Folder(folder) = &mut item {
                folder.children = self.query_children(&folder.path)?;
            }
            items.push(item);
        }
        Ok(items)
    }

    fn insert_query_item(
        &mut self,
        parent_path: &str,
        name: &str,
        text: Option<&str>,
    ) -> Result<()> {
        let parent_is_root = parent_path == self.project;
        if !parent_is_root {
            match self.lookup_query_item(parent_path)? {
                Some(QueryItem::Folder(_)) => {}
                Some(QueryItem::Definition(_)) | None => {
                    return Err(MigrateError::not_found("query folder", parent_path));
                }
            }
        }
        let path = join_query_path(parent_path, name);
        if self.lookup_query_item(&path)?.is_some() {
            return Err(MigrateError::already_exists("query item", path));
        }
        self.conn.execute(
            "INSERT INTO query_items (path, parent_path, name, is_folder, is_personal, query_text)
             VALUES (?, ?, ?, ?, 0, ?)",
            params![path, parent_path, name, text.is_none(), text],
        )?;
        debug!(path = %path, "Created query item");
        Ok(())
    }
}

impl ProjectStore for SqliteStore {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn project_name(&self) -> &str {
        &self.project
    }
}

impl WorkItemStore for SqliteStore {
    fn query_work_items(&self, query: &WorkItemQuery) -> Result<Vec<WorkItem>> {
        let items = self.load_work_items("", None)?;
        Ok(items.into_iter().filter(|item| query.matches(item)).collect())
    }

    fn get_work_item(&self, id: i64) -> Result<Option<WorkItem>> {
        Ok(self.load_work_items("WHERE id = ?", Some(id))?.pop())
    }

    fn work_item_type(&self, name: &str) -> Result<Option<WorkItemType>> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM work_item_types WHERE name = ?",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT reference_name, name, editable, required FROM work_item_type_fields
             WHERE type_name = ?",
        )?;
        let definitions = stmt
            .query_map([name], |row| {
                Ok(FieldDefinition {
                    reference_name: row.get(0)?,
                    name: row.get(1)?,
                    editable: row.get(2)?,
                    required: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Some(WorkItemType::new(name, definitions)))
    }

    fn validate_work_item(&self, item: &WorkItem) -> Result<Vec<String>> {
        let Some(ty) = self.work_item_type(&item.work_item_type)? else {
            return Ok(vec![fields::WORK_ITEM_TYPE.to_string()]);
        };
        Ok(ty
            .required_fields()
            .filter(|def| !item.has_value(&def.reference_name))
            .map(|def| def.reference_name.clone())
            .collect())
    }

    fn save_work_item(&mut self, item: &mut WorkItem) -> Result<i64> {
        if self.work_item_type(&item.work_item_type)?.is_none() {
            return Err(MigrateError::SaveFailed(format!(
                "work item type '{}' does not exist in project '{}'",
                item.work_item_type, self.project
            )));
        }
        if item.has_value(fields::AREA_PATH) {
            self.check_classification_path(NodeKind::Area, item.area_path())?;
        }
        if item.has_value(fields::ITERATION_PATH) {
            self.check_classification_path(NodeKind::Iteration, item.iteration_path())?;
        }

        let prior = match item.id {
            Some(id) => Some(
                self.persisted_fields(id)?
                    .ok_or_else(|| MigrateError::not_found("work item", id.to_string()))?,
            ),
            None => None,
        };
        let (prior_rev, prior_fields) = prior.unwrap_or_default();
        let rev = prior_rev + 1;
        let now = Utc::now().to_rfc3339();

        item.set_field(fields::TEAM_PROJECT, self.project.clone());
        item.set_field(fields::WORK_ITEM_TYPE, item.work_item_type.clone());
        if item.field(fields::CHANGED_DATE) == prior_fields.get(fields::CHANGED_DATE) {
            item.set_field(fields::CHANGED_DATE, now.clone());
        }
        if !item.has_value(fields::CHANGED_BY) {
            item.set_field(fields::CHANGED_BY, DEFAULT_ACTOR);
        }
        if !item.has_value(fields::CREATED_DATE) {
            item.set_field(fields::CREATED_DATE, now);
        }
        if !item.has_value(fields::CREATED_BY) {
            let actor = item.field(fields::CHANGED_BY).cloned().unwrap_or_default();
            item.set_field(fields::CREATED_BY, actor);
        }
        item.set_field(fields::REV, rev);
        item.set_field(
            fields::EXTERNAL_LINK_COUNT,
            count_links(&item.links, LinkKind::ExternalLink),
        );
        item.set_field(
            fields::HYPERLINK_COUNT,
            count_links(&item.links, LinkKind::Hyperlink),
        );
        item.set_field(
            fields::RELATED_LINK_COUNT,
            count_links(&item.links, LinkKind::Related),
        );

        let changed_at = item
            .field_str(fields::CHANGED_DATE)
            .unwrap_or_default()
            .to_string();
        let links_json = serde_json::to_string(&item.links)?;

        let tx = self.conn.transaction()?;
        let id = if let Some(id) = item.id {
            id
        } else {
            tx.execute(
                "INSERT INTO work_items (work_item_type, rev, changed_at) VALUES (?, 0, ?)",
                params![item.work_item_type, changed_at],
            )?;
            tx.last_insert_rowid()
        };
        item.set_field(fields::ID, id);

        let revision_json = serde_json::to_string(&item.fields)?;
        let history = item.remove_field(fields::HISTORY);
        let current_json = serde_json::to_string(&item.fields)?;

        tx.execute(
            "UPDATE work_items SET rev = ?, changed_at = ?, fields_json = ?, links_json = ?
             WHERE id = ?",
            params![rev, changed_at, current_json, links_json, id],
        )?;
        tx.execute(
            "INSERT INTO work_item_revisions (work_item_id, rev, fields_json, links_json)
             VALUES (?, ?, ?, ?)",
            params![id, rev, revision_json, links_json],
        )?;
        tx.commit()?;

        let mut revision_fields = item.fields.clone();
        if let Some(history) = history {
            revision_fields.insert(fields::HISTORY.to_string(), history);
        }
        item.revisions.push(Revision {
            rev,
            fields: revision_fields,
            links: item.links.clone(),
        });
        item.id = Some(id);

        debug!(id, rev, work_item_type = %item.work_item_type, "Saved work item");
        Ok(id)
    }
}

impl ClassificationStore for SqliteStore {
    fn classification_tree(&self, kind: NodeKind) -> Result<ClassificationNode> {
        let mut stmt = self.conn.prepare(
            "SELECT name, path, parent_path, start_date, finish_date FROM classification_nodes
             WHERE kind = ? ORDER BY id",
        )?;
        let rows = stmt
            .query_map([kind.as_str()], |row| {
                Ok((node_from_row(row)?, row.get::<_, Option<String>>(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut root = None;
        let mut by_parent: HashMap<String, Vec<ClassificationNode>> = HashMap::new();
        for (node, parent) in rows {
            match parent {
                Some(parent) => by_parent.entry(parent).or_default().push(node),
                None => root = Some(node),
            }
        }

        let mut root = root.ok_or_else(|| {
            MigrateError::Setup(format!(
                "project '{}' has no {kind} root node",
                self.project
            ))
        })?;
        attach_children(&mut root, &mut by_parent);
        Ok(root)
    }

    fn lookup_node(&self, kind: NodeKind, path: &str) -> Result<Option<ClassificationNode>> {
        let node = self
            .conn
            .query_row(
                "SELECT name, path, parent_path, start_date, finish_date FROM classification_nodes
                 WHERE kind = ? AND path = ?",
                params![kind.as_str(), path],
                node_from_row,
            )
            .optional()?;
        Ok(node)
    }

    fn create_node(
        &mut self,
        kind: NodeKind,
        parent_path: &str,
        name: &str,
        dates: Option<DateRange>,
    ) -> Result<()> {
        if self.lookup_node(kind, parent_path)?.is_none() {
            return Err(MigrateError::not_found("classification node", parent_path));
        }
        let path = join_path(parent_path, name);
        if self.lookup_node(kind, &path)?.is_some() {
            return Err(MigrateError::already_exists("classification node", path));
        }
        self.conn.execute(
            "INSERT INTO classification_nodes (kind, path, name, parent_path, start_date, finish_date)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                kind.as_str(),
                path,
                name,
                parent_path,
                dates.map(|d| d.start.to_rfc3339()),
                dates.map(|d| d.finish.to_rfc3339()),
            ],
        )?;
        debug!(kind = %kind, path = %path, "Created classification node");
        Ok(())
    }
}

impl TestManagementStore for SqliteStore {
    fn test_configurations(&self) -> Result<Vec<TestConfiguration>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, area_path, is_default, state, values_json
             FROM test_configurations ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    TestConfiguration {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        area_path: row.get(3)?,
                        is_default: row.get(4)?,
                        state: row.get(5)?,
                        values: BTreeMap::new(),
                    },
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut config, values_json)| {
                config.values = serde_json::from_str(&values_json)?;
                Ok(config)
            })
            .collect()
    }

    fn create_test_configuration(&mut self, configuration: &TestConfiguration) -> Result<i64> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM test_configurations WHERE name = ?",
                [&configuration.name],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_some() {
            return Err(MigrateError::already_exists(
                "test configuration",
                configuration.name.clone(),
            ));
        }
        self.conn.execute(
            "INSERT INTO test_configurations (name, description, area_path, is_default, state, values_json)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                configuration.name,
                configuration.description,
                configuration.area_path,
                configuration.is_default,
                configuration.state,
                serde_json::to_string(&configuration.values)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn test_plans(&self) -> Result<Vec<TestPlan>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, area_path, iteration, start_date, end_date, root_suite_id
             FROM test_plans ORDER BY id",
        )?;
        let plans = stmt
            .query_map([], |row| {
                Ok(TestPlan {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    area_path: row.get(3)?,
                    iteration: row.get(4)?,
                    start_date: row.get::<_, Option<String>>(5)?.as_deref().and_then(parse_datetime),
                    end_date: row.get::<_, Option<String>>(6)?.as_deref().and_then(parse_datetime),
                    root_suite_id: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    fn create_test_plan(&mut self, plan: &TestPlan) -> Result<TestPlan> {
        if !plan.area_path.is_empty() {
            self.check_classification_path(NodeKind::Area, &plan.area_path)?;
        }
        if !plan.iteration.is_empty() {
            self.check_classification_path(NodeKind::Iteration, &plan.iteration)?;
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO test_plans (name, description, area_path, iteration, start_date, end_date)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                plan.name,
                plan.description,
                plan.area_path,
                plan.iteration,
                plan.start_date.map(|d| d.to_rfc3339()),
                plan.end_date.map(|d| d.to_rfc3339()),
            ],
        )?;
        let plan_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO test_suites (plan_id, parent_id, title, suite_type) VALUES (?, NULL, ?, 'static')",
            params![plan_id, plan.name],
        )?;
        let root_suite_id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE test_plans SET root_suite_id = ? WHERE id = ?",
            params![root_suite_id, plan_id],
        )?;
        tx.commit()?;

        Ok(TestPlan {
            id: plan_id,
            root_suite_id,
            ..plan.clone()
        })
    }

    fn suite_tree(&self, suite_id: i64) -> Result<Option<TestSuite>> {
        let Some((_, mut suite)) = self.suite_row(suite_id)? else {
            return Ok(None);
        };
        self.load_suite_tree(&mut suite)?;
        Ok(Some(suite))
    }

    fn child_suites(&self, parent_id: i64) -> Result<Vec<TestSuite>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, plan_id, title, suite_type, query_text, requirement_id, default_configs_json
             FROM test_suites WHERE parent_id = ? ORDER BY id",
        )?;
        let rows = stmt
            .query_map([parent_id], suite_columns)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|columns| suite_from_columns(columns).map(|(_, suite)| suite))
            .collect()
    }

    fn create_suite(&mut self, parent_id: i64, title: &str, kind: &SuiteKind) -> Result<i64> {
        let (plan_id, parent) = self
            .suite_row(parent_id)?
            .ok_or_else(|| MigrateError::not_found("test suite", parent_id.to_string()))?;
        if !parent.kind.is_static() {
            return Err(MigrateError::SaveFailed(format!(
                "suite '{}' cannot contain child suites",
                parent.title
            )));
        }
        if self
            .child_suites(parent_id)?
            .iter()
            .any(|child| child.title == title)
        {
            return Err(MigrateError::already_exists("test suite", title));
        }

        let (query_text, requirement_id) = match kind {
            SuiteKind::Static => (None, None),
            SuiteKind::Dynamic { query } => (Some(query.as_str()), None),
            SuiteKind::Requirement { requirement_id } => {
                if self.get_work_item(*requirement_id)?.is_none() {
                    return Err(MigrateError::SaveFailed(format!(
                        "requirement {requirement_id} does not exist"
                    )));
                }
                (None, Some(*requirement_id))
            }
        };

        self.conn.execute(
            "INSERT INTO test_suites (plan_id, parent_id, title, suite_type, query_text, requirement_id)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![plan_id, parent_id, title, kind.as_str(), query_text, requirement_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn clear_default_configurations(&mut self, suite_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE test_suites SET default_configs_json = '[]' WHERE id = ?",
            [suite_id],
        )?;
        Ok(())
    }

    fn set_default_configurations(&mut self, suite_id: i64, configs: &[ConfigRef]) -> Result<()> {
        self.check_catalog_refs(configs)?;
        let updated = self.conn.execute(
            "UPDATE test_suites SET default_configs_json = ? WHERE id = ?",
            params![serde_json::to_string(configs)?, suite_id],
        )?;
        if updated == 0 {
            return Err(MigrateError::not_found("test suite", suite_id.to_string()));
        }
        Ok(())
    }

    fn test_case_entries(&self, suite_id: i64) -> Result<Vec<TestCaseEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT work_item_id, configurations_json FROM test_case_entries
             WHERE suite_id = ? ORDER BY position, work_item_id",
        )?;
        let rows = stmt
            .query_map([suite_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(work_item_id, json)| {
                Ok(TestCaseEntry {
                    work_item_id,
                    configurations: json.as_deref().map(serde_json::from_str).transpose()?,
                })
            })
            .collect()
    }

    fn add_test_cases(&mut self, suite_id: i64, entries: &[TestCaseEntry]) -> Result<()> {
        let (_, suite) = self
            .suite_row(suite_id)?
            .ok_or_else(|| MigrateError::not_found("test suite", suite_id.to_string()))?;
        if !suite.kind.is_static() {
            return Err(MigrateError::SaveFailed(format!(
                "suite '{}' does not accept test cases",
                suite.title
            )));
        }
        for entry in entries {
            if self.get_work_item(entry.work_item_id)?.is_none() {
                return Err(MigrateError::not_found(
                    "work item",
                    entry.work_item_id.to_string(),
                ));
            }
            if let Some(configs) = &entry.configurations {
                self.check_catalog_refs(configs)?;
            }
        }

        let tx = self.conn.transaction()?;
        for entry in entries {
            let configurations = entry
                .configurations
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            tx.execute(
                "INSERT OR IGNORE INTO test_case_entries (suite_id, work_item_id, position, configurations_json)
                 VALUES (?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM test_case_entries WHERE suite_id = ?), ?)",
                params![suite_id, entry.work_item_id, suite_id, configurations],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_entry_configurations(&mut self, suite_id: i64, work_item_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE test_case_entries SET configurations_json = '[]'
             WHERE suite_id = ? AND work_item_id = ?",
            params![suite_id, work_item_id],
        )?;
        Ok(())
    }

    fn set_entry_configurations(
        &mut self,
        suite_id: i64,
        work_item_id: i64,
        configs: &[ConfigRef],
    ) -> Result<()> {
        self.check_catalog_refs(configs)?;
        let updated = self.conn.execute(
            "UPDATE test_case_entries SET configurations_json = ?
             WHERE suite_id = ? AND work_item_id = ?",
            params![serde_json::to_string(configs)?, suite_id, work_item_id],
        )?;
        if updated == 0 {
            return Err(MigrateError::not_found(
                "test case entry",
                format!("{suite_id}/{work_item_id}"),
            ));
        }
        Ok(())
    }
}

impl QueryStore for SqliteStore {
    fn query_hierarchy(&self) -> Result<Vec<QueryItem>> {
        self.query_children(&self.project)
    }

    fn lookup_query_item(&self, path: &str) -> Result<Option<QueryItem>> {
        let item = self
            .conn
            .query_row(
                "SELECT path, name, is_folder, is_personal, query_text FROM query_items WHERE path = ?",
                [path],
                query_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn create_query_folder(&mut self, parent_path: &str, name: &str) -> Result<()> {
        self.insert_query_item(parent_path, name, None)
    }

    fn create_query_definition(
        &mut self,
        parent_path: &str,
        name: &str,
        text: &str,
    ) -> Result<()> {
        for captures in QUERY_PATH_CLAUSE.captures_iter(text) {
            let kind = if captures[1].eq_ignore_ascii_case("AreaPath") {
                NodeKind::Area
            } else {
                NodeKind::Iteration
            };
            let path = &captures[2];
            if self.lookup_node(kind, path)?.is_none() {
                return Err(MigrateError::SaveFailed(format!(
                    "query '{name}' references unknown {kind} path '{path}'"
                )));
            }
        }
        self.insert_query_item(parent_path, name, Some(text))
    }
}

fn initialize(conn: &Connection, endpoint: &str, project: &str) -> Result<()> {
    if project.trim().is_empty() {
        return Err(MigrateError::Setup("project name cannot be empty".to_string()));
    }
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?, ?), (?, ?)",
        params![META_ENDPOINT, endpoint, META_PROJECT, project],
    )?;
    for kind in NodeKind::ALL {
        conn.execute(
            "INSERT INTO classification_nodes (kind, path, name, parent_path) VALUES (?, ?, ?, NULL)",
            params![kind.as_str(), project, project],
        )?;
    }
    for (name, personal) in [(SHARED_QUERIES, false), (MY_QUERIES, true)] {
        conn.execute(
            "INSERT INTO query_items (path, parent_path, name, is_folder, is_personal)
             VALUES (?, ?, ?, 1, ?)",
            params![join_query_path(project, name), project, name, personal],
        )?;
    }
    Ok(())
}

fn read_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM metadata WHERE key = ?", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}

fn count_links(links: &[Link], kind: LinkKind) -> i64 {
    i64::try_from(links.iter().filter(|link| link.kind == kind).count()).unwrap_or(i64::MAX)
}

fn node_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClassificationNode> {
    Ok(ClassificationNode {
        name: row.get(0)?,
        path: row.get(1)?,
        start_date: row.get::<_, Option<String>>(3)?.as_deref().and_then(parse_datetime),
        finish_date: row.get::<_, Option<String>>(4)?.as_deref().and_then(parse_datetime),
        children: Vec::new(),
    })
}

fn attach_children(
    node: &mut ClassificationNode,
    by_parent: &mut HashMap<String, Vec<ClassificationNode>>,
) {
    let mut children = by_parent.remove(&node.path).unwrap_or_default();
    for child in &mut children {
        attach_children(child, by_parent);
    }
    node.children = children;
}

type SuiteColumns = (
    i64,
    i64,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<String>,
);

fn suite_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<SuiteColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn suite_from_columns(columns: SuiteColumns) -> Result<(i64, TestSuite)> {
    let (id, plan_id, title, suite_type, query_text, requirement_id, configs_json) = columns;
    let kind = match suite_type.as_str() {
        "dynamic" => SuiteKind::Dynamic {
            query: query_text.unwrap_or_default(),
        },
        "requirement" => SuiteKind::Requirement {
            requirement_id: requirement_id.unwrap_or_default(),
        },
        _ => SuiteKind::Static,
    };
    let default_configurations = configs_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    Ok((
        plan_id,
        TestSuite {
            id,
            title,
            kind,
            default_configurations,
            children: Vec::new(),
            test_cases: Vec::new(),
        },
    ))
}

fn query_item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueryItem> {
    let path: String = row.get(0)?;
    let name: String = row.get(1)?;
    let is_folder: bool = row.get(2)?;
    Ok(if is_folder {
        QueryItem::Folder(QueryFolder {
            name,
            path,
            is_personal: row.get(3)?,
            children: Vec::new(),
        })
    } else {
        QueryItem::Definition(QueryDefinition {
            name,
            path,
            text: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        })
    })
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
