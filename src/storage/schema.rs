//! Database schema definitions for a project store.

use rusqlite::{Connection, Result};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for one project store.
///
/// Field bags, link lists and configuration lists are JSON text columns; the
/// store never queries inside them with SQL.
pub const SCHEMA_SQL: &str = r"
    -- Store identity: endpoint and project name
    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    -- Work item types and their field definitions
    CREATE TABLE IF NOT EXISTS work_item_types (
        name TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS work_item_type_fields (
        type_name TEXT NOT NULL,
        reference_name TEXT NOT NULL,
        name TEXT NOT NULL,
        editable INTEGER NOT NULL DEFAULT 1,
        required INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (type_name, reference_name),
        FOREIGN KEY (type_name) REFERENCES work_item_types(name) ON DELETE CASCADE
    );

    -- Work items: current state
    CREATE TABLE IF NOT EXISTS work_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        work_item_type TEXT NOT NULL,
        rev INTEGER NOT NULL DEFAULT 0,
        changed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        fields_json TEXT NOT NULL DEFAULT '{}',
        links_json TEXT NOT NULL DEFAULT '[]'
    );
    CREATE INDEX IF NOT EXISTS idx_work_items_changed_at ON work_items(changed_at);

    -- Work items: one row per saved revision
    CREATE TABLE IF NOT EXISTS work_item_revisions (
        work_item_id INTEGER NOT NULL,
        rev INTEGER NOT NULL,
        fields_json TEXT NOT NULL,
        links_json TEXT NOT NULL DEFAULT '[]',
        PRIMARY KEY (work_item_id, rev),
        FOREIGN KEY (work_item_id) REFERENCES work_items(id) ON DELETE CASCADE
    );

    -- Area and iteration trees. The project root has parent_path NULL.
    CREATE TABLE IF NOT EXISTS classification_nodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL CHECK(kind IN ('area', 'iteration')),
        path TEXT NOT NULL,
        name TEXT NOT NULL,
        parent_path TEXT,
        start_date DATETIME,
        finish_date DATETIME,
        UNIQUE (kind, path)
    );
    CREATE INDEX IF NOT EXISTS idx_classification_parent
        ON classification_nodes(kind, parent_path);

    -- Test configuration catalog
    CREATE TABLE IF NOT EXISTS test_configurations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        area_path TEXT NOT NULL DEFAULT '',
        is_default INTEGER NOT NULL DEFAULT 0,
        state TEXT NOT NULL DEFAULT 'Active',
        values_json TEXT NOT NULL DEFAULT '{}'
    );

    -- Test plans and suites
    CREATE TABLE IF NOT EXISTS test_plans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        area_path TEXT NOT NULL DEFAULT '',
        iteration TEXT NOT NULL DEFAULT '',
        start_date DATETIME,
        end_date DATETIME,
        root_suite_id INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS test_suites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plan_id INTEGER NOT NULL,
        parent_id INTEGER,
        title TEXT NOT NULL,
        suite_type TEXT NOT NULL CHECK(suite_type IN ('static', 'dynamic', 'requirement')),
        query_text TEXT,
        requirement_id INTEGER,
        default_configs_json TEXT,
        FOREIGN KEY (plan_id) REFERENCES test_plans(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_test_suites_parent ON test_suites(parent_id);

    CREATE TABLE IF NOT EXISTS test_case_entries (
        suite_id INTEGER NOT NULL,
        work_item_id INTEGER NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        configurations_json TEXT,
        PRIMARY KEY (suite_id, work_item_id),
        FOREIGN KEY (suite_id) REFERENCES test_suites(id) ON DELETE CASCADE
    );

    -- Query hierarchy. Root folders hang off the project name.
    CREATE TABLE IF NOT EXISTS query_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        parent_path TEXT NOT NULL,
        name TEXT NOT NULL,
        is_folder INTEGER NOT NULL,
        is_personal INTEGER NOT NULL DEFAULT 0,
        query_text TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_query_items_parent ON query_items(parent_path);
";

/// Apply the schema and connection pragmas.
///
/// # Errors
///
/// Returns an error if any DDL statement or pragma fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;

    Ok(())
}
