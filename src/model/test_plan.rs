//! Test management entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference to a configuration by catalog id and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigRef {
    pub id: i64,
    pub name: String,
}

impl ConfigRef {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A named test configuration (e.g. "Windows-x64").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfiguration {
    /// Catalog id; 0 for configurations not yet created.
    pub id: i64,
    pub name: String,
    pub description: String,
    pub area_path: String,
    pub is_default: bool,
    pub state: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl TestConfiguration {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: String::new(),
            area_path: String::new(),
            is_default: false,
            state: "Active".to_string(),
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn to_ref(&self) -> ConfigRef {
        ConfigRef::new(self.id, self.name.clone())
    }
}

/// A test plan. Every saved plan owns a static root suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlan {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub area_path: String,
    pub iteration: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub root_suite_id: i64,
}

impl TestPlan {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: String::new(),
            area_path: String::new(),
            iteration: String::new(),
            start_date: None,
            end_date: None,
            root_suite_id: 0,
        }
    }
}

/// The three suite flavours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuiteKind {
    /// Hand-curated suite; the only kind that has child suites and test cases.
    Static,
    /// Membership defined by a query.
    Dynamic { query: String },
    /// Membership defined by a requirement work item.
    Requirement { requirement_id: i64 },
}

impl SuiteKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic { .. } => "dynamic",
            Self::Requirement { .. } => "requirement",
        }
    }

    #[must_use]
    pub const fn is_static(&self) -> bool {
        matches!(self, Self::Static)
    }
}

/// A test case membership within a suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseEntry {
    pub work_item_id: i64,
    /// `None` means "inherit the suite defaults".
    pub configurations: Option<Vec<ConfigRef>>,
}

impl TestCaseEntry {
    #[must_use]
    pub const fn new(work_item_id: i64) -> Self {
        Self {
            work_item_id,
            configurations: None,
        }
    }

    #[must_use]
    pub fn configuration_count(&self) -> usize {
        self.configurations.as_ref().map_or(0, Vec::len)
    }
}

/// A suite with its loaded subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    pub id: i64,
    pub title: String,
    pub kind: SuiteKind,
    pub default_configurations: Option<Vec<ConfigRef>>,
    #[serde(default)]
    pub children: Vec<TestSuite>,
    #[serde(default)]
    pub test_cases: Vec<TestCaseEntry>,
}

impl TestSuite {
    #[must_use]
    pub fn new(title: impl Into<String>, kind: SuiteKind) -> Self {
        Self {
            id: 0,
            title: title.into(),
            kind,
            default_configurations: None,
            children: Vec::new(),
            test_cases: Vec::new(),
        }
    }

    #[must_use]
    pub fn default_configuration_count(&self) -> usize {
        self.default_configurations.as_ref().map_or(0, Vec::len)
    }
}
