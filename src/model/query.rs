//! Shared query hierarchy.

use serde::{Deserialize, Serialize};

/// Separator between query hierarchy path segments.
pub const QUERY_PATH_SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFolder {
    pub name: String,
    pub path: String,
    pub is_personal: bool,
    #[serde(default)]
    pub children: Vec<QueryItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub name: String,
    pub path: String,
    pub text: String,
}

/// A node of the query hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum QueryItem {
    Folder(QueryFolder),
    Definition(QueryDefinition),
}

impl QueryItem {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Folder(folder) => &folder.name,
            Self::Definition(definition) => &definition.name,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Folder(folder) => &folder.path,
            Self::Definition(definition) => &definition.path,
        }
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Folder(folder) => &folder.children,
            Self::Definition(_) => &[],
        }
    }
}

#[must_use]
pub fn join_query_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{QUERY_PATH_SEPARATOR}{name}")
    }
}
