//! Area and iteration classification trees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator between classification path segments.
pub const PATH_SEPARATOR: char = '\\';

/// Which classification tree a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Area,
    Iteration,
}

impl NodeKind {
    pub const ALL: [Self; 2] = [Self::Area, Self::Iteration];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Iteration => "iteration",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "area" => Some(Self::Area),
            "iteration" => Some(Self::Iteration),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete start/finish pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
}

/// A node in an area or iteration tree.
///
/// `path` is the full path including the project root, e.g. `Proj\Team\Sub`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationNode {
    pub name: String,
    pub path: String,
    pub start_date: Option<DateTime<Utc>>,
    pub finish_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub children: Vec<ClassificationNode>,
}

impl ClassificationNode {
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            start_date: None,
            finish_date: None,
            children: Vec::new(),
        }
    }

    /// Both bounds, or nothing. Half-open ranges are dropped.
    #[must_use]
    pub fn date_range(&self) -> Option<DateRange> {
        match (self.start_date, self.finish_date) {
            (Some(start), Some(finish)) => Some(DateRange { start, finish }),
            _ => None,
        }
    }

    /// Number of nodes in this subtree, excluding `self`.
    #[must_use]
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

/// Join a parent path and a child name.
#[must_use]
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{name}")
    }
}
