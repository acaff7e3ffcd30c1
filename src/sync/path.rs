//! Rewriting project-qualified paths and query text.
//!
//! Area and iteration paths start with the project name (`Proj\Team\Sub`).
//! Moving data between projects means re-rooting those paths under one of
//! two run-wide policies:
//!
//! | Policy | `ProjectA\Team1` becomes |
//! |--------|--------------------------|
//! | [`PathPolicy::Prefix`] | `ProjectB\ProjectA\Team1` |
//! | [`PathPolicy::Substitute`] | `ProjectB\Team1` |
//!
//! The prefix policy matches trees mirrored with a synthetic project root.

use crate::model::PATH_SEPARATOR;
use serde::{Deserialize, Serialize};

/// Run-wide area/iteration path policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPolicy {
    /// Prepend the target project name to the full source path.
    Prefix,
    /// Replace the first occurrence of the source project name.
    #[default]
    Substitute,
}

impl PathPolicy {
    #[must_use]
    pub const fn from_prefix_flag(prefix_project_to_nodes: bool) -> Self {
        if prefix_project_to_nodes {
            Self::Prefix
        } else {
            Self::Substitute
        }
    }

    #[must_use]
    pub const fn is_prefix(self) -> bool {
        matches!(self, Self::Prefix)
    }

    /// Rewrite one area or iteration path.
    #[must_use]
    pub fn rewrite(self, path: &str, source_project: &str, target_project: &str) -> String {
        match self {
            Self::Prefix => format!("{target_project}{PATH_SEPARATOR}{path}"),
            Self::Substitute => path.replacen(source_project, target_project, 1),
        }
    }
}

/// Replace every occurrence of the source project name.
///
/// Used for test configuration area paths, which are re-rooted without the
/// run-wide policy.
#[must_use]
pub fn replace_project(path: &str, source_project: &str, target_project: &str) -> String {
    if source_project.is_empty() {
        return path.to_string();
    }
    path.replace(source_project, target_project)
}

/// Rewrite quoted project-rooted literals (`'Proj...`) in query text.
#[must_use]
pub fn rewrite_query_text(text: &str, source_project: &str, target_project: &str) -> String {
    if source_project.is_empty() {
        return text.to_string();
    }
    text.replace(&format!("'{source_project}"), &format!("'{target_project}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_prepends_target_project() {
        assert_eq!(
            PathPolicy::Prefix.rewrite("ProjectA\\Team1", "ProjectA", "ProjectB"),
            "ProjectB\\ProjectA\\Team1"
        );
    }

    #[test]
    fn substitute_replaces_first_occurrence_only() {
        assert_eq!(
            PathPolicy::Substitute.rewrite("Alpha\\Alpha Team", "Alpha", "Beta"),
            "Beta\\Alpha Team"
        );
    }

    #[test]
    fn flag_selects_policy() {
        assert!(PathPolicy::from_prefix_flag(true).is_prefix());
        assert_eq!(PathPolicy::from_prefix_flag(false), PathPolicy::Substitute);
    }

    #[test]
    fn replace_project_replaces_all() {
        assert_eq!(replace_project("Alpha\\Alpha Team", "Alpha", "Beta"), "Beta\\Beta Team");
        assert_eq!(replace_project("Alpha", "", "Beta"), "Alpha");
    }

    #[test]
    fn query_text_literals_are_rerooted() {
        let text = "SELECT [System.Id] FROM WorkItems WHERE [System.AreaPath] UNDER 'Alpha\\Web' \
                    AND [System.Title] CONTAINS 'Alpha'";
        let rewritten = rewrite_query_text(text, "Alpha", "Beta");
        assert!(rewritten.contains("UNDER 'Beta\\Web'"));
        assert!(rewritten.contains("CONTAINS 'Beta'"));
    }
}
