//! Work item replication.
//!
//! Builds a draft target item from a source item under a field policy, stamps
//! the reflected identity, saves it, and optionally marks the source item
//! with the identity of its copy.
//!
//! # Field policy
//!
//! A source field is copied only when the target type defines it, it is not
//! on [`IGNORED_FIELDS`], and the target field is editable. Area and
//! iteration paths are re-rooted with the run-wide [`PathPolicy`]; a
//! non-numeric backlog priority is reset to [`BACKLOG_PRIORITY_DEFAULT`].
//!
//! # Submodules
//!
//! - [`history`] - Revision history rendering

pub mod history;

pub use history::{MAX_HISTORY_LEN, synthesize_history};

use crate::error::{MigrateError, Result};
use crate::identity::identity_of;
use crate::model::{WorkItem, WorkItemType, display_value, fields};
use crate::storage::WorkItemStore;
use crate::sync::path::PathPolicy;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

/// Source fields that are never copied.
pub const IGNORED_FIELDS: [&str; 19] = [
    "System.Rev",
    "System.AreaId",
    "System.IterationId",
    "System.Id",
    "System.RevisedDate",
    "System.AttachedFileCount",
    "System.TeamProject",
    "System.NodeName",
    "System.RelatedLinkCount",
    "System.WorkItemType",
    "Microsoft.VSTS.Common.ActivatedDate",
    "Microsoft.VSTS.Common.StateChangeDate",
    "System.ExternalLinkCount",
    "System.HyperLinkCount",
    "System.Watermark",
    "System.AuthorizedDate",
    "System.BoardColumn",
    "System.BoardColumnDone",
    "System.BoardLane",
];

/// Replacement for a backlog priority that is not a number.
pub const BACKLOG_PRIORITY_DEFAULT: i64 = 10;

/// What happens to one source field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAction {
    CopyVerbatim,
    PathRewrite,
    NumericSanitize,
    SkipIgnored,
    SkipNotEditable,
    /// The target type has no such field.
    SkipUndefined,
}

/// Decide the action for `reference_name` against the target type.
#[must_use]
pub fn classify_field(reference_name: &str, target_type: &WorkItemType) -> FieldAction {
    if !target_type.contains(reference_name) {
        FieldAction::SkipUndefined
    } else if IGNORED_FIELDS.contains(&reference_name) {
        FieldAction::SkipIgnored
    } else if !target_type.is_editable(reference_name) {
        FieldAction::SkipNotEditable
    } else if reference_name == fields::AREA_PATH || reference_name == fields::ITERATION_PATH {
        FieldAction::PathRewrite
    } else if reference_name == fields::BACKLOG_PRIORITY {
        FieldAction::NumericSanitize
    } else {
        FieldAction::CopyVerbatim
    }
}

/// Run-wide replication switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationOptions {
    pub identity_field: String,
    pub path_policy: PathPolicy,
    pub update_created_date: bool,
    pub update_created_by: bool,
    pub update_source_identity: bool,
}

/// Result of replicating one source item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplicationOutcome {
    Saved {
        target_id: i64,
        invalid_fields: Vec<String>,
        source_marked: bool,
    },
    SaveFailed {
        error: String,
        invalid_fields: Vec<String>,
    },
}

/// Copies work items from one project store to another.
#[derive(Debug, Clone)]
pub struct WorkItemReplicator {
    options: ReplicationOptions,
}

impl WorkItemReplicator {
    #[must_use]
    pub const fn new(options: ReplicationOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub const fn options(&self) -> &ReplicationOptions {
        &self.options
    }

    /// Build the unsaved target item for `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot instantiate `target_type`.
    pub fn build_draft<T: WorkItemStore + ?Sized>(
        &self,
        target: &T,
        source: &WorkItem,
        source_project: &str,
        target_type: &WorkItemType,
    ) -> Result<WorkItem> {
        let mut draft = target.new_work_item(&target_type.name)?;
        let target_project = target.project_name();

        for (name, value) in &source.fields {
            let action = classify_field(name, target_type);
            match action {
                FieldAction::CopyVerbatim | FieldAction::NumericSanitize => {
                    draft.set_field(name, value.clone());
                }
                FieldAction::PathRewrite => {
                    let path = display_value(value);
                    let rewritten =
                        self.options
                            .path_policy
                            .rewrite(&path, source_project, target_project);
                    draft.set_field(name, rewritten);
                }
                FieldAction::SkipIgnored
                | FieldAction::SkipNotEditable
                | FieldAction::SkipUndefined => {
                    trace!(field = %name, action = ?action, "Not copied");
                }
            }
        }

        if draft
            .field(fields::BACKLOG_PRIORITY)
            .is_some_and(|priority| !priority.is_null() && !is_numeric(priority))
        {
            debug!(source = source.id_or_zero(), "Resetting non-numeric backlog priority");
            draft.set_field(fields::BACKLOG_PRIORITY, BACKLOG_PRIORITY_DEFAULT);
        }

        let history = synthesize_history(source);
        if !history.is_empty() {
            draft.set_field(fields::HISTORY, history);
        }
        Ok(draft)
    }

    /// Replicate `source` into `target` as `target_type_name` and save it.
    ///
    /// Validation failures are logged and do not block the save. A failed
    /// save is reported as [`ReplicationOutcome::SaveFailed`] after the
    /// draft's fields are logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the target type does not exist or a store read
    /// fails; the caller counts the item as failed.
    pub fn replicate<S, T>(
        &self,
        source_store: &mut S,
        target: &mut T,
        source: &mut WorkItem,
        target_type_name: &str,
    ) -> Result<ReplicationOutcome>
    where
        S: WorkItemStore + ?Sized,
        T: WorkItemStore + ?Sized,
    {
        let target_type = target
            .work_item_type(target_type_name)?
            .ok_or_else(|| MigrateError::not_found("work item type", target_type_name))?;
        let source_project = source_store.project_name().to_string();
        let mut draft = self.build_draft(&*target, source, &source_project, &target_type)?;

        let identity_field = &self.options.identity_field;
        if target_type.contains(identity_field) {
            draft.set_field(identity_field, identity_of(&*source_store, source).to_string());
        }

        let invalid_fields = target.validate_work_item(&draft)?;
        for field in &invalid_fields {
            let err = MigrateError::validation(field, "required field has no value");
            warn!(
                source = source.id_or_zero(),
                work_item_type = %source.work_item_type,
                field = %field,
                code = %err.code(),
                error = %err,
                "Invalid field"
            );
        }

        if self.options.update_created_date {
            if let Some(value) = source.field(fields::CREATED_DATE) {
                draft.set_field(fields::CREATED_DATE, value.clone());
            }
        }
        if self.options.update_created_by {
            if let Some(value) = source.field(fields::CREATED_BY) {
                draft.set_field(fields::CREATED_BY, value.clone());
            }
        }

        let target_id = match target.save_work_item(&mut draft) {
            Ok(id) => id,
            Err(err) => {
                error!(source = source.id_or_zero(), error = %err, "Failed to save");
                for (name, value) in &draft.fields {
                    error!(field = %name, value = %abbreviate(value), "Unsaved field");
                }
                return Ok(ReplicationOutcome::SaveFailed {
                    error: err.to_string(),
                    invalid_fields,
                });
            }
        };
        info!(source = source.id_or_zero(), target = target_id, "Saved");

        let source_marked = self.mark_source(source_store, &*target, source, &draft)?;
        Ok(ReplicationOutcome::Saved {
            target_id,
            invalid_fields,
            source_marked,
        })
    }

    fn mark_source<S, T>(
        &self,
        source_store: &mut S,
        target: &T,
        source: &mut WorkItem,
        saved: &WorkItem,
    ) -> Result<bool>
    where
        S: WorkItemStore + ?Sized,
        T: WorkItemStore + ?Sized,
    {
        if !self.options.update_source_identity {
            return Ok(false);
        }
        let field = &self.options.identity_field;
        let defined = source_store
            .work_item_type(&source.work_item_type)?
            .is_some_and(|ty| ty.contains(field));
        if !defined {
            debug!(source = source.id_or_zero(), field = %field, "Source type lacks identity field");
            return Ok(false);
        }

        source.set_field(field, identity_of(target, saved).to_string());
        match source_store.save_work_item(source) {
            Ok(_) => {
                debug!(source = source.id_or_zero(), "Source updated");
                Ok(true)
            }
            Err(err) => {
                warn!(source = source.id_or_zero(), error = %err, "Failed to update source identity");
                Ok(false)
            }
        }
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

fn abbreviate(value: &Value) -> String {
    const LIMIT: usize = 200;
    let text = display_value(value);
    if text.chars().count() <= LIMIT {
        text
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldDefinition;
    use crate::storage::SqliteStore;

    fn bug_type() -> WorkItemType {
        WorkItemType::new(
            "Bug",
            [
                FieldDefinition::editable(fields::TITLE, "Title"),
                FieldDefinition::editable(fields::AREA_PATH, "Area Path"),
                FieldDefinition::editable(fields::ITERATION_PATH, "Iteration Path"),
                FieldDefinition::editable(fields::BACKLOG_PRIORITY, "Backlog Priority"),
                FieldDefinition::editable("System.BoardColumn", "Board Column"),
                FieldDefinition::read_only("Custom.Computed", "Computed"),
            ],
        )
    }

    fn options(policy: PathPolicy) -> ReplicationOptions {
        ReplicationOptions {
            identity_field: crate::identity::DEFAULT_IDENTITY_FIELD.to_string(),
            path_policy: policy,
            update_created_date: false,
            update_created_by: false,
            update_source_identity: false,
        }
    }

    #[test]
    fn classify_follows_policy_order() {
        let ty = bug_type();
        assert_eq!(classify_field(fields::TITLE, &ty), FieldAction::CopyVerbatim);
        assert_eq!(classify_field(fields::AREA_PATH, &ty), FieldAction::PathRewrite);
        assert_eq!(classify_field(fields::BACKLOG_PRIORITY, &ty), FieldAction::NumericSanitize);
        assert_eq!(classify_field("System.BoardColumn", &ty), FieldAction::SkipIgnored);
        assert_eq!(classify_field("Custom.Computed", &ty), FieldAction::SkipNotEditable);
        assert_eq!(classify_field("Custom.Unknown", &ty), FieldAction::SkipUndefined);
    }

    #[test]
    fn draft_copies_rewrites_and_sanitizes() {
        let mut target = SqliteStore::open_memory("http://target", "Beta").unwrap();
        target.define_work_item_type(&bug_type()).unwrap();

        let mut source = WorkItem::new("Bug");
        source.set_field(fields::TITLE, "Crash");
        source.set_field(fields::AREA_PATH, "Alpha\\Web");
        source.set_field(fields::ITERATION_PATH, "Alpha");
        source.set_field(fields::BACKLOG_PRIORITY, "high");
        source.set_field("System.BoardColumn", "Doing");
        source.set_field("Custom.Computed", "x");

        let replicator = WorkItemReplicator::new(options(PathPolicy::Prefix));
        let draft = replicator
            .build_draft(&target, &source, "Alpha", &bug_type())
            .unwrap();

        assert_eq!(draft.title(), "Crash");
        assert_eq!(draft.area_path(), "Beta\\Alpha\\Web");
        assert_eq!(draft.iteration_path(), "Beta\\Alpha");
        assert_eq!(
            draft.field(fields::BACKLOG_PRIORITY),
            Some(&Value::from(BACKLOG_PRIORITY_DEFAULT))
        );
        assert!(draft.field("System.BoardColumn").is_none());
        assert!(draft.field("Custom.Computed").is_none());
        assert_eq!(draft.project(), "Beta");
    }

    #[test]
    fn numeric_priority_is_kept() {
        let mut target = SqliteStore::open_memory("http://target", "Beta").unwrap();
        target.define_work_item_type(&bug_type()).unwrap();
        let mut source = WorkItem::new("Bug");
        source.set_field(fields::BACKLOG_PRIORITY, "12.5");

        let draft = WorkItemReplicator::new(options(PathPolicy::Substitute))
            .build_draft(&target, &source, "Alpha", &bug_type())
            .unwrap();
        assert_eq!(draft.field(fields::BACKLOG_PRIORITY), Some(&Value::from("12.5")));
    }

    #[test]
    fn abbreviate_limits_long_values() {
        let long = Value::from("y".repeat(500));
        assert_eq!(abbreviate(&long).chars().count(), 203);
        assert_eq!(abbreviate(&Value::from("short")), "short");
    }
}
