//! Work items, their types, links and revisions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Well-known field reference names.
pub mod fields {
    pub const ID: &str = "System.Id";
    pub const REV: &str = "System.Rev";
    pub const TEAM_PROJECT: &str = "System.TeamProject";
    pub const WORK_ITEM_TYPE: &str = "System.WorkItemType";
    pub const TITLE: &str = "System.Title";
    pub const STATE: &str = "System.State";
    pub const AREA_PATH: &str = "System.AreaPath";
    pub const ITERATION_PATH: &str = "System.IterationPath";
    pub const HISTORY: &str = "System.History";
    pub const CHANGED_BY: &str = "System.ChangedBy";
    pub const CHANGED_DATE: &str = "System.ChangedDate";
    pub const CREATED_BY: &str = "System.CreatedBy";
    pub const CREATED_DATE: &str = "System.CreatedDate";
    pub const EXTERNAL_LINK_COUNT: &str = "System.ExternalLinkCount";
    pub const HYPERLINK_COUNT: &str = "System.HyperLinkCount";
    pub const RELATED_LINK_COUNT: &str = "System.RelatedLinkCount";
    pub const BACKLOG_PRIORITY: &str = "Microsoft.VSTS.Common.BacklogPriority";
}

/// Base type of a work item link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    ExternalLink,
    Hyperlink,
    Related,
}

impl LinkKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExternalLink => "ExternalLink",
            Self::Hyperlink => "Hyperlink",
            Self::Related => "RelatedLink",
        }
    }
}

/// A link from a work item to an artifact, URL or other work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub kind: LinkKind,
    /// Artifact URI, hyperlink location, or related work item id.
    pub target: String,
}

impl Link {
    #[must_use]
    pub fn new(kind: LinkKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }

    /// Description shown in audit tables. Related links carry none.
    #[must_use]
    pub fn description(&self) -> &str {
        match self.kind {
            LinkKind::ExternalLink | LinkKind::Hyperlink => &self.target,
            LinkKind::Related => "",
        }
    }
}

/// Snapshot of a work item as of one saved revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub rev: u32,
    pub fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Revision {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A work item. `id` is `None` until the item has been saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Option<i64>,
    pub work_item_type: String,
    pub fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub revisions: Vec<Revision>,
}

impl WorkItem {
    /// Create an unsaved draft of the given type.
    #[must_use]
    pub fn new(work_item_type: impl Into<String>) -> Self {
        let work_item_type = work_item_type.into();
        let mut fields = BTreeMap::new();
        fields.insert(
            fields::WORK_ITEM_TYPE.to_string(),
            Value::String(work_item_type.clone()),
        );
        Self {
            id: None,
            work_item_type,
            fields,
            links: Vec::new(),
            revisions: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// True when the field is present with a non-null, non-blank value.
    #[must_use]
    pub fn has_value(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|v| !is_empty_value(v))
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.field_str(fields::TITLE).unwrap_or_default()
    }

    #[must_use]
    pub fn project(&self) -> &str {
        self.field_str(fields::TEAM_PROJECT).unwrap_or_default()
    }

    #[must_use]
    pub fn area_path(&self) -> &str {
        self.field_str(fields::AREA_PATH).unwrap_or_default()
    }

    #[must_use]
    pub fn iteration_path(&self) -> &str {
        self.field_str(fields::ITERATION_PATH).unwrap_or_default()
    }

    /// Saved id, or 0 for drafts (used in log lines only).
    #[must_use]
    pub fn id_or_zero(&self) -> i64 {
        self.id.unwrap_or(0)
    }
}

/// True for `null`, or a string that is empty after trimming.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Render a field value the way it appears in audit tables and logs.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Definition of one field on a work item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub reference_name: String,
    pub name: String,
    pub editable: bool,
    pub required: bool,
}

impl FieldDefinition {
    #[must_use]
    pub fn editable(reference_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            reference_name: reference_name.into(),
            name: name.into(),
            editable: true,
            required: false,
        }
    }

    #[must_use]
    pub fn read_only(reference_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            editable: false,
            ..Self::editable(reference_name, name)
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A work item type with its field definitions keyed by reference name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemType {
    pub name: String,
    pub fields: BTreeMap<String, FieldDefinition>,
}

impl WorkItemType {
    #[must_use]
    pub fn new(name: impl Into<String>, definitions: impl IntoIterator<Item = FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            fields: definitions
                .into_iter()
                .map(|def| (def.reference_name.clone(), def))
                .collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, reference_name: &str) -> bool {
        self.fields.contains_key(reference_name)
    }

    #[must_use]
    pub fn is_editable(&self, reference_name: &str) -> bool {
        self.fields
            .get(reference_name)
            .is_some_and(|def| def.editable)
    }

    #[must_use]
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.values().filter(|def| def.required)
    }
}

/// Filter for work item queries.
///
/// All clauses are conjunctive. `project` always applies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkItemQuery {
    pub project: String,
    pub types: Vec<String>,
    pub non_empty: Vec<String>,
    pub equals: Vec<(String, Value)>,
}

impl WorkItemQuery {
    #[must_use]
    pub fn in_project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_types(mut self, types: &[String]) -> Self {
        self.types.extend(types.iter().cloned());
        self
    }

    #[must_use]
    pub fn field_not_empty(mut self, field: &str) -> Self {
        self.non_empty.push(field.to_string());
        self
    }

    #[must_use]
    pub fn field_equals(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.equals.push((field.to_string(), value.into()));
        self
    }

    /// Evaluate the filter against an item.
    #[must_use]
    pub fn matches(&self, item: &WorkItem) -> bool {
        if item.project() != self.project {
            return false;
        }
        if !self.types.is_empty() && !self.types.iter().any(|t| t == &item.work_item_type) {
            return false;
        }
        if !self.non_empty.iter().all(|field| item.has_value(field)) {
            return false;
        }
        self.equals
            .iter()
            .all(|(field, value)| item.field(field) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(project: &str, ty: &str) -> WorkItem {
        let mut wi = WorkItem::new(ty);
        wi.set_field(fields::TEAM_PROJECT, project);
        wi
    }

    #[test]
    fn query_filters_project_and_type() {
        let bug = item("Alpha", "Bug");
        let task = item("Alpha", "Task");
        let other = item("Beta", "Bug");
        let query = WorkItemQuery::in_project("Alpha").with_types(&["Bug".to_string()]);

        assert!(query.matches(&bug));
        assert!(!query.matches(&task));
        assert!(!query.matches(&other));
    }

    #[test]
    fn query_non_empty_ignores_blank_strings() {
        let mut wi = item("Alpha", "Bug");
        wi.set_field("Custom.Ref", "   ");
        let query = WorkItemQuery::in_project("Alpha").field_not_empty("Custom.Ref");
        assert!(!query.matches(&wi));

        wi.set_field("Custom.Ref", "http://host/Alpha/3");
        assert!(query.matches(&wi));
    }

    #[test]
    fn query_equality_is_exact() {
        let mut wi = item("Alpha", "Bug");
        wi.set_field("Custom.Ref", "a/b/1");
        let hit = WorkItemQuery::in_project("Alpha").field_equals("Custom.Ref", "a/b/1");
        let miss = WorkItemQuery::in_project("Alpha").field_equals("Custom.Ref", "a/b/10");
        assert!(hit.matches(&wi));
        assert!(!miss.matches(&wi));
    }

    #[test]
    fn display_value_renders_scalars() {
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&json!("text")), "text");
        assert_eq!(display_value(&json!(12)), "12");
        assert_eq!(display_value(&json!(true)), "true");
    }

    #[test]
    fn type_reports_editability() {
        let ty = WorkItemType::new(
            "Bug",
            [
                FieldDefinition::editable(fields::TITLE, "Title").required(),
                FieldDefinition::read_only(fields::CREATED_DATE, "Created Date"),
            ],
        );
        assert!(ty.is_editable(fields::TITLE));
        assert!(!ty.is_editable(fields::CREATED_DATE));
        assert!(!ty.is_editable("Missing.Field"));
        assert_eq!(ty.required_fields().count(), 1);
    }
}
