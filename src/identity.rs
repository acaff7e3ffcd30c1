//! Reflected identity: the durable link between a source entity and the
//! target entity created from it.
//!
//! The wire format is `{endpoint}/{project}/{id}`, stored in a designated
//! field of the target item. Parsing is advisory: anything that is not
//! locator-shaped yields a [`ParseError`] and callers treat it as "no link".

use crate::error::{ParseError, Result};
use crate::model::{WorkItem, WorkItemQuery, display_value};
use crate::storage::WorkItemStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// Default name of the identity field on target items.
pub const DEFAULT_IDENTITY_FIELD: &str = "TfsMigrationTool.ReflectedWorkItemId";

static LOCATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.-]*://)?[\w.-]+(?::\d+)?(?:/[^/]*)*/([^/]*)$")
        .expect("locator regex")
});

/// Identity string recorded on a migrated entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReflectedIdentity(String);

impl ReflectedIdentity {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric id of the entity this identity points at.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the value is not locator-shaped.
    pub fn numeric_id(&self) -> std::result::Result<i64, ParseError> {
        parse_identity(&self.0)
    }
}

impl fmt::Display for ReflectedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ReflectedIdentity> for String {
    fn from(identity: ReflectedIdentity) -> Self {
        identity.0
    }
}

/// Identity of entity `id` hosted at `endpoint` in `project`.
#[must_use]
pub fn compute_identity(endpoint: &str, project: &str, id: i64) -> ReflectedIdentity {
    ReflectedIdentity(format!(
        "{}/{project}/{id}",
        endpoint.trim_end_matches('/')
    ))
}

/// Identity of a saved item in `store`.
#[must_use]
pub fn identity_of<S: WorkItemStore + ?Sized>(store: &S, item: &WorkItem) -> ReflectedIdentity {
    compute_identity(store.endpoint(), store.project_name(), item.id_or_zero())
}

/// Extract the numeric id from an identity value.
///
/// # Errors
///
/// - [`ParseError::Empty`] for blank input
/// - [`ParseError::NotLocator`] if the value has no `host/.../segment` shape
/// - [`ParseError::NoNumericSegment`] if the last segment is not an integer
pub fn parse_identity(value: &str) -> std::result::Result<i64, ParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ParseError::Empty);
    }
    let captures = LOCATOR
        .captures(value)
        .ok_or_else(|| ParseError::NotLocator(value.to_string()))?;
    captures[1]
        .parse::<i64>()
        .map_err(|_| ParseError::NoNumericSegment(value.to_string()))
}

/// Answers "has this source entity already been migrated?" against one
/// target store.
///
/// The bulk index is built on the first [`find_existing`](Self::find_existing)
/// call and is not refreshed for the rest of the run: items created later in
/// the same run are only visible through
/// [`find_by_exact_identity`](Self::find_by_exact_identity).
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    field: String,
    index: Option<HashMap<String, WorkItem>>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            index: None,
        }
    }

    /// Number of migrated items seen by the bulk index, if built.
    #[must_use]
    pub fn indexed_count(&self) -> Option<usize> {
        self.index.as_ref().map(HashMap::len)
    }

    /// Drop the index so the next lookup rebuilds it.
    pub fn reset(&mut self) {
        self.index = None;
    }

    /// Look up the target item carrying `identity`, via the run's index.
    ///
    /// # Errors
    ///
    /// Returns an error if the bulk query fails.
    pub fn find_existing<S: WorkItemStore + ?Sized>(
        &mut self,
        target: &S,
        identity: &ReflectedIdentity,
    ) -> Result<Option<WorkItem>> {
        if self.index.is_none() {
            self.index = Some(self.build_index(target)?);
        }
        Ok(self
            .index
            .as_ref()
            .and_then(|index| index.get(identity.as_str()))
            .cloned())
    }

    /// Targeted equality query that bypasses the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_by_exact_identity<S: WorkItemStore + ?Sized>(
        &self,
        target: &S,
        identity: &ReflectedIdentity,
    ) -> Result<Option<WorkItem>> {
        let query = WorkItemQuery::in_project(target.project_name())
            .field_equals(&self.field, identity.as_str());
        Ok(target.query_work_items(&query)?.into_iter().next())
    }

    /// Source id recorded on `item`, or `None` when absent or unparseable.
    #[must_use]
    pub fn linked_id(&self, item: &WorkItem) -> Option<i64> {
        let value = item.field_str(&self.field)?;
        match parse_identity(value) {
            Ok(id) => Some(id),
            Err(err) => {
                debug!(item = item.id_or_zero(), error = %err, "Ignoring unparseable identity");
                None
            }
        }
    }

    fn build_index<S: WorkItemStore + ?Sized>(
        &self,
        target: &S,
    ) -> Result<HashMap<String, WorkItem>> {
        let query =
            WorkItemQuery::in_project(target.project_name()).field_not_empty(&self.field);
        let mut index = HashMap::new();
        for item in target.query_work_items(&query)? {
            let Some(value) = item.field(&self.field).map(display_value) else {
                continue;
            };
            index.entry(value).or_insert(item);
        }
        trace!(count = index.len(), field = %self.field, "Built identity index");
        Ok(index)
    }
}
