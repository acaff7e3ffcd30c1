//! Hierarchy mirroring.
//!
//! [`sync_node`] mirrors one source subtree under a target parent without
//! creating duplicates. Each node is matched to an existing target child by
//! its natural key; missing nodes are created and then re-fetched so the
//! handle always comes from the target. Failures are contained: a node that
//! cannot be resolved abandons its own subtree while siblings continue.
//!
//! The same algorithm drives area/iteration trees, query folders and test
//! suites through the [`SourceNode`] and [`TreeTarget`] seams.
//!
//! # Submodules
//!
//! - [`path`] - Path and query-text rewriting between projects

pub mod path;

use crate::error::{MigrateError, Result};
use crate::model::{ClassificationNode, DateRange, QueryItem, TestSuite};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, trace, warn};

/// A node of a source hierarchy.
pub trait SourceNode: Sized {
    /// Name (or title) compared against target siblings.
    fn natural_key(&self) -> &str;

    fn child_nodes(&self) -> &[Self];

    /// Dates to carry over; `None` unless both bounds are present.
    fn date_range(&self) -> Option<DateRange> {
        None
    }
}

impl SourceNode for ClassificationNode {
    fn natural_key(&self) -> &str {
        &self.name
    }

    fn child_nodes(&self) -> &[Self] {
        &self.children
    }

    fn date_range(&self) -> Option<DateRange> {
        Self::date_range(self)
    }
}

impl SourceNode for QueryItem {
    fn natural_key(&self) -> &str {
        self.name()
    }

    fn child_nodes(&self) -> &[Self] {
        self.children()
    }
}

impl SourceNode for TestSuite {
    fn natural_key(&self) -> &str {
        &self.title
    }

    fn child_nodes(&self) -> &[Self] {
        &self.children
    }
}

/// Target side of a hierarchy.
pub trait TreeTarget<N: SourceNode> {
    /// Canonical reference to a target node (a path or an id).
    type Handle: Clone + fmt::Display;

    /// Child of `parent` whose natural key equals the source node's.
    fn lookup_child(&mut self, parent: &Self::Handle, source: &N) -> Result<Option<Self::Handle>>;

    /// Create the child. The caller re-fetches it with [`lookup_child`](Self::lookup_child).
    fn create_child(
        &mut self,
        parent: &Self::Handle,
        source: &N,
        dates: Option<DateRange>,
    ) -> Result<()>;

    /// Reason to leave `source` (and its subtree) alone, if any.
    fn skip_reason(&self, _source: &N) -> Option<String> {
        None
    }

    /// Called once a node is resolved, before its children are visited.
    fn on_resolved(&mut self, _source: &N, _handle: &Self::Handle, _created: bool) -> Result<()> {
        Ok(())
    }
}

/// Counters for one synchronization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub reused: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncReport {
    #[must_use]
    pub const fn resolved(&self) -> usize {
        self.created + self.reused
    }
}

/// How a single node was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<H> {
    /// A sibling with the same natural key already existed.
    Reused(H),
    /// The node was created (or lost a creation race) and re-fetched.
    Created(H),
}

impl<H> Resolution<H> {
    #[must_use]
    pub fn into_handle(self) -> H {
        match self {
            Self::Reused(handle) | Self::Created(handle) => handle,
        }
    }

    #[must_use]
    pub const fn handle(&self) -> &H {
        match self {
            Self::Reused(handle) | Self::Created(handle) => handle,
        }
    }
}

/// Resolve `source` under `parent` without visiting its children.
///
/// # Errors
///
/// Returns the lookup or creation error; an [`MigrateError::AlreadyExists`]
/// failure is treated as success.
pub fn resolve_node<N, T>(
    target: &mut T,
    source: &N,
    parent: &T::Handle,
) -> Result<Resolution<T::Handle>>
where
    N: SourceNode,
    T: TreeTarget<N>,
{
    if let Some(existing) = target.lookup_child(parent, source)? {
        return Ok(Resolution::Reused(existing));
    }

    match target.create_child(parent, source, source.date_range()) {
        Ok(()) => {}
        Err(err) if err.is_already_exists() => {
            debug!(key = %source.natural_key(), parent = %parent, "Node appeared concurrently");
        }
        Err(err) => return Err(err),
    }

    target
        .lookup_child(parent, source)?
        .map(Resolution::Created)
        .ok_or_else(|| MigrateError::not_found("created node", source.natural_key().to_string()))
}

/// Mirror `source` and its subtree under `parent`.
///
/// Returns the target handle, or `None` when the branch was skipped or
/// abandoned. Never fails: errors are logged and counted in `report`.
pub fn sync_node<N, T>(
    target: &mut T,
    source: &N,
    parent: &T::Handle,
    report: &mut SyncReport,
) -> Option<T::Handle>
where
    N: SourceNode,
    T: TreeTarget<N>,
{
    trace!(
        key = %source.natural_key(),
        parent = %parent,
        children = source.child_nodes().len(),
        "Resolving node"
    );
    if let Some(reason) = target.skip_reason(source) {
        debug!(key = %source.natural_key(), reason = %reason, "Skipping node");
        report.skipped += 1;
        return None;
    }

    let resolution = match resolve_node(target, source, parent) {
        Ok(resolution) => resolution,
        Err(err) => {
            warn!(
                key = %source.natural_key(),
                parent = %parent,
                error = %err,
                "Abandoning branch"
            );
            report.failed += 1;
            return None;
        }
    };

    let created = matches!(resolution, Resolution::Created(_));
    let handle = resolution.into_handle();
    if created {
        info!(node = %handle, "Created");
        report.created += 1;
    } else {
        debug!(node = %handle, "Already exists");
        report.reused += 1;
    }

    if let Err(err) = target.on_resolved(source, &handle, created) {
        warn!(node = %handle, error = %err, "Post-processing failed");
        report.failed += 1;
    }

    for child in source.child_nodes() {
        sync_node(target, child, &handle, report);
    }
    Some(handle)
}

/// Mirror the children of `source_root` under `target_root`.
///
/// With `prefix_root`, a node named after `source_root` is resolved under
/// `target_root` first and the children are grafted beneath it.
pub fn sync_tree<N, T>(
    target: &mut T,
    source_root: &N,
    target_root: &T::Handle,
    prefix_root: bool,
) -> SyncReport
where
    N: SourceNode,
    T: TreeTarget<N>,
{
    let mut report = SyncReport::default();
    let parent = if prefix_root {
        match resolve_node(target, source_root, target_root) {
            Ok(Resolution::Created(handle)) => {
                info!(node = %handle, "Created prefix root");
                report.created += 1;
                handle
            }
            Ok(Resolution::Reused(handle)) => {
                report.reused += 1;
                handle
            }
            Err(err) => {
                warn!(key = %source_root.natural_key(), error = %err, "Cannot resolve prefix root");
                report.failed += 1;
                return report;
            }
        }
    } else {
        target_root.clone()
    };

    for child in source_root.child_nodes() {
        sync_node(target, child, &parent, &mut report);
    }
    report
}
