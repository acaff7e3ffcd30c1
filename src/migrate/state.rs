//! Per-run counters and the rolling completion estimate.

use crate::format::{format_average, format_duration};
use crate::migrate::MigrationKind;
use crate::sync::SyncReport;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

/// How one top-level entity ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Migrated,
    Skipped,
    Failed,
}

/// Final counters for one migration kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub kind: MigrationKind,
    pub attempted: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Query folders scanned; only reported for query runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folders: Option<usize>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RunSummary {
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Counters owned by one run; discarded when the run ends.
#[derive(Debug, Clone)]
pub struct RunState {
    kind: MigrationKind,
    total: usize,
    processed: usize,
    attempted: usize,
    migrated: usize,
    skipped: usize,
    failed: usize,
    folders: Option<usize>,
    item_time: Duration,
    started: Instant,
}

impl RunState {
    /// Start a run over `total` top-level entities.
    #[must_use]
    pub fn new(kind: MigrationKind, total: usize) -> Self {
        Self {
            kind,
            total,
            processed: 0,
            attempted: 0,
            migrated: 0,
            skipped: 0,
            failed: 0,
            folders: None,
            item_time: Duration::ZERO,
            started: Instant::now(),
        }
    }

    /// Record one processed entity and its processing time.
    pub fn record(&mut self, outcome: ItemOutcome, took: Duration) {
        self.count(outcome);
        self.finish(took);
    }

    /// Close out one top-level entity whose nested outcomes were counted
    /// separately.
    pub fn finish(&mut self, took: Duration) {
        self.processed += 1;
        self.item_time += took;
        info!(
            kind = %self.kind,
            remaining = self.remaining(),
            average = %format_average(self.average()),
            eta = %format_duration(self.eta()),
            "Progress"
        );
    }

    /// Count an outcome for a nested entity that is not part of the estimate.
    pub const fn count(&mut self, outcome: ItemOutcome) {
        self.attempted += 1;
        match outcome {
            ItemOutcome::Migrated => self.migrated += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }

    /// Fold a hierarchy pass into the counters: created nodes are migrated,
    /// reused and skipped nodes are skipped.
    pub fn tally(&mut self, report: &SyncReport) {
        self.attempted += report.created + report.reused + report.skipped + report.failed;
        self.migrated += report.created;
        self.skipped += report.reused + report.skipped;
        self.failed += report.failed;
    }

    pub fn add_folders(&mut self, count: usize) {
        *self.folders.get_or_insert(0) += count;
    }

    #[must_use]
    pub const fn processed(&self) -> usize {
        self.processed
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    /// Mean processing time per entity so far.
    #[must_use]
    pub fn average(&self) -> Duration {
        match u32::try_from(self.processed) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.item_time / n,
            Err(_) => Duration::ZERO,
        }
    }

    /// Average multiplied by the number of entities not yet processed.
    #[must_use]
    pub fn eta(&self) -> Duration {
        let remaining = u32::try_from(self.remaining()).unwrap_or(u32::MAX);
        self.average().saturating_mul(remaining)
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            kind: self.kind,
            attempted: self.attempted,
            migrated: self.migrated,
            skipped: self.skipped,
            failed: self.failed,
            folders: self.folders,
            elapsed: self.started.elapsed(),
        }
    }
}
