//! Outcome of a sync pass.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Steps a pass goes through. `PerCollection` steps repeat for each list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PassState {
    Idle,
    FetchingToken,
    EnumeratingCollections,
    FetchingItems,
    Reconciling,
    Applying,
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassState::Idle => "idle",
            PassState::FetchingToken => "fetching token",
            PassState::EnumeratingCollections => "enumerating collections",
            PassState::FetchingItems => "fetching items",
            PassState::Reconciling => "reconciling",
            PassState::Applying => "applying",
            PassState::Aggregating => "aggregating",
            PassState::Done => "done",
            PassState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Category of a per-item failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    Provider,
    Timeout,
    Store,
    Validation,
}

/// One item (or collection) that could not be synced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub kind: FailureKind,
    pub task_id: Option<i64>,
    pub external_id: Option<String>,
    pub collection: Option<String>,
    pub message: String,
}

/// Non-fatal observation made during a pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SyncWarning {
    /// Several local projects matched a collection name; the earliest
    /// created one was used.
    MappingAmbiguity {
        collection: String,
        chosen_project_id: i64,
        candidates: usize,
    },
}

/// Counters and diagnostics of one pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub pass_id: Uuid,
    pub created: usize,
    pub updated: usize,
    pub exported: usize,
    /// Items a direction left untouched, including imports deferred to export.
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
    pub warnings: Vec<SyncWarning>,
    /// Local tasks found newer than their remote copy during import.
    pub queued_for_export: Vec<i64>,
    pub state: PassState,
}

impl SyncResult {
    pub fn new(pass_id: Uuid) -> Self {
        Self {
            pass_id,
            created: 0,
            updated: 0,
            exported: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
            queued_for_export: Vec::new(),
            state: PassState::Idle,
        }
    }

    pub fn record_failure(&mut self, failure: ItemFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    /// Fold the counters of a sub-pass into this result.
    pub fn merge(&mut self, other: SyncResult) {
        self.created += other.created;
        self.updated += other.updated;
        self.exported += other.exported;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.failures.extend(other.failures);
        self.warnings.extend(other.warnings);
        for id in other.queued_for_export {
            if !self.queued_for_export.contains(&id) {
                self.queued_for_export.push(id);
            }
        }
    }

    pub fn imported(&self) -> usize {
        self.created + self.updated
    }

    /// User-facing one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} imported, {} exported, {} failed",
            self.imported(),
            self.exported,
            self.failed
        )
    }
}
