//! Per-task merge decisions for the import direction.

use chrono::{DateTime, Utc};

use super::mapping::{diff_fields, FieldChange, LocalFields};
use crate::entities::task;

/// What to do with one remote task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// No local task holds the binding yet.
    Create,
    /// Overwrite the local task with the remote values. `changes` may be empty
    /// when only the sync stamps move.
    UpdateLocal { changes: Vec<FieldChange> },
    /// The local copy is newer and must be pushed by the export direction.
    QueueExport,
    Skip,
}

/// Best known time of the last local change.
///
/// `updated_at` wins; tasks that were never edited after being bound fall
/// back to the stamp of the last sync. `None` means nothing is known, which
/// callers treat as "remote is newer".
pub fn effective_local_timestamp(task: &task::Model) -> Option<DateTime<Utc>> {
    task.updated_at.or(task.external_last_modified)
}

/// Whether the remote copy was modified after the local one.
pub fn is_remote_newer(remote_modified: Option<DateTime<Utc>>, local: &task::Model) -> bool {
    match (remote_modified, effective_local_timestamp(local)) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(remote), Some(local)) => remote > local,
    }
}

/// Whether the local copy was edited after the remote one.
pub fn is_local_newer(remote_modified: Option<DateTime<Utc>>, local: &task::Model) -> bool {
    let Some(updated_at) = local.updated_at else {
        return false;
    };
    match remote_modified.or(local.external_last_modified) {
        Some(reference) => updated_at > reference,
        None => false,
    }
}

/// Decide how to merge a remote task into its bound local task, if any.
pub fn decide(
    remote: &LocalFields,
    remote_modified: Option<DateTime<Utc>>,
    bound: Option<&task::Model>,
    force_update: bool,
) -> Decision {
    let Some(local) = bound else {
        return Decision::Create;
    };

    let changes = diff_fields(&LocalFields::of_task(local), remote);
    if !changes.is_empty() || is_remote_newer(remote_modified, local) || force_update {
        return Decision::UpdateLocal { changes };
    }

    if is_local_newer(remote_modified, local) {
        return Decision::QueueExport;
    }

    Decision::Skip
}
