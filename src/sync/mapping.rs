//! Translation between provider tasks and local task fields.
//!
//! Everything here is pure. Dates are compared at whole-second precision
//! because the provider truncates sub-second parts differently than SQLite.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::entities::{task, TaskPriority, TaskStatus};
use crate::provider::{BodyType, ExternalTask, Importance, RemoteStatus, TaskBody, TaskWrite, ZonedDateTime};
use crate::utils::datetime::{format_graph_datetime, zoned_to_utc};
use crate::utils::html::html_to_text;

/// Field names used in diffs and on the timeline.
pub const FIELD_NAME: &str = "name";
pub const FIELD_NOTE: &str = "note";
pub const FIELD_DUE_DATE: &str = "due_date";
pub const FIELD_PRIORITY: &str = "priority";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_COMPLETED_AT: &str = "completed_at";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("task has an empty title")]
    EmptyTitle,

    #[error("invalid {field} date {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("task could not be decoded: {0}")]
    Undecodable(String),
}

/// The synchronized subset of a task, in local terms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFields {
    pub name: String,
    pub note: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LocalFields {
    pub fn of_task(task: &task::Model) -> Self {
        Self {
            name: task.name.clone(),
            note: task.note.clone(),
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            completed_at: task.completed_at,
        }
    }

    /// JSON snapshot written to the timeline when a task is created.
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "note": self.note,
            "status": self.status.as_str(),
            "priority": self.priority.as_str(),
            "due_date": self.due_date.map(|d| d.to_rfc3339()),
            "completed_at": self.completed_at.map(|d| d.to_rfc3339()),
        })
    }
}

/// A changed field with its previous and new rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Whether two optional instants denote the same second.
pub fn same_instant(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.timestamp() == b.timestamp(),
        (None, None) => true,
        _ => false,
    }
}

fn render_date(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|d| d.to_rfc3339())
}

/// Field-by-field differences going from `from` to `to`, in a stable order.
pub fn diff_fields(from: &LocalFields, to: &LocalFields) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    if from.name != to.name {
        changes.push(FieldChange {
            field: FIELD_NAME,
            old_value: Some(from.name.clone()),
            new_value: Some(to.name.clone()),
        });
    }
    if from.note != to.note {
        changes.push(FieldChange {
            field: FIELD_NOTE,
            old_value: from.note.clone(),
            new_value: to.note.clone(),
        });
    }
    if !same_instant(from.due_date, to.due_date) {
        changes.push(FieldChange {
            field: FIELD_DUE_DATE,
            old_value: render_date(from.due_date),
            new_value: render_date(to.due_date),
        });
    }
    if from.priority != to.priority {
        changes.push(FieldChange {
            field: FIELD_PRIORITY,
            old_value: Some(from.priority.as_str().to_string()),
            new_value: Some(to.priority.as_str().to_string()),
        });
    }
    if from.status != to.status {
        changes.push(FieldChange {
            field: FIELD_STATUS,
            old_value: Some(from.status.as_str().to_string()),
            new_value: Some(to.status.as_str().to_string()),
        });
    }
    if !same_instant(from.completed_at, to.completed_at) {
        changes.push(FieldChange {
            field: FIELD_COMPLETED_AT,
            old_value: render_date(from.completed_at),
            new_value: render_date(to.completed_at),
        });
    }

    changes
}

/// Pure translation between the provider's vocabulary and the local one.
pub struct FieldMapper;

impl FieldMapper {
    pub fn status_from_remote(status: &RemoteStatus) -> TaskStatus {
        match status {
            RemoteStatus::Completed => TaskStatus::Done,
            RemoteStatus::InProgress => TaskStatus::InProgress,
            RemoteStatus::NotStarted | RemoteStatus::Other(_) => TaskStatus::NotStarted,
        }
    }

    pub fn status_to_remote(status: TaskStatus) -> RemoteStatus {
        match status {
            TaskStatus::Done => RemoteStatus::Completed,
            TaskStatus::InProgress => RemoteStatus::InProgress,
            TaskStatus::NotStarted => RemoteStatus::NotStarted,
        }
    }

    pub fn priority_from_importance(importance: Importance) -> TaskPriority {
        match importance {
            Importance::High => TaskPriority::High,
            Importance::Low => TaskPriority::Low,
            Importance::Normal => TaskPriority::Medium,
        }
    }

    pub fn priority_to_importance(priority: TaskPriority) -> Importance {
        match priority {
            TaskPriority::High => Importance::High,
            TaskPriority::Low => Importance::Low,
            TaskPriority::Medium => Importance::Normal,
        }
    }

    /// Plain-text note of a body; empty bodies carry no note.
    pub fn note_from_body(body: Option<&TaskBody>) -> Option<String> {
        let body = body?;
        let text = match body.content_type {
            BodyType::Html => html_to_text(&body.content),
            BodyType::Text => body.content.trim().to_string(),
        };
        (!text.is_empty()).then_some(text)
    }

    pub fn parse_date(field: &'static str, value: Option<&ZonedDateTime>) -> Result<Option<DateTime<Utc>>, MappingError> {
        let Some(value) = value else {
            return Ok(None);
        };
        zoned_to_utc(&value.date_time, &value.time_zone)
            .map(Some)
            .map_err(|_| MappingError::InvalidDate {
                field,
                value: value.date_time.clone(),
            })
    }

    pub fn format_date(value: DateTime<Utc>) -> ZonedDateTime {
        ZonedDateTime {
            date_time: format_graph_datetime(value),
            time_zone: "UTC".to_string(),
        }
    }

    /// Local view of a remote task.
    pub fn to_local(external: &ExternalTask) -> Result<LocalFields, MappingError> {
        if let Some(reason) = &external.decode_error {
            return Err(MappingError::Undecodable(reason.clone()));
        }
        let name = external.title.trim();
        if name.is_empty() {
            return Err(MappingError::EmptyTitle);
        }

        Ok(LocalFields {
            name: name.to_string(),
            note: Self::note_from_body(external.body.as_ref()),
            status: Self::status_from_remote(&external.status),
            priority: Self::priority_from_importance(external.importance),
            due_date: Self::parse_date(FIELD_DUE_DATE, external.due.as_ref())?,
            completed_at: Self::parse_date(FIELD_COMPLETED_AT, external.completed.as_ref())?,
        })
    }

    /// Full payload for creating the remote copy of a local task.
    pub fn to_remote(fields: &LocalFields) -> Result<TaskWrite, MappingError> {
        if fields.name.trim().is_empty() {
            return Err(MappingError::EmptyTitle);
        }

        Ok(TaskWrite {
            title: Some(fields.name.clone()),
            body: Some(TaskBody::text(fields.note.clone().unwrap_or_default())),
            status: Some(Self::status_to_remote(fields.status)),
            importance: Some(Self::priority_to_importance(fields.priority)),
            due: Some(fields.due_date.map(Self::format_date)),
            completed: fields
                .completed_at
                .filter(|_| fields.status == TaskStatus::Done)
                .map(|d| Some(Self::format_date(d))),
        })
    }

    /// Patch carrying only the fields where `local` differs from `remote`.
    pub fn remote_patch(local: &LocalFields, remote: &LocalFields) -> Result<TaskWrite, MappingError> {
        if local.name.trim().is_empty() {
            return Err(MappingError::EmptyTitle);
        }

        let mut patch = TaskWrite::default();
        for change in diff_fields(remote, local) {
            match change.field {
                FIELD_NAME => patch.title = Some(local.name.clone()),
                FIELD_NOTE => patch.body = Some(TaskBody::text(local.note.clone().unwrap_or_default())),
                FIELD_DUE_DATE => patch.due = Some(local.due_date.map(Self::format_date)),
                FIELD_PRIORITY => patch.importance = Some(Self::priority_to_importance(local.priority)),
                FIELD_STATUS => patch.status = Some(Self::status_to_remote(local.status)),
                FIELD_COMPLETED_AT if local.status == TaskStatus::Done => {
                    patch.completed = Some(local.completed_at.map(Self::format_date))
                }
                _ => {}
            }
        }
        Ok(patch)
    }
}
