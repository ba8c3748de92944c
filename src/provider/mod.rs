//! Provider abstraction for the external task service.
//!
//! This module defines the interface the sync engine uses to talk to the
//! remote to-do service, along with the provider-side data types and error
//! handling. [`mstodo::MsTodoClient`] implements it for Microsoft To Do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod mstodo;

pub use mstodo::MsTodoClient;

/// Errors raised by provider calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The access token was refused.
    #[error("Provider refused the access token")]
    Unauthorized,

    /// Network failure, timeout, throttling or a server-side error.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Any other client error. The response body is deliberately not kept.
    #[error("Provider rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// A remote collection of tasks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalList {
    pub id: String,
    pub display_name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    Text,
    Html,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBody {
    pub content: String,
    pub content_type: BodyType,
}

impl TaskBody {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: BodyType::Text,
        }
    }
}

/// Remote workflow status. Unknown values are kept so they can be logged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteStatus {
    NotStarted,
    InProgress,
    Completed,
    Other(String),
}

impl RemoteStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "notStarted" => RemoteStatus::NotStarted,
            "inProgress" => RemoteStatus::InProgress,
            "completed" => RemoteStatus::Completed,
            other => RemoteStatus::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            RemoteStatus::NotStarted => "notStarted",
            RemoteStatus::InProgress => "inProgress",
            RemoteStatus::Completed => "completed",
            RemoteStatus::Other(value) => value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Importance {
    Low,
    Normal,
    High,
}

impl Importance {
    /// Unknown importance values read as `Normal`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "low" => Importance::Low,
            "high" => Importance::High,
            _ => Importance::Normal,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Importance::Low => "low",
            Importance::Normal => "normal",
            Importance::High => "high",
        }
    }
}

/// A wall-clock time qualified by a time zone name, as the provider sends it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZonedDateTime {
    pub date_time: String,
    pub time_zone: String,
}

/// Immutable snapshot of a remote task as fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalTask {
    pub id: String,
    pub list_id: String,
    pub title: String,
    pub body: Option<TaskBody>,
    pub status: RemoteStatus,
    pub importance: Importance,
    pub due: Option<ZonedDateTime>,
    pub completed: Option<ZonedDateTime>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Set when the provider sent this item in a shape that could not be read.
    pub decode_error: Option<String>,
}

impl ExternalTask {
    /// Placeholder for a listed item that could not be decoded, so the
    /// failure stays attached to that one item.
    pub fn undecodable(id: impl Into<String>, list_id: &str, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            list_id: list_id.to_string(),
            title: String::new(),
            body: None,
            status: RemoteStatus::NotStarted,
            importance: Importance::Normal,
            due: None,
            completed: None,
            last_modified: None,
            decode_error: Some(reason.into()),
        }
    }
}

/// Fields sent when creating or patching a remote task. `None` fields are
/// omitted; nullable fields use a nested option so they can be cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskWrite {
    pub title: Option<String>,
    pub body: Option<TaskBody>,
    pub status: Option<RemoteStatus>,
    pub importance: Option<Importance>,
    pub due: Option<Option<ZonedDateTime>>,
    pub completed: Option<Option<ZonedDateTime>>,
}

impl TaskWrite {
    pub fn is_empty(&self) -> bool {
        self == &TaskWrite::default()
    }

    /// Names of the fields this write transmits.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.title.is_some() {
            names.push("title");
        }
        if self.body.is_some() {
            names.push("body");
        }
        if self.status.is_some() {
            names.push("status");
        }
        if self.importance.is_some() {
            names.push("importance");
        }
        if self.due.is_some() {
            names.push("dueDateTime");
        }
        if self.completed.is_some() {
            names.push("completedDateTime");
        }
        names
    }
}

/// Interface of the remote task service.
///
/// Every call receives the bearer token to use, so one client can serve
/// many users.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Tag stored in `external_source` for items of this provider.
    fn source_tag(&self) -> &str;

    async fn fetch_lists(&self, token: &str) -> Result<Vec<ExternalList>, ProviderError>;
    async fn fetch_tasks(&self, token: &str, list_id: &str) -> Result<Vec<ExternalTask>, ProviderError>;

    async fn create_list(&self, token: &str, display_name: &str) -> Result<ExternalList, ProviderError>;
    async fn create_task(&self, token: &str, list_id: &str, task: &TaskWrite) -> Result<ExternalTask, ProviderError>;
    async fn update_task(
        &self,
        token: &str,
        list_id: &str,
        task_id: &str,
        patch: &TaskWrite,
    ) -> Result<ExternalTask, ProviderError>;
}
