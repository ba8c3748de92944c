//! Local storage module for the task store consumed by the sync engine.
//!
//! The engine never touches the database directly. It talks to the narrow
//! collaborator interfaces defined here:
//! - [`TaskStore`] - tasks and their provider bindings
//! - [`ProjectStore`] - projects that external lists map onto
//! - [`TimelineSink`] - the append-only audit timeline
//! - [`TokenStore`] - persisted OAuth leases
//!
//! [`LocalStorage`] implements all of them on top of SeaORM and SQLite.

pub mod connections;
pub mod db;
pub mod projects;
pub mod tasks;
pub mod timeline;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::TokenLease;
use crate::entities::{project, task, TaskPriority, TaskStatus};

pub use db::LocalStorage;

/// Fields of a task about to be created.
#[derive(Clone, Debug, PartialEq)]
pub struct NewTask {
    pub user_id: i64,
    pub project_id: Option<i64>,
    pub name: String,
    pub note: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub external_id: Option<String>,
    pub external_source: Option<String>,
    pub external_list_id: Option<String>,
    pub external_last_modified: Option<DateTime<Utc>>,
    /// Explicit mutation stamp; the store uses the current time when absent.
    pub updated_at: Option<DateTime<Utc>>,
}

impl NewTask {
    /// A purely local task with default status and priority.
    pub fn local(user_id: i64, name: impl Into<String>) -> Self {
        Self {
            user_id,
            project_id: None,
            name: name.into(),
            note: None,
            status: TaskStatus::NotStarted,
            priority: TaskPriority::Medium,
            due_date: None,
            completed_at: None,
            external_id: None,
            external_source: None,
            external_list_id: None,
            external_last_modified: None,
            updated_at: None,
        }
    }
}

/// Partial update of a task. `None` leaves a column untouched; nullable
/// columns use a nested option so they can be cleared.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskPatch {
    pub project_id: Option<Option<i64>>,
    pub name: Option<String>,
    pub note: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub external_id: Option<String>,
    pub external_source: Option<String>,
    pub external_list_id: Option<String>,
    pub external_last_modified: Option<DateTime<Utc>>,
    /// Explicit mutation stamp; the store uses the current time when absent.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A change event about to be appended to the timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct NewChangeEvent {
    pub task_id: i64,
    pub user_id: i64,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor: String,
    pub metadata: serde_json::Value,
}

/// Task persistence consumed by the sync engine.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<task::Model>>;

    /// The task holding the binding `(user, source, external_id)`, if any.
    async fn find_by_external_id(&self, user_id: i64, source: &str, external_id: &str) -> Result<Option<task::Model>>;

    async fn create(&self, fields: NewTask) -> Result<task::Model>;

    /// Apply `patch` to task `id`. Fails when the patch would rebind the task
    /// to a different external id.
    async fn update(&self, id: i64, patch: TaskPatch) -> Result<task::Model>;

    async fn list_export_candidates(&self, user_id: i64, source: &str, include_unbound: bool)
        -> Result<Vec<task::Model>>;
}

/// Project persistence consumed by the list mapper.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<project::Model>>;

    /// All projects matching `name` ignoring case, earliest created first.
    async fn find_by_name_case_insensitive(&self, user_id: i64, name: &str) -> Result<Vec<project::Model>>;

    async fn create(&self, user_id: i64, name: &str, source: Option<&str>) -> Result<project::Model>;
}

/// Append-only audit timeline.
#[async_trait]
pub trait TimelineSink: Send + Sync {
    /// Append all events or none of them.
    async fn record(&self, events: Vec<NewChangeEvent>) -> Result<()>;
}

/// Durable home of OAuth leases.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// The connected lease of a user, `None` when missing or disconnected.
    async fn load(&self, user_id: i64, provider: &str) -> Result<Option<TokenLease>>;

    async fn save(&self, user_id: i64, provider: &str, lease: &TokenLease) -> Result<()>;

    /// Forget the lease and require a fresh authorization.
    async fn mark_disconnected(&self, user_id: i64, provider: &str) -> Result<()>;

    async fn connected_users(&self, provider: &str) -> Result<Vec<i64>>;
}
