use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveValue, IntoActiveModel, TransactionTrait};

use super::{LocalStorage, NewTask, TaskPatch, TaskStore};
use crate::entities::task;
use crate::repositories::TaskRepository;

#[async_trait]
impl TaskStore for LocalStorage {
    async fn get(&self, id: i64) -> Result<Option<task::Model>> {
        TaskRepository::get_by_id(&self.conn, id).await
    }

    async fn find_by_external_id(&self, user_id: i64, source: &str, external_id: &str) -> Result<Option<task::Model>> {
        TaskRepository::get_by_external_id(&self.conn, user_id, source, external_id).await
    }

    async fn create(&self, fields: NewTask) -> Result<task::Model> {
        let now = Utc::now();
        let local_task = task::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(fields.user_id),
            project_id: ActiveValue::Set(fields.project_id),
            name: ActiveValue::Set(fields.name),
            note: ActiveValue::Set(fields.note),
            status: ActiveValue::Set(fields.status),
            priority: ActiveValue::Set(fields.priority),
            due_date: ActiveValue::Set(fields.due_date),
            completed_at: ActiveValue::Set(fields.completed_at),
            external_id: ActiveValue::Set(fields.external_id),
            external_source: ActiveValue::Set(fields.external_source),
            external_list_id: ActiveValue::Set(fields.external_list_id),
            external_last_modified: ActiveValue::Set(fields.external_last_modified),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(Some(fields.updated_at.unwrap_or(now))),
        };

        TaskRepository::insert(&self.conn, local_task).await
    }

    async fn update(&self, id: i64, patch: TaskPatch) -> Result<task::Model> {
        let txn = self.conn.begin().await?;

        let Some(existing) = TaskRepository::get_by_id(&txn, id).await? else {
            bail!("Task not found: {id}");
        };

        if let (Some(bound), Some(requested)) = (&existing.external_id, &patch.external_id) {
            if bound != requested {
                bail!("Task {id} is already bound to external id {bound}; refusing to rebind to {requested}");
            }
        }

        let mut active_model: task::ActiveModel = existing.into_active_model();
        if let Some(project_id) = patch.project_id {
            active_model.project_id = ActiveValue::Set(project_id);
        }
        if let Some(name) = patch.name {
            active_model.name = ActiveValue::Set(name);
        }
        if let Some(note) = patch.note {
            active_model.note = ActiveValue::Set(note);
        }
        if let Some(status) = patch.status {
            active_model.status = ActiveValue::Set(status);
        }
        if let Some(priority) = patch.priority {
            active_model.priority = ActiveValue::Set(priority);
        }
        if let Some(due_date) = patch.due_date {
            active_model.due_date = ActiveValue::Set(due_date);
        }
        if let Some(completed_at) = patch.completed_at {
            active_model.completed_at = ActiveValue::Set(completed_at);
        }
        if let Some(external_id) = patch.external_id {
            active_model.external_id = ActiveValue::Set(Some(external_id));
        }
        if let Some(source) = patch.external_source {
            active_model.external_source = ActiveValue::Set(Some(source));
        }
        if let Some(list_id) = patch.external_list_id {
            active_model.external_list_id = ActiveValue::Set(Some(list_id));
        }
        if let Some(last_modified) = patch.external_last_modified {
            active_model.external_last_modified = ActiveValue::Set(Some(last_modified));
        }
        active_model.updated_at = ActiveValue::Set(Some(patch.updated_at.unwrap_or_else(Utc::now)));

        let updated = TaskRepository::update(&txn, active_model).await?;
        txn.commit().await?;
        Ok(updated)
    }

    async fn list_export_candidates(&self, user_id: i64, source: &str, include_unbound: bool) -> Result<Vec<task::Model>> {
        TaskRepository::get_export_candidates(&self.conn, user_id, source, include_unbound).await
    }
}

impl LocalStorage {
    /// All tasks of a user, oldest first.
    pub async fn tasks_for_user(&self, user_id: i64) -> Result<Vec<task::Model>> {
        TaskRepository::get_for_user(&self.conn, user_id).await
    }
}
