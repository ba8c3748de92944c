use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue;

use super::{LocalStorage, ProjectStore};
use crate::entities::project;
use crate::repositories::ProjectRepository;

#[async_trait]
impl ProjectStore for LocalStorage {
    async fn get(&self, id: i64) -> Result<Option<project::Model>> {
        ProjectRepository::get_by_id(&self.conn, id).await
    }

    async fn find_by_name_case_insensitive(&self, user_id: i64, name: &str) -> Result<Vec<project::Model>> {
        ProjectRepository::get_by_name_case_insensitive(&self.conn, user_id, name).await
    }

    async fn create(&self, user_id: i64, name: &str, source: Option<&str>) -> Result<project::Model> {
        let local_project = project::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(user_id),
            name: ActiveValue::Set(name.to_string()),
            source: ActiveValue::Set(source.map(str::to_string)),
            created_at: ActiveValue::Set(Utc::now()),
        };

        ProjectRepository::insert(&self.conn, local_project).await
    }
}

impl LocalStorage {
    /// All projects of a user in creation order.
    pub async fn projects_for_user(&self, user_id: i64) -> Result<Vec<project::Model>> {
        ProjectRepository::get_for_user(&self.conn, user_id).await
    }
}
