//! Project repository for database operations.

use anyhow::Result;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::project;

/// Repository for project-related database operations.
pub struct ProjectRepository;

impl ProjectRepository {
    /// Get a single project by id.
    pub async fn get_by_id<C>(conn: &C, id: i64) -> Result<Option<project::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(project::Entity::find_by_id(id).one(conn).await?)
    }

    /// Get all projects of a user in creation order.
    pub async fn get_for_user<C>(conn: &C, user_id: i64) -> Result<Vec<project::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(project::Entity::find()
            .filter(project::Column::UserId.eq(user_id))
            .order_by_asc(project::Column::CreatedAt)
            .order_by_asc(project::Column::Id)
            .all(conn)
            .await?)
    }

    /// Projects whose name equals `name` ignoring case, earliest created first.
    ///
    /// The comparison happens in Rust because SQLite's `lower()` only folds ASCII.
    pub async fn get_by_name_case_insensitive<C>(conn: &C, user_id: i64, name: &str) -> Result<Vec<project::Model>>
    where
        C: ConnectionTrait,
    {
        let wanted = name.to_lowercase();
        Ok(Self::get_for_user(conn, user_id)
            .await?
            .into_iter()
            .filter(|p| p.name.to_lowercase() == wanted)
            .collect())
    }

    /// Insert a new project and return the stored row.
    pub async fn insert<C>(conn: &C, project: project::ActiveModel) -> Result<project::Model>
    where
        C: ConnectionTrait,
    {
        Ok(project.insert(conn).await?)
    }
}
