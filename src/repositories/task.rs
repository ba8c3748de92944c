//! Task repository for database operations.

use anyhow::Result;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::task;

/// Repository for task-related database operations.
pub struct TaskRepository;

impl TaskRepository {
    /// Get a single task by id.
    pub async fn get_by_id<C>(conn: &C, id: i64) -> Result<Option<task::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(task::Entity::find_by_id(id).one(conn).await?)
    }

    /// Look up the task bound to `(user, source, external_id)`.
    pub async fn get_by_external_id<C>(
        conn: &C,
        user_id: i64,
        source: &str,
        external_id: &str,
    ) -> Result<Option<task::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(task::Entity::find()
            .filter(task::Column::UserId.eq(user_id))
            .filter(task::Column::ExternalSource.eq(source))
            .filter(task::Column::ExternalId.eq(external_id))
            .one(conn)
            .await?)
    }

    /// Get all tasks owned by a user, oldest first.
    pub async fn get_for_user<C>(conn: &C, user_id: i64) -> Result<Vec<task::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(task::Entity::find()
            .filter(task::Column::UserId.eq(user_id))
            .order_by_asc(task::Column::Id)
            .all(conn)
            .await?)
    }

    /// Tasks eligible for the export pass.
    ///
    /// Tasks tagged with `source` always qualify. Untagged tasks without a
    /// binding qualify only when `include_unbound` is set.
    pub async fn get_export_candidates<C>(
        conn: &C,
        user_id: i64,
        source: &str,
        include_unbound: bool,
    ) -> Result<Vec<task::Model>>
    where
        C: ConnectionTrait,
    {
        let mut scope = Condition::any().add(task::Column::ExternalSource.eq(source));
        if include_unbound {
            scope = scope.add(
                Condition::all()
                    .add(task::Column::ExternalSource.is_null())
                    .add(task::Column::ExternalId.is_null()),
            );
        }

        Ok(task::Entity::find()
            .filter(task::Column::UserId.eq(user_id))
            .filter(scope)
            .order_by_asc(task::Column::Id)
            .all(conn)
            .await?)
    }

    /// Insert a new task and return the stored row.
    pub async fn insert<C>(conn: &C, task: task::ActiveModel) -> Result<task::Model>
    where
        C: ConnectionTrait,
    {
        Ok(task.insert(conn).await?)
    }

    /// Update a task in the database.
    pub async fn update<C>(conn: &C, task: task::ActiveModel) -> Result<task::Model>
    where
        C: ConnectionTrait,
    {
        Ok(task.update(conn).await?)
    }
}
