//! Change event repository for database operations.

use anyhow::Result;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::change_event;

/// Repository for the append-only change timeline.
pub struct ChangeEventRepository;

impl ChangeEventRepository {
    /// Append a batch of events. Callers wrap this in a transaction.
    pub async fn insert_many<C>(conn: &C, events: Vec<change_event::ActiveModel>) -> Result<()>
    where
        C: ConnectionTrait,
    {
        if events.is_empty() {
            return Ok(());
        }
        change_event::Entity::insert_many(events).exec(conn).await?;
        Ok(())
    }

    /// Timeline of a task, oldest first.
    pub async fn get_for_task<C>(conn: &C, task_id: i64) -> Result<Vec<change_event::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(change_event::Entity::find()
            .filter(change_event::Column::TaskId.eq(task_id))
            .order_by_asc(change_event::Column::Id)
            .all(conn)
            .await?)
    }

    /// Timeline of a user, oldest first.
    pub async fn get_for_user<C>(conn: &C, user_id: i64) -> Result<Vec<change_event::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(change_event::Entity::find()
            .filter(change_event::Column::UserId.eq(user_id))
            .order_by_asc(change_event::Column::Id)
            .all(conn)
            .await?)
    }
}
