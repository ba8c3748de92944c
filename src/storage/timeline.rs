use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveValue, TransactionTrait};

use super::{LocalStorage, NewChangeEvent, TimelineSink};
use crate::entities::change_event;
use crate::repositories::ChangeEventRepository;

#[async_trait]
impl TimelineSink for LocalStorage {
    async fn record(&self, events: Vec<NewChangeEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let rows = events
            .into_iter()
            .map(|event| change_event::ActiveModel {
                id: ActiveValue::NotSet,
                task_id: ActiveValue::Set(event.task_id),
                user_id: ActiveValue::Set(event.user_id),
                field: ActiveValue::Set(event.field),
                old_value: ActiveValue::Set(event.old_value),
                new_value: ActiveValue::Set(event.new_value),
                actor: ActiveValue::Set(event.actor),
                metadata: ActiveValue::Set(event.metadata),
                created_at: ActiveValue::Set(now),
            })
            .collect();

        let txn = self.conn.begin().await?;
        ChangeEventRepository::insert_many(&txn, rows).await?;
        txn.commit().await?;
        Ok(())
    }
}

impl LocalStorage {
    /// Timeline of a task, oldest first.
    pub async fn timeline_for_task(&self, task_id: i64) -> Result<Vec<change_event::Model>> {
        ChangeEventRepository::get_for_task(&self.conn, task_id).await
    }

    /// Timeline of a user, oldest first.
    pub async fn timeline_for_user(&self, user_id: i64) -> Result<Vec<change_event::Model>> {
        ChangeEventRepository::get_for_user(&self.conn, user_id).await
    }
}
