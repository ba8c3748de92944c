//! Connection repository for persisted OAuth leases.

use anyhow::Result;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::connection::{self, ConnectionStatus};

/// Repository for provider connections.
pub struct ConnectionRepository;

impl ConnectionRepository {
    /// Get the connection of a user for a provider.
    pub async fn get<C>(conn: &C, user_id: i64, provider: &str) -> Result<Option<connection::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(connection::Entity::find()
            .filter(connection::Column::UserId.eq(user_id))
            .filter(connection::Column::Provider.eq(provider))
            .one(conn)
            .await?)
    }

    /// Users holding a connected lease for a provider.
    pub async fn get_connected_users<C>(conn: &C, provider: &str) -> Result<Vec<i64>>
    where
        C: ConnectionTrait,
    {
        Ok(connection::Entity::find()
            .filter(connection::Column::Provider.eq(provider))
            .filter(connection::Column::Status.eq(ConnectionStatus::Connected))
            .order_by_asc(connection::Column::UserId)
            .all(conn)
            .await?
            .into_iter()
            .map(|c| c.user_id)
            .collect())
    }

    /// Insert a new connection row.
    pub async fn insert<C>(conn: &C, connection: connection::ActiveModel) -> Result<connection::Model>
    where
        C: ConnectionTrait,
    {
        Ok(connection.insert(conn).await?)
    }

    /// Update an existing connection row.
    pub async fn update<C>(conn: &C, connection: connection::ActiveModel) -> Result<connection::Model>
    where
        C: ConnectionTrait,
    {
        Ok(connection.update(conn).await?)
    }
}
