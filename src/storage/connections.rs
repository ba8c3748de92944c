use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use log::warn;
use sea_orm::{ActiveValue, IntoActiveModel, TransactionTrait};

use super::{LocalStorage, TokenStore};
use crate::auth::TokenLease;
use crate::entities::connection::{self, ConnectionStatus};
use crate::repositories::ConnectionRepository;

#[async_trait]
impl TokenStore for LocalStorage {
    async fn load(&self, user_id: i64, provider: &str) -> Result<Option<TokenLease>> {
        let Some(row) = ConnectionRepository::get(&self.conn, user_id, provider).await? else {
            return Ok(None);
        };

        if row.status == ConnectionStatus::Disconnected {
            return Ok(None);
        }

        match (row.access_token, row.expires_at) {
            (Some(access_token), Some(expires_at)) => Ok(Some(TokenLease {
                access_token,
                refresh_token: row.refresh_token,
                expires_at,
            })),
            (None, _) if row.refresh_token.is_some() => Ok(Some(TokenLease {
                access_token: String::new(),
                refresh_token: row.refresh_token,
                expires_at: Utc::now(),
            })),
            _ => {
                warn!("Connection of user {user_id} for {provider} has no usable token");
                Ok(None)
            }
        }
    }

    async fn save(&self, user_id: i64, provider: &str, lease: &TokenLease) -> Result<()> {
        let txn = self.conn.begin().await?;
        let access_token = (!lease.access_token.is_empty()).then(|| lease.access_token.clone());

        match ConnectionRepository::get(&txn, user_id, provider).await? {
            Some(existing) => {
                let mut active_model: connection::ActiveModel = existing.into_active_model();
                active_model.access_token = ActiveValue::Set(access_token);
                active_model.refresh_token = ActiveValue::Set(lease.refresh_token.clone());
                active_model.expires_at = ActiveValue::Set(Some(lease.expires_at));
                active_model.status = ActiveValue::Set(ConnectionStatus::Connected);
                active_model.updated_at = ActiveValue::Set(Utc::now());
                ConnectionRepository::update(&txn, active_model).await?;
            }
            None => {
                let row = connection::ActiveModel {
                    id: ActiveValue::NotSet,
                    user_id: ActiveValue::Set(user_id),
                    provider: ActiveValue::Set(provider.to_string()),
                    access_token: ActiveValue::Set(access_token),
                    refresh_token: ActiveValue::Set(lease.refresh_token.clone()),
                    expires_at: ActiveValue::Set(Some(lease.expires_at)),
                    status: ActiveValue::Set(ConnectionStatus::Connected),
                    updated_at: ActiveValue::Set(Utc::now()),
                };
                ConnectionRepository::insert(&txn, row).await?;
            }
        }

        txn.commit().await?;
        Ok(())
    }

    async fn mark_disconnected(&self, user_id: i64, provider: &str) -> Result<()> {
        if let Some(existing) = ConnectionRepository::get(&self.conn, user_id, provider).await? {
            let mut active_model: connection::ActiveModel = existing.into_active_model();
            active_model.access_token = ActiveValue::Set(None);
            active_model.refresh_token = ActiveValue::Set(None);
            active_model.expires_at = ActiveValue::Set(None);
            active_model.status = ActiveValue::Set(ConnectionStatus::Disconnected);
            active_model.updated_at = ActiveValue::Set(Utc::now());
            ConnectionRepository::update(&self.conn, active_model).await?;
        }
        Ok(())
    }

    async fn connected_users(&self, provider: &str) -> Result<Vec<i64>> {
        ConnectionRepository::get_connected_users(&self.conn, provider).await
    }
}
