use anyhow::{Context, Result};
use log::info;
use sea_orm::sea_query::{Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};

use crate::entities::{change_event, connection, project, task};

/// SeaORM-backed local store.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    pub(crate) conn: DatabaseConnection,
}

impl LocalStorage {
    /// Open (or create) the database at `database_url` and ensure the schema exists.
    pub async fn new(database_url: &str) -> Result<Self> {
        let mut options = ConnectOptions::new(database_url.to_string());
        options.sqlx_logging(false);

        // A private in-memory database only lives as long as its connection.
        if database_url.contains(":memory:") {
            options.min_connections(1).max_connections(1);
        }

        let conn = Database::connect(options)
            .await
            .with_context(|| format!("Failed to open database: {database_url}"))?;

        let storage = Self { conn };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Fresh in-memory database, mostly for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        let schema = Schema::new(backend);

        // Referenced tables first so foreign keys resolve.
        self.create_table(schema.create_table_from_entity(project::Entity)).await?;
        self.create_table(schema.create_table_from_entity(task::Entity)).await?;
        self.create_table(schema.create_table_from_entity(change_event::Entity)).await?;
        self.create_table(schema.create_table_from_entity(connection::Entity)).await?;

        // One local task per (user, source, external id).
        self.create_index(
            Index::create()
                .name("idx_tasks_binding")
                .table(task::Entity)
                .col(task::Column::UserId)
                .col(task::Column::ExternalSource)
                .col(task::Column::ExternalId)
                .unique()
                .if_not_exists()
                .to_owned(),
        )
        .await?;

        self.create_index(
            Index::create()
                .name("idx_tasks_user")
                .table(task::Entity)
                .col(task::Column::UserId)
                .if_not_exists()
                .to_owned(),
        )
        .await?;

        self.create_index(
            Index::create()
                .name("idx_projects_user")
                .table(project::Entity)
                .col(project::Column::UserId)
                .if_not_exists()
                .to_owned(),
        )
        .await?;

        self.create_index(
            Index::create()
                .name("idx_change_events_task")
                .table(change_event::Entity)
                .col(change_event::Column::TaskId)
                .if_not_exists()
                .to_owned(),
        )
        .await?;

        self.create_index(
            Index::create()
                .name("idx_connections_user_provider")
                .table(connection::Entity)
                .col(connection::Column::UserId)
                .col(connection::Column::Provider)
                .unique()
                .if_not_exists()
                .to_owned(),
        )
        .await?;

        info!("Local storage schema ready");
        Ok(())
    }

    async fn create_table(&self, mut stmt: TableCreateStatement) -> Result<()> {
        let backend = self.conn.get_database_backend();
        stmt.if_not_exists();
        self.conn.execute(backend.build(&stmt)).await?;
        Ok(())
    }

    async fn create_index(&self, stmt: IndexCreateStatement) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn.execute(backend.build(&stmt)).await?;
        Ok(())
    }
}
