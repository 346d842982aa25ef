//! Durable per-user storage.
//!
//! Each user is one opaque record keyed by email, written whole:
//! a save either replaces the stored aggregate or leaves it untouched.

mod memory;
pub mod schema;

use std::future::Future;

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::debug;

use crate::models::User;

pub use memory::MemoryStore;

/// Key-value persistence for user aggregates.
pub trait UserStore: Send + Sync {
    /// Load a user, or `None` if the email has never been stored.
    fn load(&self, email: &str) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Atomically replace the stored user.
    fn save(&self, user: &User) -> impl Future<Output = Result<()>> + Send;
}

/// SQLite-backed user store.
pub struct SqliteStore {
    pool: SqlitePool,
}

/// Row of the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredUser {
    pub email: String,
    pub schema_version: i64,
    pub data: String,
    pub updated_at: String,
}

impl SqliteStore {
    /// Connect and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let mut options = SqlitePoolOptions::new().max_connections(5);

        // Every connection to `:memory:` is a separate database.
        if database_url.contains(":memory:") {
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                email TEXT PRIMARY KEY,
                schema_version INTEGER NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Raw row for a user, without decoding.
    pub async fn get_row(&self, email: &str) -> Result<Option<StoredUser>> {
        sqlx::query_as::<_, StoredUser>(
            "SELECT email, schema_version, data, updated_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")
    }

    /// Emails of every stored user.
    pub async fn list_emails(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT email FROM users ORDER BY email")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(e,)| e).collect())
    }

    /// Get the connection pool (for advanced queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl UserStore for SqliteStore {
    async fn load(&self, email: &str) -> Result<Option<User>> {
        let Some(row) = self.get_row(email).await? else {
            return Ok(None);
        };

        let user = schema::decode(&row.data)
            .with_context(|| format!("Corrupt record for {}", row.email))?;
        Ok(Some(user))
    }

    async fn save(&self, user: &User) -> Result<()> {
        let data = schema::encode(user)?;

        sqlx::query(
            r#"
            INSERT INTO users (email, schema_version, data)
            VALUES (?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                schema_version = excluded.schema_version,
                data = excluded.data,
                updated_at = datetime('now')
            "#,
        )
        .bind(user.email())
        .bind(schema::SCHEMA_VERSION as i64)
        .bind(&data)
        .execute(&self.pool)
        .await
        .context("Failed to save user")?;

        debug!(email = %user.email(), bytes = data.len(), "Saved user");
        Ok(())
    }
}
