use std::str::FromStr;

use anyhow::Context;
use chrono::Utc;
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::{datastore::DataStore, IdeaRecord, NewIdea};

static MIGRATOR: Migrator = sqlx::migrate!();

#[derive(Debug, Clone)]
pub struct SqliteDataStore {
    pub pool: SqlitePool,
}

impl SqliteDataStore {
    /// Opens (creating if needed) the database at `database_url` and creates
    /// the ideas table if not exists
    pub async fn init(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid sqlite database url: {database_url}"))?
            .create_if_missing(true);

        Self::connect(options, 5).await
    }

    /// A private in-memory database, mostly useful for tests and dry runs
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // every connection to `:memory:` gets its own database
        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .inspect_err(
                |e| tracing::error!(error = ?e, "Failed to establish connection to database"),
            )
            .context("Failed to connect to sqlite database")?;

        MIGRATOR
            .run(&pool)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to run database migrations"))
            .context("Failed to run database migrations")?;

        Ok(SqliteDataStore { pool })
    }
}

impl DataStore for SqliteDataStore {
    async fn insert_idea(&self, idea: &NewIdea) -> anyhow::Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO ideas (video_urls, transcript, idea, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(idea.joined_urls())
        .bind(&idea.transcript)
        .bind(&idea.idea)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            tracing::error!(
                error = ?err,
                video_count = idea.video_urls.len(),
                "Failed to insert idea"
            )
        })
        .context("Failed to insert idea")?;

        Ok(result.last_insert_rowid())
    }

    async fn list_ideas(&self) -> anyhow::Result<Vec<IdeaRecord>> {
        let ideas = sqlx::query_as::<_, IdeaRecord>(
            r#"
            SELECT id, video_urls, transcript, idea, created_at
            FROM ideas
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, "Failed to fetch ideas"))
        .context("Failed to fetch ideas")?;

        Ok(ideas)
    }
}
