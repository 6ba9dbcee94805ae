use crate::error::ApiResult;
use crate::models::WatchlistEntry;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

/// Caller-scoped watchlist CRUD. Every call takes the verified user id;
/// rows belonging to other users are invisible.
#[async_trait]
pub trait WatchlistStore: Send + Sync {
    async fn list(&self, user_id: &str) -> ApiResult<Vec<WatchlistEntry>>;
    async fn add(
        &self,
        user_id: &str,
        movie_id: i64,
        movie_title: &str,
        movie_poster: &str,
    ) -> ApiResult<WatchlistEntry>;
    async fn remove(&self, user_id: &str, entry_id: &str) -> ApiResult<()>;
}

pub struct SqliteWatchlist {
    pool: SqlitePool,
}

impl SqliteWatchlist {
    pub async fn connect(db_url: &str) -> ApiResult<Self> {
        let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&pool)
            .await?;
        info!("Watchlist database ready at {}", db_url);

        Ok(Self { pool })
    }
}

#[async_trait]
impl WatchlistStore for SqliteWatchlist {
    async fn list(&self, user_id: &str) -> ApiResult<Vec<WatchlistEntry>> {
        let entries = sqlx::query_as::<_, WatchlistEntry>(
            "SELECT id, movie_id, movie_title, movie_poster, added_at
             FROM watchlist WHERE user_id = ? ORDER BY added_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn add(
        &self,
        user_id: &str,
        movie_id: i64,
        movie_title: &str,
        movie_poster: &str,
    ) -> ApiResult<WatchlistEntry> {
        let entry = WatchlistEntry {
            id: Uuid::new_v4().to_string(),
            movie_id,
            movie_title: movie_title.to_string(),
            movie_poster: movie_poster.to_string(),
            added_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO watchlist (id, user_id, movie_id, movie_title, movie_poster, added_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(user_id)
        .bind(entry.movie_id)
        .bind(&entry.movie_title)
        .bind(&entry.movie_poster)
        .bind(entry.added_at)
        .execute(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn remove(&self, user_id: &str, entry_id: &str) -> ApiResult<()> {
        // Scoped delete: a miss (wrong owner or unknown id) is
        // indistinguishable from success.
        sqlx::query("DELETE FROM watchlist WHERE id = ? AND user_id = ?")
            .bind(entry_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
