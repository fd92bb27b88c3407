use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::models::{ClickRecord, LinkRecord};
use crate::store::ShortLinkStore;

/// SQLite-backed store.
///
/// Uniqueness is enforced by the UNIQUE constraint on `links.short_code`;
/// `insert_if_absent` rides on `ON CONFLICT DO NOTHING` so allocation is one
/// atomic statement. Clicks live in their own table and are appended with an
/// `INSERT ... SELECT` keyed by short code, so the existence check and the
/// append are likewise a single statement.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn clicks_for(&self, link_id: i64) -> Result<Vec<ClickRecord>, StoreError> {
        let rows: Vec<(DateTime<Utc>, String, String, String, String)> = sqlx::query_as(
            "SELECT clicked_at, referrer, ip, user_agent, location
             FROM clicks WHERE link_id = ?1 ORDER BY id",
        )
        .bind(link_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(timestamp, referrer, ip, user_agent, location)| ClickRecord {
                timestamp,
                referrer,
                ip,
                user_agent,
                location,
            })
            .collect())
    }
}

#[async_trait]
impl ShortLinkStore for SqliteStore {
    async fn insert_if_absent(
        &self,
        code: &str,
        original_url: &str,
        expiry_at: DateTime<Utc>,
    ) -> Result<Option<LinkRecord>, StoreError> {
        let created_at = Utc::now();

        let affected = sqlx::query(
            "INSERT INTO links (short_code, original_url, created_at, expiry_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(short_code) DO NOTHING",
        )
        .bind(code)
        .bind(original_url)
        .bind(created_at)
        .bind(expiry_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Ok(None);
        }

        Ok(Some(LinkRecord {
            short_code: code.to_owned(),
            original_url: original_url.to_owned(),
            created_at,
            expiry_at,
            clicks: Vec::new(),
        }))
    }

    async fn get(&self, code: &str) -> Result<Option<LinkRecord>, StoreError> {
        let row: Option<(i64, String, String, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, short_code, original_url, created_at, expiry_at
             FROM links WHERE short_code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        let (id, short_code, original_url, created_at, expiry_at) = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let clicks = self.clicks_for(id).await?;

        Ok(Some(LinkRecord {
            short_code,
            original_url,
            created_at,
            expiry_at,
            clicks,
        }))
    }

    async fn append_click(&self, code: &str, click: ClickRecord) -> Result<bool, StoreError> {
        let affected = sqlx::query(
            "INSERT INTO clicks (link_id, clicked_at, referrer, ip, user_agent, location)
             SELECT id, ?2, ?3, ?4, ?5, ?6 FROM links WHERE short_code = ?1",
        )
        .bind(code)
        .bind(click.timestamp)
        .bind(&click.referrer)
        .bind(&click.ip)
        .bind(&click.user_agent)
        .bind(&click.location)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }
}
