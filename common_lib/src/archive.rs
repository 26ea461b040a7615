//! archive.rs
//!
//! Append-only store for raw trade documents exactly as fetched. Nothing is deduplicated here;
//! overlapping pages show up twice and that's expected.

use std::path::Path;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use crate::error::BackfillError;

#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// one batched insert per page; returns the number of documents stored
    async fn insert_raw(&self, symbol: &str, docs: &[Value]) -> Result<u64, BackfillError>;
}

/// schema-less jsonb document table:
///
/// create table raw_trades (symbol text not null, doc jsonb not null, fetched_at timestamptz not null default now());
pub struct PgArchive {
    pool: PgPool,
}

impl PgArchive {
    pub fn new(pool: PgPool) -> PgArchive {
        PgArchive { pool }
    }

    pub fn insert_query<'a>(symbol: &'a str, docs: &'a [Value], fetched_at: DateTime<Utc>) -> QueryBuilder<'a, Postgres> {
        let mut query_builder = QueryBuilder::new("insert into raw_trades (symbol, doc, fetched_at) ");
        query_builder.push_values(docs, |mut b, doc| {
            b.push_bind(symbol)
                .push_bind(Json(doc))
                .push_bind(fetched_at);
        });
        query_builder
    }
}

#[async_trait]
impl ArchiveStore for PgArchive {
    async fn insert_raw(&self, symbol: &str, docs: &[Value]) -> Result<u64, BackfillError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let mut query_builder = PgArchive::insert_query(symbol, docs, Utc::now());
        let result = query_builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("[PgArchive::insert_raw] {} docs for {} not inserted: {:?}", docs.len(), symbol, &e);
                BackfillError::archive(e)
            })?;
        Ok(result.rows_affected())
    }
}

/// one json object per line: {"symbol":..,"fetched_at":..,"doc":{..}}
pub struct JsonlArchive {
    file: Mutex<File>,
}

impl JsonlArchive {
    pub async fn open(path: impl AsRef<Path>) -> Result<JsonlArchive, BackfillError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| BackfillError::Connection(format!("archive file {}: {}", path.display(), e)))?;
        tracing::info!("[JsonlArchive::open] appending raw trades to {}", path.display());
        Ok(JsonlArchive { file: Mutex::new(file) })
    }

    fn lines(symbol: &str, docs: &[Value], fetched_at: DateTime<Utc>) -> Result<String, BackfillError> {
        let mut buf = String::new();
        for doc in docs {
            let line = json!({ "symbol": symbol, "fetched_at": fetched_at, "doc": doc });
            buf.push_str(&serde_json::to_string(&line).map_err(BackfillError::archive)?);
            buf.push('\n');
        }
        Ok(buf)
    }
}

#[async_trait]
impl ArchiveStore for JsonlArchive {
    async fn insert_raw(&self, symbol: &str, docs: &[Value]) -> Result<u64, BackfillError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let buf = JsonlArchive::lines(symbol, docs, Utc::now())?;

        // whole page in one write so concurrent symbols never interleave lines
        let mut file = self.file.lock().await;
        file.write_all(buf.as_bytes()).await.map_err(BackfillError::archive)?;
        file.flush().await.map_err(BackfillError::archive)?;
        Ok(docs.len() as u64)
    }
}
