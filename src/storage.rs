//! Versioned storage for generated quote PDFs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::domain::aggregates::quote::document_path;
use crate::Result;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StoredDocument {
    pub quote_number: String,
    pub version: i32,
    pub path: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Every version is kept; writing an existing version replaces it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, quote_number: &str, version: i32, bytes: Vec<u8>) -> Result<StoredDocument>;
    async fn get(&self, quote_number: &str, version: i32) -> Result<Option<Vec<u8>>>;
    async fn latest(&self, quote_number: &str) -> Result<Option<StoredDocument>>;
}

pub struct PgDocumentStore {
    db: PgPool,
}

impl PgDocumentStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn put(&self, quote_number: &str, version: i32, bytes: Vec<u8>) -> Result<StoredDocument> {
        let doc = sqlx::query_as::<_, StoredDocument>(
            "INSERT INTO quote_documents (quote_number, version, path, content, size_bytes, created_at) VALUES ($1, $2, $3, $4, $5, NOW())
             ON CONFLICT (quote_number, version) DO UPDATE SET content = EXCLUDED.content, size_bytes = EXCLUDED.size_bytes, created_at = NOW()
             RETURNING quote_number, version, path, size_bytes, created_at")
            .bind(quote_number).bind(version).bind(document_path(quote_number, version)).bind(&bytes).bind(bytes.len() as i64)
            .fetch_one(&self.db).await?;
        Ok(doc)
    }

    async fn get(&self, quote_number: &str, version: i32) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT content FROM quote_documents WHERE quote_number = $1 AND version = $2")
            .bind(quote_number).bind(version).fetch_optional(&self.db).await?;
        Ok(row.map(|r| r.0))
    }

    async fn latest(&self, quote_number: &str) -> Result<Option<StoredDocument>> {
        let doc = sqlx::query_as::<_, StoredDocument>("SELECT quote_number, version, path, size_bytes, created_at FROM quote_documents WHERE quote_number = $1 ORDER BY version DESC LIMIT 1")
            .bind(quote_number).fetch_optional(&self.db).await?;
        Ok(doc)
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<(String, i32), (StoredDocument, Vec<u8>)>>,
}

impl MemoryDocumentStore {
    pub async fn len(&self) -> usize { self.docs.lock().await.len() }
    pub async fn is_empty(&self) -> bool { self.docs.lock().await.is_empty() }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, quote_number: &str, version: i32, bytes: Vec<u8>) -> Result<StoredDocument> {
        let doc = StoredDocument {
            quote_number: quote_number.to_string(),
            version,
            path: document_path(quote_number, version),
            size_bytes: bytes.len() as i64,
            created_at: Utc::now(),
        };
        self.docs.lock().await.insert((quote_number.to_string(), version), (doc.clone(), bytes));
        Ok(doc)
    }

    async fn get(&self, quote_number: &str, version: i32) -> Result<Option<Vec<u8>>> {
        Ok(self.docs.lock().await.get(&(quote_number.to_string(), version)).map(|(_, b)| b.clone()))
    }

    async fn latest(&self, quote_number: &str) -> Result<Option<StoredDocument>> {
        let docs = self.docs.lock().await;
        Ok(docs.values().filter(|(d, _)| d.quote_number == quote_number).map(|(d, _)| d).max_by_key(|d| d.version).cloned())
    }
}
