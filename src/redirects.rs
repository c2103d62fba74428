//! Stored path redirects with a short-lived lookup cache.
//!
//! Lookups are keyed by the normalised request path. Misses are cached too,
//! so unknown paths cost one query per TTL. Any admin change clears the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{Result, StorefrontError};

pub const DEFAULT_STATUS_CODE: u16 = 301;
pub const ALLOWED_STATUS_CODES: [u16; 4] = [301, 302, 307, 308];
const CACHE_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedirectError {
    #[error("Both fromPath and toPath are required")]
    MissingPath,
    #[error("Cannot redirect a path to itself")]
    SelfRedirect,
    #[error("fromPath must be a local path (starting with /)")]
    NotLocal,
    #[error("Status code must be one of 301, 302, 307, 308")]
    InvalidStatus(u16),
}

impl From<RedirectError> for StorefrontError {
    fn from(e: RedirectError) -> Self { Self::Validation(e.to_string()) }
}

/// Leading slash, no trailing slash except for the root, lowercase.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized.to_lowercase()
}

/// Absolute targets are stored as given.
pub fn normalize_target(path: &str) -> String {
    if path.starts_with("http") { path.to_string() } else { normalize_path(path) }
}

pub fn validate_redirect(from_path: &str, to_path: &str) -> std::result::Result<(), RedirectError> {
    if from_path.trim().is_empty() || to_path.trim().is_empty() {
        return Err(RedirectError::MissingPath);
    }
    if normalize_path(from_path) == normalize_target(to_path) {
        return Err(RedirectError::SelfRedirect);
    }
    if from_path.starts_with("http") {
        return Err(RedirectError::NotLocal);
    }
    Ok(())
}

pub fn validate_status(code: Option<u16>) -> std::result::Result<u16, RedirectError> {
    match code {
        None => Ok(DEFAULT_STATUS_CODE),
        Some(c) if ALLOWED_STATUS_CODES.contains(&c) => Ok(c),
        Some(c) => Err(RedirectError::InvalidStatus(c)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub id: Uuid,
    pub from_path: String,
    pub to_path: String,
    pub status_code: i32,
    pub is_active: bool,
    pub product_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub hit_count: i64,
    pub last_hit_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Redirect {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool { self.is_active && self.expires_at.map_or(true, |exp| exp > now) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectInput {
    #[serde(default)]
    pub from_path: String,
    #[serde(default)]
    pub to_path: String,
    pub status_code: Option<u16>,
    pub is_active: Option<bool>,
    pub product_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Validated and normalised form of [`RedirectInput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectDraft {
    pub from_path: String,
    pub to_path: String,
    pub status_code: u16,
    pub is_active: bool,
    pub product_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RedirectInput {
    pub fn into_draft(self) -> std::result::Result<RedirectDraft, RedirectError> {
        validate_redirect(&self.from_path, &self.to_path)?;
        Ok(RedirectDraft {
            from_path: normalize_path(&self.from_path),
            to_path: normalize_target(&self.to_path),
            status_code: validate_status(self.status_code)?,
            is_active: self.is_active.unwrap_or(true),
            product_id: self.product_id,
            expires_at: self.expires_at,
        })
    }
}

#[async_trait]
pub trait RedirectStore: Send + Sync {
    async fn find_live(&self, from_path: &str, now: DateTime<Utc>) -> Result<Option<Redirect>>;
    async fn record_hit(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn list(&self) -> Result<Vec<Redirect>>;
    async fn create(&self, draft: RedirectDraft) -> Result<Redirect>;
    async fn update(&self, id: Uuid, draft: RedirectDraft) -> Result<Redirect>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

const DUPLICATE_FROM: &str = "A redirect from this path already exists";

fn map_unique(e: sqlx::Error) -> StorefrontError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorefrontError::Conflict(DUPLICATE_FROM.to_string()),
        _ => StorefrontError::Database(e),
    }
}

pub struct PgRedirectStore {
    db: PgPool,
}

impl PgRedirectStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl RedirectStore for PgRedirectStore {
    async fn find_live(&self, from_path: &str, now: DateTime<Utc>) -> Result<Option<Redirect>> {
        let r = sqlx::query_as::<_, Redirect>("SELECT * FROM redirects WHERE from_path = $1 AND is_active AND (expires_at IS NULL OR expires_at > $2) LIMIT 1")
            .bind(from_path).bind(now).fetch_optional(&self.db).await?;
        Ok(r)
    }

    async fn record_hit(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE redirects SET hit_count = hit_count + 1, last_hit_at = $2 WHERE id = $1").bind(id).bind(at).execute(&self.db).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Redirect>> {
        Ok(sqlx::query_as::<_, Redirect>("SELECT * FROM redirects ORDER BY created_at DESC").fetch_all(&self.db).await?)
    }

    async fn create(&self, d: RedirectDraft) -> Result<Redirect> {
        sqlx::query_as::<_, Redirect>("INSERT INTO redirects (id, from_path, to_path, status_code, is_active, product_id, expires_at, hit_count, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, 0, NOW(), NOW()) RETURNING *")
            .bind(Uuid::now_v7()).bind(&d.from_path).bind(&d.to_path).bind(i32::from(d.status_code)).bind(d.is_active).bind(d.product_id).bind(d.expires_at)
            .fetch_one(&self.db).await.map_err(map_unique)
    }

    async fn update(&self, id: Uuid, d: RedirectDraft) -> Result<Redirect> {
        sqlx::query_as::<_, Redirect>("UPDATE redirects SET from_path = $2, to_path = $3, status_code = $4, is_active = $5, product_id = $6, expires_at = $7, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id).bind(&d.from_path).bind(&d.to_path).bind(i32::from(d.status_code)).bind(d.is_active).bind(d.product_id).bind(d.expires_at)
            .fetch_optional(&self.db).await.map_err(map_unique)?
            .ok_or(StorefrontError::NotFound("Redirect"))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let done = sqlx::query("DELETE FROM redirects WHERE id = $1").bind(id).execute(&self.db).await?;
        if done.rows_affected() == 0 { return Err(StorefrontError::NotFound("Redirect")); }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRedirectStore {
    redirects: Mutex<HashMap<Uuid, Redirect>>,
}

#[async_trait]
impl RedirectStore for MemoryRedirectStore {
    async fn find_live(&self, from_path: &str, now: DateTime<Utc>) -> Result<Option<Redirect>> {
        let redirects = self.redirects.lock().await;
        Ok(redirects.values().find(|r| r.from_path == from_path && r.is_live_at(now)).cloned())
    }

    async fn record_hit(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(r) = self.redirects.lock().await.get_mut(&id) {
            r.hit_count += 1;
            r.last_hit_at = Some(at);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Redirect>> {
        let mut all: Vec<Redirect> = self.redirects.lock().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn create(&self, d: RedirectDraft) -> Result<Redirect> {
        let mut redirects = self.redirects.lock().await;
        if redirects.values().any(|r| r.from_path == d.from_path) {
            return Err(StorefrontError::Conflict(DUPLICATE_FROM.to_string()));
        }
        let now = Utc::now();
        let r = Redirect {
            id: Uuid::now_v7(), from_path: d.from_path, to_path: d.to_path, status_code: i32::from(d.status_code),
            is_active: d.is_active, product_id: d.product_id, expires_at: d.expires_at, hit_count: 0, last_hit_at: None,
            created_at: now, updated_at: now,
        };
        redirects.insert(r.id, r.clone());
        Ok(r)
    }

    async fn update(&self, id: Uuid, d: RedirectDraft) -> Result<Redirect> {
        let mut redirects = self.redirects.lock().await;
        if redirects.values().any(|r| r.id != id && r.from_path == d.from_path) {
            return Err(StorefrontError::Conflict(DUPLICATE_FROM.to_string()));
        }
        let r = redirects.get_mut(&id).ok_or(StorefrontError::NotFound("Redirect"))?;
        r.from_path = d.from_path;
        r.to_path = d.to_path;
        r.status_code = i32::from(d.status_code);
        r.is_active = d.is_active;
        r.product_id = d.product_id;
        r.expires_at = d.expires_at;
        r.updated_at = Utc::now();
        Ok(r.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.redirects.lock().await.remove(&id).map(|_| ()).ok_or(StorefrontError::NotFound("Redirect"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRedirect {
    pub id: Uuid,
    pub to_path: String,
    pub status_code: u16,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct RedirectService {
    store: Arc<dyn RedirectStore>,
    cache: Cache<String, Option<ResolvedRedirect>>,
}

impl RedirectService {
    pub fn new(store: Arc<dyn RedirectStore>, ttl: Duration) -> Self {
        Self { store, cache: Cache::builder().max_capacity(CACHE_CAPACITY).time_to_live(ttl).build() }
    }

    /// Counts a hit for every redirect served.
    pub async fn resolve(&self, path: &str) -> Result<Option<ResolvedRedirect>> {
        let key = normalize_path(path);
        let now = Utc::now();
        let cached = match self.cache.get(&key).await {
            Some(entry) => entry,
            None => {
                let found = self.store.find_live(&key, now).await?.map(|r| ResolvedRedirect {
                    id: r.id,
                    to_path: r.to_path,
                    status_code: u16::try_from(r.status_code).unwrap_or(DEFAULT_STATUS_CODE),
                    expires_at: r.expires_at,
                });
                self.cache.insert(key, found.clone()).await;
                found
            }
        };
        let Some(hit) = cached.filter(|r| r.expires_at.map_or(true, |exp| exp > now)) else { return Ok(None) };
        if let Err(e) = self.store.record_hit(hit.id, now).await {
            tracing::warn!(redirect_id = %hit.id, error = %e, "failed to record redirect hit");
        }
        Ok(Some(hit))
    }

    pub fn invalidate(&self) { self.cache.invalidate_all(); }

    pub async fn list(&self) -> Result<Vec<Redirect>> { self.store.list().await }

    pub async fn create(&self, input: RedirectInput) -> Result<Redirect> {
        let r = self.store.create(input.into_draft()?).await?;
        self.invalidate();
        tracing::info!(from = %r.from_path, to = %r.to_path, status = r.status_code, "redirect created");
        Ok(r)
    }

    pub async fn update(&self, id: Uuid, input: RedirectInput) -> Result<Redirect> {
        let r = self.store.update(id, input.into_draft()?).await?;
        self.invalidate();
        Ok(r)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.store.delete(id).await?;
        self.invalidate();
        Ok(())
    }
}

/// Answers GET requests for a redirected path before routing.
pub async fn redirect_middleware(State(redirects): State<RedirectService>, request: Request<Body>, next: Next) -> Response {
    if request.method() != Method::GET || request.uri().path().starts_with("/api/") {
        return next.run(request).await;
    }
    match redirects.resolve(request.uri().path()).await {
        Ok(Some(hit)) => {
            let status = StatusCode::from_u16(hit.status_code).unwrap_or(StatusCode::MOVED_PERMANENTLY);
            (status, [(header::LOCATION, hit.to_path)]).into_response()
        }
        Ok(None) => next.run(request).await,
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = %e, "redirect lookup failed");
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn input(from: &str, to: &str) -> RedirectInput {
        RedirectInput { from_path: from.into(), to_path: to.into(), status_code: None, is_active: None, product_id: None, expires_at: None }
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path("Products/Valves/"), "/products/valves");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_target("https://Example.com/X"), "https://Example.com/X");
    }

    #[test]
    fn validation_messages() {
        assert_eq!(validate_redirect("", "/b"), Err(RedirectError::MissingPath));
        assert_eq!(validate_redirect("/Old/", "old"), Err(RedirectError::SelfRedirect));
        assert_eq!(validate_redirect("https://x.test/a", "/b"), Err(RedirectError::NotLocal));
        assert!(validate_redirect("/a", "https://x.test/a").is_ok());
        assert_eq!(validate_status(Some(307)), Ok(307));
        assert_eq!(validate_status(Some(303)), Err(RedirectError::InvalidStatus(303)));
        assert_eq!(RedirectError::NotLocal.to_string(), "fromPath must be a local path (starting with /)");
    }

    #[tokio::test]
    async fn resolves_counts_hits_and_invalidates() {
        let store = Arc::new(MemoryRedirectStore::default());
        let service = RedirectService::new(store.clone(), Duration::from_secs(60));
        assert_eq!(service.resolve("/old").await.unwrap(), None);

        let created = service.create(input("/Old/", "/new")).await.unwrap();
        let hit = service.resolve("/OLD").await.unwrap().unwrap();
        assert_eq!((hit.to_path.as_str(), hit.status_code), ("/new", 301));
        service.resolve("/old").await.unwrap();
        assert_eq!(store.list().await.unwrap()[0].hit_count, 2);

        assert!(matches!(service.create(input("/old", "/other")).await, Err(StorefrontError::Conflict(_))));

        let mut inactive = input("/old", "/new");
        inactive.is_active = Some(false);
        service.update(created.id, inactive).await.unwrap();
        assert_eq!(service.resolve("/old").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_redirects_are_ignored() {
        let store = Arc::new(MemoryRedirectStore::default());
        let service = RedirectService::new(store, Duration::from_secs(60));
        let mut expired = input("/sale", "/products");
        expired.expires_at = Some(Utc::now() - ChronoDuration::hours(1));
        service.create(expired).await.unwrap();
        assert_eq!(service.resolve("/sale").await.unwrap(), None);
    }
}
