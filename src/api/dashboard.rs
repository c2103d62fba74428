//! Admin shell helpers: sidebar badge counts and the global search box.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::quoting::QuoteSummary;
use crate::Result;

const SEARCH_LIMIT: i64 = 5;
const MIN_SEARCH_LEN: usize = 2;

#[derive(Debug, Serialize)]
pub struct Badges {
    pub quotes: i64,
}

pub async fn badges(State(s): State<AppState>) -> Result<Json<Badges>> {
    Ok(Json(Badges { quotes: s.quotes.open_count().await? }))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Quote,
    Product,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub kind: HitKind,
    pub id: Uuid,
    pub title: String,
    pub subtitle: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductHit {
    id: Uuid,
    name: String,
    sku: String,
    brand: Option<String>,
}

impl From<QuoteSummary> for SearchHit {
    fn from(q: QuoteSummary) -> Self {
        Self {
            kind: HitKind::Quote,
            id: q.id,
            subtitle: format!("{} · {}", q.company_name.unwrap_or_default(), q.customer_name),
            url: format!("/admin/quotes/{}", q.id),
            title: q.quote_number,
        }
    }
}

impl From<ProductHit> for SearchHit {
    fn from(p: ProductHit) -> Self {
        Self {
            kind: HitKind::Product,
            id: p.id,
            subtitle: format!("{} · {}", p.brand.as_deref().unwrap_or("Unknown"), p.sku),
            url: format!("/admin/products/{}", p.id),
            title: p.name,
        }
    }
}

/// Up to five quotes then up to five products. Terms shorter than two characters match nothing.
pub async fn search(State(s): State<AppState>, Query(p): Query<SearchParams>) -> Result<Json<SearchResults>> {
    let term = p.q.as_deref().map(str::trim).unwrap_or_default();
    if term.chars().count() < MIN_SEARCH_LEN {
        return Ok(Json(SearchResults { results: Vec::new() }));
    }
    let quotes = s.quotes.search(term, SEARCH_LIMIT).await?;
    let products = sqlx::query_as::<_, ProductHit>(
        "SELECT p.id, p.name, p.sku, b.name AS brand FROM products p LEFT JOIN brands b ON b.id = p.brand_id
         WHERE p.name ILIKE $1 OR p.sku ILIKE $1 OR p.slug ILIKE $1 ORDER BY p.updated_at DESC LIMIT $2",
    )
    .bind(format!("%{term}%"))
    .bind(SEARCH_LIMIT)
    .fetch_all(&s.db)
    .await?;
    let results = quotes.into_iter().map(SearchHit::from).chain(products.into_iter().map(SearchHit::from)).collect();
    Ok(Json(SearchResults { results }))
}
