//! HTTP surface: public catalogue and quote endpoints plus the admin back-office.

pub mod catalog;
pub mod contact;
pub mod dashboard;
pub mod inventory;
pub mod logistics;
pub mod pricing;
pub mod quotes;
pub mod redirects;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::mail::Mailer;
use crate::quoting::{EventPublisher, QuoteService};
use crate::rate_limit::RateLimiter;
use crate::redirects::{redirect_middleware, RedirectService};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub quotes: Arc<QuoteService>,
    pub redirects: RedirectService,
    pub rate_limiter: Arc<RateLimiter>,
    pub events: EventPublisher,
    pub mailer: Arc<dyn Mailer>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub search: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }
    pub fn per_page(&self) -> u32 { self.per_page.unwrap_or(20).clamp(1, 100) }
    pub fn offset(&self) -> i64 { i64::from((self.page() - 1) * self.per_page()) }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

/// `{"success": true, "message": ...}` acknowledgement used by bulk and delete endpoints.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Json<Self> { Json(Self { success: true, message: message.into() }) }
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "industrial-storefront"})) }))
        .route("/api/products", get(catalog::list_products))
        .route("/api/products/:slug", get(catalog::get_product))
        .route("/api/categories", get(catalog::list_categories))
        .route("/api/search", get(catalog::search))
        .route("/api/shipping/classify", get(logistics::classify))
        .route("/api/contact", post(contact::submit_contact))
        .route("/api/quote", post(quotes::submit_quote))
        .route("/api/approve-quote/:token", post(quotes::approve_quote));

    let admin = Router::new()
        .route("/api/admin/stats/badges", get(dashboard::badges))
        .route("/api/admin/search", get(dashboard::search))
        .route("/api/admin/quotes", get(quotes::list_quotes))
        .route("/api/admin/quotes/:id", get(quotes::get_quote).patch(quotes::patch_quote).delete(quotes::delete_quote))
        .route("/api/admin/quotes/:id/items/:item_id", patch(quotes::price_item))
        .route("/api/admin/quotes/:id/restore", post(quotes::restore_quote))
        .route("/api/admin/quotes/:id/store-pdf", post(quotes::store_pdf))
        .route("/api/admin/quotes/:id/pdf", get(quotes::download_pdf))
        .route("/api/admin/quotes/:id/send", post(quotes::send_quote))
        .route("/api/admin/quotes/:id/email-preview", post(quotes::email_preview))
        .route("/api/admin/products", get(catalog::admin_list_products).post(catalog::create_product))
        .route("/api/admin/products/:id", get(catalog::admin_get_product).put(catalog::update_product).delete(catalog::delete_product))
        .route("/api/admin/products/:id/variations", post(catalog::create_variation))
        .route("/api/admin/products/:id/variations/:variation_id", axum::routing::delete(catalog::delete_variation))
        .route("/api/admin/categories", get(catalog::admin_list_categories).post(catalog::create_category))
        .route("/api/admin/categories/:id", put(catalog::update_category).delete(catalog::delete_category))
        .route("/api/admin/brands", get(catalog::list_brands).post(catalog::create_brand))
        .route("/api/admin/brands/:id", put(catalog::update_brand).delete(catalog::delete_brand))
        .route("/api/admin/inventory", get(inventory::list_inventory).patch(inventory::bulk_action))
        .route("/api/admin/inventory/batch", patch(inventory::batch_update))
        .route("/api/admin/pricing", get(pricing::list_pricing).patch(pricing::bulk_promotion))
        .route("/api/admin/pricing/:id/tiers", put(pricing::update_tiers))
        .route("/api/admin/logistics/regions", get(logistics::list_regions))
        .route("/api/admin/redirects", get(redirects::list_redirects).post(redirects::create_redirect))
        .route("/api/admin/redirects/:id", patch(redirects::update_redirect).delete(redirects::delete_redirect));

    public
        .merge(admin)
        .fallback(|| async { crate::StorefrontError::NotFound("Page") })
        .layer(from_fn_with_state(state.redirects.clone(), redirect_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Lowercase words joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') { slug.pop(); }
    slug
}

/// Turns unique-key violations into a 409 with the given message.
pub(crate) fn conflict_on_unique(message: &'static str) -> impl Fn(sqlx::Error) -> crate::StorefrontError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => crate::StorefrontError::Conflict(message.to_string()),
        _ => crate::StorefrontError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(slugify("  Butterfly Valves & Actuators "), "butterfly-valves-actuators");
        assert_eq!(slugify("DN50 / 2\""), "dn50-2");
        assert_eq!(slugify("--"), "");
    }

    #[test]
    fn pagination_is_clamped() {
        let p = ListParams { page: Some(0), per_page: Some(500), category: None, brand: None, search: None };
        assert_eq!((p.page(), p.per_page(), p.offset()), (1, 100, 0));
        let p = ListParams { page: Some(3), per_page: None, category: None, brand: None, search: None };
        assert_eq!(p.offset(), 40);
    }
}
