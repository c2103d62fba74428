//! Catalogue reads and product, variation, category and brand administration.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{conflict_on_unique, slugify, Ack, AppState, ListParams, PaginatedResponse};
use crate::domain::aggregates::product::{
    AvailabilityFlags, PriceTiers, Promotion, StockStatus, Variation, VariationSource, VARIATION_REORDER_POINT,
};
use crate::domain::aggregates::{Product, StockLevel};
use crate::domain::value_objects::{Money, Sku};
use crate::{Result, StorefrontError};

// =============================================================================
// Rows
// =============================================================================

pub(crate) const PRODUCT_SELECT: &str = "SELECT p.id, p.slug, p.sku, p.name, p.short_name, p.brand_id, b.name AS brand_name, p.category_id, c.name AS category_name, c.slug AS category_slug, p.description, p.lead_time, p.price_varies, p.base_price, p.cost_price, p.rrp, p.promotion_id, p.promotion_price, p.promotion_starts_at, p.promotion_ends_at, p.tier_a, p.tier_b, p.tier_c, p.tier_d, p.tier_e, p.tier_f, p.is_active, p.is_quote_only, p.is_suspended, p.suspended_reason, s.qty_in_stock, s.incoming_qty, s.preorder_qty, s.reorder_point, p.created_at, p.updated_at
    FROM products p
    LEFT JOIN brands b ON b.id = p.brand_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN product_stock s ON s.product_id = p.id AND s.variation_id IS NULL";

const VARIATION_SELECT: &str = "SELECT v.id, v.product_id, v.size, v.label, v.sku, v.price, v.source, v.display_order, s.qty_in_stock, s.incoming_qty, s.preorder_qty, s.reorder_point
    FROM product_variations v LEFT JOIN product_stock s ON s.variation_id = v.id";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub slug: String,
    pub sku: String,
    pub name: String,
    pub short_name: Option<String>,
    pub brand_id: Option<Uuid>,
    pub brand_name: Option<String>,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub description: Option<String>,
    pub lead_time: Option<String>,
    pub price_varies: bool,
    pub base_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub rrp: Option<Decimal>,
    pub promotion_id: Option<String>,
    pub promotion_price: Option<Decimal>,
    pub promotion_starts_at: Option<DateTime<Utc>>,
    pub promotion_ends_at: Option<DateTime<Utc>>,
    pub tier_a: Option<Decimal>,
    pub tier_b: Option<Decimal>,
    pub tier_c: Option<Decimal>,
    pub tier_d: Option<Decimal>,
    pub tier_e: Option<Decimal>,
    pub tier_f: Option<Decimal>,
    pub is_active: bool,
    pub is_quote_only: bool,
    pub is_suspended: bool,
    pub suspended_reason: Option<String>,
    pub qty_in_stock: Option<i32>,
    pub incoming_qty: Option<i32>,
    pub preorder_qty: Option<i32>,
    pub reorder_point: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct VariationRow {
    id: Uuid,
    product_id: Uuid,
    size: String,
    label: String,
    sku: Option<String>,
    price: Option<Decimal>,
    source: String,
    display_order: i32,
    qty_in_stock: Option<i32>,
    incoming_qty: Option<i32>,
    preorder_qty: Option<i32>,
    reorder_point: Option<i32>,
}

fn stock_level(qty: Option<i32>, incoming: Option<i32>, preorder: Option<i32>, reorder: Option<i32>, default_reorder: i32) -> Option<StockLevel> {
    qty.map(|q| StockLevel {
        qty_in_stock: q,
        incoming_qty: incoming.unwrap_or(0),
        preorder_qty: preorder.unwrap_or(0),
        reorder_point: reorder.unwrap_or(default_reorder),
    })
}

impl From<VariationRow> for Variation {
    fn from(r: VariationRow) -> Self {
        Self {
            id: r.id, size: r.size, label: r.label, sku: r.sku, price: r.price, source: VariationSource::parse(&r.source),
            display_order: r.display_order,
            stock: stock_level(r.qty_in_stock, r.incoming_qty, r.preorder_qty, r.reorder_point, VARIATION_REORDER_POINT),
        }
    }
}

impl ProductRow {
    fn promotion(&self) -> Option<Promotion> {
        match (self.promotion_price, self.promotion_starts_at) {
            (Some(price), Some(starts_at)) => Some(Promotion {
                id: self.promotion_id.clone().unwrap_or_default(),
                price,
                starts_at,
                ends_at: self.promotion_ends_at,
            }),
            _ => None,
        }
    }

    pub fn to_domain(&self, variations: Vec<Variation>) -> Result<Product> {
        let sku = Sku::new(&self.sku).map_err(|e| StorefrontError::Validation(e.to_string()))?;
        Ok(Product::new(self.id, sku, &self.name)
            .with_base_price(self.base_price.map(Money::aud))
            .with_cost_price(self.cost_price.map(Money::aud))
            .with_price_varies(self.price_varies)
            .with_promotion(self.promotion())
            .with_tiers(PriceTiers { a: self.tier_a, b: self.tier_b, c: self.tier_c, d: self.tier_d, e: self.tier_e, f: self.tier_f })
            .with_lead_time(self.lead_time.clone())
            .with_flags(AvailabilityFlags {
                is_active: self.is_active,
                is_quote_only: self.is_quote_only,
                is_suspended: self.is_suspended,
                suspended_reason: self.suspended_reason.clone(),
            })
            .with_stock(stock_level(self.qty_in_stock, self.incoming_qty, self.preorder_qty, self.reorder_point, crate::domain::aggregates::product::DEFAULT_REORDER_POINT))
            .with_variations(variations))
    }
}

/// A product row together with its domain aggregate.
#[derive(Debug, Clone)]
pub struct CatalogProduct {
    pub row: ProductRow,
    pub product: Product,
}

pub(crate) async fn hydrate(db: &sqlx::PgPool, rows: Vec<ProductRow>) -> Result<Vec<CatalogProduct>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let variation_rows = sqlx::query_as::<_, VariationRow>(&format!("{VARIATION_SELECT} WHERE v.product_id = ANY($1)"))
        .bind(&ids).fetch_all(db).await?;
    let mut by_product: HashMap<Uuid, Vec<Variation>> = HashMap::new();
    for v in variation_rows {
        by_product.entry(v.product_id).or_default().push(v.into());
    }
    rows.into_iter()
        .map(|row| -> Result<CatalogProduct> {
            let product = row.to_domain(by_product.remove(&row.id).unwrap_or_default())?;
            Ok(CatalogProduct { row, product })
        })
        .collect()
}

pub(crate) async fn load_product(db: &sqlx::PgPool, id: Uuid) -> Result<CatalogProduct> {
    let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
        .bind(id).fetch_optional(db).await?.ok_or(StorefrontError::NotFound("Product"))?;
    hydrate(db, vec![row]).await?.pop().ok_or(StorefrontError::NotFound("Product"))
}

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub slug: String,
    pub sku: String,
    pub name: String,
    pub short_name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub category_slug: Option<String>,
    pub description: Option<String>,
    pub lead_time: Option<String>,
    pub price_varies: bool,
    pub base_price: Option<Decimal>,
    pub rrp: Option<Decimal>,
    /// Base price with a running promotion applied.
    pub price: Option<Decimal>,
    pub display_price: Option<Decimal>,
    pub promotion: Option<Promotion>,
    pub is_quote_only: bool,
    pub stock_status: StockStatus,
    pub stock_label: &'static str,
    pub stock: Option<StockLevel>,
    pub variations: Vec<Variation>,
}

impl CatalogProduct {
    pub fn view(&self, now: DateTime<Utc>) -> ProductView {
        let (row, p) = (&self.row, &self.product);
        let status = p.stock_status();
        ProductView {
            id: row.id, slug: row.slug.clone(), sku: p.sku().to_string(), name: row.name.clone(),
            short_name: row.short_name.clone(), brand: row.brand_name.clone(), category: row.category_name.clone(),
            category_slug: row.category_slug.clone(), description: row.description.clone(), lead_time: row.lead_time.clone(),
            price_varies: p.price_varies(), base_price: row.base_price, rrp: row.rrp,
            price: p.effective_base_price(now), display_price: p.display_price(now),
            promotion: p.promotion().filter(|promo| promo.is_active_at(now)).cloned(),
            is_quote_only: row.is_quote_only, stock_status: status, stock_label: status.label(),
            stock: p.aggregate_stock(), variations: p.variations().to_vec(),
        }
    }
}

// =============================================================================
// Public catalogue
// =============================================================================

fn like(term: Option<&str>) -> Option<String> {
    term.map(str::trim).filter(|t| !t.is_empty()).map(|t| format!("%{t}%"))
}

/// One page of hydrated products plus the unpaged total.
pub(crate) async fn query_page(s: &AppState, p: &ListParams, active_only: bool) -> Result<(Vec<CatalogProduct>, i64)> {
    let filter = "WHERE ($1::text IS NULL OR c.slug = $1) AND ($2::text IS NULL OR b.slug = $2) AND ($3::text IS NULL OR p.name ILIKE $3 OR p.sku ILIKE $3 OR p.short_name ILIKE $3) AND (NOT $4 OR p.is_active)";
    let search = like(p.search.as_deref());
    let rows = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} {filter} ORDER BY p.name LIMIT $5 OFFSET $6"))
        .bind(&p.category).bind(&p.brand).bind(&search).bind(active_only).bind(i64::from(p.per_page())).bind(p.offset())
        .fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products p LEFT JOIN brands b ON b.id = p.brand_id LEFT JOIN categories c ON c.id = p.category_id {filter}"))
        .bind(&p.category).bind(&p.brand).bind(&search).bind(active_only)
        .fetch_one(&s.db).await?;
    Ok((hydrate(&s.db, rows).await?, total.0))
}

async fn page_products(s: &AppState, p: &ListParams, active_only: bool) -> Result<PaginatedResponse<ProductView>> {
    let (products, total) = query_page(s, p, active_only).await?;
    let now = Utc::now();
    Ok(PaginatedResponse { data: products.iter().map(|cp| cp.view(now)).collect(), total, page: p.page() })
}

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<ProductView>>> {
    Ok(Json(page_products(&s, &p, true).await?))
}

pub async fn get_product(State(s): State<AppState>, Path(slug): Path<String>) -> Result<Json<ProductView>> {
    let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.slug = $1 AND p.is_active"))
        .bind(&slug).fetch_optional(&s.db).await?.ok_or(StorefrontError::NotFound("Product"))?;
    let product = hydrate(&s.db, vec![row]).await?.pop().ok_or(StorefrontError::NotFound("Product"))?;
    Ok(Json(product.view(Utc::now())))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams { pub q: Option<String> }

pub const SEARCH_LIMIT: i64 = 20;

pub async fn search(State(s): State<AppState>, Query(p): Query<SearchParams>) -> Result<Json<Vec<ProductView>>> {
    let Some(term) = like(p.q.as_deref().filter(|q| q.trim().chars().count() >= 2)) else { return Ok(Json(vec![])) };
    let rows = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.is_active AND (p.name ILIKE $1 OR p.sku ILIKE $1 OR p.short_name ILIKE $1) ORDER BY p.name LIMIT $2"))
        .bind(&term).bind(SEARCH_LIMIT).fetch_all(&s.db).await?;
    let now = Utc::now();
    Ok(Json(hydrate(&s.db, rows).await?.iter().map(|cp| cp.view(now)).collect()))
}

// =============================================================================
// Admin products
// =============================================================================

pub async fn admin_list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<ProductView>>> {
    Ok(Json(page_products(&s, &p, false).await?))
}

pub async fn admin_get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ProductView>> {
    Ok(Json(load_product(&s.db, id).await?.view(Utc::now())))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 50))]
    pub sku: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub slug: Option<String>,
    pub short_name: Option<String>,
    pub brand_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
    pub lead_time: Option<String>,
    pub base_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub rrp: Option<Decimal>,
    pub is_quote_only: Option<bool>,
    pub is_active: Option<bool>,
}

impl ProductRequest {
    fn checked(self) -> Result<(Sku, String, Self)> {
        self.validate()?;
        for (field, value) in [("basePrice", self.base_price), ("costPrice", self.cost_price), ("rrp", self.rrp)] {
            if value.is_some_and(|v| v < Decimal::ZERO) {
                return Err(StorefrontError::Validation(format!("{field} cannot be negative")));
            }
        }
        let sku = Sku::new(&self.sku).map_err(|e| StorefrontError::Validation(e.to_string()))?;
        let slug = slugify(self.slug.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(&self.name));
        if slug.is_empty() { return Err(StorefrontError::Validation("Slug cannot be empty".into())); }
        Ok((sku, slug, self))
    }
}

const DUPLICATE_PRODUCT: &str = "A product with this SKU or slug already exists";

pub async fn create_product(State(s): State<AppState>, Json(r): Json<ProductRequest>) -> Result<(StatusCode, Json<ProductView>)> {
    let (sku, slug, r) = r.checked()?;
    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO products (id, slug, sku, name, short_name, brand_id, category_id, description, lead_time, base_price, cost_price, rrp, is_quote_only, is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW(), NOW())")
        .bind(id).bind(&slug).bind(sku.as_str()).bind(r.name.trim()).bind(&r.short_name).bind(r.brand_id).bind(r.category_id)
        .bind(&r.description).bind(&r.lead_time).bind(r.base_price).bind(r.cost_price).bind(r.rrp)
        .bind(r.is_quote_only.unwrap_or(false)).bind(r.is_active.unwrap_or(true))
        .execute(&s.db).await.map_err(conflict_on_unique(DUPLICATE_PRODUCT))?;
    tracing::info!(product_id = %id, sku = %sku.as_str(), "product created");
    Ok((StatusCode::CREATED, Json(load_product(&s.db, id).await?.view(Utc::now()))))
}

pub async fn update_product(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ProductRequest>) -> Result<Json<ProductView>> {
    let (sku, slug, r) = r.checked()?;
    let done = sqlx::query("UPDATE products SET slug = $2, sku = $3, name = $4, short_name = $5, brand_id = $6, category_id = $7, description = $8, lead_time = $9, base_price = $10, cost_price = $11, rrp = $12, is_quote_only = COALESCE($13, is_quote_only), is_active = COALESCE($14, is_active), updated_at = NOW() WHERE id = $1")
        .bind(id).bind(&slug).bind(sku.as_str()).bind(r.name.trim()).bind(&r.short_name).bind(r.brand_id).bind(r.category_id)
        .bind(&r.description).bind(&r.lead_time).bind(r.base_price).bind(r.cost_price).bind(r.rrp).bind(r.is_quote_only).bind(r.is_active)
        .execute(&s.db).await.map_err(conflict_on_unique(DUPLICATE_PRODUCT))?;
    if done.rows_affected() == 0 { return Err(StorefrontError::NotFound("Product")); }
    Ok(Json(load_product(&s.db, id).await?.view(Utc::now())))
}

/// Products are deactivated rather than removed so quotes keep their references.
pub async fn delete_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let done = sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1").bind(id).execute(&s.db).await?;
    if done.rows_affected() == 0 { return Err(StorefrontError::NotFound("Product")); }
    tracing::info!(product_id = %id, "product deactivated");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Variations
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VariationRequest {
    #[validate(length(min = 1, max = 100))]
    pub size: String,
    pub label: Option<String>,
    #[validate(length(max = 50))]
    pub sku: Option<String>,
    pub price: Option<Decimal>,
}

pub(crate) async fn sku_used_by_product(db: &sqlx::PgPool, sku: &str) -> Result<bool> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE UPPER(sku) = UPPER($1)").bind(sku).fetch_optional(db).await?;
    Ok(row.is_some())
}

pub async fn create_variation(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<VariationRequest>) -> Result<(StatusCode, Json<Variation>)> {
    r.validate()?;
    if r.price.is_some_and(|p| p < Decimal::ZERO) { return Err(StorefrontError::Validation("price cannot be negative".into())); }
    let mut cp = load_product(&s.db, id).await?;
    let variation = cp.product.add_variation(Uuid::now_v7(), &r.size, r.label.as_deref(), r.sku.as_deref(), r.price)?.clone();
    if let Some(sku) = &variation.sku {
        if sku_used_by_product(&s.db, sku).await? {
            return Err(StorefrontError::Conflict(format!("SKU \"{sku}\" is already used as a product SKU")));
        }
    }
    let mut tx = s.db.begin().await?;
    sqlx::query("INSERT INTO product_variations (id, product_id, size, label, sku, price, source, display_order, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())")
        .bind(variation.id).bind(id).bind(&variation.size).bind(&variation.label).bind(&variation.sku).bind(variation.price)
        .bind(variation.source.as_str()).bind(variation.display_order)
        .execute(&mut *tx).await.map_err(conflict_on_unique("Variation SKU is already in use"))?;
    sqlx::query("INSERT INTO product_stock (id, product_id, variation_id, qty_in_stock, incoming_qty, preorder_qty, reorder_point, updated_at) VALUES ($1, $2, $3, 0, 0, 0, $4, NOW())")
        .bind(Uuid::now_v7()).bind(id).bind(variation.id).bind(VARIATION_REORDER_POINT)
        .execute(&mut *tx).await?;
    sqlx::query("UPDATE products SET price_varies = TRUE, updated_at = NOW() WHERE id = $1").bind(id).execute(&mut *tx).await?;
    tx.commit().await?;
    s.events.publish(cp.product.take_events()).await;
    tracing::info!(product_id = %id, size = %variation.size, "variation added");
    Ok((StatusCode::CREATED, Json(variation)))
}

pub async fn delete_variation(State(s): State<AppState>, Path((id, variation_id)): Path<(Uuid, Uuid)>) -> Result<StatusCode> {
    let mut cp = load_product(&s.db, id).await?;
    cp.product.remove_variation(variation_id)?;
    let mut tx = s.db.begin().await?;
    sqlx::query("DELETE FROM product_variations WHERE id = $1 AND product_id = $2").bind(variation_id).bind(id).execute(&mut *tx).await?;
    sqlx::query("UPDATE products SET price_varies = $2, updated_at = NOW() WHERE id = $1").bind(id).bind(cp.product.price_varies()).execute(&mut *tx).await?;
    tx.commit().await?;
    s.events.publish(cp.product.take_events()).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Categories and brands
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

pub async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<Category>>> {
    let cats = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE is_active ORDER BY display_order, name").fetch_all(&s.db).await?;
    Ok(Json(cats))
}

pub async fn admin_list_categories(State(s): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY display_order, name").fetch_all(&s.db).await?))
}

pub async fn create_category(State(s): State<AppState>, Json(r): Json<CategoryRequest>) -> Result<(StatusCode, Json<Category>)> {
    r.validate()?;
    let slug = slugify(r.slug.as_deref().unwrap_or(&r.name));
    let c = sqlx::query_as::<_, Category>("INSERT INTO categories (id, name, slug, description, parent_id, display_order, is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(r.name.trim()).bind(&slug).bind(&r.description).bind(r.parent_id)
        .bind(r.display_order.unwrap_or(0)).bind(r.is_active.unwrap_or(true))
        .fetch_one(&s.db).await.map_err(conflict_on_unique("A category with this slug already exists"))?;
    Ok((StatusCode::CREATED, Json(c)))
}

pub async fn update_category(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<CategoryRequest>) -> Result<Json<Category>> {
    r.validate()?;
    if r.parent_id == Some(id) { return Err(StorefrontError::Validation("A category cannot be its own parent".into())); }
    let slug = slugify(r.slug.as_deref().unwrap_or(&r.name));
    sqlx::query_as::<_, Category>("UPDATE categories SET name = $2, slug = $3, description = $4, parent_id = $5, display_order = COALESCE($6, display_order), is_active = COALESCE($7, is_active), updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(r.name.trim()).bind(&slug).bind(&r.description).bind(r.parent_id).bind(r.display_order).bind(r.is_active)
        .fetch_optional(&s.db).await.map_err(conflict_on_unique("A category with this slug already exists"))?
        .map(Json).ok_or(StorefrontError::NotFound("Category"))
}

pub async fn delete_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<super::Ack>> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE category_id = $1").bind(id).fetch_one(&s.db).await?;
    if count > 0 { return Err(StorefrontError::Conflict(format!("Category has {count} products assigned"))); }
    let done = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&s.db).await?;
    if done.rows_affected() == 0 { return Err(StorefrontError::NotFound("Category")); }
    Ok(Ack::new("Category deleted"))
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BrandRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub slug: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
}

pub async fn list_brands(State(s): State<AppState>) -> Result<Json<Vec<Brand>>> {
    Ok(Json(sqlx::query_as::<_, Brand>("SELECT * FROM brands ORDER BY name").fetch_all(&s.db).await?))
}

pub async fn create_brand(State(s): State<AppState>, Json(r): Json<BrandRequest>) -> Result<(StatusCode, Json<Brand>)> {
    r.validate()?;
    let b = sqlx::query_as::<_, Brand>("INSERT INTO brands (id, name, slug, website, created_at, updated_at) VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(r.name.trim()).bind(slugify(r.slug.as_deref().unwrap_or(&r.name))).bind(&r.website)
        .fetch_one(&s.db).await.map_err(conflict_on_unique("A brand with this slug already exists"))?;
    Ok((StatusCode::CREATED, Json(b)))
}

pub async fn update_brand(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<BrandRequest>) -> Result<Json<Brand>> {
    r.validate()?;
    sqlx::query_as::<_, Brand>("UPDATE brands SET name = $2, slug = $3, website = $4, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(r.name.trim()).bind(slugify(r.slug.as_deref().unwrap_or(&r.name))).bind(&r.website)
        .fetch_optional(&s.db).await.map_err(conflict_on_unique("A brand with this slug already exists"))?
        .map(Json).ok_or(StorefrontError::NotFound("Brand"))
}

pub async fn delete_brand(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Ack>> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE brand_id = $1").bind(id).fetch_one(&s.db).await?;
    if count > 0 { return Err(StorefrontError::Conflict(format!("Brand has {count} products assigned"))); }
    let done = sqlx::query("DELETE FROM brands WHERE id = $1").bind(id).execute(&s.db).await?;
    if done.rows_affected() == 0 { return Err(StorefrontError::NotFound("Brand")); }
    Ok(Ack::new("Brand deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn row() -> ProductRow {
        let now = Utc::now();
        ProductRow {
            id: Uuid::new_v4(), slug: "gate-valve".into(), sku: "gv-100".into(), name: "Gate Valve".into(), short_name: None,
            brand_id: None, brand_name: Some("Bermad".into()), category_id: None, category_name: Some("Valves".into()),
            category_slug: Some("valves".into()), description: None, lead_time: Some("2-3 weeks".into()), price_varies: false,
            base_price: Some(dec!(120)), cost_price: Some(dec!(80)), rrp: None, promotion_id: Some("PROMO-1".into()),
            promotion_price: Some(dec!(99)), promotion_starts_at: Some(now - Duration::days(1)), promotion_ends_at: None,
            tier_a: Some(dec!(110)), tier_b: None, tier_c: None, tier_d: None, tier_e: None, tier_f: None,
            is_active: true, is_quote_only: false, is_suspended: false, suspended_reason: None,
            qty_in_stock: Some(3), incoming_qty: None, preorder_qty: None, reorder_point: None,
            created_at: now, updated_at: now,
        }
    }

    #[test]
    fn rows_map_to_priced_views() {
        let cp = CatalogProduct { product: row().to_domain(vec![]).unwrap(), row: row() };
        let view = cp.view(Utc::now());
        assert_eq!(view.sku, "GV-100");
        assert_eq!(view.price, Some(dec!(99)));
        assert_eq!(view.base_price, Some(dec!(120)));
        assert_eq!(view.stock_status, StockStatus::LowStock);
        assert_eq!(view.stock_label, "Low Stock");
        assert!(view.promotion.is_some());
        assert_eq!(cp.product.tiers().a, Some(dec!(110)));
    }

    #[test]
    fn variation_rows_sort_by_size() {
        let vr = |size: &str, price| VariationRow {
            id: Uuid::new_v4(), product_id: Uuid::nil(), size: size.into(), label: size.into(), sku: None, price,
            source: "neto".into(), display_order: 0, qty_in_stock: Some(4), incoming_qty: Some(1), preorder_qty: None, reorder_point: None,
        };
        let mut r = row();
        r.price_varies = true;
        let product = r.to_domain(vec![vr("DN100", Some(dec!(300))).into(), vr("DN50", Some(dec!(150))).into(), vr("DN80", None).into()]).unwrap();
        let sizes: Vec<&str> = product.variations().iter().map(|v| v.size.as_str()).collect();
        assert_eq!(sizes, ["DN50", "DN80", "DN100"]);
        assert_eq!(product.display_price(Utc::now()), Some(dec!(150)));
        assert_eq!(product.aggregate_stock().map(|s| (s.qty_in_stock, s.incoming_qty)), Some((12, 3)));
    }

    #[test]
    fn product_requests_are_checked() {
        let req = |price| ProductRequest {
            sku: " bfv-1 ".into(), name: "Butterfly Valve".into(), slug: None, short_name: None, brand_id: None, category_id: None,
            description: None, lead_time: None, base_price: price, cost_price: None, rrp: None, is_quote_only: None, is_active: None,
        };
        let (sku, slug, _) = req(Some(dec!(10))).checked().unwrap();
        assert_eq!((sku.as_str(), slug.as_str()), ("BFV-1", "butterfly-valve"));
        assert!(matches!(req(Some(dec!(-1))).checked(), Err(StorefrontError::Validation(_))));
    }
}
