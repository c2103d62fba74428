//! Stock and availability administration.

use std::collections::BTreeMap;
use std::str::FromStr;

use axum::extract::{Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::catalog::{query_page, CatalogProduct};
use super::{AppState, ListParams, PaginatedResponse};
use crate::domain::aggregates::product::{StockStatus, Variation, DEFAULT_REORDER_POINT, VARIATION_REORDER_POINT};
use crate::domain::aggregates::StockLevel;
use crate::domain::value_objects::Sku;
use crate::{Result, StorefrontError};

pub const SUSPEND_REASON: &str = "Suspended via bulk action";

// =============================================================================
// Listing
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryView {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub short_name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub lead_time: Option<String>,
    pub is_active: bool,
    pub is_quote_only: bool,
    pub is_suspended: bool,
    pub suspended_reason: Option<String>,
    pub stock: Option<StockLevel>,
    pub stock_status: StockStatus,
    pub stock_label: &'static str,
    pub variations: Vec<Variation>,
}

impl From<&CatalogProduct> for InventoryView {
    fn from(cp: &CatalogProduct) -> Self {
        let (row, p) = (&cp.row, &cp.product);
        let status = p.stock_status();
        Self {
            id: row.id, sku: p.sku().to_string(), name: row.name.clone(), short_name: row.short_name.clone(),
            brand: row.brand_name.clone(), category: row.category_name.clone(), lead_time: row.lead_time.clone(),
            is_active: row.is_active, is_quote_only: row.is_quote_only, is_suspended: row.is_suspended,
            suspended_reason: row.suspended_reason.clone(), stock: p.aggregate_stock(), stock_status: status,
            stock_label: status.label(), variations: p.variations().to_vec(),
        }
    }
}

pub async fn list_inventory(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<InventoryView>>> {
    let (products, total) = query_page(&s, &p, false).await?;
    Ok(Json(PaginatedResponse { data: products.iter().map(InventoryView::from).collect(), total, page: p.page() }))
}

// =============================================================================
// Bulk availability actions
// =============================================================================

/// Distinguishes an absent field from an explicit `null`.
fn present<'de, D, T>(d: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionRequest {
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    pub action: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub lead_time: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryAction {
    QuoteOnly,
    Suspend,
    Activate,
    Unsuspend,
    SetLeadTime(Option<String>),
}

impl InventoryAction {
    pub fn parse(action: Option<&str>, lead_time: Option<Option<String>>) -> Result<Self> {
        match action {
            Some("quote-only") => Ok(Self::QuoteOnly),
            Some("suspend") => Ok(Self::Suspend),
            Some("activate") => Ok(Self::Activate),
            Some("unsuspend") => Ok(Self::Unsuspend),
            Some("set-lead-time") => {
                let value = lead_time.ok_or_else(|| StorefrontError::Validation("Lead time value required".into()))?;
                Ok(Self::SetLeadTime(value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())))
            }
            _ => Err(StorefrontError::Validation("Invalid action".into())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteOnly => "quote-only", Self::Suspend => "suspend", Self::Activate => "activate",
            Self::Unsuspend => "unsuspend", Self::SetLeadTime(_) => "set-lead-time",
        }
    }

    fn push_assignments(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::QuoteOnly => { qb.push(", is_quote_only = TRUE"); }
            Self::Suspend => { qb.push(", is_suspended = TRUE, suspended_reason = ").push_bind(SUSPEND_REASON); }
            Self::Activate => { qb.push(", is_active = TRUE, is_quote_only = FALSE, is_suspended = FALSE, suspended_reason = NULL"); }
            Self::Unsuspend => { qb.push(", is_suspended = FALSE, suspended_reason = NULL"); }
            Self::SetLeadTime(lead_time) => { qb.push(", lead_time = ").push_bind(lead_time.clone()); }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub success: bool,
    pub message: String,
    pub action: &'static str,
}

pub async fn bulk_action(State(s): State<AppState>, Json(r): Json<BulkActionRequest>) -> Result<Json<BulkResponse>> {
    if r.product_ids.is_empty() { return Err(StorefrontError::Validation("Product IDs are required".into())); }
    let action = InventoryAction::parse(r.action.as_deref(), r.lead_time)?;
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE products SET updated_at = NOW()");
    action.push_assignments(&mut qb);
    qb.push(" WHERE id = ANY(").push_bind(&r.product_ids).push(")");
    let done = qb.build().execute(&s.db).await?;
    tracing::info!(action = action.as_str(), requested = r.product_ids.len(), updated = done.rows_affected(), "inventory bulk action");
    Ok(Json(BulkResponse { success: true, message: format!("Updated {} products", done.rows_affected()), action: action.as_str() }))
}

// =============================================================================
// Batch edits
// =============================================================================

/// Reads a price sent as a number, a string, or blank for "no price".
pub fn parse_price(value: &serde_json::Value) -> std::result::Result<Option<Decimal>, String> {
    let text = match value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::String(s) if s.trim().is_empty() => return Ok(None),
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(format!("Invalid price: {other}")),
    };
    let price = Decimal::from_str(&text).map_err(|_| format!("Invalid price: {text}"))?;
    if price < Decimal::ZERO { return Err(format!("Invalid price: {text}")); }
    Ok(Some(price))
}

fn non_negative(field: &str, value: Option<i32>) -> std::result::Result<(), String> {
    match value {
        Some(v) if v < 0 => Err(format!("{field} cannot be negative")),
        _ => Ok(()),
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub sku: Option<String>,
    pub qty_in_stock: Option<i32>,
    pub incoming_qty: Option<i32>,
    pub lead_time_text: Option<String>,
    pub base_price: Option<serde_json::Value>,
}

/// Product columns to overwrite. The outer `Option` on nullable columns means "leave as is".
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub short_name: Option<Option<String>>,
    pub sku: Option<String>,
    pub lead_time: Option<Option<String>>,
    pub base_price: Option<Option<Decimal>>,
    pub qty_in_stock: Option<i32>,
    pub incoming_qty: Option<i32>,
}

impl ProductPatch {
    pub fn has_fields(&self) -> bool {
        self.name.is_some() || self.short_name.is_some() || self.sku.is_some() || self.lead_time.is_some() || self.base_price.is_some()
    }

    pub fn has_stock(&self) -> bool { self.qty_in_stock.is_some() || self.incoming_qty.is_some() }
}

impl ProductUpdate {
    pub fn normalize(self) -> std::result::Result<ProductPatch, String> {
        non_negative("qtyInStock", self.qty_in_stock)?;
        non_negative("incomingQty", self.incoming_qty)?;
        let sku = match self.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(Sku::new(raw).map_err(|e| format!("SKU \"{raw}\": {e}"))?.as_str().to_string()),
            None => None,
        };
        Ok(ProductPatch {
            name: self.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            short_name: self.short_name.map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty())),
            sku,
            lead_time: self.lead_time_text.map(|l| Some(l.trim().to_string()).filter(|l| !l.is_empty())),
            base_price: self.base_price.as_ref().map(parse_price).transpose()?,
            qty_in_stock: self.qty_in_stock,
            incoming_qty: self.incoming_qty,
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationUpdate {
    pub size: Option<String>,
    pub label: Option<String>,
    pub sku: Option<String>,
    pub qty_in_stock: Option<i32>,
    pub incoming_qty: Option<i32>,
    pub price: Option<serde_json::Value>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct VariationPatch {
    pub size: Option<String>,
    pub label: Option<String>,
    pub sku: Option<Option<String>>,
    pub price: Option<Option<Decimal>>,
    pub qty_in_stock: Option<i32>,
    pub incoming_qty: Option<i32>,
}

impl VariationPatch {
    pub fn has_fields(&self) -> bool { self.size.is_some() || self.label.is_some() || self.sku.is_some() || self.price.is_some() }
    pub fn has_stock(&self) -> bool { self.qty_in_stock.is_some() || self.incoming_qty.is_some() }
}

impl VariationUpdate {
    pub fn normalize(self) -> std::result::Result<VariationPatch, String> {
        non_negative("qtyInStock", self.qty_in_stock)?;
        non_negative("incomingQty", self.incoming_qty)?;
        let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(VariationPatch {
            size: trimmed(self.size),
            // label is required on the row, so blanks are ignored
            label: trimmed(self.label),
            sku: self.sku.map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty())),
            price: self.price.as_ref().map(parse_price).transpose()?,
            qty_in_stock: self.qty_in_stock,
            incoming_qty: self.incoming_qty,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateRequest {
    #[serde(default, alias = "updates")]
    pub product_updates: BTreeMap<String, ProductUpdate>,
    #[serde(default)]
    pub variation_updates: BTreeMap<String, VariationUpdate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub success: bool,
    pub message: String,
    pub products_updated: u32,
    pub variations_updated: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Outcome of one batch row: applied, or a message for the caller.
enum RowError {
    Rejected(String),
    Failed(sqlx::Error),
}

impl From<sqlx::Error> for RowError {
    fn from(e: sqlx::Error) -> Self { Self::Failed(e) }
}

impl From<String> for RowError {
    fn from(m: String) -> Self { Self::Rejected(m) }
}

async fn apply_product(db: &PgPool, id: Uuid, patch: ProductPatch) -> std::result::Result<(), RowError> {
    if let Some(sku) = &patch.sku {
        let taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE UPPER(sku) = UPPER($1) AND id <> $2")
            .bind(sku).bind(id).fetch_optional(db).await?;
        if taken.is_some() { return Err(format!("SKU \"{sku}\" is already in use by another product").into()); }
    }
    let mut tx = db.begin().await?;
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE products SET updated_at = NOW()");
    if let Some(name) = patch.name { qb.push(", name = ").push_bind(name); }
    if let Some(short_name) = patch.short_name { qb.push(", short_name = ").push_bind(short_name); }
    if let Some(sku) = patch.sku { qb.push(", sku = ").push_bind(sku); }
    if let Some(lead_time) = patch.lead_time { qb.push(", lead_time = ").push_bind(lead_time); }
    if let Some(base_price) = patch.base_price { qb.push(", base_price = ").push_bind(base_price); }
    qb.push(" WHERE id = ").push_bind(id);
    if qb.build().execute(&mut *tx).await?.rows_affected() == 0 {
        return Err(format!("Product not found: {id}").into());
    }
    if patch.qty_in_stock.is_some() || patch.incoming_qty.is_some() {
        sqlx::query("INSERT INTO product_stock (id, product_id, variation_id, qty_in_stock, incoming_qty, preorder_qty, reorder_point, updated_at)
             VALUES ($1, $2, NULL, COALESCE($3, 0), COALESCE($4, 0), 0, $5, NOW())
             ON CONFLICT (product_id) WHERE variation_id IS NULL DO UPDATE SET
             qty_in_stock = COALESCE($3, product_stock.qty_in_stock), incoming_qty = COALESCE($4, product_stock.incoming_qty), updated_at = NOW()")
            .bind(Uuid::now_v7()).bind(id).bind(patch.qty_in_stock).bind(patch.incoming_qty).bind(DEFAULT_REORDER_POINT)
            .execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn apply_variation(db: &PgPool, id: Uuid, patch: VariationPatch) -> std::result::Result<(), RowError> {
    let (product_id,): (Uuid,) = sqlx::query_as("SELECT product_id FROM product_variations WHERE id = $1")
        .bind(id).fetch_optional(db).await?.ok_or_else(|| format!("Variation not found: {id}"))?;
    if let Some(size) = &patch.size {
        let clash: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM product_variations WHERE product_id = $1 AND size = $2 AND id <> $3")
            .bind(product_id).bind(size).bind(id).fetch_optional(db).await?;
        if clash.is_some() { return Err(format!("Size \"{size}\" already exists in this product").into()); }
    }
    if let Some(Some(sku)) = &patch.sku {
        let clash: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM product_variations WHERE sku = $1 AND id <> $2")
            .bind(sku).bind(id).fetch_optional(db).await?;
        if clash.is_some() { return Err(format!("Variation SKU \"{sku}\" is already in use").into()); }
        if super::catalog::sku_used_by_product(db, sku).await.map_err(|e| format!("{e}"))? {
            return Err(format!("SKU \"{sku}\" is already used as a product SKU").into());
        }
    }
    let mut tx = db.begin().await?;
    if patch.has_fields() {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE product_variations SET updated_at = NOW()");
        if let Some(size) = patch.size { qb.push(", size = ").push_bind(size); }
        if let Some(label) = patch.label { qb.push(", label = ").push_bind(label); }
        if let Some(sku) = patch.sku { qb.push(", sku = ").push_bind(sku); }
        if let Some(price) = patch.price { qb.push(", price = ").push_bind(price); }
        qb.push(" WHERE id = ").push_bind(id);
        qb.build().execute(&mut *tx).await?;
    }
    if patch.qty_in_stock.is_some() || patch.incoming_qty.is_some() {
        sqlx::query("INSERT INTO product_stock (id, product_id, variation_id, qty_in_stock, incoming_qty, preorder_qty, reorder_point, updated_at)
             VALUES ($1, $2, $3, COALESCE($4, 0), COALESCE($5, 0), 0, $6, NOW())
             ON CONFLICT (variation_id) WHERE variation_id IS NOT NULL DO UPDATE SET
             qty_in_stock = COALESCE($4, product_stock.qty_in_stock), incoming_qty = COALESCE($5, product_stock.incoming_qty), updated_at = NOW()")
            .bind(Uuid::now_v7()).bind(product_id).bind(id).bind(patch.qty_in_stock).bind(patch.incoming_qty).bind(VARIATION_REORDER_POINT)
            .execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

fn record(errors: &mut Vec<String>, kind: &str, key: &str, outcome: std::result::Result<(), RowError>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(RowError::Rejected(message)) => { errors.push(message); false }
        Err(RowError::Failed(e)) => {
            tracing::warn!(kind, id = key, error = %e, "batch row failed");
            errors.push(format!("Failed to update {kind} {key}"));
            false
        }
    }
}

/// Applies each row independently; one bad row never blocks the rest.
pub async fn batch_update(State(s): State<AppState>, Json(r): Json<BatchUpdateRequest>) -> Result<Json<BatchResponse>> {
    if r.product_updates.is_empty() && r.variation_updates.is_empty() {
        return Err(StorefrontError::Validation("No updates provided".into()));
    }
    let (mut products_updated, mut variations_updated, mut errors) = (0u32, 0u32, Vec::new());

    for (key, update) in r.product_updates {
        let Ok(id) = Uuid::parse_str(&key) else { errors.push(format!("Invalid product ID: {key}")); continue };
        let outcome = match update.normalize() {
            Ok(patch) => apply_product(&s.db, id, patch).await,
            Err(message) => Err(RowError::Rejected(message)),
        };
        if record(&mut errors, "product", &key, outcome) { products_updated += 1; }
    }
    for (key, update) in r.variation_updates {
        let Ok(id) = Uuid::parse_str(&key) else { errors.push(format!("Invalid variation ID: {key}")); continue };
        let outcome = match update.normalize() {
            Ok(patch) => apply_variation(&s.db, id, patch).await,
            Err(message) => Err(RowError::Rejected(message)),
        };
        if record(&mut errors, "variation", &key, outcome) { variations_updated += 1; }
    }

    tracing::info!(products_updated, variations_updated, errors = errors.len(), "inventory batch update");
    Ok(Json(BatchResponse {
        success: true,
        message: format!("Updated {products_updated} product(s) and {variations_updated} variation(s)"),
        products_updated,
        variations_updated,
        errors: (!errors.is_empty()).then_some(errors),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn bulk_actions_parse() {
        assert_eq!(InventoryAction::parse(Some("suspend"), None).unwrap(), InventoryAction::Suspend);
        assert_eq!(InventoryAction::parse(Some("set-lead-time"), Some(Some(" 2 weeks ".into()))).unwrap(), InventoryAction::SetLeadTime(Some("2 weeks".into())));
        assert_eq!(InventoryAction::parse(Some("set-lead-time"), Some(Some(String::new()))).unwrap(), InventoryAction::SetLeadTime(None));
        assert!(matches!(InventoryAction::parse(Some("set-lead-time"), None), Err(StorefrontError::Validation(m)) if m == "Lead time value required"));
        assert!(matches!(InventoryAction::parse(Some("delete"), None), Err(StorefrontError::Validation(m)) if m == "Invalid action"));
        assert!(InventoryAction::parse(None, None).is_err());
    }

    #[test]
    fn explicit_null_lead_time_clears_it() {
        let r: BulkActionRequest = serde_json::from_value(json!({"productIds": [], "action": "set-lead-time", "leadTime": null})).unwrap();
        assert_eq!(r.lead_time, Some(None));
        let r: BulkActionRequest = serde_json::from_value(json!({"action": "set-lead-time"})).unwrap();
        assert_eq!(r.lead_time, None);
    }

    #[test]
    fn prices_accept_numbers_strings_and_blanks() {
        assert_eq!(parse_price(&json!("12.50")), Ok(Some(dec!(12.50))));
        assert_eq!(parse_price(&json!(99)), Ok(Some(dec!(99))));
        assert_eq!(parse_price(&json!("")), Ok(None));
        assert_eq!(parse_price(&json!(null)), Ok(None));
        assert!(parse_price(&json!("abc")).is_err());
        assert!(parse_price(&json!(-1)).is_err());
    }

    #[test]
    fn product_updates_normalize() {
        let patch = ProductUpdate {
            name: Some("  ".into()), short_name: Some(" ".into()), sku: Some(" gv-2 ".into()),
            lead_time_text: Some("".into()), base_price: Some(json!("150")), qty_in_stock: Some(4), incoming_qty: None,
        }
        .normalize()
        .unwrap();
        assert_eq!(patch, ProductPatch {
            name: None, short_name: Some(None), sku: Some("GV-2".into()), lead_time: Some(None),
            base_price: Some(Some(dec!(150))), qty_in_stock: Some(4), incoming_qty: None,
        });
        assert!(patch.has_fields() && patch.has_stock());
        assert!(ProductUpdate { qty_in_stock: Some(-1), ..Default::default() }.normalize().is_err());
        assert!(!ProductUpdate::default().normalize().unwrap().has_fields());
    }

    #[test]
    fn variation_updates_normalize() {
        let patch = VariationUpdate { size: Some(" DN80 ".into()), label: Some("".into()), sku: Some("".into()), price: Some(json!("")), ..Default::default() }
            .normalize()
            .unwrap();
        assert_eq!(patch.size.as_deref(), Some("DN80"));
        assert_eq!(patch.label, None);
        assert_eq!(patch.sku, Some(None));
        assert_eq!(patch.price, Some(None));
        assert!(!patch.has_stock());
    }

    #[test]
    fn batch_accepts_legacy_key() {
        let id = Uuid::new_v4();
        let r: BatchUpdateRequest = serde_json::from_value(json!({"updates": {id.to_string(): {"qtyInStock": 3}}})).unwrap();
        assert_eq!(r.product_updates.len(), 1);
        assert!(r.variation_updates.is_empty());
    }
}
