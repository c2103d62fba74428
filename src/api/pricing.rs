use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::{hydrate, load_product, query_page, CatalogProduct, ProductRow, PRODUCT_SELECT};
use super::inventory::{parse_price, BulkResponse};
use super::{AppState, ListParams, PaginatedResponse};
use crate::domain::aggregates::product::{margin_band, MarginBand, PriceTiers, ProductError, Promotion, Variation};
use crate::{Result, StorefrontError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingView {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub brand: Option<String>,
    pub price_varies: bool,
    pub base_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub rrp: Option<Decimal>,
    pub effective_price: Option<Decimal>,
    pub margin: Option<Decimal>,
    pub margin_band: Option<MarginBand>,
    pub promotion: Option<Promotion>,
    pub promotion_active: bool,
    pub tiers: PriceTiers,
    pub variations: Vec<Variation>,
}

impl CatalogProduct {
    pub fn pricing_view(&self, now: DateTime<Utc>) -> PricingView {
        let (row, p) = (&self.row, &self.product);
        let margin = p.margin().map(|m| m.round_dp(1));
        PricingView {
            id: row.id, sku: p.sku().to_string(), name: row.name.clone(), brand: row.brand_name.clone(),
            price_varies: p.price_varies(), base_price: row.base_price, cost_price: row.cost_price, rrp: row.rrp,
            effective_price: p.effective_base_price(now), margin, margin_band: margin.map(margin_band),
            promotion: p.promotion().cloned(), promotion_active: p.promotion().is_some_and(|promo| promo.is_active_at(now)),
            tiers: p.tiers().clone(), variations: p.variations().to_vec(),
        }
    }
}

pub async fn list_pricing(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<PricingView>>> {
    let (products, total) = query_page(&s, &p, false).await?;
    let now = Utc::now();
    Ok(Json(PaginatedResponse { data: products.iter().map(|cp| cp.pricing_view(now)).collect(), total, page: p.page() }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRequest {
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    pub action: Option<String>,
    pub promotion_price: Option<serde_json::Value>,
    pub promotion_start_date: Option<DateTime<Utc>>,
    pub promotion_end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionAction {
    Set(Promotion),
    Clear,
}

impl PromotionAction {
    pub fn parse(r: &PromotionRequest, now: DateTime<Utc>) -> Result<Self> {
        match r.action.as_deref() {
            Some("set-promotion") => {
                let price = r.promotion_price.as_ref()
                    .map(parse_price).transpose().map_err(StorefrontError::Validation)?
                    .flatten()
                    .ok_or_else(|| StorefrontError::Validation("Promotion price is required".into()))?;
                let promotion = Promotion::new(price, r.promotion_start_date, r.promotion_end_date, now);
                if price <= Decimal::ZERO || promotion.ends_at.is_some_and(|end| end <= promotion.starts_at) {
                    return Err(ProductError::InvalidPromotion.into());
                }
                Ok(Self::Set(promotion))
            }
            Some("clear-promotion") => Ok(Self::Clear),
            _ => Err(StorefrontError::Validation("Invalid action".into())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self { Self::Set(_) => "set-promotion", Self::Clear => "clear-promotion" }
    }
}

pub async fn bulk_promotion(State(s): State<AppState>, Json(r): Json<PromotionRequest>) -> Result<Json<BulkResponse>> {
    if r.product_ids.is_empty() { return Err(StorefrontError::Validation("Product IDs are required".into())); }
    let action = PromotionAction::parse(&r, Utc::now())?;
    let rows = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = ANY($1)"))
        .bind(&r.product_ids).fetch_all(&s.db).await?;
    let mut products = hydrate(&s.db, rows).await?;
    for cp in &mut products {
        match &action {
            PromotionAction::Set(promotion) => cp.product.set_promotion(promotion.clone())?,
            PromotionAction::Clear => cp.product.clear_promotion(),
        }
    }

    let done = match &action {
        PromotionAction::Set(promo) => sqlx::query("UPDATE products SET promotion_id = $2, promotion_price = $3, promotion_starts_at = $4, promotion_ends_at = $5, updated_at = NOW() WHERE id = ANY($1)")
            .bind(&r.product_ids).bind(&promo.id).bind(promo.price).bind(promo.starts_at).bind(promo.ends_at)
            .execute(&s.db).await?,
        PromotionAction::Clear => sqlx::query("UPDATE products SET promotion_id = NULL, promotion_price = NULL, promotion_starts_at = NULL, promotion_ends_at = NULL, updated_at = NOW() WHERE id = ANY($1)")
            .bind(&r.product_ids).execute(&s.db).await?,
    };
    for cp in &mut products {
        s.events.publish(cp.product.take_events()).await;
    }
    tracing::info!(action = action.as_str(), updated = done.rows_affected(), "pricing bulk action");
    Ok(Json(BulkResponse { success: true, message: format!("Updated {} products", done.rows_affected()), action: action.as_str() }))
}

pub async fn update_tiers(State(s): State<AppState>, Path(id): Path<Uuid>, Json(tiers): Json<PriceTiers>) -> Result<Json<PricingView>> {
    for price in [tiers.a, tiers.b, tiers.c, tiers.d, tiers.e, tiers.f].into_iter().flatten() {
        if price < Decimal::ZERO { return Err(StorefrontError::Validation("Tier prices cannot be negative".into())); }
    }
    let done = sqlx::query("UPDATE products SET tier_a = $2, tier_b = $3, tier_c = $4, tier_d = $5, tier_e = $6, tier_f = $7, updated_at = NOW() WHERE id = $1")
        .bind(id).bind(tiers.a).bind(tiers.b).bind(tiers.c).bind(tiers.d).bind(tiers.e).bind(tiers.f)
        .execute(&s.db).await?;
    if done.rows_affected() == 0 { return Err(StorefrontError::NotFound("Product")); }
    Ok(Json(load_product(&s.db, id).await?.pricing_view(Utc::now())))
}
