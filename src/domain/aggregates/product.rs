//! Product Aggregate
//!
//! A product is priced either by a single base price or per size variation.
//! Promotions override the base price inside their window, and stock is held
//! either on the product itself or on each variation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::sizing;
use crate::domain::value_objects::{Money, Sku};

/// Reorder point used when a product has no stock record of its own.
pub const DEFAULT_REORDER_POINT: i32 = 5;
/// Reorder point given to new variation-level stock records.
pub const VARIATION_REORDER_POINT: i32 = 2;

#[derive(Clone, Debug)]
pub struct Product {
    id: Uuid,
    sku: Sku,
    name: String,
    price_varies: bool,
    base_price: Option<Money>,
    cost_price: Option<Money>,
    promotion: Option<Promotion>,
    tiers: PriceTiers,
    lead_time: Option<String>,
    flags: AvailabilityFlags,
    variations: Vec<Variation>,
    stock: Option<StockLevel>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variation {
    pub id: Uuid,
    pub size: String,
    pub label: String,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub source: VariationSource,
    pub display_order: i32,
    pub stock: Option<StockLevel>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariationSource { #[default] Neto, Manual }

impl VariationSource {
    pub fn as_str(&self) -> &'static str { match self { Self::Neto => "neto", Self::Manual => "manual" } }
    pub fn parse(s: &str) -> Self { if s.eq_ignore_ascii_case("manual") { Self::Manual } else { Self::Neto } }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    pub price: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Promotion {
    pub fn new(price: Decimal, starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self { id: format!("PROMO-{}", now.timestamp_millis()), price, starts_at: starts_at.unwrap_or(now), ends_at }
    }

    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && self.ends_at.map_or(true, |end| at < end)
    }
}

/// Wholesale price tiers A to F.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTiers {
    pub a: Option<Decimal>,
    pub b: Option<Decimal>,
    pub c: Option<Decimal>,
    pub d: Option<Decimal>,
    pub e: Option<Decimal>,
    pub f: Option<Decimal>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriceTier { A, B, C, D, E, F }

impl PriceTiers {
    pub fn get(&self, tier: PriceTier) -> Option<Decimal> {
        match tier {
            PriceTier::A => self.a, PriceTier::B => self.b, PriceTier::C => self.c,
            PriceTier::D => self.d, PriceTier::E => self.e, PriceTier::F => self.f,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityFlags {
    pub is_active: bool,
    pub is_quote_only: bool,
    pub is_suspended: bool,
    pub suspended_reason: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub qty_in_stock: i32,
    pub incoming_qty: i32,
    pub preorder_qty: i32,
    pub reorder_point: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockStatus { InStock, LowStock, OutOfStock, QuoteOnly, Suspended, Inactive }

impl StockStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::InStock => "In Stock", Self::LowStock => "Low Stock", Self::OutOfStock => "Out of Stock",
            Self::QuoteOnly => "Quote Only", Self::Suspended => "Suspended", Self::Inactive => "Inactive",
        }
    }
}

/// Availability wins over quantity: inactive, suspended and quote-only products
/// never report a stock level.
pub fn stock_status(flags: &AvailabilityFlags, stock: Option<&StockLevel>) -> StockStatus {
    if !flags.is_active { return StockStatus::Inactive; }
    if flags.is_suspended { return StockStatus::Suspended; }
    if flags.is_quote_only { return StockStatus::QuoteOnly; }
    let qty = stock.map_or(0, |s| s.qty_in_stock);
    let threshold = stock.map_or(DEFAULT_REORDER_POINT, |s| s.reorder_point);
    if qty == 0 { StockStatus::OutOfStock } else if qty <= threshold { StockStatus::LowStock } else { StockStatus::InStock }
}

/// Margin as a percentage of the sell price.
pub fn margin_percent(cost: Option<Decimal>, sell: Option<Decimal>) -> Option<Decimal> {
    match (cost, sell) {
        (Some(c), Some(s)) if !c.is_zero() && !s.is_zero() => Some((s - c) / s * Decimal::ONE_HUNDRED),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginBand { Low, Medium, High }

pub fn margin_band(margin: Decimal) -> MarginBand {
    if margin < Decimal::from(20) { MarginBand::Low } else if margin < Decimal::from(30) { MarginBand::Medium } else { MarginBand::High }
}

impl Product {
    pub fn new(id: Uuid, sku: Sku, name: impl Into<String>) -> Self {
        Self {
            id, sku, name: name.into(), price_varies: false, base_price: None, cost_price: None,
            promotion: None, tiers: PriceTiers::default(), lead_time: None,
            flags: AvailabilityFlags { is_active: true, ..Default::default() },
            variations: vec![], stock: None, updated_at: Utc::now(), events: vec![],
        }
    }

    pub fn with_base_price(mut self, price: Option<Money>) -> Self { self.base_price = price; self }
    pub fn with_cost_price(mut self, cost: Option<Money>) -> Self { self.cost_price = cost; self }
    pub fn with_price_varies(mut self, varies: bool) -> Self { self.price_varies = varies; self }
    pub fn with_promotion(mut self, promotion: Option<Promotion>) -> Self { self.promotion = promotion; self }
    pub fn with_tiers(mut self, tiers: PriceTiers) -> Self { self.tiers = tiers; self }
    pub fn with_lead_time(mut self, lead_time: Option<String>) -> Self { self.lead_time = lead_time; self }
    pub fn with_flags(mut self, flags: AvailabilityFlags) -> Self { self.flags = flags; self }
    pub fn with_stock(mut self, stock: Option<StockLevel>) -> Self { self.stock = stock; self }
    pub fn with_variations(mut self, mut variations: Vec<Variation>) -> Self {
        sizing::sort_by_size(&mut variations, |v| v.size.as_str());
        self.variations = variations;
        self
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn price_varies(&self) -> bool { self.price_varies }
    pub fn base_price(&self) -> Option<&Money> { self.base_price.as_ref() }
    pub fn promotion(&self) -> Option<&Promotion> { self.promotion.as_ref() }
    pub fn tiers(&self) -> &PriceTiers { &self.tiers }
    pub fn lead_time(&self) -> Option<&str> { self.lead_time.as_deref() }
    pub fn flags(&self) -> &AvailabilityFlags { &self.flags }
    pub fn variations(&self) -> &[Variation] { &self.variations }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn variation_by_size(&self, size: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.size == size)
    }

    /// Base price with any promotion running at `at` applied.
    pub fn effective_base_price(&self, at: DateTime<Utc>) -> Option<Decimal> {
        match &self.promotion {
            Some(p) if p.is_active_at(at) => Some(p.price),
            _ => self.base_price.as_ref().map(Money::amount),
        }
    }

    /// Unit price for a size (or the product itself). `None` means POA.
    pub fn unit_price(&self, size: Option<&str>, at: DateTime<Utc>) -> Result<Option<Decimal>, ProductError> {
        if self.price_varies && !self.variations.is_empty() {
            let size = size.ok_or(ProductError::SizeRequired)?;
            let variation = self.variation_by_size(size).ok_or_else(|| ProductError::InvalidSize(size.to_string()))?;
            return Ok(variation.price);
        }
        Ok(self.effective_base_price(at))
    }

    /// Price shown on listings: the cheapest priced size for varying products.
    pub fn display_price(&self, at: DateTime<Utc>) -> Option<Decimal> {
        if self.price_varies && !self.variations.is_empty() {
            return self.variations.iter().filter_map(|v| v.price).min();
        }
        self.effective_base_price(at)
    }

    /// Price used against cost for margin reporting.
    pub fn sell_price(&self) -> Option<Decimal> {
        if self.price_varies && !self.variations.is_empty() {
            return self.variations.iter().find_map(|v| v.price);
        }
        self.base_price.as_ref().map(Money::amount)
    }

    pub fn margin(&self) -> Option<Decimal> {
        margin_percent(self.cost_price.as_ref().map(Money::amount), self.sell_price())
    }

    /// Summed variation stock for products with sizes, otherwise the product's own record.
    pub fn aggregate_stock(&self) -> Option<StockLevel> {
        if self.variations.is_empty() { return self.stock; }
        let total = self.variations.iter().filter_map(|v| v.stock).fold(
            StockLevel { reorder_point: DEFAULT_REORDER_POINT, ..Default::default() },
            |mut acc, s| {
                acc.qty_in_stock += s.qty_in_stock;
                acc.incoming_qty += s.incoming_qty;
                acc.preorder_qty += s.preorder_qty;
                acc
            },
        );
        Some(total)
    }

    pub fn stock_status(&self) -> StockStatus { stock_status(&self.flags, self.aggregate_stock().as_ref()) }

    pub fn add_variation(&mut self, id: Uuid, size: &str, label: Option<&str>, sku: Option<&str>, price: Option<Decimal>) -> Result<&Variation, ProductError> {
        let size = size.trim();
        if size.is_empty() { return Err(ProductError::SizeRequired); }
        if self.variation_by_size(size).is_some() { return Err(ProductError::DuplicateSize(size.to_string())); }
        let display_order = self.variations.iter().map(|v| v.display_order).max().unwrap_or(0) + 1;
        let label = label.map(str::trim).filter(|l| !l.is_empty()).unwrap_or(size).to_string();
        let sku = sku.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        self.variations.push(Variation {
            id, size: size.to_string(), label, sku, price, source: VariationSource::Manual, display_order,
            stock: Some(StockLevel { reorder_point: VARIATION_REORDER_POINT, ..Default::default() }),
        });
        self.price_varies = true;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::VariationAdded { product_id: self.id, size: size.to_string() }));
        let idx = self.variations.len() - 1;
        Ok(&self.variations[idx])
    }

    pub fn remove_variation(&mut self, variation_id: Uuid) -> Result<Variation, ProductError> {
        let idx = self.variations.iter().position(|v| v.id == variation_id).ok_or(ProductError::VariationNotFound)?;
        let removed = self.variations.remove(idx);
        if self.variations.is_empty() { self.price_varies = false; }
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::VariationRemoved { product_id: self.id, size: removed.size.clone() }));
        Ok(removed)
    }

    pub fn set_promotion(&mut self, promotion: Promotion) -> Result<(), ProductError> {
        if promotion.price <= Decimal::ZERO { return Err(ProductError::InvalidPromotion); }
        if let Some(end) = promotion.ends_at { if end <= promotion.starts_at { return Err(ProductError::InvalidPromotion); } }
        self.raise_event(DomainEvent::Product(ProductEvent::PromotionSet { product_id: self.id, promotion_id: promotion.id.clone(), price: promotion.price }));
        self.promotion = Some(promotion);
        self.touch();
        Ok(())
    }

    pub fn clear_promotion(&mut self) {
        if self.promotion.take().is_some() {
            self.raise_event(DomainEvent::Product(ProductEvent::PromotionCleared { product_id: self.id }));
        }
        self.touch();
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Size selection is required for products with variable pricing")]
    SizeRequired,
    #[error("Invalid size selection: {0}")]
    InvalidSize(String),
    #[error("Size \"{0}\" already exists in this product")]
    DuplicateSize(String),
    #[error("Variation not found")]
    VariationNotFound,
    #[error("Promotion price must be positive and end after it starts")]
    InvalidPromotion,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn variation(size: &str, price: Option<Decimal>, qty: i32) -> Variation {
        Variation {
            id: Uuid::new_v4(), size: size.into(), label: size.into(), sku: None, price,
            source: VariationSource::Neto, display_order: 0,
            stock: Some(StockLevel { qty_in_stock: qty, incoming_qty: 1, preorder_qty: 0, reorder_point: 2 }),
        }
    }

    fn valve() -> Product {
        Product::new(Uuid::new_v4(), Sku::new("BFV").unwrap(), "Butterfly Valve")
    }

    #[test]
    fn promotion_applies_only_inside_window() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        let promo = Promotion::new(dec!(80), Some(now), Some(now + Duration::days(7)), now);
        let p = valve().with_base_price(Some(Money::aud(dec!(100)))).with_promotion(Some(promo));
        assert_eq!(p.effective_base_price(now - Duration::hours(1)), Some(dec!(100)));
        assert_eq!(p.effective_base_price(now), Some(dec!(80)));
        assert_eq!(p.effective_base_price(now + Duration::days(7)), Some(dec!(100)));
    }

    #[test]
    fn varying_products_price_by_size() {
        let now = Utc::now();
        let p = valve().with_price_varies(true).with_variations(vec![
            variation("100mm", Some(dec!(250)), 3),
            variation("50mm", Some(dec!(120)), 0),
            variation("DN300", None, 0),
        ]);
        assert_eq!(p.variations()[0].size, "50mm");
        assert_eq!(p.unit_price(Some("100mm"), now).unwrap(), Some(dec!(250)));
        assert_eq!(p.unit_price(Some("DN300"), now).unwrap(), None);
        assert_eq!(p.unit_price(None, now), Err(ProductError::SizeRequired));
        assert_eq!(p.unit_price(Some("75mm"), now), Err(ProductError::InvalidSize("75mm".into())));
        assert_eq!(p.display_price(now), Some(dec!(120)));
        assert_eq!(p.sell_price(), Some(dec!(120)));
    }

    #[test]
    fn stock_aggregates_from_variations() {
        let p = valve().with_variations(vec![variation("50mm", None, 3), variation("80mm", None, 4)]);
        let stock = p.aggregate_stock().unwrap();
        assert_eq!(stock.qty_in_stock, 7);
        assert_eq!(stock.incoming_qty, 2);
        assert_eq!(stock.reorder_point, DEFAULT_REORDER_POINT);
        assert_eq!(p.stock_status(), StockStatus::InStock);
    }

    #[test]
    fn stock_status_precedence() {
        let mut flags = AvailabilityFlags { is_active: true, ..Default::default() };
        let low = StockLevel { qty_in_stock: 2, reorder_point: 5, ..Default::default() };
        assert_eq!(stock_status(&flags, Some(&low)), StockStatus::LowStock);
        assert_eq!(stock_status(&flags, None), StockStatus::OutOfStock);
        flags.is_quote_only = true;
        assert_eq!(stock_status(&flags, Some(&low)), StockStatus::QuoteOnly);
        flags.is_suspended = true;
        assert_eq!(stock_status(&flags, Some(&low)), StockStatus::Suspended);
        flags.is_active = false;
        assert_eq!(stock_status(&flags, Some(&low)), StockStatus::Inactive);
    }

    #[test]
    fn variation_lifecycle_toggles_price_varies() {
        let mut p = valve();
        let id = p.add_variation(Uuid::new_v4(), " 65mm ", None, Some(""), Some(dec!(99))).unwrap().id;
        assert!(p.price_varies());
        assert_eq!(p.variations()[0].label, "65mm");
        assert_eq!(p.variations()[0].sku, None);
        assert_eq!(p.add_variation(Uuid::new_v4(), "65mm", None, None, None).unwrap_err(), ProductError::DuplicateSize("65mm".into()));
        p.remove_variation(id).unwrap();
        assert!(!p.price_varies());
        assert_eq!(p.take_events().len(), 2);
    }

    #[test]
    fn margin_calculation() {
        assert_eq!(margin_percent(Some(dec!(60)), Some(dec!(100))), Some(dec!(40)));
        assert_eq!(margin_percent(None, Some(dec!(100))), None);
        assert_eq!(margin_percent(Some(dec!(0)), Some(dec!(100))), None);
        assert_eq!(margin_band(dec!(19.9)), MarginBand::Low);
        assert_eq!(margin_band(dec!(25)), MarginBand::Medium);
        assert_eq!(margin_band(dec!(30)), MarginBand::High);
    }

    #[test]
    fn invalid_promotion_rejected() {
        let now = Utc::now();
        let mut p = valve();
        assert_eq!(p.set_promotion(Promotion::new(dec!(0), None, None, now)), Err(ProductError::InvalidPromotion));
        assert_eq!(p.set_promotion(Promotion::new(dec!(5), Some(now), Some(now), now)), Err(ProductError::InvalidPromotion));
        assert!(p.set_promotion(Promotion::new(dec!(5), None, None, now)).is_ok());
        assert!(p.promotion().unwrap().id.starts_with("PROMO-"));
    }
}
