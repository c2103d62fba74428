//! Quote cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::product::{Product, ProductError};

/// Fee charged per line that asks for a material test certificate.
pub const MATERIAL_CERT_FEE: Decimal = dec!(350);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DiscountTier {
    pub min_quantity: u32,
    pub percentage: u32,
    pub label: &'static str,
}

/// Highest threshold first.
pub const DISCOUNT_TIERS: [DiscountTier; 3] = [
    DiscountTier { min_quantity: 10, percentage: 15, label: "10+ items" },
    DiscountTier { min_quantity: 5, percentage: 10, label: "5+ items" },
    DiscountTier { min_quantity: 2, percentage: 5, label: "2+ items" },
];

pub fn discount_tier(total_quantity: u32) -> Option<&'static DiscountTier> {
    DISCOUNT_TIERS.iter().find(|t| total_quantity >= t.min_quantity)
}

pub fn discount_percentage(total_quantity: u32) -> u32 {
    discount_tier(total_quantity).map_or(0, |t| t.percentage)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartVariation {
    pub size: String,
    pub size_label: String,
    pub sku: String,
    pub unit_price: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub base_price: Option<Decimal>,
    pub base_sku: Option<String>,
    pub price_varies: bool,
    pub variation: Option<CartVariation>,
    pub quantity: u32,
    pub material_test_cert: bool,
    pub lead_time: Option<String>,
}

impl CartItem {
    /// Snapshot a product into a cart line. Sized products need a valid size.
    pub fn from_product(product: &Product, brand: &str, category: &str, size: Option<&str>, quantity: u32, at: DateTime<Utc>) -> Result<Self, CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        let (variation, base_price, base_sku) = if product.price_varies() && !product.variations().is_empty() {
            let size = size.ok_or(ProductError::SizeRequired)?;
            let v = product.variation_by_size(size).ok_or_else(|| ProductError::InvalidSize(size.to_string()))?;
            let variation = CartVariation {
                size: v.size.clone(),
                size_label: v.label.clone(),
                sku: v.sku.clone().unwrap_or_else(|| product.sku().to_string()),
                unit_price: v.price,
            };
            (Some(variation), None, Some(product.sku().to_string()))
        } else {
            (None, product.effective_base_price(at), Some(product.sku().to_string()))
        };
        Ok(Self {
            id: Uuid::new_v4(), product_id: product.id(), name: product.name().to_string(),
            brand: brand.to_string(), category: category.to_string(), base_price, base_sku,
            price_varies: product.price_varies(), variation, quantity, material_test_cert: false,
            lead_time: product.lead_time().map(str::to_string),
        })
    }

    pub fn unit_price(&self) -> Option<Decimal> {
        match &self.variation { Some(v) => v.unit_price, None => self.base_price }
    }

    pub fn sku(&self) -> &str {
        match &self.variation { Some(v) => &v.sku, None => self.base_sku.as_deref().unwrap_or_default() }
    }

    pub fn size_label(&self) -> Option<&str> { self.variation.as_ref().map(|v| v.size_label.as_str()) }

    pub fn subtotal(&self) -> Option<Decimal> { self.unit_price().map(|p| p * Decimal::from(self.quantity)) }

    /// Line subtotal after the tier for the whole cart's quantity.
    pub fn discounted_subtotal(&self, cart_quantity: u32) -> Option<Decimal> {
        let pct = Decimal::from(discount_percentage(cart_quantity));
        self.subtotal().map(|s| s - s * pct / Decimal::ONE_HUNDRED)
    }

    pub fn savings(&self, cart_quantity: u32) -> Decimal {
        match (self.subtotal(), self.discounted_subtotal(cart_quantity)) {
            (Some(full), Some(discounted)) => full - discounted,
            _ => Decimal::ZERO,
        }
    }

    fn same_line(&self, other: &CartItem) -> bool {
        self.product_id == other.product_id && self.variation.as_ref().map(|v| &v.size) == other.variation.as_ref().map(|v| &v.size)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: u32,
    pub list_total: Decimal,
    pub savings: Decimal,
    pub discounted_total: Decimal,
    pub discount_percentage: u32,
    pub has_unpriced_items: bool,
    pub cert_count: u32,
    pub cert_fee: Decimal,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuoteCart {
    items: Vec<CartItem>,
}

impl QuoteCart {
    pub fn new() -> Self { Self::default() }
    pub fn from_items(items: Vec<CartItem>) -> Self { Self { items } }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn total_quantity(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    pub fn add_item(&mut self, item: CartItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.same_line(&item)) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            existing.material_test_cert |= item.material_test_cert;
        } else {
            self.items.push(item);
        }
    }

    pub fn update_quantity(&mut self, item_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.id == item_id).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 { self.items.retain(|i| i.id != item_id); } else { item.quantity = quantity; }
        Ok(())
    }

    pub fn toggle_material_cert(&mut self, item_id: Uuid) -> Result<bool, CartError> {
        let item = self.items.iter_mut().find(|i| i.id == item_id).ok_or(CartError::ItemNotFound)?;
        item.material_test_cert = !item.material_test_cert;
        Ok(item.material_test_cert)
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.id != item_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); }

    pub fn totals(&self) -> CartTotals {
        let total_quantity = self.total_quantity();
        let priced = self.items.iter().filter(|i| i.unit_price().is_some());
        let (list_total, discounted_total, savings) = priced.fold((Decimal::ZERO, Decimal::ZERO, Decimal::ZERO), |(l, d, s), i| {
            (l + i.subtotal().unwrap_or_default(), d + i.discounted_subtotal(total_quantity).unwrap_or_default(), s + i.savings(total_quantity))
        });
        let cert_count = self.items.iter().filter(|i| i.material_test_cert).count() as u32;
        CartTotals {
            item_count: self.items.len(),
            total_quantity,
            list_total,
            savings,
            discounted_total,
            discount_percentage: discount_percentage(total_quantity),
            has_unpriced_items: self.items.iter().any(|i| i.unit_price().is_none()),
            cert_count,
            cert_fee: MATERIAL_CERT_FEE * Decimal::from(cert_count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Item not found")]
    ItemNotFound,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error(transparent)]
    Product(#[from] ProductError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::{StockLevel, Variation, VariationSource};
    use crate::domain::value_objects::{Money, Sku};

    fn coupling() -> Product {
        Product::new(Uuid::new_v4(), Sku::new("PC-1").unwrap(), "Pipe Coupling").with_base_price(Some(Money::aud(dec!(100))))
    }

    fn strainer() -> Product {
        let v = |size: &str, price| Variation {
            id: Uuid::new_v4(), size: size.into(), label: format!("{size} Pipe OD"), sku: Some(format!("YS-{size}")),
            price, source: VariationSource::Neto, display_order: 0, stock: Some(StockLevel::default()),
        };
        Product::new(Uuid::new_v4(), Sku::new("YS").unwrap(), "Y Strainer")
            .with_price_varies(true)
            .with_variations(vec![v("50mm", Some(dec!(200))), v("300mm", None)])
    }

    #[test]
    fn sized_products_snapshot_the_variation() {
        let item = CartItem::from_product(&strainer(), "Defender", "Strainers", Some("50mm"), 1, Utc::now()).unwrap();
        assert_eq!(item.sku(), "YS-50mm");
        assert_eq!(item.size_label(), Some("50mm Pipe OD"));
        assert_eq!(item.unit_price(), Some(dec!(200)));
        let err = CartItem::from_product(&strainer(), "Defender", "Strainers", None, 1, Utc::now()).unwrap_err();
        assert_eq!(err, CartError::Product(ProductError::SizeRequired));
    }

    #[test]
    fn discount_tiers_use_cart_quantity() {
        assert_eq!(discount_percentage(1), 0);
        assert_eq!(discount_percentage(2), 5);
        assert_eq!(discount_percentage(9), 10);
        assert_eq!(discount_percentage(10), 15);

        let mut cart = QuoteCart::new();
        let a = CartItem::from_product(&coupling(), "Straub", "Couplings", None, 3, Utc::now()).unwrap();
        let b = CartItem::from_product(&strainer(), "Defender", "Strainers", Some("50mm"), 2, Utc::now()).unwrap();
        cart.add_item(a);
        cart.add_item(b);
        let totals = cart.totals();
        assert_eq!(totals.total_quantity, 5);
        assert_eq!(totals.discount_percentage, 10);
        assert_eq!(totals.list_total, dec!(700));
        assert_eq!(totals.savings, dec!(70));
        assert_eq!(totals.discounted_total, dec!(630));
    }

    #[test]
    fn unpriced_lines_and_cert_fees() {
        let mut cart = QuoteCart::new();
        let poa = CartItem::from_product(&strainer(), "Defender", "Strainers", Some("300mm"), 1, Utc::now()).unwrap();
        let poa_id = poa.id;
        cart.add_item(poa);
        assert!(cart.toggle_material_cert(poa_id).unwrap());
        let totals = cart.totals();
        assert!(totals.has_unpriced_items);
        assert_eq!(totals.list_total, Decimal::ZERO);
        assert_eq!(totals.cert_count, 1);
        assert_eq!(totals.cert_fee, dec!(350));
    }

    #[test]
    fn merges_same_line_and_updates_quantity() {
        let mut cart = QuoteCart::new();
        let product = coupling();
        let first = CartItem::from_product(&product, "Straub", "Couplings", None, 1, Utc::now()).unwrap();
        let id = first.id;
        cart.add_item(first);
        let mut again = CartItem::from_product(&product, "Straub", "Couplings", None, 2, Utc::now()).unwrap();
        again.material_test_cert = true;
        cart.add_item(again);
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert!(cart.items()[0].material_test_cert);
        cart.add_item(CartItem::from_product(&product, "Straub", "Couplings", None, 1, Utc::now()).unwrap());
        assert!(cart.items()[0].material_test_cert);

        cart.update_quantity(id, 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.remove_item(id), Err(CartError::ItemNotFound));
    }

    #[test]
    fn different_sizes_stay_separate_lines() {
        let mut cart = QuoteCart::new();
        let product = strainer();
        cart.add_item(CartItem::from_product(&product, "Defender", "Strainers", Some("50mm"), 1, Utc::now()).unwrap());
        cart.add_item(CartItem::from_product(&product, "Defender", "Strainers", Some("300mm"), 1, Utc::now()).unwrap());
        cart.add_item(CartItem::from_product(&product, "Defender", "Strainers", Some("50mm"), 4, Utc::now()).unwrap());
        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.items().iter().map(|i| i.quantity).collect::<Vec<_>>(), vec![5, 1]);
    }
}
