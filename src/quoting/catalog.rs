//! Catalogue lookups for pricing quote lines.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::catalog::{hydrate, ProductRow, PRODUCT_SELECT};
use crate::domain::aggregates::cart::{CartItem, CartVariation};
use crate::domain::aggregates::Product;
use crate::Result;

#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub product: Product,
    pub brand: String,
    pub category: String,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Active products among `ids`. Unknown and inactive ids are left out.
    async fn active_products(&self, ids: &[Uuid]) -> Result<Vec<CatalogEntry>>;
}

pub struct PgProductCatalog {
    db: PgPool,
}

impl PgProductCatalog {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn active_products(&self, ids: &[Uuid]) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = ANY($1) AND p.is_active"))
            .bind(ids.to_vec()).fetch_all(&self.db).await?;
        Ok(hydrate(&self.db, rows).await?
            .into_iter()
            .map(|cp| CatalogEntry {
                brand: cp.row.brand_name.unwrap_or_default(),
                category: cp.row.category_name.unwrap_or_default(),
                product: cp.product,
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryProductCatalog {
    entries: Mutex<HashMap<Uuid, CatalogEntry>>,
}

impl MemoryProductCatalog {
    pub async fn insert(&self, product: Product, brand: &str, category: &str) {
        let entry = CatalogEntry { brand: brand.to_string(), category: category.to_string(), product };
        self.entries.lock().await.insert(entry.product.id(), entry);
    }
}

#[async_trait]
impl ProductCatalog for MemoryProductCatalog {
    async fn active_products(&self, ids: &[Uuid]) -> Result<Vec<CatalogEntry>> {
        let entries = self.entries.lock().await;
        Ok(ids.iter().filter_map(|id| entries.get(id)).filter(|e| e.product.flags().is_active).cloned().collect())
    }
}

/// A line as the customer asked for it. It carries no price; prices come from the catalogue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestedLine {
    pub product_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub brand: String,
    pub category: String,
    pub size: Option<String>,
    pub size_label: Option<String>,
    pub variation_sku: Option<String>,
    pub quantity: u32,
    pub material_test_cert: bool,
    pub lead_time: Option<String>,
}

impl RequestedLine {
    /// Snapshot of the catalogue product, or a POA line when the product is not on sale.
    pub fn price(self, entry: Option<&CatalogEntry>, at: DateTime<Utc>) -> Result<CartItem> {
        let Some(entry) = entry else { return Ok(self.unpriced()) };
        let mut item = CartItem::from_product(&entry.product, &entry.brand, &entry.category, self.size.as_deref(), self.quantity, at)?;
        item.material_test_cert = self.material_test_cert;
        if item.lead_time.is_none() { item.lead_time = self.lead_time; }
        Ok(item)
    }

    fn unpriced(self) -> CartItem {
        let sku = self.sku;
        let variation = self.size.map(|size| CartVariation {
            size_label: self.size_label.unwrap_or_else(|| size.clone()),
            sku: self.variation_sku.or_else(|| sku.clone()).unwrap_or_default(),
            unit_price: None,
            size,
        });
        CartItem {
            id: Uuid::new_v4(),
            product_id: self.product_id,
            name: self.name,
            brand: self.brand,
            category: self.category,
            base_price: None,
            base_sku: sku,
            price_varies: variation.is_some(),
            variation,
            quantity: self.quantity,
            material_test_cert: self.material_test_cert,
            lead_time: self.lead_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::{Promotion, StockLevel, Variation, VariationSource};
    use crate::domain::aggregates::{CartError, ProductError};
    use crate::domain::value_objects::{Money, Sku};
    use crate::StorefrontError;
    use rust_decimal_macros::dec;

    fn line(product_id: Uuid, size: Option<&str>) -> RequestedLine {
        RequestedLine {
            product_id, name: "Gate Valve".into(), sku: Some("GV-1".into()), brand: "Bermad".into(), category: "Valves".into(),
            size: size.map(str::to_string), size_label: None, variation_sku: None, quantity: 2, material_test_cert: true,
            lead_time: Some("2 weeks".into()),
        }
    }

    fn entry(product: Product) -> CatalogEntry { CatalogEntry { product, brand: "Bermad".into(), category: "Valves".into() } }

    #[test]
    fn catalogue_prices_replace_the_request() {
        let now = Utc::now();
        let promo = Promotion::new(dec!(95), None, None, now - chrono::Duration::hours(1));
        let product = Product::new(Uuid::new_v4(), Sku::new("GV-1").unwrap(), "Gate Valve")
            .with_base_price(Some(Money::aud(dec!(120))))
            .with_promotion(Some(promo));
        let item = line(product.id(), None).price(Some(&entry(product)), now).unwrap();
        assert_eq!(item.unit_price(), Some(dec!(95)));
        assert!(item.material_test_cert);
        assert_eq!(item.lead_time.as_deref(), Some("2 weeks"));
    }

    #[test]
    fn sized_lines_need_a_catalogue_size() {
        let v = Variation {
            id: Uuid::new_v4(), size: "DN100".into(), label: "DN100".into(), sku: Some("BFV-DN100".into()), price: Some(dec!(300)),
            source: VariationSource::Manual, display_order: 0, stock: Some(StockLevel::default()),
        };
        let product = Product::new(Uuid::new_v4(), Sku::new("BFV").unwrap(), "Butterfly Valve").with_price_varies(true).with_variations(vec![v]);
        let e = entry(product);
        let item = line(e.product.id(), Some("DN100")).price(Some(&e), Utc::now()).unwrap();
        assert_eq!((item.sku(), item.unit_price()), ("BFV-DN100", Some(dec!(300))));
        let bad = line(e.product.id(), Some("DN999")).price(Some(&e), Utc::now());
        assert!(matches!(bad, Err(StorefrontError::Cart(CartError::Product(ProductError::InvalidSize(s)))) if s == "DN999"));
    }

    #[test]
    fn unknown_products_are_priced_on_application() {
        let item = line(Uuid::new_v4(), Some("50mm")).price(None, Utc::now()).unwrap();
        assert_eq!(item.unit_price(), None);
        assert!(item.price_varies);
        assert_eq!(item.sku(), "GV-1");
        assert_eq!(item.size_label(), Some("50mm"));
    }

    #[tokio::test]
    async fn memory_catalogue_skips_inactive_products() {
        let catalog = MemoryProductCatalog::default();
        let live = Product::new(Uuid::new_v4(), Sku::new("A").unwrap(), "Live");
        let mut flags = live.flags().clone();
        flags.is_active = false;
        let retired = Product::new(Uuid::new_v4(), Sku::new("B").unwrap(), "Retired").with_flags(flags);
        let ids = [live.id(), retired.id(), Uuid::new_v4()];
        catalog.insert(live, "", "").await;
        catalog.insert(retired, "", "").await;
        let found = catalog.active_products(&ids).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].product.name(), "Live");
    }
}
