use axum::extract::Query;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::shipping::{classify_delivery, shipping_message, DeliveryClassification, ShippingMessage, SHIPPING_REGIONS};

#[derive(Debug, Deserialize)]
pub struct ClassifyParams {
    pub postcode: String,
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyResponse {
    #[serde(flatten)]
    pub classification: DeliveryClassification,
    pub shipping: ShippingMessage,
}

pub async fn classify(Query(p): Query<ClassifyParams>) -> Json<ClassifyResponse> {
    Json(ClassifyResponse {
        classification: classify_delivery(&p.postcode, p.address.as_deref()),
        shipping: shipping_message(&p.postcode),
    })
}

#[derive(Debug, Serialize)]
pub struct RegionView {
    pub name: &'static str,
    pub state: &'static str,
    /// Inclusive postcode ranges, formatted `6000-6199`.
    pub postcodes: Vec<String>,
}

pub fn regions() -> Vec<RegionView> {
    SHIPPING_REGIONS
        .iter()
        .map(|r| RegionView {
            name: r.name,
            state: r.state,
            postcodes: r.ranges.iter().map(|(start, end)| if start == end { format!("{start:04}") } else { format!("{start:04}-{end:04}") }).collect(),
        })
        .collect()
}

pub async fn list_regions() -> Json<Vec<RegionView>> { Json(regions()) }

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classify_combines_zone_and_message() {
        let Json(r) = classify(Query(ClassifyParams { postcode: "3000".into(), address: None })).await;
        assert_eq!(r.classification.region.as_deref(), Some("Melbourne"));
        assert!(r.shipping.is_free_shipping);
    }

    #[test]
    fn region_ranges_are_zero_padded() {
        let all = regions();
        let darwin = all.iter().find(|r| r.name == "Darwin").unwrap();
        assert_eq!(darwin.postcodes, ["0800-0899"]);
        let karratha = all.iter().find(|r| r.name == "Karratha").unwrap();
        assert_eq!(karratha.postcodes, ["6714"]);
    }
}
