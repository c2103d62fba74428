//! Exception flags that tell staff a quote needs more than a standard reply.

use serde::Serialize;

use crate::domain::aggregates::quote::{is_long_lead_time, QuoteItem};
use crate::domain::shipping::DeliveryZone;

/// Orders above this many units are flagged as large.
pub const LARGE_ORDER_QUANTITY: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteExceptionFlags {
    pub is_non_metro: bool,
    pub is_remote: bool,
    pub is_large_order: bool,
    pub has_long_lead_time: bool,
    /// `"<name> (<lead time>)"` per slow item.
    pub long_lead_time_items: Vec<String>,
    pub total_quantity: u32,
    pub delivery_zone: DeliveryZone,
}

impl QuoteExceptionFlags {
    pub fn is_standard(&self) -> bool { !self.is_non_metro && !self.is_large_order && !self.has_long_lead_time }
}

pub fn detect_exceptions(items: &[QuoteItem], zone: DeliveryZone) -> QuoteExceptionFlags {
    let total_quantity = items.iter().map(|i| i.quantity).sum();
    let long_lead_time_items: Vec<String> = items
        .iter()
        .filter_map(|i| i.lead_time.as_deref().filter(|lt| is_long_lead_time(lt)).map(|lt| format!("{} ({})", i.name, lt)))
        .collect();
    QuoteExceptionFlags {
        is_non_metro: zone != DeliveryZone::Metro,
        is_remote: zone == DeliveryZone::Remote,
        is_large_order: total_quantity > LARGE_ORDER_QUANTITY,
        has_long_lead_time: !long_lead_time_items.is_empty(),
        long_lead_time_items,
        total_quantity,
        delivery_zone: zone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(name: &str, quantity: u32, lead_time: Option<&str>) -> QuoteItem {
        QuoteItem {
            id: Uuid::new_v4(), product_id: None, sku: "SKU".into(), variation_sku: None, name: name.into(),
            brand: "Brand".into(), size_label: None, quantity, unit_price: None, line_total: None,
            lead_time: lead_time.map(str::to_string), material_test_cert: false, quoted_price: None, quoted_notes: None,
        }
    }

    #[test]
    fn standard_metro_quote_has_no_flags() {
        let flags = detect_exceptions(&[item("Valve", 10, Some("In Stock"))], DeliveryZone::Metro);
        assert!(flags.is_standard());
        assert!(!flags.is_large_order);
    }

    #[test]
    fn flags_remote_large_and_slow_orders() {
        let items = [item("Valve", 8, Some("6-8 weeks")), item("Gasket", 3, Some("2-3 weeks")), item("Clamp", 1, None)];
        let flags = detect_exceptions(&items, DeliveryZone::Remote);
        assert!(flags.is_remote && flags.is_non_metro);
        assert!(flags.is_large_order);
        assert_eq!(flags.total_quantity, 12);
        assert_eq!(flags.long_lead_time_items, vec!["Valve (6-8 weeks)".to_string()]);
    }
}
