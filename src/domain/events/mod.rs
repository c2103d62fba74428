//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Quote(QuoteEvent),
}

impl DomainEvent {
    /// Subject suffix used when the event is published.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::VariationAdded { .. }) => "product.variation_added",
            Self::Product(ProductEvent::VariationRemoved { .. }) => "product.variation_removed",
            Self::Product(ProductEvent::PromotionSet { .. }) => "product.promotion_set",
            Self::Product(ProductEvent::PromotionCleared { .. }) => "product.promotion_cleared",
            Self::Quote(QuoteEvent::Submitted { .. }) => "quote.submitted",
            Self::Quote(QuoteEvent::Reviewed { .. }) => "quote.reviewed",
            Self::Quote(QuoteEvent::DocumentGenerated { .. }) => "quote.document_generated",
            Self::Quote(QuoteEvent::Forwarded { .. }) => "quote.forwarded",
            Self::Quote(QuoteEvent::Deleted { .. }) => "quote.deleted",
            Self::Quote(QuoteEvent::Restored { .. }) => "quote.restored",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductEvent {
    VariationAdded { product_id: Uuid, size: String },
    VariationRemoved { product_id: Uuid, size: String },
    PromotionSet { product_id: Uuid, promotion_id: String, price: Decimal },
    PromotionCleared { product_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteEvent {
    Submitted { quote_id: Uuid, quote_number: String, total: Decimal },
    Reviewed { quote_id: Uuid },
    DocumentGenerated { quote_id: Uuid, version: i32 },
    Forwarded { quote_id: Uuid, email: String },
    Deleted { quote_id: Uuid, deleted_by: Option<String> },
    Restored { quote_id: Uuid },
}
