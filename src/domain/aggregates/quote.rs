//! Quote Aggregate
//!
//! A quote is the persisted form of a cart: customer and delivery details,
//! snapshotted line items and the pricing worked out when it was submitted.
//! Staff review it, may override line prices, and forward the final PDF to
//! the customer.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rand::RngCore;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::cart::{discount_percentage, CartItem, QuoteCart, MATERIAL_CERT_FEE};
use crate::domain::events::{DomainEvent, QuoteEvent};
use crate::domain::shipping::{DeliveryClassification, DeliveryZone};
use crate::domain::value_objects::round_cents;

pub const GST_RATE: Decimal = dec!(0.10);

/// Longest last. Matching is a case-insensitive substring test, first hit wins.
pub const LEAD_TIME_ORDER: [&str; 9] = [
    "In Stock", "1 week", "1-2 weeks", "2-3 weeks", "2-4 weeks", "3-4 weeks", "4-6 weeks", "6-8 weeks", "8+ weeks",
];

/// Index into [`LEAD_TIME_ORDER`] from which a lead time counts as long.
pub const LONG_LEAD_TIME_RANK: usize = 6;

pub fn lead_time_rank(lead_time: &str) -> Option<usize> {
    let lower = lead_time.to_lowercase();
    LEAD_TIME_ORDER.iter().position(|lt| lower.contains(&lt.to_lowercase()))
}

pub fn is_long_lead_time(lead_time: &str) -> bool {
    lead_time_rank(lead_time).is_some_and(|r| r >= LONG_LEAD_TIME_RANK)
}

/// The longest recognised lead time across the items.
pub fn overall_lead_time<'a>(lead_times: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    lead_times
        .into_iter()
        .filter_map(|lt| lead_time_rank(lt).map(|r| (r, lt)))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, lt)| lt)
}

/// Quotes stay valid until the last day of the month after they were raised.
pub fn valid_until(created_at: DateTime<Utc>) -> NaiveDate {
    let (year, month) = (created_at.year(), created_at.month());
    let (y2, m2) = if month >= 11 { (year + 1, month - 10) } else { (year, month + 2) };
    NaiveDate::from_ymd_opt(y2, m2, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or_else(|| created_at.date_naive())
}

/// `Q-YYYYMMDD-NNNN`, where the sequence restarts every day.
pub fn format_quote_number(date: NaiveDate, sequence: u32) -> String {
    format!("Q-{}-{:04}", date.format("%Y%m%d"), sequence)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus { #[default] Draft, Submitted, Reviewed, Forwarded }

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Submitted => "submitted", Self::Reviewed => "reviewed", Self::Forwarded => "forwarded" }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft), "submitted" => Some(Self::Submitted),
            "reviewed" => Some(Self::Reviewed), "forwarded" => Some(Self::Forwarded),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub suburb: String,
    pub state: String,
    pub postcode: String,
}

impl Address {
    /// Two-line form used on documents.
    pub fn formatted(&self) -> String { format!("{}\n{} {} {}", self.street, self.suburb, self.state, self.postcode) }
    pub fn one_line(&self) -> String { format!("{} {}", self.street, self.suburb) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub sku: String,
    pub variation_sku: Option<String>,
    pub name: String,
    pub brand: String,
    pub size_label: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Decimal>,
    pub line_total: Option<Decimal>,
    pub lead_time: Option<String>,
    pub material_test_cert: bool,
    pub quoted_price: Option<Decimal>,
    pub quoted_notes: Option<String>,
}

impl QuoteItem {
    pub fn from_cart_item(item: &CartItem) -> Self {
        let (sku, variation_sku) = match &item.variation {
            Some(v) => (item.base_sku.clone().unwrap_or_else(|| v.sku.clone()), Some(v.sku.clone())),
            None => (item.sku().to_string(), None),
        };
        Self {
            id: Uuid::now_v7(), product_id: Some(item.product_id), sku, variation_sku,
            name: item.name.clone(), brand: item.brand.clone(), size_label: item.size_label().map(str::to_string),
            quantity: item.quantity, unit_price: item.unit_price(), line_total: item.subtotal(),
            lead_time: item.lead_time.clone(), material_test_cert: item.material_test_cert,
            quoted_price: None, quoted_notes: None,
        }
    }

    /// SKU shown to the customer: the size's own SKU when it has one.
    pub fn display_sku(&self) -> &str { self.variation_sku.as_deref().unwrap_or(&self.sku) }

    /// Staff overrides replace the list price.
    pub fn effective_unit_price(&self) -> Option<Decimal> { self.quoted_price.or(self.unit_price) }

    pub fn effective_line_total(&self) -> Option<Decimal> {
        self.effective_unit_price().map(|p| p * Decimal::from(self.quantity))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePricing {
    pub subtotal: Decimal,
    pub savings: Decimal,
    pub discount_percentage: u32,
    pub cert_fee: Decimal,
    pub shipping_cost: Decimal,
    pub net: Decimal,
    pub gst: Decimal,
    pub total: Decimal,
    pub has_unpriced_items: bool,
}

impl QuotePricing {
    /// `net = subtotal - savings + cert_fee + shipping`, GST on top.
    pub fn compute(subtotal: Decimal, savings: Decimal, cert_fee: Decimal, shipping_cost: Decimal, has_unpriced_items: bool) -> Self {
        let subtotal = round_cents(subtotal);
        let savings = round_cents(savings);
        let net = subtotal - savings + cert_fee + shipping_cost;
        let gst = round_cents(net * GST_RATE);
        let discount_percentage = if subtotal.is_zero() {
            0
        } else {
            (savings / subtotal * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_u32()
                .unwrap_or(0)
        };
        Self {
            subtotal, savings, discount_percentage, cert_fee: round_cents(cert_fee),
            shipping_cost: round_cents(shipping_cost), net: round_cents(net), gst, total: round_cents(net) + gst,
            has_unpriced_items,
        }
    }

    pub fn from_cart(cart: &QuoteCart, shipping_cost: Decimal) -> Self {
        let totals = cart.totals();
        Self::compute(totals.list_total, totals.savings, totals.cert_fee, shipping_cost, totals.has_unpriced_items)
    }

    /// Recomputes from stored lines. Quantity discounts only apply to lines
    /// still at list price; staff-quoted prices are final.
    pub fn from_items(items: &[QuoteItem], shipping_cost: Decimal) -> Self {
        let quantity: u32 = items.iter().map(|i| i.quantity).sum();
        let pct = Decimal::from(discount_percentage(quantity));
        let mut subtotal = Decimal::ZERO;
        let mut savings = Decimal::ZERO;
        for item in items {
            let Some(line) = item.effective_line_total() else { continue };
            subtotal += line;
            if item.quoted_price.is_none() { savings += line * pct / Decimal::ONE_HUNDRED; }
        }
        let certs = items.iter().filter(|i| i.material_test_cert).count() as u32;
        let unpriced = items.iter().any(|i| i.effective_unit_price().is_none());
        Self::compute(subtotal, savings, MATERIAL_CERT_FEE * Decimal::from(certs), shipping_cost, unpriced)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApprovalToken {
    /// 32 random bytes, URL-safe base64 without padding.
    pub fn generate(valid_days: i64, now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { token: URL_SAFE_NO_PAD.encode(bytes), expires_at: Some(now + Duration::days(valid_days)) }
    }

    /// A token without an expiry never approves anything.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expires_at.map_or(true, |exp| now > exp) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfRecord {
    pub version: i32,
    pub path: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
}

pub fn document_path(quote_number: &str, version: i32) -> String {
    format!("quotes/{quote_number}/quote-v{version}.pdf")
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deletion {
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Quote {
    pub(crate) id: Uuid,
    pub(crate) quote_number: String,
    pub(crate) status: QuoteStatus,
    pub(crate) customer: Customer,
    pub(crate) delivery: Address,
    pub(crate) billing: Option<Address>,
    pub(crate) delivery_zone: DeliveryZone,
    pub(crate) notes: Option<String>,
    pub(crate) items: Vec<QuoteItem>,
    pub(crate) pricing: QuotePricing,
    pub(crate) shipping_notes: Option<String>,
    pub(crate) internal_notes: Option<String>,
    #[serde(skip)]
    pub(crate) approval: Option<ApprovalToken>,
    pub(crate) pdf: PdfRecord,
    pub(crate) deletion: Deletion,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) reviewed_at: Option<DateTime<Utc>>,
    pub(crate) forwarded_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

impl Quote {
    pub fn draft(quote_number: String, customer: Customer, delivery: Address, classification: &DeliveryClassification, cart: &QuoteCart, now: DateTime<Utc>) -> Result<Self, QuoteError> {
        if cart.is_empty() { return Err(QuoteError::NoItems); }
        Ok(Self {
            id: Uuid::now_v7(), quote_number, status: QuoteStatus::Draft, customer, delivery, billing: None,
            delivery_zone: classification.zone, notes: None,
            items: cart.items().iter().map(QuoteItem::from_cart_item).collect(),
            pricing: QuotePricing::from_cart(cart, Decimal::ZERO),
            shipping_notes: None, internal_notes: None, approval: None,
            pdf: PdfRecord::default(), deletion: Deletion::default(),
            created_at: now, updated_at: now, reviewed_at: None, forwarded_at: None, events: vec![],
        })
    }

    pub fn with_billing(mut self, billing: Option<Address>) -> Self { self.billing = billing; self }
    pub fn with_notes(mut self, notes: Option<String>) -> Self { self.notes = notes.filter(|n| !n.trim().is_empty()); self }

    pub fn id(&self) -> Uuid { self.id }
    pub fn quote_number(&self) -> &str { &self.quote_number }
    pub fn status(&self) -> QuoteStatus { self.status }
    pub fn customer(&self) -> &Customer { &self.customer }
    pub fn delivery(&self) -> &Address { &self.delivery }
    pub fn billing(&self) -> Option<&Address> { self.billing.as_ref() }
    pub fn delivery_zone(&self) -> DeliveryZone { self.delivery_zone }
    pub fn notes(&self) -> Option<&str> { self.notes.as_deref() }
    pub fn items(&self) -> &[QuoteItem] { &self.items }
    pub fn pricing(&self) -> &QuotePricing { &self.pricing }
    pub fn shipping_notes(&self) -> Option<&str> { self.shipping_notes.as_deref() }
    pub fn internal_notes(&self) -> Option<&str> { self.internal_notes.as_deref() }
    pub fn approval(&self) -> Option<&ApprovalToken> { self.approval.as_ref() }
    pub fn pdf(&self) -> &PdfRecord { &self.pdf }
    pub fn deletion(&self) -> &Deletion { &self.deletion }
    pub fn is_deleted(&self) -> bool { self.deletion.is_deleted }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> { self.reviewed_at }
    pub fn forwarded_at(&self) -> Option<DateTime<Utc>> { self.forwarded_at }
    pub fn valid_until(&self) -> NaiveDate { valid_until(self.created_at) }
    pub fn total_quantity(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }
    pub fn overall_lead_time(&self) -> Option<&str> { overall_lead_time(self.items.iter().filter_map(|i| i.lead_time.as_deref())) }
    pub fn has_quoted_prices(&self) -> bool { self.items.iter().any(|i| i.quoted_price.is_some()) }

    pub fn submit(&mut self, approval: ApprovalToken, now: DateTime<Utc>) -> Result<(), QuoteError> {
        self.transition(QuoteStatus::Draft, QuoteStatus::Submitted)?;
        self.approval = Some(approval);
        self.updated_at = now;
        let total = self.pricing.total;
        self.raise_event(DomainEvent::Quote(QuoteEvent::Submitted { quote_id: self.id, quote_number: self.quote_number.clone(), total }));
        Ok(())
    }

    /// Re-reviewing keeps the first review stamp.
    pub fn review(&mut self, now: DateTime<Utc>) -> Result<(), QuoteError> {
        match self.status {
            QuoteStatus::Reviewed => return Ok(()),
            QuoteStatus::Submitted => {}
            from => return Err(QuoteError::InvalidTransition { from, to: QuoteStatus::Reviewed }),
        }
        self.status = QuoteStatus::Reviewed;
        self.reviewed_at = Some(now);
        self.updated_at = now;
        self.raise_event(DomainEvent::Quote(QuoteEvent::Reviewed { quote_id: self.id }));
        Ok(())
    }

    /// Checks an approval token against this quote without changing it.
    pub fn check_approval(&self, now: DateTime<Utc>) -> Result<(), QuoteError> {
        if self.approval.as_ref().map_or(true, |t| t.is_expired(now)) { return Err(QuoteError::ApprovalExpired); }
        if self.status == QuoteStatus::Forwarded { return Err(QuoteError::AlreadyForwarded); }
        Ok(())
    }

    pub fn forward(&mut self, now: DateTime<Utc>) -> Result<(), QuoteError> {
        match self.status {
            QuoteStatus::Forwarded => return Err(QuoteError::AlreadyForwarded),
            QuoteStatus::Draft => return Err(QuoteError::InvalidTransition { from: QuoteStatus::Draft, to: QuoteStatus::Forwarded }),
            QuoteStatus::Submitted | QuoteStatus::Reviewed => {}
        }
        self.status = QuoteStatus::Forwarded;
        self.forwarded_at = Some(now);
        self.updated_at = now;
        let email = self.customer.email.clone();
        self.raise_event(DomainEvent::Quote(QuoteEvent::Forwarded { quote_id: self.id, email }));
        Ok(())
    }

    pub fn set_shipping(&mut self, cost: Option<Decimal>, notes: Option<String>, now: DateTime<Utc>) -> Result<(), QuoteError> {
        if let Some(c) = cost {
            if c < Decimal::ZERO { return Err(QuoteError::InvalidAmount); }
            self.pricing = QuotePricing::from_items(&self.items, c);
        }
        if notes.is_some() { self.shipping_notes = notes.filter(|n| !n.is_empty()); }
        self.updated_at = now;
        Ok(())
    }

    pub fn set_internal_notes(&mut self, notes: Option<String>, now: DateTime<Utc>) {
        self.internal_notes = notes.filter(|n| !n.is_empty());
        self.updated_at = now;
    }

    /// Sets or clears a staff price on one line and reprices the quote.
    pub fn set_item_price(&mut self, item_id: Uuid, quoted_price: Option<Decimal>, quoted_notes: Option<String>, now: DateTime<Utc>) -> Result<(), QuoteError> {
        if quoted_price.is_some_and(|p| p < Decimal::ZERO) { return Err(QuoteError::InvalidAmount); }
        let item = self.items.iter_mut().find(|i| i.id == item_id).ok_or(QuoteError::ItemNotFound)?;
        item.quoted_price = quoted_price;
        item.quoted_notes = quoted_notes.filter(|n| !n.is_empty());
        self.pricing = QuotePricing::from_items(&self.items, self.pricing.shipping_cost);
        self.updated_at = now;
        Ok(())
    }

    pub fn next_document_version(&self) -> i32 { self.pdf.version + 1 }

    pub fn record_document(&mut self, version: i32, path: String, now: DateTime<Utc>) {
        self.pdf = PdfRecord { version, path: Some(path), generated_at: Some(now) };
        self.updated_at = now;
        self.raise_event(DomainEvent::Quote(QuoteEvent::DocumentGenerated { quote_id: self.id, version }));
    }

    pub fn soft_delete(&mut self, deleted_by: Option<String>, now: DateTime<Utc>) -> Result<(), QuoteError> {
        if self.deletion.is_deleted { return Err(QuoteError::AlreadyDeleted); }
        self.deletion = Deletion { is_deleted: true, deleted_at: Some(now), deleted_by: deleted_by.clone() };
        self.updated_at = now;
        self.raise_event(DomainEvent::Quote(QuoteEvent::Deleted { quote_id: self.id, deleted_by }));
        Ok(())
    }

    /// Restoring keeps who deleted it and when.
    pub fn restore(&mut self, now: DateTime<Utc>) -> Result<(), QuoteError> {
        if !self.deletion.is_deleted { return Err(QuoteError::NotDeleted); }
        self.deletion.is_deleted = false;
        self.updated_at = now;
        self.raise_event(DomainEvent::Quote(QuoteEvent::Restored { quote_id: self.id }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }

    fn transition(&mut self, from: QuoteStatus, to: QuoteStatus) -> Result<(), QuoteError> {
        if self.status != from { return Err(QuoteError::InvalidTransition { from: self.status, to }); }
        self.status = to;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("Quote must contain at least one item")]
    NoItems,
    #[error("Cannot move quote from {} to {}", from.as_str(), to.as_str())]
    InvalidTransition { from: QuoteStatus, to: QuoteStatus },
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ApprovalExpired,
    #[error("Quote already sent to customer")]
    AlreadyForwarded,
    #[error("Quote is already deleted")]
    AlreadyDeleted,
    #[error("Quote is not deleted")]
    NotDeleted,
    #[error("Quote item not found")]
    ItemNotFound,
    #[error("Amounts cannot be negative")]
    InvalidAmount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::Product;
    use crate::domain::shipping::classify_delivery;
    use crate::domain::value_objects::{Money, Sku};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn cart(qty: u32, price: Decimal) -> QuoteCart {
        let product = Product::new(Uuid::new_v4(), Sku::new("GV-100").unwrap(), "Gate Valve")
            .with_base_price(Some(Money::aud(price)))
            .with_lead_time(Some("4-6 weeks".into()));
        let mut cart = QuoteCart::new();
        cart.add_item(CartItem::from_product(&product, "Bermad", "Valves", None, qty, Utc::now()).unwrap());
        cart
    }

    fn quote(now: DateTime<Utc>) -> Quote {
        let customer = Customer { name: "Jo Smith".into(), email: "jo@example.com".into(), phone: "0400 000 000".into(), company: None };
        let delivery = Address { street: "1 Main St".into(), suburb: "Perth".into(), state: "WA".into(), postcode: "6000".into() };
        Quote::draft("Q-20250310-0001".into(), customer, delivery, &classify_delivery("6000", None), &cart(5, dec!(100)), now).unwrap()
    }

    #[test]
    fn pricing_adds_gst_after_discount() {
        let pricing = QuotePricing::from_cart(&cart(5, dec!(100)), Decimal::ZERO);
        assert_eq!(pricing, QuotePricing {
            subtotal: dec!(500), savings: dec!(50), discount_percentage: 10, cert_fee: dec!(0),
            shipping_cost: dec!(0), net: dec!(450), gst: dec!(45.00), total: dec!(495.00), has_unpriced_items: false,
        });
    }

    #[test]
    fn gst_rounds_to_cents() {
        let p = QuotePricing::compute(dec!(33.33), dec!(0), dec!(0), dec!(0), false);
        assert_eq!(p.gst, dec!(3.33));
        assert_eq!(p.total, dec!(36.66));
    }

    #[test]
    fn validity_is_end_of_next_month() {
        let at = |y, m, d| Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap();
        assert_eq!(valid_until(at(2025, 1, 31)), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(valid_until(at(2025, 11, 5)), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert_eq!(valid_until(at(2025, 12, 5)), NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
    }

    #[test]
    fn quote_numbers_are_zero_padded() {
        assert_eq!(format_quote_number(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), 7), "Q-20250310-0007");
    }

    #[test]
    fn lead_times_rank_by_substring() {
        assert_eq!(lead_time_rank("in stock - Perth"), Some(0));
        assert_eq!(lead_time_rank("Approx 6-8 weeks FRO"), Some(7));
        assert_eq!(lead_time_rank("call us"), None);
        assert!(is_long_lead_time("4-6 weeks"));
        assert!(!is_long_lead_time("3-4 weeks"));
        assert_eq!(overall_lead_time(["1 week", "8+ weeks", "2-3 weeks", "ask"]), Some("8+ weeks"));
    }

    #[test]
    fn approval_tokens() {
        let now = Utc::now();
        let token = ApprovalToken::generate(7, now);
        assert_eq!(token.token.len(), 43);
        assert!(!token.is_expired(now + Duration::days(6)));
        assert!(token.is_expired(now + Duration::days(8)));
        assert!(ApprovalToken { token: "x".into(), expires_at: None }.is_expired(now));
    }

    #[test]
    fn lifecycle_and_forwarding() {
        let now = Utc::now();
        let mut q = quote(now);
        assert_eq!(q.forward(now), Err(QuoteError::InvalidTransition { from: QuoteStatus::Draft, to: QuoteStatus::Forwarded }));
        q.submit(ApprovalToken::generate(7, now), now).unwrap();
        q.check_approval(now).unwrap();
        q.review(now).unwrap();
        assert!(q.reviewed_at().is_some());
        q.forward(now).unwrap();
        assert_eq!(q.check_approval(now), Err(QuoteError::AlreadyForwarded));
        assert_eq!(q.forward(now), Err(QuoteError::AlreadyForwarded));
        assert_eq!(q.take_events().len(), 3);
    }

    #[test]
    fn staff_prices_reprice_the_quote() {
        let now = Utc::now();
        let mut q = quote(now);
        let id = q.items()[0].id;
        q.set_item_price(id, Some(dec!(90)), Some("matched competitor".into()), now).unwrap();
        assert_eq!(q.pricing().subtotal, dec!(450));
        assert_eq!(q.pricing().savings, dec!(0));
        q.set_shipping(Some(dec!(50)), Some("Toll freight".into()), now).unwrap();
        assert_eq!(q.pricing().net, dec!(500));
        assert_eq!(q.pricing().total, dec!(550.00));
        assert_eq!(q.set_item_price(Uuid::new_v4(), None, None, now), Err(QuoteError::ItemNotFound));
    }

    #[test]
    fn soft_delete_and_restore() {
        let now = Utc::now();
        let mut q = quote(now);
        assert_eq!(q.restore(now), Err(QuoteError::NotDeleted));
        q.soft_delete(Some("admin".into()), now).unwrap();
        assert_eq!(q.soft_delete(None, now), Err(QuoteError::AlreadyDeleted));
        q.restore(now).unwrap();
        assert!(!q.is_deleted());
        assert_eq!(q.deletion().deleted_by.as_deref(), Some("admin"));
    }

    #[test]
    fn documents_are_versioned() {
        let now = Utc::now();
        let mut q = quote(now);
        let v = q.next_document_version();
        q.record_document(v, document_path(q.quote_number(), v), now);
        assert_eq!(q.pdf().path.as_deref(), Some("quotes/Q-20250310-0001/quote-v1.pdf"));
        assert_eq!(q.next_document_version(), 2);
    }
}
