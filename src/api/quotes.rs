use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::domain::aggregates::{Address, Customer, Quote};
use crate::quoting::{EmailPreview, FinalizeQuote, QuotePatch, QuoteRequest, QuoteSummary, RequestedLine, SentQuote, SubmittedQuote};
use crate::rate_limit::client_ip;
use crate::storage::StoredDocument;
use crate::{Result, StorefrontError};

// =============================================================================
// Public quote form
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[validate(length(min = 1, max = 255))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub suburb: String,
    #[validate(length(min = 2, max = 3))]
    pub state: String,
    #[validate(length(min = 3, max = 4))]
    pub postcode: String,
}

impl From<AddressInput> for Address {
    fn from(a: AddressInput) -> Self {
        Self { street: a.street.trim().into(), suburb: a.suburb.trim().into(), state: a.state.trim().to_uppercase(), postcode: a.postcode.trim().into() }
    }
}

pub const MAX_QUOTE_ITEMS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemVariationInput {
    pub size: String,
    pub size_label: Option<String>,
    pub sku: Option<String>,
}

/// Cart line as the browser holds it. Any prices it carries are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteItemInput {
    pub id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    pub quantity: u32,
    #[serde(default)]
    pub material_test_cert: bool,
    pub lead_time: Option<String>,
    pub variation: Option<ItemVariationInput>,
}

impl QuoteItemInput {
    fn into_line(self) -> Result<RequestedLine> {
        if self.quantity == 0 { return Err(StorefrontError::Validation(format!("Quantity for {} must be at least 1", self.name))); }
        let (size, size_label, variation_sku) = match self.variation {
            Some(v) => (Some(v.size), v.size_label, v.sku),
            None => (None, None, None),
        };
        Ok(RequestedLine {
            product_id: self.id,
            name: self.name,
            sku: self.sku,
            brand: self.brand,
            category: self.category,
            size,
            size_label,
            variation_sku,
            quantity: self.quantity,
            material_test_cert: self.material_test_cert,
            lead_time: self.lead_time,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuoteRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 30))]
    pub phone: String,
    pub company: Option<String>,
    #[serde(alias = "notes")]
    pub message: Option<String>,
    #[validate]
    pub delivery_address: AddressInput,
    pub billing_address: Option<AddressInput>,
    pub items: Vec<QuoteItemInput>,
}

impl SubmitQuoteRequest {
    pub fn into_request(self) -> Result<QuoteRequest> {
        self.validate()?;
        if let Some(billing) = &self.billing_address { billing.validate()?; }
        if !(1..=MAX_QUOTE_ITEMS).contains(&self.items.len()) {
            return Err(StorefrontError::Validation(format!("Quote must include between 1 and {MAX_QUOTE_ITEMS} items")));
        }
        let items = self.items.into_iter().map(QuoteItemInput::into_line).collect::<Result<Vec<_>>>()?;
        Ok(QuoteRequest {
            customer: Customer {
                name: self.name.trim().into(),
                email: self.email.trim().to_lowercase(),
                phone: self.phone.trim().into(),
                company: self.company.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            },
            delivery: self.delivery_address.into(),
            billing: self.billing_address.map(Address::from),
            notes: self.message,
            items,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuoteResponse {
    pub success: bool,
    #[serde(flatten)]
    pub quote: SubmittedQuote,
}

pub async fn submit_quote(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<SubmitQuoteRequest>) -> Result<(StatusCode, Json<SubmitQuoteResponse>)> {
    let ip = client_ip(&headers);
    if !s.rate_limiter.allow(&ip, &s.config.quote_rate_limit).await {
        tracing::warn!(ip = %ip, "quote submission rate limited");
        return Err(StorefrontError::RateLimited);
    }
    let quote = s.quotes.submit(r.into_request()?).await?;
    Ok((StatusCode::CREATED, Json(SubmitQuoteResponse { success: true, quote })))
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    #[serde(flatten)]
    pub sent: SentQuote,
}

pub async fn approve_quote(State(s): State<AppState>, Path(token): Path<String>, body: Option<Json<FinalizeQuote>>) -> Result<Json<SendResponse>> {
    let details = body.map(|Json(b)| b).unwrap_or_default();
    let sent = s.quotes.approve_by_token(&token, details).await?;
    Ok(Json(SendResponse { success: true, sent }))
}

// =============================================================================
// Admin
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteListParams {
    #[serde(default)]
    pub include_deleted: bool,
}

pub async fn list_quotes(State(s): State<AppState>, Query(p): Query<QuoteListParams>) -> Result<Json<Vec<QuoteSummary>>> {
    Ok(Json(s.quotes.list(p.include_deleted).await?))
}

pub async fn get_quote(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Quote>> {
    Ok(Json(s.quotes.get(id).await?))
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub success: bool,
    pub quote: Quote,
}

impl QuoteResponse {
    fn ok(quote: Quote) -> Json<Self> { Json(Self { success: true, quote }) }
}

pub async fn patch_quote(State(s): State<AppState>, Path(id): Path<Uuid>, Json(p): Json<QuotePatch>) -> Result<Json<QuoteResponse>> {
    Ok(QuoteResponse::ok(s.quotes.patch(id, p).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPriceRequest {
    pub quoted_price: Option<Decimal>,
    pub quoted_notes: Option<String>,
}

pub async fn price_item(State(s): State<AppState>, Path((id, item_id)): Path<(Uuid, Uuid)>, Json(r): Json<ItemPriceRequest>) -> Result<Json<QuoteResponse>> {
    Ok(QuoteResponse::ok(s.quotes.set_item_price(id, item_id, r.quoted_price, r.quoted_notes).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    pub deleted_by: Option<String>,
}

pub async fn delete_quote(State(s): State<AppState>, Path(id): Path<Uuid>, Query(p): Query<DeleteParams>) -> Result<Json<QuoteResponse>> {
    Ok(QuoteResponse::ok(s.quotes.delete(id, p.deleted_by).await?))
}

pub async fn restore_quote(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<QuoteResponse>> {
    Ok(QuoteResponse::ok(s.quotes.restore(id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorePdfRequest {
    pub prepared_by: Option<String>,
}

pub async fn store_pdf(State(s): State<AppState>, Path(id): Path<Uuid>, body: Option<Json<StorePdfRequest>>) -> Result<(StatusCode, Json<StoredDocument>)> {
    let prepared_by = body.and_then(|Json(b)| b.prepared_by);
    Ok((StatusCode::CREATED, Json(s.quotes.store_pdf(id, prepared_by).await?)))
}

#[derive(Debug, Default, Deserialize)]
pub struct PdfParams {
    pub version: Option<i32>,
}

pub async fn download_pdf(State(s): State<AppState>, Path(id): Path<Uuid>, Query(p): Query<PdfParams>) -> Result<impl IntoResponse> {
    let (filename, bytes) = s.quotes.document(id, p.version).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    ))
}

pub async fn send_quote(State(s): State<AppState>, Path(id): Path<Uuid>, body: Option<Json<FinalizeQuote>>) -> Result<Json<SendResponse>> {
    let details = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(SendResponse { success: true, sent: s.quotes.send(id, details).await? }))
}

pub async fn email_preview(State(s): State<AppState>, Path(id): Path<Uuid>, body: Option<Json<FinalizeQuote>>) -> Result<Json<EmailPreview>> {
    let details = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(s.quotes.email_preview(id, details).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form() -> serde_json::Value {
        json!({
            "name": " Jane Citizen ",
            "email": "Jane@Example.com",
            "phone": "0400 000 000",
            "company": "",
            "message": "Need by Friday",
            "deliveryAddress": {"street": "1 Pipe St", "suburb": "Welshpool", "state": "wa", "postcode": "6106"},
            "items": [
                {"id": Uuid::nil(), "name": "Gate Valve", "sku": "GV-1", "brand": "Bermad", "basePrice": "120.00", "quantity": 2},
                {"id": Uuid::nil(), "name": "Butterfly Valve", "brand": "Bermad", "quantity": 1, "materialTestCert": true,
                 "variation": {"size": "DN100", "sku": "BFV-DN100", "price": 300}}
            ]
        })
    }

    #[test]
    fn form_becomes_quote_request() {
        let r: SubmitQuoteRequest = serde_json::from_value(form()).unwrap();
        let q = r.into_request().unwrap();
        assert_eq!(q.customer.name, "Jane Citizen");
        assert_eq!(q.customer.email, "jane@example.com");
        assert_eq!(q.customer.company, None);
        assert_eq!(q.delivery.state, "WA");
        assert_eq!(q.notes.as_deref(), Some("Need by Friday"));
        assert_eq!(q.items[0].sku.as_deref(), Some("GV-1"));
        assert_eq!(q.items[0].size, None);
        let sized = &q.items[1];
        assert!(sized.material_test_cert);
        assert_eq!(sized.size.as_deref(), Some("DN100"));
        assert_eq!(sized.variation_sku.as_deref(), Some("BFV-DN100"));
    }

    #[test]
    fn form_rejects_bad_input() {
        let mut f = form();
        f["items"] = json!([]);
        let r: SubmitQuoteRequest = serde_json::from_value(f).unwrap();
        assert!(matches!(r.into_request(), Err(StorefrontError::Validation(m)) if m.contains("items")));

        let mut f = form();
        let line = f["items"][0].clone();
        f["items"] = json!(vec![line; MAX_QUOTE_ITEMS + 1]);
        let r: SubmitQuoteRequest = serde_json::from_value(f).unwrap();
        assert!(matches!(r.into_request(), Err(StorefrontError::Validation(m)) if m.contains("items")));

        let mut f = form();
        f["email"] = json!("not-an-email");
        let r: SubmitQuoteRequest = serde_json::from_value(f).unwrap();
        assert!(r.into_request().is_err());

        let mut f = form();
        f["items"][0]["quantity"] = json!(0);
        let r: SubmitQuoteRequest = serde_json::from_value(f).unwrap();
        assert!(matches!(r.into_request(), Err(StorefrontError::Validation(m)) if m.contains("Gate Valve")));
    }
}
