//! Quote documents: HTML and plain-text emails plus the PDF attachment.
//!
//! Every renderer works from a [`QuoteDocument`], a flattened view of a quote
//! with dates already formatted and staff price overrides applied.

pub mod contact;
pub mod escape;
pub mod html;
pub mod pdf;
pub mod text;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::config::BusinessProfile;
use crate::domain::aggregates::quote::{Address, Quote, QuotePricing};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),
}

impl From<DocumentError> for crate::StorefrontError {
    fn from(e: DocumentError) -> Self { Self::Render(e.to_string()) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentLine {
    pub sku: String,
    pub name: String,
    pub brand: String,
    pub size_label: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Decimal>,
    pub line_total: Option<Decimal>,
    pub lead_time: Option<String>,
    pub material_test_cert: bool,
    pub quoted_notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuoteDocument {
    pub quote_number: String,
    pub quote_date: String,
    pub valid_until: String,
    pub company_name: Option<String>,
    pub contact_name: String,
    pub email: String,
    pub phone: String,
    pub delivery: Address,
    /// Only set when it differs from the delivery address.
    pub billing: Option<Address>,
    pub items: Vec<DocumentLine>,
    pub pricing: QuotePricing,
    pub cert_count: u32,
    pub shipping_notes: Option<String>,
    pub notes: Option<String>,
    pub overall_lead_time: Option<String>,
    pub prepared_by: Option<String>,
    #[serde(skip)]
    pub business: BusinessProfile,
}

/// `5 March 2025`
pub fn format_date(date: NaiveDate) -> String { date.format("%-d %B %Y").to_string() }

impl QuoteDocument {
    pub fn from_quote(quote: &Quote, business: &BusinessProfile, prepared_by: Option<String>) -> Self {
        let items = quote
            .items()
            .iter()
            .map(|item| {
                let unit_price = item.effective_unit_price();
                DocumentLine {
                    sku: item.display_sku().to_string(),
                    name: item.name.clone(),
                    brand: item.brand.clone(),
                    size_label: item.size_label.clone(),
                    quantity: item.quantity,
                    unit_price,
                    line_total: item.effective_line_total().or(item.line_total),
                    lead_time: item.lead_time.clone(),
                    material_test_cert: item.material_test_cert,
                    quoted_notes: item.quoted_notes.clone(),
                }
            })
            .collect::<Vec<_>>();
        let billing = quote.billing().filter(|b| b.formatted() != quote.delivery().formatted()).cloned();
        Self {
            quote_number: quote.quote_number().to_string(),
            quote_date: format_date(quote.created_at().date_naive()),
            valid_until: format_date(quote.valid_until()),
            company_name: quote.customer().company.clone(),
            contact_name: quote.customer().name.clone(),
            email: quote.customer().email.clone(),
            phone: quote.customer().phone.clone(),
            delivery: quote.delivery().clone(),
            billing,
            cert_count: items.iter().filter(|i| i.material_test_cert).count() as u32,
            items,
            pricing: quote.pricing().clone(),
            shipping_notes: quote.shipping_notes().map(str::to_string),
            notes: quote.notes().map(str::to_string),
            overall_lead_time: quote.overall_lead_time().map(str::to_string),
            prepared_by: prepared_by.filter(|p| !p.trim().is_empty()),
            business: business.clone(),
        }
    }

    /// Company when given, otherwise the contact.
    pub fn customer_label(&self) -> &str { self.company_name.as_deref().unwrap_or(&self.contact_name) }

    pub fn attachment_name(&self) -> String { format!("{}.pdf", self.quote_number) }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_view_model() {
        let doc = QuoteDocument::from_quote(&fixtures::quote(), &fixtures::business(), Some("  ".into()));
        assert_eq!(doc.quote_date, "5 March 2025");
        assert_eq!(doc.valid_until, "30 April 2025");
        assert_eq!(doc.items.len(), 3);
        assert_eq!(doc.cert_count, 1);
        assert_eq!(doc.customer_label(), "Pilbara Ops");
        assert_eq!(doc.overall_lead_time.as_deref(), Some("6-8 weeks"));
        assert!(doc.prepared_by.is_none());
        assert!(doc.billing.is_none());
        assert_eq!(doc.attachment_name(), "Q-20250305-0003.pdf");
    }
}
