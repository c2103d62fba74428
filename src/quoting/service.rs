use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::{ProductCatalog, RequestedLine};
use super::events::EventPublisher;
use super::repository::{QuoteRepository, QuoteSummary};
use crate::config::{BusinessProfile, Config};
use crate::documents::{html, pdf, text, QuoteDocument};
use crate::domain::aggregates::cart::QuoteCart;
use crate::domain::aggregates::quote::{Address, ApprovalToken, Customer, Quote, QuoteError, QuotePricing, QuoteStatus};
use crate::domain::flags::{detect_exceptions, QuoteExceptionFlags};
use crate::domain::shipping::{classify_delivery, DeliveryClassification};
use crate::mail::{Attachment, Mailer, OutboundEmail};
use crate::storage::{DocumentStore, StoredDocument};
use crate::{Result, StorefrontError};

/// What the quote pipeline needs to know about the business it runs for.
#[derive(Clone, Debug)]
pub struct QuoteSettings {
    pub business: BusinessProfile,
    pub from_email: String,
    pub public_url: String,
    pub approval_token_days: i64,
}

impl QuoteSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            business: config.business.clone(),
            from_email: config.from_email.clone(),
            public_url: config.public_url.clone(),
            approval_token_days: config.approval_token_days,
        }
    }

    pub fn approval_url(&self, token: &str) -> String { format!("{}/api/approve-quote/{}", self.public_url, token) }
}

#[derive(Clone, Debug)]
pub struct QuoteRequest {
    pub customer: Customer,
    pub delivery: Address,
    pub billing: Option<Address>,
    pub notes: Option<String>,
    pub items: Vec<RequestedLine>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedQuote {
    pub id: Uuid,
    pub quote_number: String,
    pub pricing: QuotePricing,
    pub delivery: DeliveryClassification,
    pub flags: QuoteExceptionFlags,
    pub valid_until: NaiveDate,
}

/// Final details staff add before the quote goes to the customer.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeQuote {
    pub shipping_cost: Option<Decimal>,
    pub shipping_notes: Option<String>,
    pub internal_notes: Option<String>,
    pub prepared_by: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotePatch {
    pub status: Option<QuoteStatus>,
    pub shipping_cost: Option<Decimal>,
    pub shipping_notes: Option<String>,
    pub internal_notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentQuote {
    pub quote_number: String,
    pub email: String,
    pub document: StoredDocument,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmailPreview {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub struct QuoteService {
    repo: Arc<dyn QuoteRepository>,
    catalog: Arc<dyn ProductCatalog>,
    documents: Arc<dyn DocumentStore>,
    mailer: Arc<dyn Mailer>,
    events: EventPublisher,
    settings: QuoteSettings,
}

impl QuoteService {
    pub fn new(
        repo: Arc<dyn QuoteRepository>,
        catalog: Arc<dyn ProductCatalog>,
        documents: Arc<dyn DocumentStore>,
        mailer: Arc<dyn Mailer>,
        events: EventPublisher,
        settings: QuoteSettings,
    ) -> Self {
        Self { repo, catalog, documents, mailer, events, settings }
    }

    pub fn settings(&self) -> &QuoteSettings { &self.settings }

    /// Prices the request from the catalogue, stores it as submitted and notifies
    /// sales and the customer. The quote is kept even when an email cannot be sent.
    pub async fn submit(&self, request: QuoteRequest) -> Result<SubmittedQuote> {
        let now = Utc::now();
        if request.items.is_empty() { return Err(QuoteError::NoItems.into()); }
        let cart = self.price_lines(request.items, now).await?;
        let classification = classify_delivery(&request.delivery.postcode, Some(&request.delivery.one_line()));
        let quote_number = self.repo.next_quote_number(now.date_naive()).await?;
        let mut quote = Quote::draft(quote_number, request.customer, request.delivery, &classification, &cart, now)?
            .with_billing(request.billing)
            .with_notes(request.notes);
        let approval = ApprovalToken::generate(self.settings.approval_token_days, now);
        let token = approval.token.clone();
        quote.submit(approval, now)?;
        self.repo.insert(&quote).await?;
        tracing::info!(quote_number = %quote.quote_number(), total = %quote.pricing().total, zone = classification.zone.as_str(), "quote submitted");

        let flags = detect_exceptions(quote.items(), quote.delivery_zone());
        let doc = QuoteDocument::from_quote(&quote, &self.settings.business, None);
        let approval_url = self.settings.approval_url(&token);
        let business_email = OutboundEmail {
            to: self.settings.business.sales_email.clone(),
            from: self.settings.from_email.clone(),
            reply_to: Some(quote.customer().email.clone()),
            subject: request_subject(&quote),
            html: html::business_notification_html(&doc, &flags, &classification.delivery_note, Some(&approval_url)),
            text: text::business_notification_text(&doc, &flags, &classification.delivery_note, Some(&approval_url)),
            attachments: vec![],
        };
        let customer_email = OutboundEmail {
            to: quote.customer().email.clone(),
            from: self.settings.from_email.clone(),
            reply_to: Some(self.settings.business.sales_email.clone()),
            subject: format!("Your Quote Request - {}", self.settings.business.name),
            html: html::customer_confirmation_html(&doc),
            text: text::customer_confirmation_text(&doc),
            attachments: vec![],
        };
        let sent = futures::future::join_all([business_email, customer_email].map(|email| self.mailer.send(email))).await;
        for e in sent.into_iter().filter_map(|r| r.err()) {
            tracing::warn!(quote_number = %quote.quote_number(), error = %e, "quote email not sent");
        }

        self.events.publish(quote.take_events()).await;
        Ok(SubmittedQuote {
            id: quote.id(),
            quote_number: quote.quote_number().to_string(),
            pricing: quote.pricing().clone(),
            delivery: classification,
            flags,
            valid_until: quote.valid_until(),
        })
    }

    async fn price_lines(&self, lines: Vec<RequestedLine>, now: DateTime<Utc>) -> Result<QuoteCart> {
        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let entries: HashMap<Uuid, _> = self.catalog.active_products(&ids).await?.into_iter().map(|e| (e.product.id(), e)).collect();
        let mut cart = QuoteCart::new();
        for line in lines {
            let entry = entries.get(&line.product_id);
            if entry.is_none() {
                tracing::warn!(product_id = %line.product_id, name = %line.name, "quote line not in catalogue, priced on application");
            }
            cart.add_item(line.price(entry, now)?);
        }
        Ok(cart)
    }

    /// Approval from the link in the sales notification. Only one approval of a
    /// quote can be in flight; a failed delivery hands the claim back.
    pub async fn approve_by_token(&self, token: &str, details: FinalizeQuote) -> Result<SentQuote> {
        let mut quote = self.repo.find_by_token(token).await?.ok_or(QuoteError::InvalidToken)?;
        quote.check_approval(Utc::now())?;
        if !self.repo.claim_forward(quote.id(), quote.status()).await? {
            return Err(QuoteError::AlreadyForwarded.into());
        }
        match self.deliver(&mut quote, details).await {
            Ok(sent) => Ok(sent),
            Err(e) => {
                tracing::warn!(quote_number = %quote.quote_number(), error = %e, "approval not delivered, releasing quote");
                self.save(&mut quote).await?;
                Err(e)
            }
        }
    }

    /// Sends the quote from the back-office. A forwarded quote is sent again.
    pub async fn send(&self, id: Uuid, details: FinalizeQuote) -> Result<SentQuote> {
        let mut quote = self.load(id).await?;
        if quote.is_deleted() { return Err(StorefrontError::Validation("Cannot send a deleted quote".into())); }
        self.deliver(&mut quote, details).await
    }

    async fn deliver(&self, quote: &mut Quote, details: FinalizeQuote) -> Result<SentQuote> {
        let now = Utc::now();
        if quote.status() == QuoteStatus::Draft {
            return Err(QuoteError::InvalidTransition { from: QuoteStatus::Draft, to: QuoteStatus::Forwarded }.into());
        }
        quote.set_shipping(details.shipping_cost, details.shipping_notes, now)?;
        if details.internal_notes.is_some() { quote.set_internal_notes(details.internal_notes, now); }
        let doc = QuoteDocument::from_quote(quote, &self.settings.business, details.prepared_by);
        let (document, bytes) = self.write_document(quote, &doc).await?;

        self.mailer
            .send(OutboundEmail {
                to: quote.customer().email.clone(),
                from: self.settings.from_email.clone(),
                reply_to: Some(self.settings.business.sales_email.clone()),
                subject: format!("Your Quote {} from {}", quote.quote_number(), self.settings.business.name),
                html: html::approved_quote_html(&doc),
                text: text::approved_quote_text(&doc),
                attachments: vec![Attachment::pdf(doc.attachment_name(), &bytes)],
            })
            .await?;

        if quote.status() != QuoteStatus::Forwarded { quote.forward(now)?; }
        self.repo.update(quote).await?;
        tracing::info!(quote_number = %quote.quote_number(), version = document.version, to = %quote.customer().email, "quote sent to customer");
        self.events.publish(quote.take_events()).await;
        Ok(SentQuote {
            quote_number: quote.quote_number().to_string(),
            email: quote.customer().email.clone(),
            document,
            total: quote.pricing().total,
        })
    }

    /// The version is recorded on the quote as soon as the bytes are stored, so a
    /// later failure never leads to the same version being written twice.
    async fn write_document(&self, quote: &mut Quote, doc: &QuoteDocument) -> Result<(StoredDocument, Vec<u8>)> {
        let bytes = pdf::render_quote_pdf(doc)?;
        let version = quote.next_document_version();
        let stored = self.documents.put(quote.quote_number(), version, bytes.clone()).await?;
        quote.record_document(version, stored.path.clone(), Utc::now());
        self.repo.record_document(quote).await?;
        tracing::info!(quote_number = %quote.quote_number(), version, size_bytes = stored.size_bytes, "quote PDF stored");
        Ok((stored, bytes))
    }

    pub async fn list(&self, include_deleted: bool) -> Result<Vec<QuoteSummary>> { self.repo.list(include_deleted).await }

    /// Quotes waiting on staff: submitted or reviewed, not deleted.
    pub async fn open_count(&self) -> Result<i64> { self.repo.count_open().await }

    pub async fn search(&self, term: &str, limit: i64) -> Result<Vec<QuoteSummary>> { self.repo.search(term, limit).await }

    pub async fn get(&self, id: Uuid) -> Result<Quote> { self.load(id).await }

    pub async fn patch(&self, id: Uuid, patch: QuotePatch) -> Result<Quote> {
        let now = Utc::now();
        let mut quote = self.load(id).await?;
        match patch.status {
            None => {}
            Some(QuoteStatus::Reviewed) => quote.review(now)?,
            Some(other) if other == quote.status() => {}
            Some(_) => return Err(StorefrontError::Validation("Status can only be changed to reviewed".into())),
        }
        quote.set_shipping(patch.shipping_cost, patch.shipping_notes, now)?;
        if patch.internal_notes.is_some() { quote.set_internal_notes(patch.internal_notes, now); }
        self.save(&mut quote).await?;
        Ok(quote)
    }

    pub async fn set_item_price(&self, id: Uuid, item_id: Uuid, quoted_price: Option<Decimal>, quoted_notes: Option<String>) -> Result<Quote> {
        let mut quote = self.load(id).await?;
        quote.set_item_price(item_id, quoted_price, quoted_notes, Utc::now())?;
        self.save(&mut quote).await?;
        Ok(quote)
    }

    pub async fn delete(&self, id: Uuid, deleted_by: Option<String>) -> Result<Quote> {
        let mut quote = self.load(id).await?;
        quote.soft_delete(deleted_by, Utc::now())?;
        self.save(&mut quote).await?;
        tracing::info!(quote_number = %quote.quote_number(), "quote deleted");
        Ok(quote)
    }

    pub async fn restore(&self, id: Uuid) -> Result<Quote> {
        let mut quote = self.load(id).await?;
        quote.restore(Utc::now())?;
        self.save(&mut quote).await?;
        tracing::info!(quote_number = %quote.quote_number(), "quote restored");
        Ok(quote)
    }

    /// Renders the current state of the quote as a new PDF version.
    pub async fn store_pdf(&self, id: Uuid, prepared_by: Option<String>) -> Result<StoredDocument> {
        let mut quote = self.load(id).await?;
        let doc = QuoteDocument::from_quote(&quote, &self.settings.business, prepared_by);
        let (stored, _) = self.write_document(&mut quote, &doc).await?;
        self.save(&mut quote).await?;
        Ok(stored)
    }

    pub async fn document(&self, id: Uuid, version: Option<i32>) -> Result<(String, Vec<u8>)> {
        let quote = self.load(id).await?;
        let version = match version {
            Some(v) => v,
            None => self.documents.latest(quote.quote_number()).await?.map(|d| d.version).ok_or(StorefrontError::NotFound("Document"))?,
        };
        let bytes = self.documents.get(quote.quote_number(), version).await?.ok_or(StorefrontError::NotFound("Document"))?;
        Ok((format!("{}-v{}.pdf", quote.quote_number(), version), bytes))
    }

    /// The customer email as it would be sent, without sending or storing anything.
    pub async fn email_preview(&self, id: Uuid, details: FinalizeQuote) -> Result<EmailPreview> {
        let mut quote = self.load(id).await?;
        quote.set_shipping(details.shipping_cost, details.shipping_notes, Utc::now())?;
        let doc = QuoteDocument::from_quote(&quote, &self.settings.business, details.prepared_by);
        Ok(EmailPreview {
            to: quote.customer().email.clone(),
            subject: format!("Your Quote {} from {}", quote.quote_number(), self.settings.business.name),
            html: html::approved_quote_html(&doc),
            text: text::approved_quote_text(&doc),
        })
    }

    async fn load(&self, id: Uuid) -> Result<Quote> { self.repo.get(id).await?.ok_or(StorefrontError::NotFound("Quote")) }

    async fn save(&self, quote: &mut Quote) -> Result<()> {
        self.repo.update(quote).await?;
        self.events.publish(quote.take_events()).await;
        Ok(())
    }
}

/// `Quote Request: Jo Smith - Acme (3 items)`
fn request_subject(quote: &Quote) -> String {
    let customer = quote.customer();
    let company = customer.company.as_ref().map(|c| format!(" - {c}")).unwrap_or_default();
    format!("Quote Request: {}{} ({} items)", customer.name, company, quote.items().len())
}
