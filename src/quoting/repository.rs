//! Quote persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::aggregates::quote::{
    format_quote_number, Address, ApprovalToken, Customer, Deletion, PdfRecord, Quote, QuoteItem, QuotePricing, QuoteStatus,
};
use crate::domain::shipping::DeliveryZone;
use crate::Result;

/// Row shown in the admin quote list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct QuoteSummary {
    pub id: Uuid,
    pub quote_number: String,
    pub status: String,
    pub customer_name: String,
    pub company_name: Option<String>,
    pub email: String,
    pub delivery_zone: String,
    pub total: Decimal,
    pub item_count: i64,
    pub pdf_version: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl QuoteSummary {
    pub fn of(q: &Quote) -> Self {
        Self {
            id: q.id(), quote_number: q.quote_number().to_string(), status: q.status().as_str().to_string(),
            customer_name: q.customer().name.clone(), company_name: q.customer().company.clone(),
            email: q.customer().email.clone(), delivery_zone: q.delivery_zone().as_str().to_string(),
            total: q.pricing().total, item_count: q.items().len() as i64, pdf_version: q.pdf().version,
            is_deleted: q.is_deleted(), created_at: q.created_at(),
        }
    }
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Allocates the next quote number for the day. Numbers are never reused.
    async fn next_quote_number(&self, date: NaiveDate) -> Result<String>;
    async fn insert(&self, quote: &Quote) -> Result<()>;
    async fn update(&self, quote: &Quote) -> Result<()>;
    /// Writes only the PDF columns.
    async fn record_document(&self, quote: &Quote) -> Result<()>;
    /// Marks the quote forwarded if it is still in `from`. `false` means another
    /// delivery got there first.
    async fn claim_forward(&self, id: Uuid, from: QuoteStatus) -> Result<bool>;
    async fn get(&self, id: Uuid) -> Result<Option<Quote>>;
    async fn find_by_token(&self, token: &str) -> Result<Option<Quote>>;
    /// Newest first.
    async fn list(&self, include_deleted: bool) -> Result<Vec<QuoteSummary>>;
    /// Live quotes waiting on staff: submitted or reviewed.
    async fn count_open(&self) -> Result<i64>;
    /// Case-insensitive match on number, company, contact name or email. Newest first.
    async fn search(&self, term: &str, limit: i64) -> Result<Vec<QuoteSummary>>;
}

// =============================================================================
// Postgres
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct QuoteRow {
    id: Uuid,
    quote_number: String,
    status: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    company_name: Option<String>,
    delivery_address: Json<Address>,
    billing_address: Option<Json<Address>>,
    delivery_zone: String,
    notes: Option<String>,
    subtotal: Decimal,
    savings: Decimal,
    discount_percentage: i32,
    cert_fee: Decimal,
    shipping_cost: Decimal,
    net: Decimal,
    gst: Decimal,
    total: Decimal,
    has_unpriced_items: bool,
    shipping_notes: Option<String>,
    internal_notes: Option<String>,
    approval_token: Option<String>,
    approval_expires_at: Option<DateTime<Utc>>,
    pdf_version: i32,
    pdf_path: Option<String>,
    pdf_generated_at: Option<DateTime<Utc>>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    forwarded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct QuoteItemRow {
    id: Uuid,
    product_id: Option<Uuid>,
    sku: String,
    variation_sku: Option<String>,
    name: String,
    brand: String,
    size_label: Option<String>,
    quantity: i32,
    unit_price: Option<Decimal>,
    line_total: Option<Decimal>,
    lead_time: Option<String>,
    material_test_cert: bool,
    quoted_price: Option<Decimal>,
    quoted_notes: Option<String>,
}

impl From<QuoteItemRow> for QuoteItem {
    fn from(r: QuoteItemRow) -> Self {
        Self {
            id: r.id, product_id: r.product_id, sku: r.sku, variation_sku: r.variation_sku, name: r.name, brand: r.brand,
            size_label: r.size_label, quantity: u32::try_from(r.quantity).unwrap_or(0), unit_price: r.unit_price,
            line_total: r.line_total, lead_time: r.lead_time, material_test_cert: r.material_test_cert,
            quoted_price: r.quoted_price, quoted_notes: r.quoted_notes,
        }
    }
}

impl QuoteRow {
    fn into_quote(self, items: Vec<QuoteItem>) -> Quote {
        let approval = self.approval_token.map(|token| ApprovalToken { token, expires_at: self.approval_expires_at });
        Quote {
            id: self.id,
            quote_number: self.quote_number,
            status: QuoteStatus::parse(&self.status).unwrap_or_default(),
            customer: Customer { name: self.customer_name, email: self.customer_email, phone: self.customer_phone, company: self.company_name },
            delivery: self.delivery_address.0,
            billing: self.billing_address.map(|b| b.0),
            delivery_zone: DeliveryZone::parse(&self.delivery_zone).unwrap_or_default(),
            notes: self.notes,
            items,
            pricing: QuotePricing {
                subtotal: self.subtotal, savings: self.savings, discount_percentage: u32::try_from(self.discount_percentage).unwrap_or(0),
                cert_fee: self.cert_fee, shipping_cost: self.shipping_cost, net: self.net, gst: self.gst, total: self.total,
                has_unpriced_items: self.has_unpriced_items,
            },
            shipping_notes: self.shipping_notes,
            internal_notes: self.internal_notes,
            approval,
            pdf: PdfRecord { version: self.pdf_version, path: self.pdf_path, generated_at: self.pdf_generated_at },
            deletion: Deletion { is_deleted: self.is_deleted, deleted_at: self.deleted_at, deleted_by: self.deleted_by },
            created_at: self.created_at,
            updated_at: self.updated_at,
            reviewed_at: self.reviewed_at,
            forwarded_at: self.forwarded_at,
            events: vec![],
        }
    }
}

const QUOTE_COLUMNS: &str = "id, quote_number, status, customer_name, customer_email, customer_phone, company_name, delivery_address, billing_address, delivery_zone, notes, subtotal, savings, discount_percentage, cert_fee, shipping_cost, net, gst, total, has_unpriced_items, shipping_notes, internal_notes, approval_token, approval_expires_at, pdf_version, pdf_path, pdf_generated_at, is_deleted, deleted_at, deleted_by, created_at, updated_at, reviewed_at, forwarded_at";

pub struct PgQuoteRepository {
    db: PgPool,
}

impl PgQuoteRepository {
    pub fn new(db: PgPool) -> Self { Self { db } }

    async fn load(&self, row: Option<QuoteRow>) -> Result<Option<Quote>> {
        let Some(row) = row else { return Ok(None) };
        let items = sqlx::query_as::<_, QuoteItemRow>("SELECT id, product_id, sku, variation_sku, name, brand, size_label, quantity, unit_price, line_total, lead_time, material_test_cert, quoted_price, quoted_notes FROM quote_items WHERE quote_id = $1 ORDER BY position")
            .bind(row.id).fetch_all(&self.db).await?;
        Ok(Some(row.into_quote(items.into_iter().map(QuoteItem::from).collect())))
    }

    async fn write_items(tx: &mut Transaction<'_, Postgres>, quote: &Quote) -> Result<()> {
        sqlx::query("DELETE FROM quote_items WHERE quote_id = $1").bind(quote.id()).execute(&mut **tx).await?;
        for (position, item) in quote.items().iter().enumerate() {
            sqlx::query("INSERT INTO quote_items (id, quote_id, position, product_id, sku, variation_sku, name, brand, size_label, quantity, unit_price, line_total, lead_time, material_test_cert, quoted_price, quoted_notes) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)")
                .bind(item.id).bind(quote.id()).bind(position as i32).bind(item.product_id).bind(&item.sku).bind(&item.variation_sku)
                .bind(&item.name).bind(&item.brand).bind(&item.size_label).bind(item.quantity as i32).bind(item.unit_price)
                .bind(item.line_total).bind(&item.lead_time).bind(item.material_test_cert).bind(item.quoted_price).bind(&item.quoted_notes)
                .execute(&mut **tx).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl QuoteRepository for PgQuoteRepository {
    async fn next_quote_number(&self, date: NaiveDate) -> Result<String> {
        let (seq,): (i32,) = sqlx::query_as("INSERT INTO quote_sequences (day, last_value) VALUES ($1, 1) ON CONFLICT (day) DO UPDATE SET last_value = quote_sequences.last_value + 1 RETURNING last_value")
            .bind(date).fetch_one(&self.db).await?;
        Ok(format_quote_number(date, u32::try_from(seq).unwrap_or(0)))
    }

    async fn insert(&self, q: &Quote) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let p = q.pricing();
        let approval = q.approval();
        sqlx::query("INSERT INTO quotes (id, quote_number, status, customer_name, customer_email, customer_phone, company_name, delivery_address, billing_address, delivery_zone, notes, subtotal, savings, discount_percentage, cert_fee, shipping_cost, net, gst, total, has_unpriced_items, approval_token, approval_expires_at, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)")
            .bind(q.id()).bind(q.quote_number()).bind(q.status().as_str())
            .bind(&q.customer().name).bind(&q.customer().email).bind(&q.customer().phone).bind(&q.customer().company)
            .bind(Json(q.delivery())).bind(q.billing().map(Json)).bind(q.delivery_zone().as_str()).bind(q.notes())
            .bind(p.subtotal).bind(p.savings).bind(p.discount_percentage as i32).bind(p.cert_fee).bind(p.shipping_cost)
            .bind(p.net).bind(p.gst).bind(p.total).bind(p.has_unpriced_items)
            .bind(approval.map(|a| a.token.as_str())).bind(approval.and_then(|a| a.expires_at))
            .bind(q.created_at()).bind(q.updated_at())
            .execute(&mut *tx).await?;
        Self::write_items(&mut tx, q).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, q: &Quote) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let p = q.pricing();
        let d = q.deletion();
        sqlx::query("UPDATE quotes SET status = $2, subtotal = $3, savings = $4, discount_percentage = $5, cert_fee = $6, shipping_cost = $7, net = $8, gst = $9, total = $10, has_unpriced_items = $11, shipping_notes = $12, internal_notes = $13, pdf_version = $14, pdf_path = $15, pdf_generated_at = $16, is_deleted = $17, deleted_at = $18, deleted_by = $19, reviewed_at = $20, forwarded_at = $21, updated_at = $22 WHERE id = $1")
            .bind(q.id()).bind(q.status().as_str())
            .bind(p.subtotal).bind(p.savings).bind(p.discount_percentage as i32).bind(p.cert_fee).bind(p.shipping_cost)
            .bind(p.net).bind(p.gst).bind(p.total).bind(p.has_unpriced_items)
            .bind(q.shipping_notes()).bind(q.internal_notes())
            .bind(q.pdf().version).bind(&q.pdf().path).bind(q.pdf().generated_at)
            .bind(d.is_deleted).bind(d.deleted_at).bind(&d.deleted_by)
            .bind(q.reviewed_at()).bind(q.forwarded_at()).bind(q.updated_at())
            .execute(&mut *tx).await?;
        Self::write_items(&mut tx, q).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_document(&self, q: &Quote) -> Result<()> {
        sqlx::query("UPDATE quotes SET pdf_version = $2, pdf_path = $3, pdf_generated_at = $4, updated_at = $5 WHERE id = $1")
            .bind(q.id()).bind(q.pdf().version).bind(&q.pdf().path).bind(q.pdf().generated_at).bind(q.updated_at())
            .execute(&self.db).await?;
        Ok(())
    }

    async fn claim_forward(&self, id: Uuid, from: QuoteStatus) -> Result<bool> {
        let done = sqlx::query("UPDATE quotes SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2")
            .bind(id).bind(from.as_str()).bind(QuoteStatus::Forwarded.as_str())
            .execute(&self.db).await?;
        Ok(done.rows_affected() == 1)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Quote>> {
        let row = sqlx::query_as::<_, QuoteRow>(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?;
        self.load(row).await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Quote>> {
        let row = sqlx::query_as::<_, QuoteRow>(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE approval_token = $1"))
            .bind(token).fetch_optional(&self.db).await?;
        self.load(row).await
    }

    async fn list(&self, include_deleted: bool) -> Result<Vec<QuoteSummary>> {
        let rows = sqlx::query_as::<_, QuoteSummary>(
            "SELECT q.id, q.quote_number, q.status, q.customer_name, q.company_name, q.customer_email AS email, q.delivery_zone, q.total,
                    (SELECT COUNT(*) FROM quote_items i WHERE i.quote_id = q.id) AS item_count, q.pdf_version, q.is_deleted, q.created_at
             FROM quotes q WHERE ($1 OR NOT q.is_deleted) ORDER BY q.created_at DESC")
            .bind(include_deleted).fetch_all(&self.db).await?;
        Ok(rows)
    }

    async fn count_open(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM quotes WHERE NOT is_deleted AND status IN ('submitted', 'reviewed')")
            .fetch_one(&self.db).await?;
        Ok(count)
    }

    async fn search(&self, term: &str, limit: i64) -> Result<Vec<QuoteSummary>> {
        let rows = sqlx::query_as::<_, QuoteSummary>(
            "SELECT q.id, q.quote_number, q.status, q.customer_name, q.company_name, q.customer_email AS email, q.delivery_zone, q.total,
                    (SELECT COUNT(*) FROM quote_items i WHERE i.quote_id = q.id) AS item_count, q.pdf_version, q.is_deleted, q.created_at
             FROM quotes q
             WHERE q.quote_number ILIKE $1 OR q.company_name ILIKE $1 OR q.customer_name ILIKE $1 OR q.customer_email ILIKE $1
             ORDER BY q.created_at DESC LIMIT $2")
            .bind(format!("%{term}%")).bind(limit).fetch_all(&self.db).await?;
        Ok(rows)
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
pub struct MemoryQuoteRepository {
    quotes: Mutex<HashMap<Uuid, Quote>>,
    sequences: Mutex<HashMap<NaiveDate, u32>>,
}

#[async_trait]
impl QuoteRepository for MemoryQuoteRepository {
    async fn next_quote_number(&self, date: NaiveDate) -> Result<String> {
        let mut seqs = self.sequences.lock().await;
        let seq = seqs.entry(date).or_insert(0);
        *seq += 1;
        Ok(format_quote_number(date, *seq))
    }

    async fn insert(&self, quote: &Quote) -> Result<()> {
        let mut quotes = self.quotes.lock().await;
        if quotes.values().any(|q| q.quote_number() == quote.quote_number()) {
            return Err(crate::StorefrontError::Conflict(format!("Quote {} already exists", quote.quote_number())));
        }
        quotes.insert(quote.id(), stored(quote));
        Ok(())
    }

    async fn update(&self, quote: &Quote) -> Result<()> {
        let mut quotes = self.quotes.lock().await;
        match quotes.get_mut(&quote.id()) {
            Some(existing) => { *existing = stored(quote); Ok(()) }
            None => Err(crate::StorefrontError::NotFound("Quote")),
        }
    }

    async fn record_document(&self, quote: &Quote) -> Result<()> {
        let mut quotes = self.quotes.lock().await;
        let existing = quotes.get_mut(&quote.id()).ok_or(crate::StorefrontError::NotFound("Quote"))?;
        existing.pdf = quote.pdf().clone();
        existing.updated_at = quote.updated_at();
        Ok(())
    }

    async fn claim_forward(&self, id: Uuid, from: QuoteStatus) -> Result<bool> {
        let mut quotes = self.quotes.lock().await;
        match quotes.get_mut(&id) {
            Some(q) if q.status == from => {
                q.status = QuoteStatus::Forwarded;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Quote>> { Ok(self.quotes.lock().await.get(&id).cloned()) }

    async fn find_by_token(&self, token: &str) -> Result<Option<Quote>> {
        let quotes = self.quotes.lock().await;
        Ok(quotes.values().find(|q| q.approval().is_some_and(|a| a.token == token)).cloned())
    }

    async fn list(&self, include_deleted: bool) -> Result<Vec<QuoteSummary>> {
        let quotes = self.quotes.lock().await;
        let mut rows: Vec<QuoteSummary> = quotes.values().filter(|q| include_deleted || !q.is_deleted()).map(QuoteSummary::of).collect();
        rows.sort_by(newest_first);
        Ok(rows)
    }

    async fn count_open(&self) -> Result<i64> {
        let quotes = self.quotes.lock().await;
        Ok(quotes.values().filter(|q| !q.is_deleted() && matches!(q.status(), QuoteStatus::Submitted | QuoteStatus::Reviewed)).count() as i64)
    }

    async fn search(&self, term: &str, limit: i64) -> Result<Vec<QuoteSummary>> {
        let needle = term.to_lowercase();
        let quotes = self.quotes.lock().await;
        let mut rows: Vec<QuoteSummary> = quotes
            .values()
            .filter(|q| {
                let c = q.customer();
                [Some(q.quote_number()), c.company.as_deref(), Some(c.name.as_str()), Some(c.email.as_str())]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .map(QuoteSummary::of)
            .collect();
        rows.sort_by(newest_first);
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }
}

fn newest_first(a: &QuoteSummary, b: &QuoteSummary) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.quote_number.cmp(&a.quote_number))
}

/// Pending events belong to the caller, not the store.
fn stored(quote: &Quote) -> Quote {
    let mut q = quote.clone();
    q.events.clear();
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::fixtures;

    #[tokio::test]
    async fn sequences_restart_each_day() {
        let repo = MemoryQuoteRepository::default();
        let day = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(repo.next_quote_number(day).await.unwrap(), "Q-20250305-0001");
        assert_eq!(repo.next_quote_number(day).await.unwrap(), "Q-20250305-0002");
        assert_eq!(repo.next_quote_number(day.succ_opt().unwrap()).await.unwrap(), "Q-20250306-0001");
    }

    #[tokio::test]
    async fn list_hides_deleted_quotes() {
        let repo = MemoryQuoteRepository::default();
        let mut quote = fixtures::quote();
        repo.insert(&quote).await.unwrap();
        assert!(repo.insert(&quote).await.is_err());
        assert_eq!(repo.list(false).await.unwrap().len(), 1);

        quote.soft_delete(Some("admin".into()), Utc::now()).unwrap();
        repo.update(&quote).await.unwrap();
        assert!(repo.list(false).await.unwrap().is_empty());
        let all = repo.list(true).await.unwrap();
        assert_eq!(all[0].quote_number, "Q-20250305-0003");
        assert_eq!(all[0].item_count, 3);
        assert!(all[0].is_deleted);
        assert!(repo.get(quote.id()).await.unwrap().is_some_and(|mut q| q.take_events().is_empty()));
    }

    #[tokio::test]
    async fn only_one_forward_claim_wins() {
        let repo = MemoryQuoteRepository::default();
        let mut quote = fixtures::quote();
        quote.submit(ApprovalToken::generate(7, Utc::now()), Utc::now()).unwrap();
        repo.insert(&quote).await.unwrap();
        assert_eq!(repo.count_open().await.unwrap(), 1);

        assert!(repo.claim_forward(quote.id(), QuoteStatus::Submitted).await.unwrap());
        assert!(!repo.claim_forward(quote.id(), QuoteStatus::Submitted).await.unwrap());
        assert!(!repo.claim_forward(Uuid::new_v4(), QuoteStatus::Submitted).await.unwrap());
        assert_eq!(repo.count_open().await.unwrap(), 0);

        quote.record_document(1, "quotes/x/quote-v1.pdf".into(), Utc::now());
        repo.record_document(&quote).await.unwrap();
        let stored = repo.get(quote.id()).await.unwrap().unwrap();
        assert_eq!((stored.status(), stored.pdf().version), (QuoteStatus::Forwarded, 1));
    }

    #[tokio::test]
    async fn search_matches_contact_fields() {
        let repo = MemoryQuoteRepository::default();
        repo.insert(&fixtures::quote()).await.unwrap();
        assert_eq!(repo.search("pilbara", 5).await.unwrap().len(), 1);
        assert_eq!(repo.search("SAM@MINE", 5).await.unwrap().len(), 1);
        assert_eq!(repo.search("0305-0003", 5).await.unwrap().len(), 1);
        assert!(repo.search("nobody", 5).await.unwrap().is_empty());
        assert!(repo.search("sam", 0).await.unwrap().is_empty());
    }
}
