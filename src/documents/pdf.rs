//! A4 quote PDF drawn with the builtin Helvetica faces.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use rust_decimal::Decimal;

use super::{DocumentError, DocumentLine, QuoteDocument};
use crate::domain::value_objects::format_currency;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 15.0;
const TOP: f32 = PAGE_H - MARGIN;
const BOTTOM: f32 = 22.0;
/// Helvetica averages about half an em per glyph; 1pt is 0.3528mm.
const GLYPH_MM_PER_PT: f32 = 0.5 * 0.3528;

const COL_SKU: f32 = MARGIN;
const COL_PRODUCT: f32 = 45.0;
const COL_SIZE: f32 = 105.0;
const COL_LEAD: f32 = 130.0;
const COL_QTY_RIGHT: f32 = 160.0;
const COL_UNIT_RIGHT: f32 = 178.0;
const COL_TOTAL_RIGHT: f32 = PAGE_W - MARGIN;

struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, DocumentError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self { doc, layer, regular, bold, y: TOP, pages: 1 })
    }

    fn text(&self, x: f32, size: f32, bold: bool, s: &str) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(pdf_safe(s), size, Mm(x), Mm(self.y), font);
    }

    fn text_right(&self, right: f32, size: f32, bold: bool, s: &str) {
        let width = s.chars().count() as f32 * size * GLYPH_MM_PER_PT;
        self.text((right - width).max(MARGIN), size, bold, s);
    }

    fn down(&mut self, mm: f32) { self.y -= mm; }

    /// Starts a new page when fewer than `needed` millimetres remain.
    fn ensure(&mut self, needed: f32) -> bool {
        if self.y - needed >= BOTTOM { return false; }
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = TOP;
        self.pages += 1;
        true
    }

    fn rule(&mut self) {
        self.text(MARGIN, 8.0, false, &"_".repeat(112));
        self.down(6.0);
    }

    fn finish(self) -> Result<(Vec<u8>, usize), DocumentError> {
        let pages = self.pages;
        let bytes = self.doc.save_to_bytes().map_err(pdf_err)?;
        Ok((bytes, pages))
    }
}

fn pdf_err(e: impl std::fmt::Debug) -> DocumentError { DocumentError::Pdf(format!("{e:?}")) }

/// Builtin fonts only cover Latin-1.
fn pdf_safe(s: &str) -> String {
    s.chars().map(|c| if (c as u32) < 0x100 && !c.is_control() { c } else { '?' }).collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max { return s.to_string(); }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn table_header(w: &mut PageWriter) {
    w.text(COL_SKU, 9.0, true, "SKU");
    w.text(COL_PRODUCT, 9.0, true, "Product");
    w.text(COL_SIZE, 9.0, true, "Size");
    w.text(COL_LEAD, 9.0, true, "Lead time");
    w.text_right(COL_QTY_RIGHT, 9.0, true, "Qty");
    w.text_right(COL_UNIT_RIGHT, 9.0, true, "Unit");
    w.text_right(COL_TOTAL_RIGHT, 9.0, true, "Total");
    w.down(2.0);
    w.rule();
}

fn item_row(w: &mut PageWriter, line: &DocumentLine) {
    if w.ensure(14.0) { table_header(w); }
    w.text(COL_SKU, 8.0, false, &truncate(&line.sku, 16));
    w.text(COL_PRODUCT, 8.0, true, &truncate(&line.name, 34));
    w.text(COL_SIZE, 8.0, false, &truncate(line.size_label.as_deref().unwrap_or("-"), 14));
    w.text(COL_LEAD, 8.0, false, &truncate(line.lead_time.as_deref().unwrap_or("-"), 14));
    w.text_right(COL_QTY_RIGHT, 8.0, false, &line.quantity.to_string());
    w.text_right(COL_UNIT_RIGHT, 8.0, false, &format_currency(line.unit_price));
    w.text_right(COL_TOTAL_RIGHT, 8.0, true, &format_currency(line.line_total));
    w.down(4.0);
    let mut extra = vec![truncate(&line.brand, 40)];
    if line.material_test_cert { extra.push("+ Material Cert".to_string()); }
    if let Some(n) = &line.quoted_notes { extra.push(format!("Note: {}", truncate(n, 60))); }
    w.text(COL_PRODUCT, 7.0, false, &extra.join("  |  "));
    w.down(6.0);
}

fn totals(w: &mut PageWriter, doc: &QuoteDocument) {
    let p = &doc.pricing;
    let mut rows = vec![("Subtotal".to_string(), format_currency(Some(p.subtotal)))];
    if p.savings > Decimal::ZERO {
        rows.push((format!("Bulk Discount ({}%)", p.discount_percentage), format!("-{}", format_currency(Some(p.savings)))));
    }
    if p.cert_fee > Decimal::ZERO {
        rows.push((format!("Material Certs ({})", doc.cert_count), format_currency(Some(p.cert_fee))));
    }
    if p.shipping_cost > Decimal::ZERO {
        rows.push(("Shipping".to_string(), format_currency(Some(p.shipping_cost))));
    }
    rows.push(("GST (10%)".to_string(), format_currency(Some(p.gst))));
    w.ensure(rows.len() as f32 * 6.0 + 14.0);
    for (label, value) in rows {
        w.text(125.0, 9.0, false, &label);
        w.text_right(COL_TOTAL_RIGHT, 9.0, false, &value);
        w.down(6.0);
    }
    w.text(125.0, 11.0, true, "Total (inc GST)");
    w.text_right(COL_TOTAL_RIGHT, 11.0, true, &format_currency(Some(p.total)));
    w.down(8.0);
    if p.has_unpriced_items {
        w.text(MARGIN, 8.0, false, "Items marked POA require price confirmation. Please contact us for final pricing.");
        w.down(6.0);
    }
}

fn paragraph(w: &mut PageWriter, heading: &str, lines: &[String]) {
    w.ensure(8.0 + lines.len() as f32 * 4.5);
    w.text(MARGIN, 10.0, true, heading);
    w.down(5.0);
    for line in lines {
        w.ensure(5.0);
        w.text(MARGIN, 8.5, false, line);
        w.down(4.5);
    }
    w.down(3.0);
}

/// Splits on whitespace so each line stays under `width` characters.
fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let mut current = String::new();
        for word in raw.split_whitespace() {
            if !current.is_empty() && current.len() + word.len() + 1 > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() { current.push(' '); }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

fn render(doc: &QuoteDocument) -> Result<(Vec<u8>, usize), DocumentError> {
    let mut w = PageWriter::new(&format!("Quote {}", doc.quote_number))?;
    let b = &doc.business;

    w.text(MARGIN, 18.0, true, &b.name.to_uppercase());
    w.text_right(COL_TOTAL_RIGHT, 16.0, true, "QUOTATION");
    w.down(6.0);
    if let Some(abn) = &b.abn { w.text(MARGIN, 8.0, false, &format!("ABN: {abn}")); }
    w.text_right(COL_TOTAL_RIGHT, 10.0, true, &doc.quote_number);
    w.down(5.0);
    let contact = [b.phone.clone(), Some(b.sales_email.clone())].into_iter().flatten().collect::<Vec<_>>().join("  |  ");
    w.text(MARGIN, 8.0, false, &contact);
    w.text_right(COL_TOTAL_RIGHT, 8.0, false, &format!("Date: {}", doc.quote_date));
    w.down(4.5);
    w.text_right(COL_TOTAL_RIGHT, 8.0, false, &format!("Valid until: {}", doc.valid_until));
    w.down(4.0);
    w.rule();

    w.text(MARGIN, 10.0, true, "Customer");
    w.text(110.0, 10.0, true, "Delivery Address");
    w.down(5.0);
    let mut customer = vec![doc.contact_name.clone()];
    if let Some(c) = &doc.company_name { customer.push(c.clone()); }
    customer.push(doc.email.clone());
    customer.push(doc.phone.clone());
    let d = &doc.delivery;
    let delivery = [d.street.clone(), format!("{} {} {}", d.suburb, d.state, d.postcode)];
    for i in 0..customer.len().max(delivery.len()) {
        if let Some(c) = customer.get(i) { w.text(MARGIN, 9.0, false, c); }
        if let Some(a) = delivery.get(i) { w.text(110.0, 9.0, false, a); }
        w.down(4.5);
    }
    if let Some(billing) = &doc.billing {
        w.down(2.0);
        w.text(110.0, 10.0, true, "Billing Address");
        w.down(5.0);
        w.text(110.0, 9.0, false, &billing.street);
        w.down(4.5);
        w.text(110.0, 9.0, false, &format!("{} {} {}", billing.suburb, billing.state, billing.postcode));
        w.down(4.5);
    }
    w.down(4.0);

    table_header(&mut w);
    for line in &doc.items { item_row(&mut w, line); }
    w.rule();
    totals(&mut w, doc);

    if let Some(lt) = &doc.overall_lead_time {
        paragraph(&mut w, "Lead Time", &[format!("Estimated lead time: {lt} from order confirmation.")]);
    }
    if let Some(notes) = &doc.shipping_notes {
        paragraph(&mut w, "Shipping", &wrap_words(notes, 110));
    }
    if let Some(notes) = &doc.notes {
        paragraph(&mut w, "Notes", &wrap_words(notes, 110));
    }
    paragraph(&mut w, "Terms & Conditions", &[
        format!("This quote is valid until {}.", doc.valid_until),
        "All prices in AUD. GST is shown separately.".to_string(),
        "Payment: 30 days from invoice for approved accounts.".to_string(),
        "Material certificates will extend lead times.".to_string(),
    ]);

    w.ensure(12.0);
    let mut footer = format!("{}  |  {}", b.name, b.website);
    if let Some(p) = &doc.prepared_by { footer.push_str(&format!("  |  Prepared by: {p}")); }
    w.text(MARGIN, 7.5, false, &footer);

    w.finish()
}

pub fn render_quote_pdf(doc: &QuoteDocument) -> Result<Vec<u8>, DocumentError> {
    let (bytes, pages) = render(doc)?;
    tracing::debug!(quote_number = %doc.quote_number, pages, bytes = bytes.len(), "rendered quote pdf");
    Ok(bytes)
}
