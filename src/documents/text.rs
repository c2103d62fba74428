//! Plain-text alternatives for the HTML emails.

use std::fmt::Write as _;

use rust_decimal::Decimal;

use super::{DocumentLine, QuoteDocument};
use crate::domain::flags::QuoteExceptionFlags;
use crate::domain::value_objects::format_currency;

pub fn flags_text(flags: &QuoteExceptionFlags) -> String {
    let mut lines = Vec::new();
    if flags.is_remote {
        lines.push("- REMOTE/MINE SITE: custom freight quote required".to_string());
    } else if flags.is_non_metro {
        lines.push("- NON-METRO DELIVERY: confirm shipping cost".to_string());
    }
    if flags.is_large_order {
        lines.push(format!("- LARGE ORDER: {} items", flags.total_quantity));
    }
    if flags.has_long_lead_time {
        lines.push(format!("- LONG LEAD TIME: {}", flags.long_lead_time_items.join(", ")));
    }
    if lines.is_empty() {
        "STANDARD QUOTE - No special handling required".to_string()
    } else {
        format!("FLAGS:\n{}", lines.join("\n"))
    }
}

fn line_text(line: &DocumentLine) -> String {
    let mut out = format!("  - {} | {}", line.sku, line.name);
    if let Some(size) = &line.size_label { let _ = write!(out, " ({size})"); }
    let _ = write!(out, " | Qty: {} | {} ea | {}", line.quantity, format_currency(line.unit_price), format_currency(line.line_total));
    if line.material_test_cert { out.push_str(" [+ Material Cert]"); }
    if let Some(lt) = &line.lead_time { let _ = write!(out, " | Lead time: {lt}"); }
    if let Some(notes) = &line.quoted_notes { let _ = write!(out, " - Note: {notes}"); }
    out
}

fn totals_text(doc: &QuoteDocument) -> String {
    let p = &doc.pricing;
    let mut out = format!("Subtotal: {}\n", format_currency(Some(p.subtotal)));
    if p.savings > Decimal::ZERO {
        let _ = writeln!(out, "Bulk Discount ({}%): -{}", p.discount_percentage, format_currency(Some(p.savings)));
    }
    if p.cert_fee > Decimal::ZERO {
        let _ = writeln!(out, "Material Certs ({}): {}", doc.cert_count, format_currency(Some(p.cert_fee)));
    }
    if p.shipping_cost > Decimal::ZERO {
        let notes = doc.shipping_notes.as_ref().map(|n| format!(" ({n})")).unwrap_or_default();
        let _ = writeln!(out, "Shipping{notes}: {}", format_currency(Some(p.shipping_cost)));
    }
    let _ = writeln!(out, "GST (10%): {}", format_currency(Some(p.gst)));
    let _ = write!(out, "TOTAL (inc GST): {}", format_currency(Some(p.total)));
    if p.has_unpriced_items { out.push_str("\nNote: Some items marked POA require manual pricing"); }
    out
}

fn items_text(doc: &QuoteDocument) -> String { doc.items.iter().map(line_text).collect::<Vec<_>>().join("\n") }

pub fn business_notification_text(doc: &QuoteDocument, flags: &QuoteExceptionFlags, delivery_note: &str, approval_url: Option<&str>) -> String {
    let mut out = format!("NEW QUOTE REQUEST {}\n\n{}\n\n", doc.quote_number, flags_text(flags));
    out.push_str("Customer Details\n================\n");
    let _ = writeln!(out, "Name: {}\nEmail: {}\nPhone: {}", doc.contact_name, doc.email, doc.phone);
    if let Some(company) = &doc.company_name { let _ = writeln!(out, "Company: {company}"); }
    let d = &doc.delivery;
    let _ = writeln!(out, "Delivery: {}, {} {} {} ({})", d.street, d.suburb, d.state, d.postcode, delivery_note);
    let _ = write!(out, "\nRequested Items ({})\n================\n{}\n\n{}\n", doc.items.len(), items_text(doc), totals_text(doc));
    if let Some(lt) = &doc.overall_lead_time { let _ = writeln!(out, "Overall lead time: {lt}"); }
    if let Some(notes) = &doc.notes { let _ = write!(out, "\nAdditional Requirements:\n{notes}\n"); }
    if let Some(url) = approval_url { let _ = write!(out, "\nReview and send to customer: {url}\n"); }
    out.trim_end().to_string()
}

pub fn customer_confirmation_text(doc: &QuoteDocument) -> String {
    let items: Vec<String> = doc.items.iter().map(|i| format!("  - {} x {}", i.quantity, i.name)).collect();
    format!(
        "Hi {},\n\nWe've received your quote request {} for {} item{}. Our team will review your requirements and send you a detailed quote within 1-2 business days.\n\nItems Requested\n---------------\n{}\n\n{}\n{}",
        doc.contact_name,
        doc.quote_number,
        doc.items.len(),
        if doc.items.len() == 1 { "" } else { "s" },
        items.join("\n"),
        doc.business.name,
        doc.business.sales_email
    )
}

pub fn approved_quote_text(doc: &QuoteDocument) -> String {
    let d = &doc.delivery;
    let mut out = format!(
        "{}\n{}\n\nQUOTATION: {}\nDate: {}\nValid Until: {}\n\n---\n\nHi {},\n\nThank you for your quote request. We're pleased to provide the following quotation for {}.\n\nDELIVERY ADDRESS\n----------------\n{}\n{} {} {}\n",
        doc.business.name.to_uppercase(),
        "=".repeat(doc.business.name.len()),
        doc.quote_number,
        doc.quote_date,
        doc.valid_until,
        doc.contact_name,
        doc.customer_label(),
        d.street,
        d.suburb,
        d.state,
        d.postcode
    );
    if let Some(b) = &doc.billing {
        let _ = write!(out, "\nBILLING ADDRESS\n---------------\n{}\n{} {} {}\n", b.street, b.suburb, b.state, b.postcode);
    }
    let _ = write!(out, "\nQUOTED ITEMS ({})\n------------\n{}\n\n{}\n", doc.items.len(), items_text(doc), totals_text(doc));
    let _ = write!(out, "\nREADY TO ORDER?\nEmail your purchase order to {} with a copy of this email or the attached PDF.\n", doc.business.sales_email);
    if let Some(phone) = &doc.business.phone { let _ = writeln!(out, "Questions? Call us on {phone}"); }
    let _ = write!(out, "\nThis quote is valid until {}.\n", doc.valid_until);
    if let Some(p) = &doc.prepared_by { let _ = write!(out, "\nQuote prepared by: {p}\n"); }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::fixtures;
    use crate::domain::flags::detect_exceptions;
    use crate::domain::shipping::DeliveryZone;

    #[test]
    fn flag_lines() {
        assert_eq!(flags_text(&detect_exceptions(&[], DeliveryZone::Metro)), "STANDARD QUOTE - No special handling required");
        let text = flags_text(&detect_exceptions(&[], DeliveryZone::Regional));
        assert_eq!(text, "FLAGS:\n- NON-METRO DELIVERY: confirm shipping cost");
    }

    #[test]
    fn approved_text_lists_lines_and_totals() {
        let doc = QuoteDocument::from_quote(&fixtures::quote(), &fixtures::business(), None);
        let text = approved_quote_text(&doc);
        assert!(text.starts_with("ACME PIPE SUPPLIES\n"));
        assert!(text.contains("  - BFV-100 | Butterfly Valve <Wafer> | Qty: 2 | $420.00 ea | $840.00 | Lead time: 6-8 weeks"));
        assert!(text.contains("  - FAB-1 | Custom Spool | Qty: 1 | POA ea | POA [+ Material Cert]"));
        assert!(text.contains("Bulk Discount (15%): -$144.75"));
        assert!(text.contains("TOTAL (inc GST): $1287.28"));
        assert!(text.contains("Questions? Call us on 1300 000 000"));
    }

    #[test]
    fn business_text_includes_approval_link() {
        let q = fixtures::quote();
        let doc = QuoteDocument::from_quote(&q, &fixtures::business(), None);
        let text = business_notification_text(&doc, &detect_exceptions(q.items(), q.delivery_zone()), "Remote", Some("https://acme.test/a/t"));
        assert!(text.starts_with("NEW QUOTE REQUEST Q-20250305-0003\n\nFLAGS:\n- REMOTE/MINE SITE"));
        assert!(text.ends_with("Review and send to customer: https://acme.test/a/t"));
    }
}
