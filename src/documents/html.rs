//! HTML email bodies. All customer-supplied text goes through [`html_escape`].

use rust_decimal::Decimal;

use super::escape::{email_href, html_escape, safe_url, tel_href};
use super::{DocumentLine, QuoteDocument};
use crate::config::BusinessProfile;
use crate::domain::aggregates::quote::Address;
use crate::domain::flags::QuoteExceptionFlags;
use crate::domain::value_objects::format_currency;

const BADGE: &str = "display: inline-block; color: white; padding: 6px 12px; border-radius: 4px; margin: 4px; font-weight: 600;";
const CELL: &str = "padding: 10px; border: 1px solid #ddd;";

/// Green box for standard quotes, amber with badges when staff need to look closer.
pub fn flags_html(flags: &QuoteExceptionFlags) -> String {
    let mut badges = Vec::new();
    if flags.is_remote {
        badges.push(format!(r#"<div style="{BADGE} background: #dc2626;">🚛 REMOTE/MINE SITE</div>"#));
    } else if flags.is_non_metro {
        badges.push(format!(r#"<div style="{BADGE} background: #f59e0b;">📍 NON-METRO DELIVERY</div>"#));
    }
    if flags.is_large_order {
        badges.push(format!(r#"<div style="{BADGE} background: #7c3aed;">📦 LARGE ORDER ({} items)</div>"#, flags.total_quantity));
    }
    if flags.has_long_lead_time {
        badges.push(format!(r#"<div style="{BADGE} background: #0369a1;">⏳ LONG LEAD TIME</div>"#));
    }

    if badges.is_empty() {
        return r#"<div style="background: #dcfce7; border: 2px solid #22c55e; border-radius: 8px; padding: 12px 16px; margin-bottom: 20px;">
  <p style="margin: 0; color: #166534; font-weight: 600;">✅ Standard Quote - No special handling required</p>
</div>"#
            .to_string();
    }

    let mut details = String::new();
    if flags.has_long_lead_time {
        let items: Vec<String> = flags.long_lead_time_items.iter().map(|i| html_escape(i)).collect();
        details.push_str(&format!(r#"<p style="margin: 8px 0 0 0; color: #92400e; font-size: 13px;"><strong>Long lead items:</strong> {}</p>"#, items.join(", ")));
    }
    if flags.is_remote {
        details.push_str(r#"<p style="margin: 8px 0 0 0; color: #92400e; font-size: 13px;"><strong>Delivery:</strong> Remote/mine site - custom freight quote required</p>"#);
    } else if flags.is_non_metro {
        details.push_str(r#"<p style="margin: 8px 0 0 0; color: #92400e; font-size: 13px;"><strong>Delivery:</strong> Regional delivery - confirm shipping cost</p>"#);
    }

    format!(
        r#"<div style="background: #fef3c7; border: 2px solid #f59e0b; border-radius: 8px; padding: 12px 16px; margin-bottom: 20px;">
  <p style="margin: 0 0 8px 0; color: #92400e; font-weight: 600;">⚠️ Requires Attention</p>
  <div>{}</div>
  {}
</div>"#,
        badges.join(""),
        details
    )
}

fn address_html(addr: &Address) -> String {
    format!(
        "{}<br />{} {} {}",
        html_escape(&addr.street),
        html_escape(&addr.suburb),
        html_escape(&addr.state),
        html_escape(&addr.postcode)
    )
}

fn line_details(line: &DocumentLine) -> String {
    let mut out = format!(
        r#"<strong>{}</strong><br /><span style="color: #666; font-size: 12px;">{}</span>"#,
        html_escape(&line.name),
        html_escape(&line.brand)
    );
    if let Some(size) = &line.size_label {
        out.push_str(&format!(r#"<br /><span style="color: #666; font-size: 12px;">Size: {}</span>"#, html_escape(size)));
    }
    if line.material_test_cert {
        out.push_str(r#"<br /><span style="display: inline-block; background: #e0f2fe; color: #0369a1; padding: 2px 6px; border-radius: 4px; font-size: 11px; margin-top: 4px;">+ Material Cert</span>"#);
    }
    if let Some(lt) = &line.lead_time {
        out.push_str(&format!(r#"<br /><span style="font-size: 11px; color: #666;">Lead time: {}</span>"#, html_escape(lt)));
    }
    if let Some(notes) = &line.quoted_notes {
        out.push_str(&format!(r#"<br /><span style="font-size: 11px; color: #92400e; font-style: italic;">Note: {}</span>"#, html_escape(notes)));
    }
    out
}

fn items_table(doc: &QuoteDocument) -> String {
    let rows: String = doc
        .items
        .iter()
        .map(|line| {
            format!(
                r#"<tr>
  <td style="{CELL}">{}</td>
  <td style="{CELL}">{}</td>
  <td style="{CELL} text-align: center;">{}</td>
  <td style="{CELL} text-align: right;">{}</td>
  <td style="{CELL} text-align: right;">{}</td>
</tr>"#,
                html_escape(&line.sku),
                line_details(line),
                line.quantity,
                format_currency(line.unit_price),
                format_currency(line.line_total)
            )
        })
        .collect();
    format!(
        r#"<table style="border-collapse: collapse; width: 100%;">
  <thead>
    <tr style="background: #f5f5f5;">
      <th style="{CELL} text-align: left;">SKU</th>
      <th style="{CELL} text-align: left;">Product</th>
      <th style="{CELL} text-align: center;">Qty</th>
      <th style="{CELL} text-align: right;">Unit Price</th>
      <th style="{CELL} text-align: right;">Line Total</th>
    </tr>
  </thead>
  <tbody>
{rows}
  </tbody>
</table>"#
    )
}

fn totals_row(label: &str, value: &str, color: Option<&str>) -> String {
    let style = color.map(|c| format!(" color: {c};")).unwrap_or_default();
    format!(r#"<tr><td style="padding: 8px 12px; border-bottom: 1px solid #e5e7eb;">{label}</td><td style="padding: 8px 12px; border-bottom: 1px solid #e5e7eb; text-align: right;{style}">{value}</td></tr>"#)
}

fn totals_table(doc: &QuoteDocument) -> String {
    let p = &doc.pricing;
    let mut rows = vec![totals_row("Subtotal", &format_currency(Some(p.subtotal)), None)];
    if p.savings > Decimal::ZERO {
        rows.push(totals_row(&format!("Bulk Discount ({}%)", p.discount_percentage), &format!("-{}", format_currency(Some(p.savings))), Some("#dc2626")));
    }
    if p.cert_fee > Decimal::ZERO {
        rows.push(totals_row(&format!("Material Certs ({})", doc.cert_count), &format_currency(Some(p.cert_fee)), None));
    }
    if p.shipping_cost > Decimal::ZERO {
        let label = match &doc.shipping_notes {
            Some(n) => format!("Shipping ({})", html_escape(n)),
            None => "Shipping".to_string(),
        };
        rows.push(totals_row(&label, &format_currency(Some(p.shipping_cost)), None));
    }
    rows.push(totals_row("GST (10%)", &format_currency(Some(p.gst)), None));
    rows.push(format!(
        r#"<tr style="background: #0ea5e9;"><td style="padding: 12px; color: #ffffff;"><strong>Total (inc GST)</strong></td><td style="padding: 12px; text-align: right; color: #ffffff;"><strong>{}</strong></td></tr>"#,
        format_currency(Some(p.total))
    ));
    let poa = if p.has_unpriced_items {
        r#"<p style="color: #d97706; margin-top: 10px;">⚠️ Some items marked as POA require manual pricing.</p>"#
    } else {
        ""
    };
    format!(r#"<table style="width: 100%; max-width: 320px; margin-left: auto; background: #f9fafb; border-collapse: collapse;">{}</table>{poa}"#, rows.join(""))
}

fn footer(doc: &QuoteDocument) -> String { business_footer(&doc.business) }

pub(super) fn business_footer(b: &BusinessProfile) -> String {
    let mut lines = vec![format!("<strong>{}</strong>", html_escape(&b.name))];
    if let Some(abn) = &b.abn { lines.push(format!("ABN: {}", html_escape(abn))); }
    if let Some(phone) = &b.phone {
        lines.push(format!(r#"Phone: <a href="tel:{}">{}</a>"#, tel_href(phone), html_escape(phone)));
    }
    lines.push(format!(r#"Email: <a href="mailto:{}">{}</a>"#, email_href(&b.sales_email), html_escape(&b.sales_email)));
    let site = safe_url(&b.website);
    if !site.is_empty() {
        let shown = site.trim_start_matches("https://").trim_start_matches("http://");
        lines.push(format!(r#"<a href="{}">{}</a>"#, html_escape(site), html_escape(shown)));
    }
    format!(r#"<p style="color: #666; font-size: 14px;">{}</p>"#, lines.join("<br />"))
}

pub(super) fn wrap(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{}</title>
</head>
<body style="margin: 0; padding: 20px; font-family: Arial, sans-serif; background-color: #f3f4f6;">
<div style="max-width: 640px; margin: 0 auto; background: #ffffff; padding: 30px; border-radius: 8px;">
{body}
</div>
</body>
</html>"#,
        html_escape(title)
    )
}

/// Sent to the sales inbox when a quote request arrives.
pub fn business_notification_html(doc: &QuoteDocument, flags: &QuoteExceptionFlags, delivery_note: &str, approval_url: Option<&str>) -> String {
    let company_row = doc
        .company_name
        .as_ref()
        .map(|c| format!(r#"<tr><td style="{CELL} font-weight: bold;">Company</td><td style="{CELL}">{}</td></tr>"#, html_escape(c)))
        .unwrap_or_default();
    let notes = doc
        .notes
        .as_ref()
        .map(|n| format!(r#"<h3 style="margin-top: 30px;">Additional Requirements</h3><div style="padding: 15px; background: #f5f5f5; border-radius: 5px; white-space: pre-wrap;">{}</div>"#, html_escape(n)))
        .unwrap_or_default();
    let approve = approval_url
        .map(safe_url)
        .filter(|u| !u.is_empty())
        .map(|u| {
            format!(
                r#"<div style="margin: 30px 0; text-align: center;"><a href="{}" style="display: inline-block; background: #16a34a; color: #ffffff; padding: 14px 28px; border-radius: 6px; text-decoration: none; font-weight: 600;">Review &amp; Send Quote to Customer</a></div>"#,
                html_escape(u)
            )
        })
        .unwrap_or_default();
    let lead = doc
        .overall_lead_time
        .as_ref()
        .map(|lt| format!("<p><strong>Overall lead time:</strong> {}</p>", html_escape(lt)))
        .unwrap_or_default();

    let body = format!(
        r#"<h2>New Quote Request {number}</h2>
{flags}
<h3>Customer Details</h3>
<table style="border-collapse: collapse; width: 100%; max-width: 600px;">
  <tr><td style="{CELL} font-weight: bold; width: 120px;">Name</td><td style="{CELL}">{name}</td></tr>
  <tr><td style="{CELL} font-weight: bold;">Email</td><td style="{CELL}"><a href="mailto:{email_href}">{email}</a></td></tr>
  <tr><td style="{CELL} font-weight: bold;">Phone</td><td style="{CELL}"><a href="tel:{tel_href}">{phone}</a></td></tr>
  {company_row}
  <tr><td style="{CELL} font-weight: bold;">Delivery</td><td style="{CELL}">{address}<br /><em>{delivery_note}</em></td></tr>
</table>
<h3 style="margin-top: 30px;">Requested Items ({count})</h3>
{items}
{lead}
<div style="margin-top: 20px;">{totals}</div>
{notes}
{approve}"#,
        number = html_escape(&doc.quote_number),
        flags = flags_html(flags),
        name = html_escape(&doc.contact_name),
        email_href = email_href(&doc.email),
        email = html_escape(&doc.email),
        tel_href = tel_href(&doc.phone),
        phone = html_escape(&doc.phone),
        address = address_html(&doc.delivery),
        delivery_note = html_escape(delivery_note),
        count = doc.items.len(),
        items = items_table(doc),
        totals = totals_table(doc),
    );
    wrap(&format!("Quote Request {}", doc.quote_number), &body)
}

/// Acknowledgement sent to the customer straight after they submit.
pub fn customer_confirmation_html(doc: &QuoteDocument) -> String {
    let rows: String = doc
        .items
        .iter()
        .map(|i| {
            let size = i.size_label.as_ref().map(|s| format!(" ({})", html_escape(s))).unwrap_or_default();
            format!(
                r#"<tr><td style="padding: 8px; border-bottom: 1px solid #eee;">{}{}</td><td style="padding: 8px; border-bottom: 1px solid #eee; text-align: center;">{}</td></tr>"#,
                html_escape(&i.name),
                size,
                i.quantity
            )
        })
        .collect();
    let count = doc.items.len();
    let body = format!(
        r#"<h2 style="color: #1a1a1a;">Thank you for your quote request</h2>
<p>Hi {name},</p>
<p>We've received your quote request <strong>{number}</strong> for {count} item{plural}. Our team will review your requirements and send you a detailed quote within <strong>1-2 business days</strong>.</p>
<h3 style="color: #666; margin-top: 30px;">Items Requested</h3>
<table style="width: 100%; border-collapse: collapse;">
  <thead><tr style="background: #f5f5f5;"><th style="padding: 10px; text-align: left;">Product</th><th style="padding: 10px; text-align: center;">Qty</th></tr></thead>
  <tbody>{rows}</tbody>
</table>
<p style="margin-top: 20px;">If you have any questions or need to make changes to your request, please reply to this email.</p>
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;" />
{footer}"#,
        name = html_escape(&doc.contact_name),
        number = html_escape(&doc.quote_number),
        plural = if count == 1 { "" } else { "s" },
        footer = footer(doc),
    );
    wrap(&format!("Your Quote Request {}", doc.quote_number), &body)
}

/// The priced quote sent with the PDF once staff approve it.
pub fn approved_quote_html(doc: &QuoteDocument) -> String {
    let billing = doc
        .billing
        .as_ref()
        .map(|b| format!(r#"<br /><br /><strong style="display: block; margin-bottom: 8px;">Billing Address</strong>{}"#, address_html(b)))
        .unwrap_or_default();
    let prepared = doc
        .prepared_by
        .as_ref()
        .map(|p| format!(r#"<p style="color: #6b7280; font-size: 12px;">Quote prepared by: {}</p>"#, html_escape(p)))
        .unwrap_or_default();
    let body = format!(
        r#"<table width="100%"><tr>
  <td><span style="display: inline-block; background-color: #0ea5e9; color: #ffffff; padding: 6px 12px; border-radius: 4px; font-size: 12px; font-weight: 600; text-transform: uppercase;">Quotation</span></td>
  <td style="text-align: right;"><strong style="font-size: 16px;">{number}</strong><br /><span style="font-size: 12px; color: #666;">Date: {date}</span><br /><span style="font-size: 12px; color: #666;">Valid until: {valid}</span></td>
</tr></table>
<h2 style="margin: 20px 0 15px 0; font-size: 20px;">Hi {name},</h2>
<p style="color: #4b5563; line-height: 1.6;">Thank you for your quote request. We're pleased to provide the following quotation for {customer}. Please review the details below and let us know if you have any questions.</p>
<div style="background-color: #f9fafb; padding: 15px; border-radius: 6px; border-left: 4px solid #0ea5e9; margin-bottom: 20px;">
  <strong style="display: block; margin-bottom: 8px;">Delivery Address</strong>{delivery}{billing}
</div>
<h3 style="font-size: 16px; border-bottom: 2px solid #e5e7eb; padding-bottom: 8px;">Quoted Items ({count})</h3>
{items}
<div style="margin-top: 20px;">{totals}</div>
<div style="background-color: #ecfdf5; padding: 20px; border-radius: 6px; border-left: 4px solid #10b981; margin-top: 20px;">
  <h4 style="margin: 0 0 12px 0; color: #065f46;">Ready to order?</h4>
  <p style="margin: 0; color: #047857; font-size: 13px;">Email your purchase order to <a href="mailto:{sales_href}">{sales}</a> with a copy of this email or the attached PDF.</p>
</div>
<div style="background-color: #f0f9ff; padding: 20px; border-radius: 6px; border-left: 4px solid #0ea5e9; margin-top: 20px;">
  <h4 style="margin: 0 0 12px 0;">Terms &amp; Conditions</h4>
  <ul style="margin: 0; padding-left: 20px; color: #4b5563; font-size: 13px; line-height: 1.8;">
    <li>This quote is valid until {valid}</li>
    <li>All prices in AUD, GST included where shown</li>
    <li>Payment: 30 days from invoice for approved accounts</li>
    <li>Material certificates will extend lead times</li>
  </ul>
</div>
{footer}
{prepared}"#,
        number = html_escape(&doc.quote_number),
        date = html_escape(&doc.quote_date),
        valid = html_escape(&doc.valid_until),
        name = html_escape(&doc.contact_name),
        customer = html_escape(doc.customer_label()),
        delivery = address_html(&doc.delivery),
        count = doc.items.len(),
        items = items_table(doc),
        totals = totals_table(doc),
        sales_href = email_href(&doc.business.sales_email),
        sales = html_escape(&doc.business.sales_email),
        footer = footer(doc),
    );
    wrap(&format!("Your Quote from {} - {}", doc.business.name, doc.quote_number), &body)
}
