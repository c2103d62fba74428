//! Contact form emails: the enquiry for the sales inbox and the customer's acknowledgement.

use super::escape::{email_href, html_escape, tel_href};
use super::html::{business_footer, wrap};
use crate::config::BusinessProfile;

const CELL: &str = "padding: 10px; border: 1px solid #ddd;";
const MESSAGE_BOX: &str = "padding: 15px; background: #f5f5f5; border-radius: 5px; white-space: pre-wrap;";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub message: String,
}

impl ContactMessage {
    pub fn business_subject(&self) -> String {
        match &self.company {
            Some(company) => format!("Contact Form: {} from {}", self.name, company),
            None => format!("Contact Form: {}", self.name),
        }
    }

    pub fn customer_subject(business: &BusinessProfile) -> String { format!("Thank you for contacting {}", business.name) }
}

pub fn business_contact_html(m: &ContactMessage, business: &BusinessProfile) -> String {
    let row = |label: &str, value: String| format!(r#"<tr><td style="{CELL} font-weight: bold;">{label}</td><td style="{CELL}">{value}</td></tr>"#);
    let mut rows = vec![
        row("Name", html_escape(&m.name)),
        row("Email", format!(r#"<a href="mailto:{}">{}</a>"#, email_href(&m.email), html_escape(&m.email))),
    ];
    if let Some(phone) = &m.phone {
        rows.push(row("Phone", format!(r#"<a href="tel:{}">{}</a>"#, tel_href(phone), html_escape(phone))));
    }
    if let Some(company) = &m.company { rows.push(row("Company", html_escape(company))); }
    let body = format!(
        r#"<h2>New Contact Form Submission</h2>
<table style="border-collapse: collapse; width: 100%; max-width: 600px;">{rows}</table>
<h3 style="margin-top: 20px;">Message</h3>
<div style="{MESSAGE_BOX}">{message}</div>
<p style="margin-top: 20px; color: #666; font-size: 12px;">Sent from the {site} website contact form</p>"#,
        rows = rows.concat(),
        message = html_escape(&m.message),
        site = html_escape(&business.name),
    );
    wrap(&m.business_subject(), &body)
}

pub fn business_contact_text(m: &ContactMessage) -> String {
    let mut lines = vec!["New Contact Form Submission".to_string(), String::new(), format!("Name: {}", m.name), format!("Email: {}", m.email)];
    if let Some(phone) = &m.phone { lines.push(format!("Phone: {phone}")); }
    if let Some(company) = &m.company { lines.push(format!("Company: {company}")); }
    lines.extend([String::new(), "Message:".to_string(), m.message.clone()]);
    lines.join("\n")
}

pub fn customer_contact_html(m: &ContactMessage, business: &BusinessProfile) -> String {
    let urgent = business
        .phone
        .as_ref()
        .map(|p| format!("<p>If you have an urgent enquiry, please call us on <strong>{}</strong>.</p>", html_escape(p)))
        .unwrap_or_default();
    let body = format!(
        r#"<h2 style="color: #1a1a1a;">Thank you for your enquiry</h2>
<p>Hi {name},</p>
<p>We've received your message and will get back to you within 1-2 business days.</p>
{urgent}
<hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;" />
<h3 style="color: #666;">Your Message</h3>
<div style="{MESSAGE_BOX}">{message}</div>
<hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;" />
{footer}"#,
        name = html_escape(&m.name),
        message = html_escape(&m.message),
        footer = business_footer(business),
    );
    wrap(&ContactMessage::customer_subject(business), &body)
}

pub fn customer_contact_text(m: &ContactMessage, business: &BusinessProfile) -> String {
    let mut text = format!(
        "Hi {},\n\nWe've received your message and will get back to you within 1-2 business days.\n\nYour message:\n{}\n\n{}",
        m.name, m.message, business.name
    );
    if let Some(phone) = &business.phone { text.push_str(&format!("\nPhone: {phone}")); }
    text.push_str(&format!("\nEmail: {}", business.sales_email));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::fixtures;

    fn message(company: Option<&str>) -> ContactMessage {
        ContactMessage {
            name: "Sam <Site Lead>".into(), email: "sam@mine.test".into(), phone: Some("0400 000 000".into()),
            company: company.map(str::to_string), message: "Need 40 x DN100 valves\n<script>alert(1)</script>".into(),
        }
    }

    #[test]
    fn subjects_name_the_sender() {
        assert_eq!(message(Some("Pilbara Iron")).business_subject(), "Contact Form: Sam <Site Lead> from Pilbara Iron");
        assert_eq!(message(None).business_subject(), "Contact Form: Sam <Site Lead>");
        assert_eq!(ContactMessage::customer_subject(&fixtures::business()), "Thank you for contacting Acme Pipe Supplies");
    }

    #[test]
    fn enquiry_escapes_sender_text() {
        let html = business_contact_html(&message(None), &fixtures::business());
        assert!(html.contains("Sam &lt;Site Lead&gt;"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains(r#"href="tel:0400 000 000""#));
        assert!(!html.contains("Company"));
        let text = business_contact_text(&message(Some("Pilbara Iron")));
        assert!(text.contains("Company: Pilbara Iron"));
        assert!(text.ends_with("<script>alert(1)</script>"));
    }

    #[test]
    fn acknowledgement_quotes_the_message() {
        let business = fixtures::business();
        let html = customer_contact_html(&message(None), &business);
        assert!(html.contains("Hi Sam &lt;Site Lead&gt;"));
        assert!(html.contains("<strong>1300 000 000</strong>"));
        assert!(html.contains("Need 40 x DN100 valves"));
        assert!(customer_contact_text(&message(None), &business).contains("Email: sales@acme.test"));
    }
}
