use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::AppState;
use crate::documents::contact::{business_contact_html, business_contact_text, customer_contact_html, customer_contact_text, ContactMessage};
use crate::mail::OutboundEmail;
use crate::rate_limit::client_ip;
use crate::{Result, StorefrontError};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ContactForm {
    #[serde(default)]
    #[validate(length(max = 255))]
    pub name: String,
    #[serde(default)]
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub company: Option<String>,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub message: String,
}

impl ContactForm {
    pub fn into_message(self) -> Result<ContactMessage> {
        let filled = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if [&self.name, &self.email, &self.message].iter().any(|s| s.trim().is_empty()) {
            return Err(StorefrontError::Validation("Name, email, and message are required".into()));
        }
        self.validate()?;
        Ok(ContactMessage {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: filled(self.phone),
            company: filled(self.company),
            message: self.message.trim().to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
}

/// Mails the enquiry to sales (reply-to the sender) and an acknowledgement to the sender.
pub async fn submit_contact(State(s): State<AppState>, headers: HeaderMap, Json(form): Json<ContactForm>) -> Result<Json<ContactResponse>> {
    let ip = client_ip(&headers);
    if !s.rate_limiter.allow(&format!("contact:{ip}"), &s.config.quote_rate_limit).await {
        tracing::warn!(ip = %ip, "contact form rate limited");
        return Err(StorefrontError::RateLimited);
    }
    let m = form.into_message()?;
    let business = &s.config.business;
    let to_sales = OutboundEmail {
        to: business.sales_email.clone(),
        from: s.config.from_email.clone(),
        reply_to: Some(m.email.clone()),
        subject: m.business_subject(),
        html: business_contact_html(&m, business),
        text: business_contact_text(&m),
        attachments: Vec::new(),
    };
    let to_customer = OutboundEmail {
        to: m.email.clone(),
        from: s.config.from_email.clone(),
        reply_to: Some(business.sales_email.clone()),
        subject: ContactMessage::customer_subject(business),
        html: customer_contact_html(&m, business),
        text: customer_contact_text(&m, business),
        attachments: Vec::new(),
    };
    let (sales, customer) = futures::future::join(s.mailer.send(to_sales), s.mailer.send(to_customer)).await;
    sales?;
    customer?;
    tracing::info!(email = %m.email, "contact enquiry sent");
    Ok(Json(ContactResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn form(name: &str, email: &str, message: &str) -> ContactForm {
        ContactForm { name: name.into(), email: email.into(), phone: Some("  ".into()), company: Some(" Pilbara Iron ".into()), message: message.into() }
    }

    #[test]
    fn form_trims_and_drops_blank_optionals() {
        let m = form(" Sam ", "sam@mine.test", " Need valves ").into_message().unwrap();
        assert_eq!(m, ContactMessage {
            name: "Sam".into(), email: "sam@mine.test".into(), phone: None, company: Some("Pilbara Iron".into()), message: "Need valves".into(),
        });
    }

    #[test]
    fn form_requires_name_email_and_message() {
        for f in [form("", "sam@mine.test", "hi"), form("Sam", " ", "hi"), form("Sam", "sam@mine.test", "")] {
            let err = f.into_message().unwrap_err();
            assert_eq!(err.to_string(), "Name, email, and message are required");
        }
        let err = form("Sam", "not-an-email", "hi").into_message().unwrap_err();
        assert_eq!(err.to_string(), "Invalid fields: email");
    }
}
