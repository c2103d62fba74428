//! Industrial Storefront
//!
//! Catalogue, quote cart and quoting back-office for an industrial parts supplier.
//!
//! ## Features
//! - Product catalogue with per-size variation pricing and promotions
//! - Quote requests priced server-side with bulk discounts, cert fees and GST
//! - Quote PDFs and emails, versioned document storage
//! - Inventory, pricing, logistics and redirect administration

pub mod api;
pub mod config;
pub mod documents;
pub mod domain;
pub mod mail;
pub mod quoting;
pub mod rate_limit;
pub mod redirects;
pub mod storage;

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;

use crate::domain::aggregates::{CartError, ProductError, QuoteError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests. Please try again later.")]
    RateLimited,

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Mail error: {0}")]
    Mail(String),
}

impl StorefrontError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Quote(e) => match e {
                QuoteError::ApprovalExpired => StatusCode::FORBIDDEN,
                QuoteError::InvalidToken | QuoteError::ItemNotFound => StatusCode::NOT_FOUND,
                QuoteError::InvalidTransition { .. } | QuoteError::AlreadyDeleted => StatusCode::CONFLICT,
                QuoteError::NoItems | QuoteError::AlreadyForwarded | QuoteError::NotDeleted | QuoteError::InvalidAmount => StatusCode::BAD_REQUEST,
            },
            Self::Product(ProductError::VariationNotFound) => StatusCode::NOT_FOUND,
            Self::Product(ProductError::DuplicateSize(_)) => StatusCode::CONFLICT,
            Self::Product(_) => StatusCode::BAD_REQUEST,
            Self::Cart(CartError::ItemNotFound) => StatusCode::NOT_FOUND,
            Self::Cart(_) => StatusCode::BAD_REQUEST,
            Self::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Storage(_) | Self::Render(_) | Self::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for StorefrontError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<&str> = errors.field_errors().into_keys().collect();
        fields.sort_unstable();
        Self::Validation(format!("Invalid fields: {}", fields.join(", ")))
    }
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_errors_map_to_http_statuses() {
        assert_eq!(StorefrontError::from(QuoteError::ApprovalExpired).status(), StatusCode::FORBIDDEN);
        assert_eq!(StorefrontError::from(QuoteError::AlreadyForwarded).status(), StatusCode::BAD_REQUEST);
        assert_eq!(StorefrontError::from(QuoteError::NotDeleted).status(), StatusCode::BAD_REQUEST);
        assert_eq!(StorefrontError::from(QuoteError::InvalidToken).status(), StatusCode::NOT_FOUND);
        assert_eq!(StorefrontError::NotFound("Quote").to_string(), "Quote not found");
    }

    #[test]
    fn server_errors_hide_details() {
        let response = StorefrontError::Storage("disk full".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(StorefrontError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
