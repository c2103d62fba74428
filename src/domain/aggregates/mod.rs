//! Aggregates module
pub mod product;
pub mod cart;
pub mod quote;

pub use product::{Product, ProductError, StockLevel, StockStatus, Variation};
pub use cart::{CartError, CartItem, CartTotals, QuoteCart};
pub use quote::{Address, ApprovalToken, Customer, Quote, QuoteError, QuoteItem, QuotePricing, QuoteStatus};
