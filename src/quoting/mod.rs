//! Quote pipeline: submission, staff review, PDF versions and delivery to the customer.

pub mod catalog;
pub mod events;
pub mod repository;
pub mod service;

pub use catalog::{CatalogEntry, MemoryProductCatalog, PgProductCatalog, ProductCatalog, RequestedLine};
pub use events::EventPublisher;
pub use repository::{MemoryQuoteRepository, PgQuoteRepository, QuoteRepository, QuoteSummary};
pub use service::{EmailPreview, FinalizeQuote, QuotePatch, QuoteRequest, QuoteService, QuoteSettings, SentQuote, SubmittedQuote};
