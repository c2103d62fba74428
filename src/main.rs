//! Industrial Storefront - catalogue, quoting and back-office service

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use industrial_storefront::api::{self, AppState};
use industrial_storefront::config::Config;
use industrial_storefront::mail::{LogMailer, Mailer, NatsMailer};
use industrial_storefront::quoting::{EventPublisher, PgProductCatalog, PgQuoteRepository, QuoteService, QuoteSettings};
use industrial_storefront::rate_limit::RateLimiter;
use industrial_storefront::redirects::{PgRedirectStore, RedirectService};
use industrial_storefront::storage::PgDocumentStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, emails will only be logged");
                None
            }
        },
        None => None,
    };

    let mailer: Arc<dyn Mailer> = match &nats {
        Some(client) => Arc::new(NatsMailer::new(client.clone())),
        None => Arc::new(LogMailer),
    };
    let events = EventPublisher::new(nats);
    let quotes = QuoteService::new(
        Arc::new(PgQuoteRepository::new(db.clone())),
        Arc::new(PgProductCatalog::new(db.clone())),
        Arc::new(PgDocumentStore::new(db.clone())),
        mailer.clone(),
        events.clone(),
        QuoteSettings::from_config(&config),
    );
    let rate_limiter = Arc::new(RateLimiter::for_config(&config.quote_rate_limit));
    let redirects = RedirectService::new(Arc::new(PgRedirectStore::new(db.clone())), config.redirect_cache_ttl);

    let port = config.port;
    let state = AppState {
        db,
        config: Arc::new(config),
        quotes: Arc::new(quotes),
        redirects,
        rate_limiter,
        events,
        mailer,
    };
    let app = api::router(state);

    tracing::info!("Industrial Storefront listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
