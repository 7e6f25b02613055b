use std::sync::Arc;

use facturo_auth::{Argon2PasswordHasher, Hs256Jwt};
use facturo_core::{Clock, SystemClock};
use facturo_infra::{
    InMemoryStore, InvoiceAggregator, InvoiceLineService, InvoiceLineStore, InvoiceService,
    InvoiceStore, LopdfRenderer, PostgresStore, StoreResult, UserService, UserStore,
};

use crate::config::ApiConfig;

/// Everything a handler needs, shared behind one `Arc`.
pub struct AppServices {
    pub invoices: InvoiceService,
    pub lines: InvoiceLineService,
    pub users: UserService,
    pub tokens: Arc<Hs256Jwt>,
}

/// Wire the services over the store selected by `config`.
pub async fn build_services(config: &ApiConfig) -> StoreResult<AppServices> {
    let tokens = Arc::new(Hs256Jwt::with_ttl(config.jwt_secret.as_bytes(), config.token_ttl));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match (&config.database_url, config.use_persistent_stores) {
        (Some(url), true) => {
            let store = PostgresStore::connect(url, config.db_max_connections).await?;
            tracing::info!("using postgres stores");
            Ok(wire(Arc::new(store), clock, tokens))
        }
        _ => {
            tracing::info!("using in-memory stores");
            Ok(wire(Arc::new(InMemoryStore::new()), clock, tokens))
        }
    }
}

/// One backing store serves all three store roles.
pub fn wire<S>(store: Arc<S>, clock: Arc<dyn Clock>, tokens: Arc<Hs256Jwt>) -> AppServices
where
    S: InvoiceStore + InvoiceLineStore + UserStore + 'static,
{
    let invoice_store: Arc<dyn InvoiceStore> = store.clone();
    let line_store: Arc<dyn InvoiceLineStore> = store.clone();
    let user_store: Arc<dyn UserStore> = store;

    let aggregator = Arc::new(InvoiceAggregator::new(
        invoice_store.clone(),
        line_store.clone(),
        clock.clone(),
    ));

    AppServices {
        invoices: InvoiceService::new(
            invoice_store.clone(),
            line_store.clone(),
            user_store.clone(),
            clock.clone(),
            aggregator.clone(),
            Arc::new(LopdfRenderer::new()),
        ),
        lines: InvoiceLineService::new(invoice_store, line_store, clock.clone(), aggregator),
        users: UserService::new(user_store, Arc::new(Argon2PasswordHasher::default()), clock),
        tokens,
    }
}
