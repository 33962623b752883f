//! Application state for dispatch-server

use std::sync::Arc;

use crate::clients::{HttpDeliveryClient, ShopifyClient, SquareClient};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::healing::HealingService;
use crate::ledger::AuditStore;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub healing: Arc<HealingService>,
    /// Audit records (read path)
    pub store: AuditStore,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, BoxError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let db_path = config.audit_db_path();
        let store = AuditStore::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Audit store opened");

        // No client timeout: outbound calls take as long as the remote side does
        let http = reqwest::Client::builder()
            .user_agent(concat!("dispatch-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let commerce = Arc::new(ShopifyClient::new(
            http.clone(),
            &config.shopify_shop_domain,
            &config.shopify_api_version,
            config.shopify_access_token.clone(),
        ));
        let pos = Arc::new(SquareClient::new(
            http.clone(),
            &config.square_base_url,
            config.square_access_token.clone(),
        ));
        let delivery = Arc::new(HttpDeliveryClient::new(http, config.delivery_api_url.clone()));

        let dispatcher = Dispatcher::new(
            commerce.clone(),
            pos,
            delivery,
            store.clone(),
            config.default_location.clone(),
            config.payment_key_window_secs,
        );
        let healing = HealingService::new(
            commerce,
            store.clone(),
            config.default_location.time_zone,
        );

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            healing: Arc::new(healing),
            store,
        })
    }
}
