//! Shared state for the relay endpoints

use crate::config::RelayConfig;
use crate::relay::Relay;
use crate::store::FileStore;
use std::sync::Arc;

/// Shared state handed to every route
pub struct RelayState {
    pub relay: Arc<Relay>,
    pub store: Arc<dyn FileStore>,
    pub config: RelayConfig,
}

impl RelayState {
    pub fn new(config: RelayConfig, store: Arc<dyn FileStore>) -> Self {
        Self {
            relay: Arc::new(Relay::new(&config, store.clone())),
            store,
            config,
        }
    }
}
