use std::sync::Arc;
use std::time::Duration;

use crate::application::services::BatchService;
use crate::domain::repositories::{HealthCheck, UrlStore};

/// Shared handles injected into whatever serves requests.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UrlStore>,
    /// Present only for backends that can be pinged.
    pub health: Option<Arc<dyn HealthCheck>>,
    pub batch_service: Arc<BatchService<dyn UrlStore>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn UrlStore>,
        health: Option<Arc<dyn HealthCheck>>,
        batch_timeout: Duration,
    ) -> Self {
        let batch_service = Arc::new(BatchService::new(store.clone()).with_timeout(batch_timeout));

        Self {
            store,
            health,
            batch_service,
        }
    }
}
