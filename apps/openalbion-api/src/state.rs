use openalbion_db::store::{HealthCheck, SessionStore, Stores};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    dataset_service::DatasetService, key_service::KeyService,
    preference_service::PreferenceService, rate_limit::RateLimiter,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: KeyService,
    pub datasets: Arc<DatasetService>,
    pub preferences: PreferenceService,
    pub sessions: Arc<dyn SessionStore>,
    pub health: Arc<dyn HealthCheck>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub fn new(config: AppConfig, stores: Stores, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        let datasets = DatasetService::new(stores.datasets, config.dataset_cache_ttl);
        Self {
            keys: KeyService::new(stores.api_keys),
            datasets: Arc::new(datasets),
            preferences: PreferenceService::new(stores.preferences),
            sessions: stores.sessions,
            health: stores.health,
            rate_limiter,
            config: Arc::new(config),
        }
    }
}
