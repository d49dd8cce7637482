pub mod cache;
pub mod dataset_service;
pub mod key_service;
pub mod preference_service;
pub mod rate_limit;
