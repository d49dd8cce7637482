pub mod datasets;
pub mod health;
pub mod keys;
pub mod preferences;
pub mod stats;
