pub mod api_key;
pub mod dataset;
pub mod preference;
pub mod session;
