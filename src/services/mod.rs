// Concept Tracker services
// Services provide the backend gateway and its SQLite implementation, crypto, object storage,
// configuration loading, startup verification and analytics.

pub mod analytics_engine;
pub mod backend_gateway;
pub mod config_loader;
pub mod connectivity;
pub mod crypto_service;
pub mod object_storage;
pub mod sqlite_gateway;
