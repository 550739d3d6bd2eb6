pub mod cache_store;
pub mod config;
pub mod contract;
pub mod core_service;
pub mod events;
pub mod icon;
pub mod inventory;
pub mod logging;
pub mod model;
pub mod runtime;
pub mod sort_key;
pub mod sync_engine;
pub mod transport;
pub mod view;
