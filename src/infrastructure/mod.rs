pub mod api_client;
pub mod audio;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod stats_cache;
pub mod storage;
