pub mod aggregate;
pub mod config;
pub mod feed;
pub mod http_client;
pub mod image_cache;
pub mod resolve;
pub mod sheet_fetch;
pub mod state;
pub mod wiki_fetch;
