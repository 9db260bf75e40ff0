pub mod config;
pub mod content;
pub mod error;
pub mod logger;
pub mod post_store;
pub mod query_string;
pub mod server;
pub mod upload;
mod test_data;
