pub mod api;
pub mod config;
pub mod scanner;
pub mod source;
pub mod store;
pub mod types;
