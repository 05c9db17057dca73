pub mod assistant;
pub mod chat;
pub mod config;
pub mod db;
pub mod entry;
pub mod error;
pub mod http;
pub mod types;
