pub mod client;
pub mod config;
pub mod export;
pub mod humanize;
pub mod observability;
pub mod retry;
pub mod storage;
