pub mod adapter;
pub mod api;
pub mod cache;
pub mod config;
pub mod data_models;
pub mod exa;
pub mod formatter;
pub mod mcp;
pub mod profiles;
pub mod storage;
pub mod tokens;
