pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod intake;
pub mod models;
pub mod observability;
pub mod security;
pub mod state;
pub mod store;
