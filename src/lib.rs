pub mod app;
pub mod authz;
pub mod config;
pub mod db;
pub mod docs;
pub mod errors;
pub mod jwt;
pub mod models;
pub mod routes;
pub mod store;
pub mod telegram;
pub mod utils;
pub mod workflow;

// Re-export commonly used items for tests
pub use app::{create_app, router, AppState};
