//! Admin REST API for the site content core.

pub mod config;
pub mod server;

pub use config::{ApiConfig, ConfigError, StorageBackend};
pub use server::{router, ApiResponse, AppState};
