//! HTTP API for the arena-hall service

pub mod routes;

// Re-export commonly used types
pub use routes::{api_router, HttpState};
