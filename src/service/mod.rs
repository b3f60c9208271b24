//! Service layer for the arena-hall service
//!
//! This module contains the main application state, the client event
//! handler gluing the transport to the core, and background task
//! management for the production service.

pub mod app;
pub mod core;

pub use app::{AppState, ServiceError};
pub use core::ArenaCore;
