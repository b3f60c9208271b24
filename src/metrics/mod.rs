//! Metrics collection for the arena-hall service

pub mod collector;

pub use collector::MetricsCollector;
