//! Main application configuration
//!
//! This module defines the primary configuration structures for the arena-hall
//! service, including environment variable loading and validation.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub redis: RedisSettings,
    pub amqp: AmqpSettings,
    pub matchmaking: MatchmakingSettings,
    pub session: SessionSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port the HTTP API and websocket transport bind to
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Persistence-layer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,
    /// Sliding TTL on player records
    pub player_ttl_seconds: i64,
    /// TTL on queue sets, refreshed on enqueue
    pub queue_ttl_seconds: i64,
    /// TTL on persisted match records
    pub game_ttl_seconds: i64,
}

/// AMQP connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmqpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    /// Maximum connect attempts before startup is aborted
    pub max_retry_attempts: u32,
    /// Base delay between connect attempts in milliseconds
    pub retry_delay_ms: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingSettings {
    /// Tick period per mode in milliseconds
    pub tick_interval_ms: u64,
    /// Rating window granted to a fresh pair of candidates
    pub base_rating_window: i32,
    /// Window widening per relaxation interval of waiting
    pub relax_step: i32,
    /// Seconds of waiting that earn one widening step
    pub relax_interval_seconds: u64,
}

/// Session lifecycle timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Delay between match creation and game start
    pub start_delay_ms: u64,
    /// Cool-down before a finished match is evicted from memory
    pub eviction_delay_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "arena-hall".to_string(),
            log_level: "info".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            player_ttl_seconds: 86_400,
            queue_ttl_seconds: 3_600,
            game_ttl_seconds: 7_200,
        }
    }
}

impl Default for AmqpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            max_retry_attempts: 10,
            retry_delay_ms: 3_000,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2_000,
            base_rating_window: 100,
            relax_step: 30,
            relax_interval_seconds: 10,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            start_delay_ms: 5_000,
            eviction_delay_ms: 60_000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            config.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Redis settings
        if let Ok(url) = env::var("REDIS_URL") {
            config.redis.url = url;
        }
        if let Ok(ttl) = env::var("PLAYER_TTL_SECONDS") {
            config.redis.player_ttl_seconds = ttl
                .parse()
                .map_err(|_| anyhow!("Invalid PLAYER_TTL_SECONDS value: {}", ttl))?;
        }
        if let Ok(ttl) = env::var("QUEUE_TTL_SECONDS") {
            config.redis.queue_ttl_seconds = ttl
                .parse()
                .map_err(|_| anyhow!("Invalid QUEUE_TTL_SECONDS value: {}", ttl))?;
        }
        if let Ok(ttl) = env::var("GAME_TTL_SECONDS") {
            config.redis.game_ttl_seconds = ttl
                .parse()
                .map_err(|_| anyhow!("Invalid GAME_TTL_SECONDS value: {}", ttl))?;
        }

        // AMQP settings
        if let Ok(host) = env::var("AMQP_HOST") {
            config.amqp.host = host;
        }
        if let Ok(port) = env::var("AMQP_PORT") {
            config.amqp.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_PORT value: {}", port))?;
        }
        if let Ok(username) = env::var("AMQP_USERNAME") {
            config.amqp.username = username;
        }
        if let Ok(password) = env::var("AMQP_PASSWORD") {
            config.amqp.password = password;
        }
        if let Ok(vhost) = env::var("AMQP_VHOST") {
            config.amqp.vhost = vhost;
        }
        if let Ok(retries) = env::var("AMQP_MAX_RETRY_ATTEMPTS") {
            config.amqp.max_retry_attempts = retries
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_MAX_RETRY_ATTEMPTS value: {}", retries))?;
        }
        if let Ok(delay) = env::var("AMQP_RETRY_DELAY_MS") {
            config.amqp.retry_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_RETRY_DELAY_MS value: {}", delay))?;
        }

        // Matchmaking settings
        if let Ok(interval) = env::var("TICK_INTERVAL_MS") {
            config.matchmaking.tick_interval_ms = interval
                .parse()
                .map_err(|_| anyhow!("Invalid TICK_INTERVAL_MS value: {}", interval))?;
        }
        if let Ok(window) = env::var("BASE_RATING_WINDOW") {
            config.matchmaking.base_rating_window = window
                .parse()
                .map_err(|_| anyhow!("Invalid BASE_RATING_WINDOW value: {}", window))?;
        }
        if let Ok(step) = env::var("RELAX_STEP") {
            config.matchmaking.relax_step = step
                .parse()
                .map_err(|_| anyhow!("Invalid RELAX_STEP value: {}", step))?;
        }
        if let Ok(interval) = env::var("RELAX_INTERVAL_SECONDS") {
            config.matchmaking.relax_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid RELAX_INTERVAL_SECONDS value: {}", interval))?;
        }

        // Session settings
        if let Ok(delay) = env::var("SESSION_START_DELAY_MS") {
            config.session.start_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid SESSION_START_DELAY_MS value: {}", delay))?;
        }
        if let Ok(delay) = env::var("SESSION_EVICTION_DELAY_MS") {
            config.session.eviction_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid SESSION_EVICTION_DELAY_MS value: {}", delay))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get matchmaking tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.matchmaking.tick_interval_ms)
    }

    /// Get AMQP retry delay as Duration
    pub fn amqp_retry_delay(&self) -> Duration {
        Duration::from_millis(self.amqp.retry_delay_ms)
    }

    /// Get session start delay as Duration
    pub fn session_start_delay(&self) -> Duration {
        Duration::from_millis(self.session.start_delay_ms)
    }

    /// Get session eviction delay as Duration
    pub fn session_eviction_delay(&self) -> Duration {
        Duration::from_millis(self.session.eviction_delay_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }

    // Validate backends
    if config.redis.url.is_empty() {
        return Err(anyhow!("Redis URL cannot be empty"));
    }
    if config.redis.player_ttl_seconds <= 0
        || config.redis.queue_ttl_seconds <= 0
        || config.redis.game_ttl_seconds <= 0
    {
        return Err(anyhow!("TTLs must be greater than 0"));
    }
    if config.amqp.host.is_empty() {
        return Err(anyhow!("AMQP host cannot be empty"));
    }
    if config.amqp.max_retry_attempts == 0 {
        return Err(anyhow!("AMQP retry attempts must be greater than 0"));
    }

    // Validate matchmaking settings
    if config.matchmaking.tick_interval_ms == 0 {
        return Err(anyhow!("Tick interval must be greater than 0"));
    }
    if config.matchmaking.base_rating_window <= 0 {
        return Err(anyhow!("Base rating window must be positive"));
    }
    if config.matchmaking.relax_interval_seconds == 0 {
        return Err(anyhow!("Relaxation interval must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.matchmaking.tick_interval_ms, 2_000);
        assert_eq!(config.session.start_delay_ms, 5_000);
        assert_eq!(config.session.eviction_delay_ms, 60_000);
        assert_eq!(config.redis.player_ttl_seconds, 86_400);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let mut config = AppConfig::default();
        config.matchmaking.tick_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_duration_accessors() {
        let config = AppConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(2_000));
        assert_eq!(config.session_start_delay(), Duration::from_secs(5));
        assert_eq!(config.session_eviction_delay(), Duration::from_secs(60));
    }
}
