//! AMQP connection management with bounded retry
//!
//! Connecting to the broker is the only retrying path in the system;
//! once up, steady-state recovery is by re-tick, not by retry.

use crate::config::AmqpSettings;
use crate::error::{ArenaError, Result};
use amqprs::connection::{Connection, OpenConnectionArguments};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Longest pause between two connect attempts
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Configuration for the AMQP connection
#[derive(Debug, Clone)]
pub struct AmqpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for AmqpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            max_retries: 10,
            retry_delay_ms: 3_000,
        }
    }
}

impl From<&AmqpSettings> for AmqpConfig {
    fn from(settings: &AmqpSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            username: settings.username.clone(),
            password: settings.password.clone(),
            vhost: settings.vhost.clone(),
            max_retries: settings.max_retry_attempts,
            retry_delay_ms: settings.retry_delay_ms,
        }
    }
}

impl AmqpConfig {
    fn open_arguments(&self) -> OpenConnectionArguments {
        let mut args =
            OpenConnectionArguments::new(&self.host, self.port, &self.username, &self.password);
        args.virtual_host(&self.vhost);
        args
    }

    /// Pause before attempt `attempt + 1`: the base delay doubled per
    /// completed attempt, capped at [`MAX_BACKOFF`]
    fn backoff(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(10);
        Duration::from_millis(self.retry_delay_ms << doublings).min(MAX_BACKOFF)
    }
}

/// Wrapper around the broker connection
pub struct AmqpConnection {
    connection: Connection,
    _config: AmqpConfig,
}

impl AmqpConnection {
    /// Establish a connection, retrying with capped exponential backoff
    pub async fn new(config: AmqpConfig) -> Result<Self> {
        let connection = Self::establish(&config).await?;

        Ok(Self {
            connection,
            _config: config,
        })
    }

    /// Try up to `max_retries` times, pausing between attempts
    async fn establish(config: &AmqpConfig) -> Result<Connection> {
        let mut last_error = String::new();

        for attempt in 1..=config.max_retries.max(1) {
            match Connection::open(&config.open_arguments()).await {
                Ok(connection) => {
                    info!(
                        "Connected to AMQP broker at {}:{} (attempt {})",
                        config.host, config.port, attempt
                    );
                    return Ok(connection);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < config.max_retries {
                        let pause = config.backoff(attempt);
                        warn!(
                            "AMQP broker unreachable ({} of {} attempts): {}; next try in {:?}",
                            attempt, config.max_retries, last_error, pause
                        );
                        sleep(pause).await;
                    }
                }
            }
        }

        error!(
            "Giving up on AMQP broker at {}:{} after {} attempts",
            config.host, config.port, config.max_retries
        );
        Err(ArenaError::BusConnectionFailed {
            message: format!(
                "no connection after {} attempts, last error: {}",
                config.max_retries, last_error
            ),
        }
        .into())
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Close the connection
    pub async fn close(self) -> Result<()> {
        self.connection
            .close()
            .await
            .map_err(|e| ArenaError::BusConnectionFailed {
                message: format!("failed to close connection: {}", e),
            })?;
        Ok(())
    }
}
