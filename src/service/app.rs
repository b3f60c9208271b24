//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the stores,
//! the bus, the matchmaking engine, the session manager, and the HTTP
//! and websocket surfaces, and manages background tasks.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::publisher::AmqpEventPublisher;
use crate::config::AppConfig;
use crate::events::fanout::EventFanOut;
use crate::http::routes::{api_router, HttpState};
use crate::matchmaker::engine::{MatchmakerConfig, MatchmakerStats, MatchmakingEngine};
use crate::metrics::MetricsCollector;
use crate::session::manager::{SessionManager, SessionStats, SessionTimings};
use crate::service::core::ArenaCore;
use crate::store::game::RedisGameStore;
use crate::store::player::RedisPlayerStore;
use crate::store::queue::RedisQueueStore;
use crate::transport::handler::TransportState;
use crate::transport::registry::InMemoryConnectionRegistry;
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Service-level errors; all of these abort startup
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Redis connection error: {message}")]
    RedisConnection { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    metrics: Arc<MetricsCollector>,
    sessions: Arc<SessionManager>,
    engine: Arc<MatchmakingEngine>,
    http_state: HttpState,
    transport_state: TransportState,
    /// Held open for the lifetime of the service; dropping it would
    /// tear down the publisher's channel
    _amqp_connection: AmqpConnection,
    background_tasks: Vec<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies.
    ///
    /// Store and bus connections are mandatory; a failure here is fatal
    /// and the process should exit.
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing arena-hall service");
        info!(
            "Configuration: service={}, redis={}, amqp={}:{}",
            config.service.name, config.redis.url, config.amqp.host, config.amqp.port
        );

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("failed to build metrics collector: {}", e),
            }
        })?);

        // Persistence
        let redis_client =
            redis::Client::open(config.redis.url.as_str()).map_err(|e| {
                ServiceError::RedisConnection {
                    message: format!("invalid redis url: {}", e),
                }
            })?;
        let redis_conn = redis_client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ServiceError::RedisConnection {
                message: format!("failed to connect to redis: {}", e),
            })?;
        let players = Arc::new(RedisPlayerStore::new(
            redis_conn.clone(),
            config.redis.player_ttl_seconds,
        ));
        let queues = Arc::new(RedisQueueStore::new(
            redis_conn.clone(),
            config.redis.queue_ttl_seconds,
        ));
        let games = Arc::new(RedisGameStore::new(
            redis_conn,
            config.redis.game_ttl_seconds,
        ));

        // Bus
        let amqp_connection = AmqpConnection::new(AmqpConfig::from(&config.amqp))
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: e.to_string(),
            })?;
        let channel = amqp_connection
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("failed to open channel: {}", e),
            })?;
        let publisher =
            Arc::new(
                AmqpEventPublisher::new(channel)
                    .await
                    .map_err(|e| ServiceError::AmqpConnection {
                        message: e.to_string(),
                    })?,
            );

        // Core components
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let fanout = Arc::new(EventFanOut::new(registry.clone(), publisher));
        let sessions = Arc::new(SessionManager::new(
            players.clone(),
            games,
            fanout.clone(),
            SessionTimings::from(&config.session),
            metrics.clone(),
        ));
        let engine = Arc::new(MatchmakingEngine::new(
            queues.clone(),
            players.clone(),
            sessions.clone(),
            fanout.clone(),
            MatchmakerConfig::from(&config.matchmaking),
            metrics.clone(),
        ));
        let core = Arc::new(ArenaCore::new(
            players.clone(),
            queues.clone(),
            sessions.clone(),
            fanout,
            metrics.clone(),
        ));

        let http_state = HttpState {
            players,
            queues,
            sessions: sessions.clone(),
            metrics: metrics.clone(),
            tick_interval: config.tick_interval(),
        };
        let transport_state = TransportState {
            registry,
            event_handler: core,
        };

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            metrics,
            sessions,
            engine,
            http_state,
            transport_state,
            _amqp_connection: amqp_connection,
            background_tasks: Vec::new(),
            shutdown_tx,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Build the service router
    pub fn router(&self) -> Router {
        api_router(self.http_state.clone(), self.transport_state.clone())
    }

    /// Start the matchmaking ticks and the HTTP server
    pub async fn start(&mut self) -> Result<()> {
        // One periodic tick task per mode
        self.background_tasks
            .extend(self.engine.spawn_tick_tasks());

        // HTTP + websocket surface
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.service.http_port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!("HTTP server listening on http://{}", addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.background_tasks.push(tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    info!("HTTP server shutdown signal received");
                })
                .await;
            if let Err(e) = result {
                error!("HTTP server terminated: {}", e);
            }
        }));

        *self.is_running.write().await = true;
        info!("Service started with {} background tasks", self.background_tasks.len());
        Ok(())
    }

    /// Stop background tasks and mark the service down
    pub async fn stop(&mut self) {
        info!("Stopping service components...");
        let _ = self.shutdown_tx.send(());
        for task in self.background_tasks.drain(..) {
            task.abort();
        }
        *self.is_running.write().await = false;
        info!("Service components stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Matches currently held in memory
    pub async fn active_games(&self) -> usize {
        self.sessions.active_count().await
    }

    /// Engine statistics snapshot
    pub fn matchmaker_stats(&self) -> MatchmakerStats {
        self.engine.stats()
    }

    /// Session statistics snapshot
    pub fn session_stats(&self) -> SessionStats {
        self.sessions.stats()
    }

    /// Metrics collector shared across components
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }
}
