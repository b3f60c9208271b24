//! Main entry point for the arena-hall service
//!
//! This is the production entry point that initializes and runs the
//! matchmaking and game-session core with proper error handling,
//! logging, and graceful shutdown.

use anyhow::Result;
use arena_hall::config::AppConfig;
use arena_hall::service::AppState;
use clap::Parser;
use tokio::signal;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Arena Hall - matchmaking and game-session core
#[derive(Parser)]
#[command(
    name = "arena-hall",
    version,
    about = "Matchmaking and game-session core for real-time multiplayer games",
    long_about = "Arena Hall accepts waiting players across several game modes, \
                 periodically partitions them into balanced matches under skill and \
                 preference constraints, runs each game session from start through \
                 settlement, and applies Elo rating updates to persistent player records."
)]
struct Args {
    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Redis URL override
    #[arg(long, value_name = "URL", help = "Override Redis connection URL")]
    redis_url: Option<String>,

    /// AMQP host override
    #[arg(long, value_name = "HOST", help = "Override AMQP broker host")]
    amqp_host: Option<String>,

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Probe the configured backends and report service statistics.
///
/// Initializing the full application state exercises the Redis and
/// AMQP connections, so a failing backend turns into a non-zero exit.
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    match AppState::new(config).await {
        Ok(app_state) => {
            let sessions = app_state.session_stats();
            let matchmaker = app_state.matchmaker_stats();

            println!("Health Check: healthy");
            println!("  Active games: {}", app_state.active_games().await);
            println!("  Matches created: {}", sessions.matches_created);
            println!("  Games finished: {}", sessions.games_finished);
            println!("  Matchmaking ticks: {}", matchmaker.ticks);
            std::process::exit(0);
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            println!("Health Check: unhealthy");
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Arena Hall");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   HTTP port: {}", config.service.http_port);
    info!("   Redis: {}", config.redis.url);
    info!("   AMQP: {}:{}", config.amqp.host, config.amqp.port);
    info!("   Tick interval: {}ms", config.matchmaking.tick_interval_ms);
    info!(
        "   Session timers: start {}ms, evict {}ms",
        config.session.start_delay_ms, config.session.eviction_delay_ms
    );
    info!("------------------------------------------------");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::from_env()?;

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(redis_url) = &args.redis_url {
        config.redis.url = redis_url.clone();
    }

    if let Some(amqp_host) = &args.amqp_host {
        config.amqp.host = amqp_host.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Arena Hall is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");

    let shutdown_timeout = config.shutdown_timeout();
    let shutdown_future = async {
        app_state.stop().await;
        // Give background tasks a moment to unwind
        sleep(Duration::from_millis(100)).await;
    };

    match tokio::time::timeout(shutdown_timeout, shutdown_future).await {
        Ok(()) => {
            info!("Graceful shutdown completed successfully");
        }
        Err(_) => {
            warn!("Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("Arena Hall stopped");
    Ok(())
}
