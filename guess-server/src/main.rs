use std::net::IpAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use guess_core::QuestionPool;
use guess_server::{
    config::Config,
    create_routes,
    session_driver::spawn_session,
    websocket::{ConnectionManager, RateLimiter},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Starting Picture Guess server...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Loading questions from: {}", config.questions_file);
    let pool = match QuestionPool::load(&config.questions_file) {
        Ok(pool) => {
            info!("Loaded {} questions", pool.len());
            pool
        }
        Err(e) => {
            error!("Failed to load questions from '{}': {:#}", config.questions_file, e);
            error!("Set QUESTIONS_FILE to a JSON file of the form {{ \"images\": [...] }}.");
            std::process::exit(1);
        }
    };

    let connection_manager = Arc::new(ConnectionManager::new());
    let (session, session_task) =
        spawn_session(config.session_config(), pool, connection_manager.clone());

    let rate_limiter = RateLimiter::new_with_limits(config.rate_limit_burst, config.rate_limit_refill());
    let routes = create_routes(connection_manager.clone(), session.clone(), rate_limiter);

    // Start cleanup task
    let cleanup_connection_manager = connection_manager.clone();
    let cleanup_session = session.clone();
    let sweep_interval = config.sweep_interval();
    let connection_timeout = config.connection_timeout();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;

            for connection_id in
                cleanup_connection_manager.cleanup_inactive_connections(connection_timeout)
            {
                let _ = cleanup_session.disconnect(connection_id);
            }
            if cleanup_session.sweep().is_err() {
                break;
            }
        }
    });

    let host: IpAddr = match config.host.parse() {
        Ok(host) => host,
        Err(e) => {
            error!("Invalid HOST '{}': {}", config.host, e);
            std::process::exit(1);
        }
    };

    // The signal future does the session-level shutdown before warp stops
    // accepting; `signalled` starts the forced-exit clock.
    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let shutdown_session = session.clone();
    let shutdown_connections = connection_manager.clone();
    let graceful = async move {
        wait_for_signal().await;
        let _ = signalled_tx.send(());

        if let Err(e) = shutdown_session.shutdown().await {
            warn!("Session already stopped: {}", e);
        }
        let closed = shutdown_connections.close_all();
        info!("Closing {} connections", closed);
    };

    let (addr, server) =
        match warp::serve(routes).try_bind_with_graceful_shutdown((host, config.port), graceful) {
            Ok(bound) => bound,
            Err(e) => {
                error!("Failed to bind {}:{}: {}", config.host, config.port, e);
                std::process::exit(1);
            }
        };

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );

    let shutdown_timeout = config.shutdown_timeout();
    let deadline = async {
        if signalled_rx.await.is_ok() {
            tokio::time::sleep(shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = async {
            server.await;
            let _ = session_task.await;
        } => {
            info!("Server shutdown complete.");
        }
        _ = deadline => {
            warn!(
                "Graceful shutdown did not finish within {:?}, forcing exit",
                shutdown_timeout
            );
            std::process::exit(1);
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = signal::ctrl_c().await;
                info!("Received SIGINT, shutting down gracefully...");
                return;
            }
        };

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
        }
        info!("Received Ctrl+C, shutting down gracefully...");
    }
}
