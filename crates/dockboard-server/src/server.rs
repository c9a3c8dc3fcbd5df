//! Board server implementation

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use dockboard::{BoardConfig, BoardService};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use crate::handlers;

/// Configuration for the board server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Directory served at `/` for the board UI
    pub static_dir: Option<PathBuf>,
    /// How often the board checks for a new calendar day
    pub day_check_interval: Duration,
}

const DEFAULT_DAY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: None,
            day_check_interval: DEFAULT_DAY_CHECK_INTERVAL,
        }
    }
}

impl From<&BoardConfig> for ServerConfig {
    fn from(config: &BoardConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            static_dir: config.static_dir.clone(),
            ..Self::default()
        }
    }
}

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub service: BoardService,
}

/// Loading-dock board server
pub struct BoardServer {
    state: Arc<AppState>,
}

impl BoardServer {
    /// Wraps an initialized service.
    pub fn new(service: BoardService, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(AppState { config, service }),
        }
    }

    /// Builds the service from `config` and serves until a shutdown signal.
    pub async fn start(config: BoardConfig) -> Result<()> {
        let service = BoardService::from_config(&config)
            .await
            .context("invalid board configuration")?;
        Self::new(service, ServerConfig::from(&config)).serve().await
    }

    /// Shared state, mostly for tests.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// The HTTP and WebSocket routes.
    pub fn router(&self) -> Router {
        // Build CORS layer
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            // Board queries
            .route("/api/board", get(handlers::api::board))
            .route("/api/yesterday", get(handlers::api::yesterday))
            .route("/api/tomorrow", get(handlers::api::tomorrow))
            // Schedule and report triggers
            .route("/api/import", post(handlers::api::reimport))
            .route(
                "/api/report",
                get(handlers::api::report).post(handlers::api::report),
            )
            // Realtime board updates
            .route("/ws", get(handlers::websocket::handler))
            .with_state(Arc::clone(&self.state));

        let app = match &self.state.config.static_dir {
            Some(dir) => app.fallback_service(ServeDir::new(dir)),
            None => app,
        };

        app.layer(cors)
    }

    /// Binds the configured address and serves until Ctrl-C or SIGTERM.
    pub async fn serve(self) -> Result<()> {
        let ServerConfig { host, port, .. } = &self.state.config;
        let listener = TcpListener::bind((host.as_str(), *port))
            .await
            .with_context(|| format!("failed to bind {host}:{port}"))?;
        self.serve_on(listener, shutdown_signal()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves, then
    /// flushes the board to history.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        info!("Board server listening on http://{}", listener.local_addr()?);

        let day_watch = tokio::spawn(watch_day(
            Arc::clone(&self.state),
            self.state.config.day_check_interval,
        ));
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;
        day_watch.abort();
        served?;

        if let Err(e) = self.state.service.shutdown().await {
            error!(error = %e, "final board flush failed");
        }
        info!("Board server stopped");
        Ok(())
    }
}

/// Rolls the board over to the new day shortly after midnight, so open
/// connections see it without anyone touching the board.
async fn watch_day(state: Arc<AppState>, every: Duration) {
    let mut ticks = tokio::time::interval(every);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        if let Some(board) = state.service.roll_over().await {
            debug!(version = board.version, "day rollover published");
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
