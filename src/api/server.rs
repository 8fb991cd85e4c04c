//! DEPG HTTP server
//!
//! Serves the dropdown catalog and turns form submissions into profiles.
//! The workbook session and the cache are loaded by the caller and shared
//! read-only by every request.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::catalog::DropdownCache;
use crate::generator::ProfileGenerator;

/// Environment variable selecting the run mode
pub const MODE_ENV: &str = "DEPG_ENV";

/// Run mode, from `DEPG_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dev,
    Production,
}

impl Mode {
    /// `dev` (any case) selects development; anything else is production
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("dev") => Mode::Dev,
            _ => Mode::Production,
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(MODE_ENV).ok().as_deref())
    }

    pub fn default_port(self) -> u16 {
        match self {
            Mode::Dev => 5001,
            Mode::Production => 80,
        }
    }

    /// Log filter used when `RUST_LOG` is unset
    pub fn default_filter(self) -> &'static str {
        match self {
            Mode::Dev => "depg=debug,depg_server=debug,tower_http=debug",
            Mode::Production => "depg=info,depg_server=info,tower_http=info",
        }
    }
}

/// API Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl ApiConfig {
    pub fn for_mode(mode: Mode) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: mode.default_port(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::for_mode(Mode::Production)
    }
}

/// Shared application state
pub struct AppState {
    pub version: String,
    pub generator: ProfileGenerator,
    cache: RwLock<Arc<DropdownCache>>,
}

impl AppState {
    pub fn new(generator: ProfileGenerator, cache: DropdownCache) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generator,
            cache: RwLock::new(Arc::new(cache)),
        }
    }

    /// The current cache; requests keep their snapshot even if a rebuild lands
    pub fn cache(&self) -> Arc<DropdownCache> {
        let guard = self.cache.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace_cache(&self, cache: DropdownCache) {
        let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(cache);
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_tracing(mode: Mode) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| mode.default_filter().into()),
        )
        .try_init();
}

/// Build the router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Form endpoints
        .route("/", get(handlers::catalog).post(handlers::generate))
        // Health and info endpoints
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Admin
        .route("/api/v1/cache/rebuild", post(handlers::rebuild_cache))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let dropdowns = state.cache().dropdown_data.len();
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(dropdowns, "DEPG server starting on http://{}", addr);
    info!("   Form: GET /, POST /   Admin: POST /api/v1/cache/rebuild");
    info!("   Health: /health, Version: /version");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("DEPG server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::config::{Config, ConfigFormat};
    use crate::engine::{EvaluationSession, SheetData, WorkbookEngine};
    use std::path::Path;

    // ==================== Mode Tests ====================

    #[test]
    fn test_mode_from_env_value() {
        assert_eq!(Mode::from_env_value(Some("dev")), Mode::Dev);
        assert_eq!(Mode::from_env_value(Some(" DEV ")), Mode::Dev);
        assert_eq!(Mode::from_env_value(Some("prod")), Mode::Production);
        assert_eq!(Mode::from_env_value(Some("")), Mode::Production);
        assert_eq!(Mode::from_env_value(None), Mode::Production);
    }

    #[test]
    fn test_mode_ports() {
        assert_eq!(ApiConfig::for_mode(Mode::Dev).port, 5001);
        assert_eq!(ApiConfig::for_mode(Mode::Production).port, 80);
        assert_eq!(ApiConfig::default().port, 80);
    }

    #[test]
    fn test_dev_filter_is_verbose() {
        assert!(Mode::Dev.default_filter().contains("debug"));
        assert!(!Mode::Production.default_filter().contains("debug"));
    }

    // ==================== AppState Tests ====================

    fn state() -> AppState {
        let config = Config::parse(
            r#"{"spreadsheet_file": "pg.xlsx", "cache_json": "c.json",
                "result_coords": {}, "result_rounding": {},
                "profile": {"advanced_shot": []}}"#,
            ConfigFormat::Json,
            Path::new("/srv"),
        )
        .unwrap();
        let sheet = SheetData::from_entries("Generator", &[("A1", "1")]).unwrap();
        let engine = WorkbookEngine::from_sheets("pg.xlsx", vec![sheet]).unwrap();
        let generator =
            ProfileGenerator::new(Arc::new(config), EvaluationSession::new(Arc::new(engine)));
        AppState::new(generator, DropdownCache::default())
    }

    #[test]
    fn test_cache_swap_keeps_old_snapshots() {
        let state = state();
        let before = state.cache();
        assert!(before.dropdown_data.is_empty());

        let mut rebuilt = DropdownCache::default();
        rebuilt
            .dropdown_data
            .insert("B3", CatalogEntry::new("Roast", vec!["Light".into()]));
        state.replace_cache(rebuilt);

        assert!(before.dropdown_data.is_empty());
        assert_eq!(state.cache().dropdown_data.len(), 1);
    }

    #[test]
    fn test_state_version() {
        assert_eq!(state().version, env!("CARGO_PKG_VERSION"));
    }
}
