pub mod config;
pub mod error;
pub mod routes;
pub mod session;

use std::sync::Arc;

use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

use crate::reasoning::{ChatReasoner, Reasoner};
use crate::store::{MemoryStore, PgStore, Store};
use config::{Config, Settings};

const DEFAULT_LOG_FILTER: &str = "agentlens=info,tower_http=info";

/// Everything a handler needs, shared across requests.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub reasoner: Option<Arc<dyn Reasoner>>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, reasoner: Option<Arc<dyn Reasoner>>, settings: Settings) -> Self {
        Self {
            store,
            reasoner,
            settings,
        }
    }
}

/// Run the web server.
pub async fn run(config: Config) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting agentlens serve on {}", config.listen_addr);

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect_lazy(url)),
        None => {
            tracing::warn!("Using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let reasoner: Option<Arc<dyn Reasoner>> = match &config.reasoning {
        Some(rc) => {
            let client = ChatReasoner::new(&rc.endpoint, &rc.api_key, &rc.model, rc.timeout)
                .map_err(|e| format!("Failed to build reasoning client: {e}"))?;
            tracing::info!(model = %rc.model, endpoint = %rc.endpoint, "Reasoning endpoint enabled");
            Some(Arc::new(client))
        }
        None => {
            tracing::info!("No reasoning API key; reasoning step uses canned output");
            None
        }
    };

    let state = Arc::new(AppState::new(store, reasoner, config.settings.clone()));
    let mut app = routes::build_router(state);

    // Serve the built front end if configured
    if let Some(ref static_dir) = config.static_dir {
        tracing::info!("Serving static files from {}", static_dir);
        app = app.fallback_service(ServeDir::new(static_dir));
    }

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {e}", config.listen_addr))?;

    tracing::info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server error: {e}"))
}
