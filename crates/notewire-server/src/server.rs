use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use notewire_hub::{Hub, HubConfig, HubHandle};
use notewire_store::NoteStore;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::limit::RateLimiter;
use crate::pipeline::SavePipeline;
use crate::router::build_router;

/// How often idle rate-limiter entries are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
/// How long a visitor entry may stay idle before being swept.
const VISITOR_TTL: Duration = Duration::from_secs(6 * 3600);
/// Cadence of the background history prune.
const PRUNE_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<NoteStore>,
    pub hub: HubHandle,
    pub pipeline: Arc<SavePipeline>,
    pub limiter: Arc<RateLimiter>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Open the store, start the hub loop, and wire up the pipeline.
    /// Must run inside a tokio runtime.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = Arc::new(NoteStore::open(&config.data_dir, config.store_config())?);
        let hub = Hub::spawn(HubConfig {
            subscriber_capacity: config.subscriber_capacity,
            ..HubConfig::default()
        });
        let pipeline = Arc::new(SavePipeline::new(Arc::clone(&store), hub.clone()));
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_sec,
            config.rate_burst,
        ));
        Ok(Self {
            store,
            hub,
            pipeline,
            limiter,
            config: Arc::new(config),
        })
    }
}

/// The notewire HTTP server.
pub struct NoteServer {
    config: ServerConfig,
}

impl NoteServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start serving requests until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        let state = AppState::new(self.config)?;

        state.limiter.spawn_sweeper(SWEEP_INTERVAL, VISITOR_TTL);
        spawn_prune_task(Arc::clone(&state.store));

        let app = build_router(state.clone());
        let listener = TcpListener::bind(&state.config.bind_addr).await?;
        info!("notewire listening on {}", listener.local_addr()?);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

/// Daily history prune; the store also prunes once at startup.
fn spawn_prune_task(store: Arc<NoteStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            if let Err(err) = store.prune_history() {
                warn!(error = %err, "history prune failed");
            }
        }
    });
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = NoteServer::new(ServerConfig::default());
        assert_eq!(
            server.config().bind_addr,
            "127.0.0.1:8080".parse().unwrap()
        );
    }
}
