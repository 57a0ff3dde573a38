//! Router assembly, serving and the expiry sweeper.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::application::auth::AuthService;
use crate::error::Result;
use crate::port::inbound::runtime::RuntimeState;
use crate::port::outbound::store::TradeStore;

use super::handler;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Shared state behind every route.
pub struct ServerState {
    pub(super) auth: Arc<AuthService>,
    pub(super) runtime: Arc<dyn RuntimeState>,
    pub(super) store: Option<Arc<dyn TradeStore>>,
    clock: Clock,
}

impl ServerState {
    pub fn new(
        auth: Arc<AuthService>,
        runtime: Arc<dyn RuntimeState>,
        store: Option<Arc<dyn TradeStore>>,
    ) -> Self {
        Self {
            auth,
            runtime,
            store,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

/// Build the postback router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(handler::dashboard))
        .route("/health", get(handler::health))
        .route("/status", get(handler::status))
        .route("/mode", get(handler::mode))
        .route("/pending", get(handler::pending))
        .route("/auth/generate", get(handler::generate))
        .route("/postback", get(handler::postback))
        .route("/success", get(handler::success))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the listener fails.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ServerState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "Postback server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Postback server stopped");
    Ok(())
}

/// Sweep expired login sessions every `every`.
pub fn spawn_cleanup(auth: Arc<AuthService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            auth.cleanup_expired(Utc::now());
        }
    })
}
