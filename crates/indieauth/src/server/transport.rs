//! HTTP transport for the authorization server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::store::AuthorizationStore;
use super::Server;

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub server: Server,
    pub store: Arc<dyn AuthorizationStore>,
    /// Public base URL without a trailing slash, e.g. `https://auth.example`.
    pub base_url: String,
    /// Profile URL of the single user this server authenticates.
    pub me: String,
}

impl HttpState {
    #[must_use]
    pub fn new(
        server: Server,
        store: Arc<dyn AuthorizationStore>,
        base_url: impl Into<String>,
        me: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { server, store, base_url, me: me.into() }
    }

    /// Issuer identifier, also sent as `iss` on authorization responses.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{}/", self.base_url)
    }

    #[must_use]
    pub fn metadata_url(&self) -> String {
        format!("{}/.well-known/oauth-authorization-server", self.base_url)
    }

    #[must_use]
    pub fn authorization_endpoint(&self) -> String {
        format!("{}/authorize", self.base_url)
    }

    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!("{}/token", self.base_url)
    }
}

impl std::fmt::Debug for HttpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpState")
            .field("server", &self.server)
            .field("base_url", &self.base_url)
            .field("me", &self.me)
            .finish()
    }
}

/// Create the HTTP router.
pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(handlers::handle_profile_page))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/.well-known/oauth-authorization-server", get(handlers::handle_server_metadata))
        .route(
            "/authorize",
            get(handlers::handle_authorize_get).post(handlers::handle_authorize_post),
        )
        .route("/token", get(handlers::handle_token_verify).post(handlers::handle_token))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "indieauth-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "service": "indieauth-server",
        "version": env!("CARGO_PKG_VERSION"),
        "issuer": state.issuer(),
        "me": state.me,
        "require_pkce": state.server.require_pkce()
    }))
}

/// Run the server on `port` until Ctrl+C.
///
/// # Errors
///
/// Returns error if the port cannot be bound or the server fails.
pub async fn run_http(state: HttpState, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("HTTP server listening on http://{}", addr);

    serve(listener, create_router(state), shutdown_signal()).await?;

    tracing::info!("HTTP server shut down");
    Ok(())
}

/// Serve `router` on an already bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns error on server failure.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
