//! Web layer module
//!
//! HTTP surface of the service:
//! - `POST /webhook/telegram`: Bot API updates, acknowledged immediately and
//!   handled in a detached task
//! - `GET /health`: liveness plus a database ping
//! - `/api/v1/...`: operator API behind a bearer token
//!
//! Handlers stay thin and delegate to [`crate::pipeline`] and
//! [`crate::database`]; errors are mapped to status codes in
//! [`responses::handle_error`].

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{config::Config, database::Database, pipeline::Pipeline};

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod responses;

pub use extractors::PaginationParams;
pub use responses::{handle_error, handle_result, ApiResponse, PaginatedResponse};

/// Path the Bot API posts updates to, relative to `web.public_url`
pub const WEBHOOK_PATH: &str = "/webhook/telegram";

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
    pipeline: Pipeline,
}

impl WebServer {
    pub fn new(config: Config, database: Database, pipeline: Pipeline) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        let app = Self::create_router(AppState {
            database,
            config: Arc::new(config),
            pipeline: pipeline.clone(),
        });

        Ok(Self {
            app,
            addr,
            pipeline,
        })
    }

    /// Full router with state applied; used directly by integration tests
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health::health_check))
            .route(WEBHOOK_PATH, post(handlers::webhook::receive_update))
            .nest("/api/v1", Self::api_v1_routes(state.clone()))
            .layer(axum::middleware::from_fn(
                middleware::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    fn api_v1_routes(state: AppState) -> Router<AppState> {
        use handlers::{upload_failures, videos};

        Router::new()
            // Videos
            .route("/videos", get(videos::list_videos))
            .route(
                "/videos/:id",
                get(videos::get_video).patch(videos::update_video),
            )
            // Upload failures
            .route(
                "/upload-failures",
                get(upload_failures::list_upload_failures),
            )
            .route(
                "/upload-failures/:id",
                get(upload_failures::get_upload_failure),
            )
            .route(
                "/upload-failures/:id/retry",
                post(upload_failures::retry_upload_failure),
            )
            .route(
                "/upload-failures/:id/resolve",
                post(upload_failures::resolve_upload_failure),
            )
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::operator_auth_middleware,
            ))
    }

    /// Serve until SIGTERM or Ctrl+C, then finish in-flight updates
    pub async fn serve(self) -> Result<()> {
        self.serve_until(shutdown_signal()).await
    }

    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("Listening on http://{}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.pipeline.drain().await;
        info!("All in-flight updates finished");
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub config: Arc<Config>,
    pub pipeline: Pipeline,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}
