//! API server: HTTP REST endpoints plus the Prometheus exporter.

use crate::jobs::DispatchJobRegistry;
use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use crate::{directory_rest, messaging_rest};
use academy_core::config::AppConfig;
use academy_messaging::{build_sender, DispatchConfig, Dispatcher};
use academy_store::DirectoryStore;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the application router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Directory
        .route("/v1/students", get(directory_rest::list_students))
        .route("/v1/students/:id", get(directory_rest::get_student))
        .route(
            "/v1/templates",
            get(directory_rest::list_templates).post(directory_rest::create_template),
        )
        .route(
            "/v1/templates/:id",
            get(directory_rest::get_template).delete(directory_rest::delete_template),
        )
        // Messaging
        .route("/v1/messaging/recipients", post(messaging_rest::preview_recipients))
        .route("/v1/messaging/render", post(messaging_rest::render_message))
        .route(
            "/v1/messaging/dispatches",
            get(messaging_rest::list_dispatches).post(messaging_rest::start_dispatch),
        )
        .route("/v1/messaging/dispatches/:id", get(messaging_rest::get_dispatch))
        .route(
            "/v1/messaging/dispatches/:id/cancel",
            post(messaging_rest::cancel_dispatch),
        )
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Main API server.
pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    /// Wire the directory store, send provider and dispatcher from config.
    pub fn new(config: AppConfig, store: Arc<DirectoryStore>) -> anyhow::Result<Self> {
        let sender = build_sender(&config.messaging)?;
        let dispatcher = Arc::new(Dispatcher::new(
            sender,
            DispatchConfig::from(&config.messaging),
        ));
        let state = AppState {
            store,
            jobs: Arc::new(DispatchJobRegistry::with_retention(
                dispatcher,
                config.messaging.max_finished_jobs,
            )),
            school_name: config.school_name.clone(),
            start_time: Instant::now(),
        };
        Ok(Self { config, state })
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = build_router(self.state.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
