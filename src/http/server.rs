//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router from the route table
//! - Wrap it in the gatekeeping pipeline
//! - Wire up request IDs and per-request tracing spans
//! - Run the client registry sweeper for the server's lifetime
//! - Drain connections on shutdown, bounded by the grace period

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatekeeperConfig;
use crate::http::handlers::{self, Catalog, SystemInfo};
use crate::http::request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::security::{ClientRegistry, Collaborators, Pipeline};

/// HTTP server for the gatekeeper.
pub struct HttpServer {
    router: Router,
    config: GatekeeperConfig,
    registry: Arc<ClientRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatekeeperConfig, collaborators: Collaborators) -> Self {
        let registry = Arc::new(ClientRegistry::from_config(&config.limiter));
        let pipeline = Pipeline::new(&config, registry.clone(), collaborators);

        let router = Self::build_router(&config, &pipeline);
        Self {
            router,
            config,
            registry,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatekeeperConfig, pipeline: &Pipeline) -> Router {
        let routes = handlers::register(
            pipeline.route_table(),
            SystemInfo::from_config(config),
            Catalog::new(),
        )
        .into_router();

        pipeline
            .wrap(routes)
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = request_id(request).unwrap_or("unknown"),
                )
            }))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
    }

    /// The fully layered router. Requests must carry `ConnectInfo<SocketAddr>`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }

    /// Serve connections on `listener` until `shutdown` fires, then drain
    /// in-flight requests for at most the configured grace period.
    ///
    /// Returns once draining finishes or the grace period elapses. Connections
    /// still open at that point are not closed here; they end when the
    /// runtime shuts down.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            limiter_enabled = self.config.limiter.enabled,
            rps = self.config.limiter.rps,
            burst = self.config.limiter.burst,
            trusted_origins = ?self.config.cors.trusted_origins,
            "HTTP server starting"
        );

        let sweeper = self
            .config
            .limiter
            .enabled
            .then(|| self.registry.clone().spawn_sweeper(shutdown.subscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let mut stop = shutdown.subscribe();
        let mut deadline = shutdown.subscribe();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                stop.recv().await;
            })
            .into_future();
        tokio::pin!(serve);

        let grace = self.config.listener.shutdown_grace();
        let result = tokio::select! {
            result = &mut serve => result,
            _ = deadline.recv() => {
                tracing::info!(grace_secs = grace.as_secs(), "Draining connections");
                match tokio::time::timeout(grace, &mut serve).await {
                    Ok(result) => result,
                    Err(_) => {
                        // Connection tasks are detached; they end with the runtime.
                        tracing::warn!(
                            grace_secs = grace.as_secs(),
                            "Grace period elapsed, returning with connections still open"
                        );
                        Ok(())
                    }
                }
            }
        };

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        tracing::info!("HTTP server stopped");
        result
    }
}
