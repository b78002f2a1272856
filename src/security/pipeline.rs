//! Assembly of the gatekeeping stages around a router.

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};

use crate::config::GatekeeperConfig;
use crate::identity::{IdentityStore, MemoryStore, PermissionStore};
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::security::authenticate::{authenticate_middleware, AuthState};
use crate::security::cors::{cors_middleware, CorsPolicy};
use crate::security::rate_limit::{rate_limit_middleware, ClientRegistry, RateLimitState};
use crate::security::recover;

/// External lookups the pipeline depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub identities: Arc<dyn IdentityStore>,
    pub permissions: Arc<dyn PermissionStore>,
}

impl Collaborators {
    pub fn new(identities: Arc<dyn IdentityStore>, permissions: Arc<dyn PermissionStore>) -> Self {
        Self {
            identities,
            permissions,
        }
    }

    /// Both lookups served by one in-memory store.
    pub fn memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            identities: store.clone(),
            permissions: store,
        }
    }
}

/// The fixed chain of stages in front of every route.
///
/// ```text
/// metrics → crash isolation → CORS → rate limit → authenticate → [route guard] → handler
/// ```
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<ClientRegistry>,
    limiter_enabled: bool,
    cors: Arc<CorsPolicy>,
    collaborators: Collaborators,
    lookup_timeout: Duration,
}

impl Pipeline {
    /// The registry is owned by the caller so its sweeper can be tied to the
    /// server's lifetime.
    pub fn new(config: &GatekeeperConfig, registry: Arc<ClientRegistry>, collaborators: Collaborators) -> Self {
        Self {
            registry,
            limiter_enabled: config.limiter.enabled,
            cors: Arc::new(CorsPolicy::from_config(&config.cors)),
            collaborators,
            lookup_timeout: config.auth.lookup_timeout(),
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// A route table whose guards share this pipeline's permission store.
    pub fn route_table(&self) -> RouteTable {
        RouteTable::new(self.collaborators.permissions.clone(), self.lookup_timeout)
    }

    /// Wrap `router` in every stage. Later layers run first.
    pub fn wrap(&self, router: Router) -> Router {
        let auth = AuthState {
            identities: self.collaborators.identities.clone(),
            lookup_timeout: self.lookup_timeout,
        };
        let rate_limit = RateLimitState {
            registry: self.registry.clone(),
            enabled: self.limiter_enabled,
        };

        router
            .layer(middleware::from_fn_with_state(auth, authenticate_middleware))
            .layer(middleware::from_fn_with_state(rate_limit, rate_limit_middleware))
            .layer(middleware::from_fn_with_state(self.cors.clone(), cors_middleware))
            .layer(recover::catch_panic_layer())
            .layer(middleware::from_fn(metrics::track_metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::testing::{request, request_from, send, send_raw};
    use crate::security::Access;
    use axum::extract::Request;
    use axum::http::{header, HeaderValue, StatusCode};
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pipeline(config: &GatekeeperConfig) -> Pipeline {
        let registry = Arc::new(ClientRegistry::from_config(&config.limiter));
        Pipeline::new(config, registry, Collaborators::memory(MemoryStore::new()))
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    fn with_bearer(mut req: Request, token: &str) -> Request {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).unwrap();
        req.headers_mut().insert(header::AUTHORIZATION, value);
        req
    }

    #[tokio::test]
    async fn rate_limit_runs_before_authentication() {
        let mut config = GatekeeperConfig::default();
        config.limiter.burst = 1;
        config.limiter.rps = 0.001;
        let pipeline = pipeline(&config);
        let router = pipeline.wrap(
            pipeline
                .route_table()
                .route("/x", get(|| async { "ok" }), Access::Public)
                .into_router(),
        );

        // The first request consumes the only permit even though its token is bogus.
        let (status, _) = send(&router, with_bearer(request("GET", "/x"), "bogus")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&router, with_bearer(request("GET", "/x"), "bogus")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(pipeline.registry().contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn rejected_requests_never_reach_the_handler() {
        let mut config = GatekeeperConfig::default();
        config.limiter.enabled = false;
        let pipeline = pipeline(&config);

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handler = get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                "secret"
            }
        });
        let router = pipeline.wrap(
            pipeline
                .route_table()
                .route("/secret", handler, Access::permission("secrets:read"))
                .into_router(),
        );

        let (status, _) = send(&router, request("GET", "/secret")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&router, with_bearer(request("GET", "/secret"), "bogus")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panics_behind_the_pipeline_become_server_errors() {
        let config = GatekeeperConfig::default();
        let pipeline = pipeline(&config);
        let router = pipeline.wrap(
            pipeline
                .route_table()
                .route(
                    "/boom",
                    get(explode),
                    Access::Public,
                )
                .route("/fine", get(|| async { "fine" }), Access::Public)
                .into_router(),
        );

        let response = send_raw(&router, request_from("GET", "/boom", "10.0.0.1:5000")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = send(&router, request_from("GET", "/fine", "10.0.0.1:5000")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
