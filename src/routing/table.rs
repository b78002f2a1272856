//! Route table with per-route access levels.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::MethodRouter;
use axum::{middleware, Router};

use crate::http::response::{method_not_allowed, not_found};
use crate::identity::PermissionStore;
use crate::security::authorize::{guard_middleware, Access, GuardState};

pub struct RouteTable {
    router: Router,
    permissions: Arc<dyn PermissionStore>,
    lookup_timeout: Duration,
}

impl RouteTable {
    pub fn new(permissions: Arc<dyn PermissionStore>, lookup_timeout: Duration) -> Self {
        Self {
            router: Router::new(),
            permissions,
            lookup_timeout,
        }
    }

    /// Register `method_router` at `path`, reachable only with `access`.
    ///
    /// The same path may be registered several times with different methods
    /// and different access levels.
    pub fn route(mut self, path: &str, method_router: MethodRouter, access: Access) -> Self {
        let method_router = match access {
            Access::Public => method_router,
            access => {
                let guard = GuardState {
                    access,
                    permissions: self.permissions.clone(),
                    lookup_timeout: self.lookup_timeout,
                };
                method_router.route_layer(middleware::from_fn_with_state(guard, guard_middleware))
            }
        };
        self.router = self.router.route(path, method_router);
        self
    }

    pub fn into_router(self) -> Router {
        self.router
            .fallback(not_found)
            .method_not_allowed_fallback(method_not_allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Identity, MemoryStore, User};
    use crate::security::testing::{request, send};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Extension;

    fn table(store: &MemoryStore) -> Router {
        RouteTable::new(Arc::new(store.clone()), Duration::from_secs(3))
            .route("/open", get(|| async { "open" }), Access::Public)
            .route("/me", get(|| async { "me" }), Access::Activated)
            .route("/movies", get(|| async { "list" }), Access::permission("movies:read"))
            .route("/movies", post(|| async { "create" }), Access::permission("movies:write"))
            .into_router()
    }

    fn as_identity(router: Router, identity: Identity) -> Router {
        router.layer(Extension(identity))
    }

    fn alice() -> Identity {
        Identity::authenticated(User::new(1, "alice", "alice@example.com").with_activated(true))
    }

    #[tokio::test]
    async fn public_route_needs_no_identity() {
        let router = table(&MemoryStore::new());
        let (status, _) = send(&router, request("GET", "/open")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn anonymous_on_activated_route_is_unauthorized() {
        let router = table(&MemoryStore::new());
        let (status, body) = send(&router, request("GET", "/me")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "you must be authenticated to access this resource");
    }

    #[tokio::test]
    async fn guards_apply_per_method() {
        let store = MemoryStore::new();
        store.grant(1, "movies:read");
        let router = as_identity(table(&store), alice());

        let (status, _) = send(&router, request("GET", "/movies")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&router, request("POST", "/movies")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["error"],
            "your user account doesn't have the necessary permissions to access this resource"
        );
    }

    #[tokio::test]
    async fn unknown_routes_get_json_errors() {
        let router = table(&MemoryStore::new());

        let (status, body) = send(&router, request("GET", "/nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "the requested resource could not be found");

        let (status, body) = send(&router, request("DELETE", "/open")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "the DELETE method is not supported for this resource");
    }
}
