//! Route-level authorization.
//!
//! Each route declares the weakest [`Access`] level it needs. Stricter levels
//! build on the weaker ones:
//!
//! ```text
//! Permission(code) → Activated → Authenticated → Public
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::{ApiError, RequestIdentityExt};
use crate::identity::{with_timeout, Identity, LookupError, PermissionStore, User};

/// Access level required by a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Anyone, including anonymous callers.
    Public,
    /// Any non-anonymous caller.
    Authenticated,
    /// An authenticated caller whose account is activated.
    Activated,
    /// An activated caller holding the permission code.
    Permission(Cow<'static, str>),
}

impl Access {
    pub fn permission(code: impl Into<Cow<'static, str>>) -> Self {
        Access::Permission(code.into())
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => f.write_str("public"),
            Access::Authenticated => f.write_str("authenticated"),
            Access::Activated => f.write_str("activated"),
            Access::Permission(code) => write!(f, "permission:{code}"),
        }
    }
}

/// Fails with `authentication-required` for anonymous callers.
pub fn require_authenticated(identity: &Identity) -> Result<&User, ApiError> {
    identity.user().ok_or(ApiError::AuthenticationRequired)
}

/// [`require_authenticated`], then fails with `inactive-account` unless the
/// account is activated.
pub fn require_activated(identity: &Identity) -> Result<&User, ApiError> {
    let user = require_authenticated(identity)?;
    if !user.activated {
        return Err(ApiError::InactiveAccount);
    }
    Ok(user)
}

/// [`require_activated`], then fails with `not-permitted` unless the user's
/// current permission set contains `code`.
///
/// The set is fetched on every call. A store failure is a server error, not
/// a denial.
pub async fn require_permission<'a>(
    identity: &'a Identity,
    code: &str,
    permissions: &dyn PermissionStore,
    lookup_timeout: Duration,
) -> Result<&'a User, ApiError> {
    let user = require_activated(identity)?;
    match with_timeout(lookup_timeout, permissions.permissions_for_user(user.id)).await {
        Ok(granted) if granted.includes(code) => Ok(user),
        Ok(_) | Err(LookupError::NotFound) => Err(ApiError::NotPermitted),
        Err(err) => Err(ApiError::server_error(err)),
    }
}

/// State for [`guard_middleware`]: one per guarded route.
#[derive(Clone)]
pub struct GuardState {
    pub access: Access,
    pub permissions: Arc<dyn PermissionStore>,
    pub lookup_timeout: Duration,
}

impl GuardState {
    pub async fn check(&self, identity: &Identity) -> Result<(), ApiError> {
        match &self.access {
            Access::Public => Ok(()),
            Access::Authenticated => require_authenticated(identity).map(drop),
            Access::Activated => require_activated(identity).map(drop),
            Access::Permission(code) => {
                require_permission(identity, code, self.permissions.as_ref(), self.lookup_timeout)
                    .await
                    .map(drop)
            }
        }
    }
}

/// Middleware enforcing the route's [`Access`] level against the identity
/// attached by the authentication stage.
pub async fn guard_middleware(State(guard): State<GuardState>, request: Request, next: Next) -> Response {
    let identity = request.identity();
    match guard.check(&identity).await {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::debug!(
                access = %guard.access,
                user_id = identity.user().map(|u| u.id),
                kind = err.kind(),
                "Request denied"
            );
            err.into_response()
        }
    }
}
