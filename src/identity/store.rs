//! Collaborator contracts for resolving identities and permissions.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::identity::token::TokenScope;
use crate::identity::user::{PermissionSet, User};

/// Failure modes of a collaborator lookup.
///
/// `NotFound` is a denial and maps to a 4xx response. Everything else is a
/// failure of the collaborator itself and maps to a 5xx response.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("record not found")]
    NotFound,

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("lookup backend failed: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Resolves a plaintext credential to the user that owns it.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Only tokens with the given scope and an expiry in the future resolve.
    async fn identity_for_token(&self, scope: TokenScope, plaintext: &str) -> Result<User, LookupError>;
}

/// Fetches the permission codes granted to a user.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn permissions_for_user(&self, user_id: i64) -> Result<PermissionSet, LookupError>;
}

/// Bound a lookup by `limit`, surfacing expiry as [`LookupError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, lookup: F) -> Result<T, LookupError>
where
    F: Future<Output = Result<T, LookupError>>,
{
    tokio::time::timeout(limit, lookup)
        .await
        .unwrap_or(Err(LookupError::Timeout(limit)))
}
