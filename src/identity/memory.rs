//! In-memory identity and permission store.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;

use crate::identity::store::{IdentityStore, LookupError, PermissionStore};
use crate::identity::token::{self, Token, TokenHash, TokenScope};
use crate::identity::user::{PermissionSet, User};

/// Error loading a seed file.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("seed token for user {user_id} is not a well-formed token")]
    MalformedToken { user_id: i64 },
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
struct SeedUser {
    id: i64,
    name: String,
    email: String,
    #[serde(default)]
    activated: bool,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    tokens: Vec<SeedToken>,
}

#[derive(Debug, Deserialize)]
struct SeedToken {
    plaintext: String,
    #[serde(default = "default_seed_scope")]
    scope: TokenScope,
    #[serde(default = "default_seed_ttl_secs")]
    ttl_secs: u64,
}

fn default_seed_scope() -> TokenScope {
    TokenScope::Authentication
}

fn default_seed_ttl_secs() -> u64 {
    24 * 60 * 60
}

/// Thread-safe store of users, their permissions and issued token hashes.
///
/// Cloning is cheap; clones share the same maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<DashMap<i64, User>>,
    permissions: Arc<DashMap<i64, PermissionSet>>,
    tokens: Arc<DashMap<TokenHash, Token>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load users, permissions and pre-shared tokens from a JSON seed file.
    ///
    /// ```json
    /// { "users": [ { "id": 1, "name": "alice", "email": "alice@example.com",
    ///                "activated": true, "created_at": "2023-01-02T03:04:05Z",
    ///                "permissions": ["movies:read"],
    ///                "tokens": [ { "plaintext": "<22 chars>", "ttl_secs": 86400 } ] } ] }
    /// ```
    pub fn load_from_file(path: &Path) -> Result<Self, SeedError> {
        let reader = BufReader::new(File::open(path)?);
        let seed: SeedFile = serde_json::from_reader(reader)?;

        let store = Self::new();
        let now = SystemTime::now();
        for seed_user in seed.users {
            let user_id = seed_user.id;
            let mut user =
                User::new(user_id, seed_user.name, seed_user.email).with_activated(seed_user.activated);
            if let Some(created_at) = seed_user.created_at {
                user = user.with_created_at(created_at);
            }
            store.insert_user(user);
            for code in seed_user.permissions {
                store.grant(user_id, code);
            }
            for seed_token in seed_user.tokens {
                if !token::is_well_formed(&seed_token.plaintext) {
                    return Err(SeedError::MalformedToken { user_id });
                }
                store.insert_token(Token::from_plaintext(
                    &seed_token.plaintext,
                    user_id,
                    now + Duration::from_secs(seed_token.ttl_secs),
                    seed_token.scope,
                ));
            }
        }

        tracing::info!(
            path = %path.display(),
            users = store.users.len(),
            tokens = store.tokens.len(),
            "Loaded identity seed file"
        );
        Ok(store)
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn grant(&self, user_id: i64, code: impl Into<String>) {
        self.permissions.entry(user_id).or_default().insert(code);
    }

    pub fn revoke(&self, user_id: i64, code: &str) {
        if let Some(mut permissions) = self.permissions.get_mut(&user_id) {
            permissions.remove(code);
        }
    }

    pub fn insert_token(&self, token: Token) {
        self.tokens.insert(token.hash, token);
    }

    /// Issue a token for `user_id` and return its plaintext.
    pub fn issue_token(&self, user_id: i64, ttl: Duration, scope: TokenScope) -> String {
        let (plaintext, token) = Token::generate(user_id, ttl, scope);
        self.insert_token(token);
        plaintext
    }

    /// Drop every token of `scope` held by `user_id`.
    pub fn delete_tokens_for_user(&self, user_id: i64, scope: TokenScope) {
        self.tokens
            .retain(|_, token| !(token.user_id == user_id && token.scope == scope));
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn identity_for_token(&self, scope: TokenScope, plaintext: &str) -> Result<User, LookupError> {
        let hash = token::hash_plaintext(plaintext);
        let user_id = match self.tokens.get(&hash) {
            Some(token) if token.scope == scope && !token.is_expired_at(SystemTime::now()) => token.user_id,
            _ => return Err(LookupError::NotFound),
        };

        self.users
            .get(&user_id)
            .map(|user| user.value().clone())
            .ok_or(LookupError::NotFound)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn permissions_for_user(&self, user_id: i64) -> Result<PermissionSet, LookupError> {
        Ok(self
            .permissions
            .get(&user_id)
            .map(|permissions| permissions.value().clone())
            .unwrap_or_default())
    }
}
