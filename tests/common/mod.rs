//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use api_gatekeeper::config::GatekeeperConfig;
use api_gatekeeper::http::HttpServer;
use api_gatekeeper::identity::{MemoryStore, TokenScope, User};
use api_gatekeeper::lifecycle::Shutdown;
use api_gatekeeper::security::Collaborators;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A gatekeeper running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    #[allow(dead_code)]
    pub async fn stop(self) -> Result<(), std::io::Error> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

pub async fn start_gatekeeper(config: GatekeeperConfig, store: MemoryStore) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, Collaborators::memory(store));
    let signal = shutdown.clone();
    let handle = tokio::spawn(async move { server.run(listener, &signal).await });

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Users covering each access level, with one authentication token each.
pub struct Fixtures {
    pub store: MemoryStore,
    /// Activated, holds `movies:read`.
    pub alice: String,
    /// Activated, holds `movies:read` and `movies:write`.
    pub bob: String,
    /// Not activated.
    pub carol: String,
}

pub fn fixtures() -> Fixtures {
    let store = MemoryStore::new();
    let ttl = Duration::from_secs(3600);

    store.insert_user(User::new(1, "alice", "alice@example.com").with_activated(true));
    store.grant(1, "movies:read");

    store.insert_user(User::new(2, "bob", "bob@example.com").with_activated(true));
    store.grant(2, "movies:read");
    store.grant(2, "movies:write");

    store.insert_user(User::new(3, "carol", "carol@example.com"));

    Fixtures {
        alice: store.issue_token(1, ttl, TokenScope::Authentication),
        bob: store.issue_token(2, ttl, TokenScope::Authentication),
        carol: store.issue_token(3, ttl, TokenScope::Authentication),
        store,
    }
}

/// Limiter off so tests can send as many requests as they need.
pub fn unlimited_config() -> GatekeeperConfig {
    let mut config = GatekeeperConfig::default();
    config.limiter.enabled = false;
    config.listener.environment = "testing".into();
    config
}
