//! Per-client rate limiting.
//!
//! Every client (keyed by source IP) gets a token bucket in the
//! [`ClientRegistry`]. The registry is a single mutex-guarded map; the lock
//! is held only while the bucket is looked up and charged, never across the
//! downstream call. A sweeper task evicts clients that have gone quiet.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::LimiterConfig;
use crate::http::ApiError;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// How often the sweeper wakes.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Clients idle for longer than this are evicted by the sweeper.
pub const IDLE_THRESHOLD: Duration = Duration::from_secs(180);

/// A token bucket. Starts full; refills continuously up to the burst ceiling.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, now: Instant, rate: f64, burst: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(burst);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct ClientEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Concurrency-safe map of client key to limiter state.
#[derive(Debug)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, ClientEntry>>,
    rate: f64,
    burst: f64,
}

impl ClientRegistry {
    /// `rate` tokens per second, at most `burst` banked.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            rate: rate.max(0.0),
            burst: f64::from(burst),
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(config.rps, config.burst)
    }

    /// Charge one token to `key`, creating its entry on first sight.
    /// Returns whether the request is admitted.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut clients = self.lock();
        let entry = clients
            .entry(key.to_owned())
            .or_insert_with(|| ClientEntry {
                bucket: TokenBucket::full(self.burst, now),
                last_seen: now,
            });
        entry.last_seen = now;
        entry.bucket.try_acquire(now, self.rate, self.burst)
    }

    /// Evict every client idle for longer than [`IDLE_THRESHOLD`].
    /// Returns the number of evicted entries.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= IDLE_THRESHOLD);
        metrics::record_tracked_clients(clients.len());
        before - clients.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run [`sweep`](Self::sweep) every [`SWEEP_INTERVAL`] until `shutdown`
    /// fires or every [`Shutdown`](crate::lifecycle::Shutdown) handle is dropped.
    pub fn spawn_sweeper(self: Arc<Self>, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + SWEEP_INTERVAL, SWEEP_INTERVAL);
            tracing::info!(
                interval_secs = SWEEP_INTERVAL.as_secs(),
                idle_secs = IDLE_THRESHOLD.as_secs(),
                "Client registry sweeper starting"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.sweep();
                        if evicted > 0 {
                            tracing::debug!(evicted, remaining = self.len(), "Evicted idle clients");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Client registry sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientEntry>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State for the rate limit middleware.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub registry: Arc<ClientRegistry>,
    pub enabled: bool,
}

/// Middleware admitting or rejecting each request against its client's bucket.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.enabled {
        return next.run(request).await;
    }

    let Some(addr) = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
    else {
        return ApiError::server_error("client address unavailable for rate limiting").into_response();
    };

    let key = addr.ip().to_string();
    if !state.registry.check(&key) {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited();
        return ApiError::RateLimitExceeded.into_response();
    }

    next.run(request).await
}
