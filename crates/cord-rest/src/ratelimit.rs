//! Rate-limit buckets
//!
//! Buckets are keyed by the server-assigned bucket hash plus the major
//! parameter. Until a route's first response names its hash, the route's
//! own template stands in. The global limit is checked before any bucket.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::header::HeaderMap;
use reqwest::Method;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::route::RouteKey;

/// Rate-limit headers of one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub bucket: Option<String>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    pub global: bool,
}

impl RateLimitHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            bucket: text("x-ratelimit-bucket").map(str::to_string),
            remaining: text("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
            reset_after: text("x-ratelimit-reset-after")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64),
            global: text("x-ratelimit-global").is_some_and(|v| v.eq_ignore_ascii_case("true")),
        }
    }
}

#[derive(Debug, Default)]
struct BucketState {
    /// Unknown until the first response
    remaining: Option<u32>,
    reset_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Bucket {
    state: Mutex<BucketState>,
}

/// Shared bucket table of one REST client
#[derive(Debug, Default)]
pub struct RateLimiter {
    hashes: DashMap<(Method, &'static str), String>,
    buckets: DashMap<String, Arc<Bucket>>,
    global_until: parking_lot::Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the bucket a route currently maps to
    pub fn bucket_id(&self, key: &RouteKey) -> String {
        let major = key.major.map_or_else(|| "-".to_string(), |m| m.to_string());
        match self.hashes.get(&(key.method.clone(), key.template)) {
            Some(hash) => format!("{}:{major}", hash.value()),
            None => format!("{} {}:{major}", key.method, key.template),
        }
    }

    fn bucket(&self, key: &RouteKey) -> Arc<Bucket> {
        let id = self.bucket_id(key);
        self.buckets.entry(id).or_default().clone()
    }

    /// Wait until the route may be called
    ///
    /// Only the calling task waits. Callers of the same bucket queue
    /// behind each other.
    pub async fn acquire(&self, key: &RouteKey) {
        self.wait_global().await;

        let bucket = self.bucket(key);
        let mut state = bucket.state.lock().await;
        if state.remaining == Some(0) {
            if let Some(reset_at) = state.reset_at {
                if reset_at > Instant::now() {
                    tracing::debug!(
                        bucket = %self.bucket_id(key),
                        wait_ms = (reset_at - Instant::now()).as_millis() as u64,
                        "Waiting for rate-limit bucket"
                    );
                    sleep_until(reset_at).await;
                }
            }
            state.remaining = None;
            state.reset_at = None;
        } else if let Some(remaining) = state.remaining.as_mut() {
            *remaining -= 1;
        }
    }

    async fn wait_global(&self) {
        loop {
            let until = *self.global_until.lock();
            match until {
                Some(until) if until > Instant::now() => {
                    tracing::debug!(
                        wait_ms = (until - Instant::now()).as_millis() as u64,
                        "Waiting for global rate limit"
                    );
                    sleep_until(until).await;
                }
                _ => return,
            }
        }
    }

    /// Record the headers of a response
    pub async fn update(&self, key: &RouteKey, headers: &RateLimitHeaders) {
        if let Some(hash) = &headers.bucket {
            self.hashes.insert((key.method.clone(), key.template), hash.clone());
        }
        let bucket = self.bucket(key);
        let mut state = bucket.state.lock().await;
        if let Some(remaining) = headers.remaining {
            state.remaining = Some(remaining);
        }
        if let Some(reset_after) = headers.reset_after {
            state.reset_at = Some(Instant::now() + reset_after);
        }
    }

    /// Block one route's bucket after a 429
    pub async fn block_route(&self, key: &RouteKey, retry_after: Duration) {
        let bucket = self.bucket(key);
        let mut state = bucket.state.lock().await;
        state.remaining = Some(0);
        state.reset_at = Some(Instant::now() + retry_after);
    }

    /// Block every route after a global 429
    pub fn block_global(&self, retry_after: Duration) {
        let until = Instant::now() + retry_after;
        let mut global = self.global_until.lock();
        if global.map_or(true, |current| current < until) {
            *global = Some(until);
        }
    }

    pub fn is_globally_limited(&self) -> bool {
        self.global_until.lock().is_some_and(|until| until > Instant::now())
    }
}
