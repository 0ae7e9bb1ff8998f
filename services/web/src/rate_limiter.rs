//! Fixed-window rate limiter for the API namespace

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::AppConfig;
use crate::error::AppError;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 3600, // 1 hour
        }
    }
}

impl From<&AppConfig> for RateLimiterConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_requests: config.rate_limit_max,
            window_seconds: config.rate_limit_window_secs,
        }
    }
}

/// Client count above which expired windows are dropped before adding another
const PRUNE_THRESHOLD: usize = 10_000;

/// Rate limiter entry
#[derive(Debug)]
struct RateLimiterEntry {
    /// Requests seen in the current window
    hits: u32,
    /// When the current window opened
    window_start: Instant,
}

/// Outcome of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
}

/// Rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count a request from `key` and decide whether it may proceed
    pub async fn check(&self, key: &str) -> Decision {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);

        if entries.len() >= PRUNE_THRESHOLD && !entries.contains_key(key) {
            entries.retain(|_, entry| now.duration_since(entry.window_start) < window);
        }

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            hits: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= window {
            entry.hits = 0;
            entry.window_start = now;
        }

        if entry.hits >= self.config.max_requests {
            return Decision {
                allowed: false,
                remaining: 0,
            };
        }

        entry.hits += 1;
        Decision {
            allowed: true,
            remaining: self.config.max_requests - entry.hits,
        }
    }

    /// Clients currently tracked
    pub async fn tracked_clients(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

/// Middleware applying the limiter per client address
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let key = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let decision = limiter.check(&key).await;
    if !decision.allowed {
        warn!("Rate limit exceeded for {}", key);
        return Err(AppError::new(
            "Too many requests from this IP, please try again in an hour!",
            StatusCode::TOO_MANY_REQUESTS,
        ));
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-ratelimit-limit",
        HeaderValue::from(limiter.config().max_requests),
    );
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    Ok(response)
}
