//! Fixed-window request quota per client address.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{error::AppError, state::AppState};

pub const WINDOW: Duration = Duration::from_secs(60 * 60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const LIMITED_MESSAGE: &str = "Too many requests from this IP, please try again in an hour!";

#[derive(Debug, Clone)]
struct Counter {
    window_start: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    counters: Mutex<HashMap<String, Counter>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn spawn_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                ticker.tick().await;
                self.prune(Instant::now()).await;
            }
        });
    }

    async fn prune(&self, now: Instant) {
        let window = self.window;
        let mut counters = self.counters.lock().await;
        counters.retain(|_, c| now.duration_since(c.window_start) < window);
    }

    pub async fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(key.to_string()).or_insert(Counter {
            window_start: now,
            count: 0,
        });

        if now.duration_since(counter.window_start) >= self.window {
            counter.window_start = now;
            counter.count = 0;
        }

        if counter.count >= self.limit {
            let elapsed = now.duration_since(counter.window_start);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        counter.count += 1;
        Decision::Allow {
            remaining: self.limit - counter.count,
        }
    }
}

/// X-Forwarded-For, then X-Real-IP, then the peer address.
fn client_identifier(request: &Request) -> String {
    let headers = request.headers();
    if let Some(first) = headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = headers.get("X-Real-IP").and_then(|h| h.to_str().ok()) {
        return real_ip.trim().to_string();
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    "unknown".to_string()
}

fn header_value(n: impl ToString) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_identifier(&request);
    let limiter = &state.limiter;

    match limiter.check(&client).await {
        Decision::Allow { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", header_value(limiter.limit()));
            headers.insert("X-RateLimit-Remaining", header_value(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            warn!(%client, limit = limiter.limit(), "rate limit exceeded");
            let mut response = AppError::operational(StatusCode::TOO_MANY_REQUESTS, LIMITED_MESSAGE)
                .into_response();
            let headers = response.headers_mut();
            headers.insert("Retry-After", header_value(retry_after.as_secs().max(1)));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            response
        }
    }
}
