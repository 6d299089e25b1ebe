//! Request Rate Limiting
//!
//! Fixed-window counters keyed by client address and route. Every route
//! carries its own set of windows, so a burst against one operation does
//! not starve the others. A request is admitted only when every window has
//! room; a rejected request consumes nothing.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

/// Tracked keys before expired counters are swept
const SWEEP_THRESHOLD: usize = 10_000;

/// `http.rate_limit` section of the config file
///
/// A zero limit disables that window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_per_second")]
    pub per_second: u32,

    #[serde(default = "default_per_hour")]
    pub per_hour: u32,

    #[serde(default = "default_per_day")]
    pub per_day: u32,
}

fn default_per_second() -> u32 {
    1
}

fn default_per_hour() -> u32 {
    3600
}

fn default_per_day() -> u32 {
    86400
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: default_per_second(),
            per_hour: default_per_hour(),
            per_day: default_per_day(),
        }
    }
}

impl RateLimitConfig {
    /// No limits at all
    pub fn unlimited() -> Self {
        Self {
            per_second: 0,
            per_hour: 0,
            per_day: 0,
        }
    }

    fn limits(&self) -> Vec<Limit> {
        [
            (self.per_second, Duration::from_secs(1), "second"),
            (self.per_hour, Duration::from_secs(3600), "hour"),
            (self.per_day, Duration::from_secs(86400), "day"),
        ]
        .into_iter()
        .filter(|(count, _, _)| *count > 0)
        .map(|(count, period, unit)| Limit {
            count,
            period,
            unit,
        })
        .collect()
    }
}

/// One window: at most `count` requests per `period`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub count: u32,
    pub period: Duration,
    unit: &'static str,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per 1 {}", self.count, self.unit)
    }
}

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub limit: Limit,
    pub retry_after: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Per-client, per-route fixed-window limiter
pub struct RateLimiter {
    limits: Vec<Limit>,
    windows: Mutex<HashMap<(String, String), Vec<Window>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limits: config.limits(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limits.is_empty()
    }

    /// Admit or reject one request from `client` against `route`
    pub fn check(&self, client: &str, route: &str) -> Result<(), Rejection> {
        self.check_at(client, route, Instant::now())
    }

    fn check_at(&self, client: &str, route: &str, now: Instant) -> Result<(), Rejection> {
        if self.is_unlimited() {
            return Ok(());
        }

        let mut all = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        if all.len() >= SWEEP_THRESHOLD {
            self.sweep(&mut all, now);
        }

        let windows = all
            .entry((client.to_string(), route.to_string()))
            .or_insert_with(|| {
                vec![
                    Window {
                        started: now,
                        hits: 0,
                    };
                    self.limits.len()
                ]
            });

        for (limit, window) in self.limits.iter().zip(windows.iter_mut()) {
            if now.duration_since(window.started) >= limit.period {
                window.started = now;
                window.hits = 0;
            }
        }

        for (limit, window) in self.limits.iter().zip(windows.iter()) {
            if window.hits >= limit.count {
                let elapsed = now.duration_since(window.started);
                return Err(Rejection {
                    limit: *limit,
                    retry_after: limit.period.saturating_sub(elapsed),
                });
            }
        }

        for window in windows.iter_mut() {
            window.hits += 1;
        }
        Ok(())
    }

    /// Drop keys whose every window has lapsed
    fn sweep(&self, all: &mut HashMap<(String, String), Vec<Window>>, now: Instant) {
        all.retain(|_, windows| {
            self.limits
                .iter()
                .zip(windows.iter())
                .any(|(limit, window)| now.duration_since(window.started) < limit.period)
        });
    }
}

/// Middleware enforcing the limiter on matched routes
///
/// Requests served without connection info share one anonymous client key.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    match limiter.check(&client, &route) {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            warn!(%client, %route, limit = %rejection.limit, "rate limit exceeded");
            too_many_requests(rejection)
        }
    }
}

fn too_many_requests(rejection: Rejection) -> Response {
    let retry_secs = rejection.retry_after.as_secs_f64().ceil().max(1.0) as u64;
    let body = json!({
        "status": StatusCode::TOO_MANY_REQUESTS.as_u16(),
        "error": format!("Too many requests: {}", rejection.limit),
    });

    (
        StatusCode::TOO_MANY_REQUESTS,
        [(RETRY_AFTER, HeaderValue::from(retry_secs))],
        Json(body),
    )
        .into_response()
}
