use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use crate::api::state::AppState;
use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::store::Store;

/// Prune expired windows once the table grows past this many clients
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Fixed-window request counter per client IP.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request. Returns false once the client is over its budget.
    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let mut clients = self.clients.lock();
        if clients.len() > PRUNE_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = clients.entry(client).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }
        entry.hits = entry.hits.saturating_add(1);
        entry.hits <= self.max_requests
    }
}

pub async fn rate_limit<S: Store + 'static>(
    State(state): State<AppState<S>>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !state.limiter.check(client) {
        log::warn!("Rate limit exceeded for {}", client);
        return ApiError::RateLimited.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_secs: u64, max_requests: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            window_secs,
            max_requests,
        })
    }

    #[test]
    fn test_budget_resets_after_window() {
        let limiter = limiter(60, 2);
        let client: IpAddr = "10.0.0.1".parse().unwrap();
        let start = Instant::now();

        assert!(limiter.check_at(client, start));
        assert!(limiter.check_at(client, start));
        assert!(!limiter.check_at(client, start + Duration::from_secs(1)));
        assert!(limiter.check_at(client, start + Duration::from_secs(61)));
    }

    #[test]
    fn test_clients_are_counted_separately() {
        let limiter = limiter(60, 1);
        let start = Instant::now();
        assert!(limiter.check_at("10.0.0.1".parse().unwrap(), start));
        assert!(limiter.check_at("10.0.0.2".parse().unwrap(), start));
        assert!(!limiter.check_at("10.0.0.1".parse().unwrap(), start));
    }

    #[test]
    fn test_counter_saturates_under_flood() {
        let limiter = limiter(60, 5);
        let client: IpAddr = "10.0.0.3".parse().unwrap();
        let start = Instant::now();
        limiter.clients.lock().insert(
            client,
            Window {
                started: start,
                hits: u32::MAX,
            },
        );

        assert!(!limiter.check_at(client, start));
        assert_eq!(limiter.clients.lock()[&client].hits, u32::MAX);
    }
}
