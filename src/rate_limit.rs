//! Per-client token buckets for the public forms.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use moka::future::Cache;
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;

const FALLBACK_IP: &str = "127.0.0.1";
const MAX_TRACKED_CLIENTS: u64 = 100_000;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A bucket idle for a whole refill window is full again, so it is dropped
/// and recreated full on the next request.
pub struct RateLimiter {
    buckets: Cache<String, Arc<Mutex<Bucket>>>,
}

impl Default for RateLimiter {
    fn default() -> Self { Self::for_config(&RateLimitConfig::default()) }
}

impl RateLimiter {
    pub fn new(idle: Duration) -> Self {
        Self { buckets: Cache::builder().max_capacity(MAX_TRACKED_CLIENTS).time_to_idle(idle).build() }
    }

    pub fn for_config(cfg: &RateLimitConfig) -> Self { Self::new(cfg.refill_window()) }

    pub async fn allow(&self, key: &str, cfg: &RateLimitConfig) -> bool {
        self.allow_at(key, cfg, Instant::now()).await
    }

    /// Clients with a live bucket.
    pub async fn tracked_clients(&self) -> u64 {
        self.buckets.run_pending_tasks().await;
        self.buckets.entry_count()
    }

    async fn allow_at(&self, key: &str, cfg: &RateLimitConfig, now: Instant) -> bool {
        let entry = self.buckets.get_with(key.to_string(), async { Arc::new(Mutex::new(Bucket { tokens: cfg.capacity, last_refill: now })) }).await;
        let mut bucket = entry.lock().await;
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + (elapsed * cfg.refill_per_sec)).min(cfg.capacity);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Client address as reported by the edge: Cloudflare first, then the first
/// `x-forwarded-for` hop, then `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty());
    if let Some(ip) = header("cf-connecting-ip") { return ip.to_string(); }
    if let Some(first) = header("x-forwarded-for").and_then(|v| v.split(',').next()).map(str::trim).filter(|v| !v.is_empty()) {
        return first.to_string();
    }
    header("x-real-ip").unwrap_or(FALLBACK_IP).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn bucket_drains_then_refills() {
        let limiter = RateLimiter::default();
        let cfg = RateLimitConfig::per_minute(5);
        let start = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at("1.2.3.4", &cfg, start).await);
        }
        assert!(!limiter.allow_at("1.2.3.4", &cfg, start).await);
        assert!(limiter.allow_at("5.6.7.8", &cfg, start).await);
        assert!(limiter.allow_at("1.2.3.4", &cfg, start + Duration::from_secs(13)).await);
    }

    #[tokio::test]
    async fn idle_clients_are_forgotten() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let cfg = RateLimitConfig::per_minute(1);
        assert!(limiter.allow("1.2.3.4", &cfg).await);
        assert!(limiter.allow("5.6.7.8", &cfg).await);
        assert!(!limiter.allow("1.2.3.4", &cfg).await);
        assert_eq!(limiter.tracked_clients().await, 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(limiter.tracked_clients().await, 0);
        assert!(limiter.allow("1.2.3.4", &cfg).await);
    }

    #[test]
    fn client_ip_prefers_cloudflare() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "127.0.0.1");
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers), "10.0.0.9");
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers), "203.0.113.7");
        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers), "198.51.100.2");
    }
}
