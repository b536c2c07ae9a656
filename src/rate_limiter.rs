//! Rate limiting for the address lookup
//!
//! Sliding window per client address: at most `max_requests` accepted in any
//! `window_ms` span. Rejected attempts are not recorded, so a client that
//! keeps hammering is let back in as soon as its oldest accepted request
//! ages out.

use std::collections::{HashMap, VecDeque};

use crate::error::{AuditError, Result};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Accepted requests per window, per key
    pub max_requests: u32,
    /// Window size in milliseconds
    pub window_ms: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_ms: 60_000,
        }
    }
}

/// Wall-clock milliseconds (works on wasm32 and native)
fn now_ms() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug)]
pub struct RequestRateLimiter {
    config: RateLimiterConfig,
    /// Accepted request timestamps per key, oldest first
    windows: HashMap<String, VecDeque<u64>>,
}

impl RequestRateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimiterConfig::default())
    }

    pub fn with_config(config: RateLimiterConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    /// Admit a request from `key` now.
    pub fn check(&mut self, key: &str) -> Result<()> {
        self.check_at(key, now_ms())
    }

    /// Admit a request from `key` at `now_ms`. Records it only when admitted.
    pub fn check_at(&mut self, key: &str, now_ms: u64) -> Result<()> {
        self.prune(now_ms);

        let window_ms = self.config.window_ms;
        let window = self.windows.entry(key.to_string()).or_default();
        while matches!(window.front(), Some(&t) if now_ms.saturating_sub(t) >= window_ms) {
            window.pop_front();
        }

        if window.len() as u32 >= self.config.max_requests {
            let oldest = window.front().copied().unwrap_or(now_ms);
            let retry_after_ms = (oldest + self.config.window_ms).saturating_sub(now_ms);
            log::warn!(
                "🚫 Rate limit: {} requests from {} in window (max: {})",
                window.len(),
                key,
                self.config.max_requests
            );
            return Err(AuditError::RateLimited { retry_after_ms });
        }

        window.push_back(now_ms);
        log::debug!("📊 Rate limiter: {} has {} request(s) in window", key, window.len());
        Ok(())
    }

    /// Drop keys whose newest request has aged out.
    fn prune(&mut self, now_ms: u64) {
        let window_ms = self.config.window_ms;
        self.windows.retain(|_, window| {
            matches!(window.back(), Some(&t) if now_ms.saturating_sub(t) < window_ms)
        });
    }

    pub fn get_stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            tracked_keys: self.windows.len() as u32,
            requests_in_window: self.windows.values().map(|w| w.len() as u32).sum(),
            max_requests: self.config.max_requests,
            window_ms: self.config.window_ms,
        }
    }
}

impl Default for RequestRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about rate limiting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterStats {
    pub tracked_keys: u32,
    pub requests_in_window: u32,
    pub max_requests: u32,
    pub window_ms: u64,
}
