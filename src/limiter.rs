// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter for the public intake endpoint.
//!
//! One window per source key (the client IP as text): the first request in
//! a window sets the counter to 1; requests below the ceiling increment it;
//! requests at the ceiling are denied without incrementing. Burst-then-
//! silence across a window boundary is accepted behavior.
//!
//! Window state lives behind the [`RateLimitStore`] trait so a deployment
//! can back it with a shared external store; the bundled [`MemoryStore`]
//! keeps it in-process and relies on a periodic sweep to bound growth.

use crate::config::RateLimitConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// One source key's window: request count and window start.
#[derive(Debug, Clone, Copy)]
pub struct WindowEntry {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitDecision {
    /// Request is allowed
    Allowed {
        /// Remaining requests in the current window
        remaining: u32,
        /// Time until the window resets
        reset_in: Duration,
    },
    /// Request is denied until the window resets
    Limited {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Window storage operations.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<WindowEntry>;
    async fn put(&self, key: &str, entry: WindowEntry);
    /// Add one to the key's counter, returning the updated entry.
    /// Returns `None` when the key is unknown.
    async fn increment(&self, key: &str) -> Option<WindowEntry>;
    /// Drop entries whose window started more than `stale_after` ago.
    async fn sweep(&self, stale_after: Duration);
}

/// In-process window store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, WindowEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<WindowEntry> {
        self.entries.read().await.get(key).copied()
    }

    async fn put(&self, key: &str, entry: WindowEntry) {
        self.entries.write().await.insert(key.to_string(), entry);
    }

    async fn increment(&self, key: &str) -> Option<WindowEntry> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(key)?;
        entry.count += 1;
        Some(*entry)
    }

    async fn sweep(&self, stale_after: Duration) {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| elapsed_since(entry.window_start, now) < stale_after);
    }
}

/// Fixed-window rate limiter over an injected store.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self { config, store }
    }

    /// Check and update the window for a source key.
    pub async fn check(&self, key: &str) -> RateLimitDecision {
        let now = Utc::now();
        let window = self.config.window_duration();

        if let Some(entry) = self.store.get(key).await {
            let elapsed = elapsed_since(entry.window_start, now);
            if elapsed < window {
                let reset_in = window.saturating_sub(elapsed);
                if entry.count < self.config.max_requests {
                    let count = match self.store.increment(key).await {
                        Some(updated) => updated.count,
                        // key swept between get and increment; start over
                        None => {
                            self.store
                                .put(
                                    key,
                                    WindowEntry {
                                        count: 1,
                                        window_start: now,
                                    },
                                )
                                .await;
                            1
                        }
                    };
                    return RateLimitDecision::Allowed {
                        remaining: self.config.max_requests.saturating_sub(count),
                        reset_in,
                    };
                }
                debug!(key, retry_after = ?reset_in, "rate limit exceeded");
                return RateLimitDecision::Limited {
                    retry_after: reset_in,
                };
            }
        }

        // first sighting, or the window has elapsed
        self.store
            .put(
                key,
                WindowEntry {
                    count: 1,
                    window_start: now,
                },
            )
            .await;
        RateLimitDecision::Allowed {
            remaining: self.config.max_requests.saturating_sub(1),
            reset_in: window,
        }
    }

    /// Drop windows old enough that they could only be reset anyway.
    pub async fn sweep(&self) {
        self.store.sweep(self.config.window_duration()).await;
    }
}

fn elapsed_since(start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - start).to_std().unwrap_or(Duration::ZERO)
}
