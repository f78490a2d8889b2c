//! Per-session rate limiting.
//!
//! Each session has two nested counters: a window counter (`max_requests`
//! per `window_ms`) and a burst counter (`burst_limit` per rolling second).
//! Admission and counting happen under the session's map entry lock, so
//! concurrent checks for one session never both take the last slot.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use warden_core::SessionId;

/// Length of the burst sub-window.
pub const BURST_WINDOW: Duration = Duration::from_millis(1000);

/// Rate limit settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
    /// Whether limiting is applied at all.
    pub enabled: bool,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Requests allowed per burst sub-window.
    pub burst_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 60,
            burst_limit: 5,
        }
    }
}

impl RateLimitConfig {
    fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Milliseconds until the limiting counter resets.
    pub reset_in_ms: u64,
    /// Requests counted in the current window.
    pub current_count: u32,
}

#[derive(Debug, Clone, Copy)]
struct SessionState {
    window_start: Instant,
    request_count: u32,
    burst_window_start: Instant,
    burst_count: u32,
    last_seen: Instant,
}

impl SessionState {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            request_count: 0,
            burst_window_start: now,
            burst_count: 0,
            last_seen: now,
        }
    }

    /// Reset counters whose window has elapsed.
    fn roll(&mut self, now: Instant, window: Duration) {
        if now.saturating_duration_since(self.window_start) >= window {
            self.window_start = now;
            self.request_count = 0;
        }
        if now.saturating_duration_since(self.burst_window_start) >= BURST_WINDOW {
            self.burst_window_start = now;
            self.burst_count = 0;
        }
    }
}

fn remaining_of(start: Instant, length: Duration, now: Instant) -> u64 {
    let left = length.saturating_sub(now.saturating_duration_since(start));
    u64::try_from(left.as_millis()).unwrap_or(u64::MAX)
}

/// Per-session sliding window and burst limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    sessions: DashMap<SessionId, SessionState>,
}

impl RateLimiter {
    /// Limiter with the given settings.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    /// Settings in effect.
    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Admit or reject one request for `session`.
    pub fn check(&self, session: &SessionId) -> RateLimitDecision {
        self.check_at(session, Instant::now())
    }

    /// [`Self::check`] at an explicit instant.
    pub fn check_at(&self, session: &SessionId, now: Instant) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision {
                allowed: true,
                remaining: self.config.max_requests,
                reset_in_ms: 0,
                current_count: 0,
            };
        }

        let window = self.config.window();
        let mut state = self
            .sessions
            .entry(session.clone())
            .or_insert_with(|| SessionState::new(now));
        state.roll(now, window);
        state.last_seen = now;

        if state.burst_count >= self.config.burst_limit {
            let reset_in_ms = remaining_of(state.burst_window_start, BURST_WINDOW, now);
            warn!(session = %session, burst = state.burst_count, reset_in_ms, "burst limit hit");
            return RateLimitDecision {
                allowed: false,
                remaining: self.config.max_requests.saturating_sub(state.request_count),
                reset_in_ms,
                current_count: state.request_count,
            };
        }
        if state.request_count >= self.config.max_requests {
            let reset_in_ms = remaining_of(state.window_start, window, now);
            warn!(session = %session, count = state.request_count, reset_in_ms, "rate limit window exhausted");
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_in_ms,
                current_count: state.request_count,
            };
        }

        state.request_count = state.request_count.saturating_add(1);
        state.burst_count = state.burst_count.saturating_add(1);
        debug!(session = %session, count = state.request_count, "rate limit admitted");
        RateLimitDecision {
            allowed: true,
            remaining: self.config.max_requests.saturating_sub(state.request_count),
            reset_in_ms: remaining_of(state.window_start, window, now),
            current_count: state.request_count,
        }
    }

    /// Current counters for `session` without consuming a request.
    #[must_use]
    pub fn status(&self, session: &SessionId) -> RateLimitDecision {
        let now = Instant::now();
        let window = self.config.window();
        let Some(entry) = self.sessions.get(session) else {
            return RateLimitDecision {
                allowed: true,
                remaining: self.config.max_requests,
                reset_in_ms: 0,
                current_count: 0,
            };
        };
        let mut state = *entry;
        drop(entry);
        state.roll(now, window);
        RateLimitDecision {
            allowed: !self.config.enabled
                || (state.burst_count < self.config.burst_limit
                    && state.request_count < self.config.max_requests),
            remaining: self.config.max_requests.saturating_sub(state.request_count),
            reset_in_ms: remaining_of(state.window_start, window, now),
            current_count: state.request_count,
        }
    }

    /// Forget all counters for `session`.
    pub fn reset(&self, session: &SessionId) {
        self.sessions.remove(session);
    }

    /// Drop sessions idle for longer than one window. Returns how many.
    pub fn prune_idle(&self) -> usize {
        self.prune_idle_at(Instant::now())
    }

    fn prune_idle_at(&self, now: Instant) -> usize {
        let window = self.config.window();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_seen) < window);
        before.saturating_sub(self.sessions.len())
    }

    /// Number of tracked sessions.
    #[must_use]
    pub fn sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
