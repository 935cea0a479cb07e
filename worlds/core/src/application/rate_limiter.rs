// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Shared-Secret Rate Limiter
//!
//! Fixed-window counters over failed secret attempts, keyed by
//! (world, subject). Counters live in a `DashMap` so request-parallel
//! handlers can increment and look up without coordination; expired windows
//! are reset lazily on the next touch, dropped on lookup, and swept
//! periodically so abandoned subjects do not accumulate.
//!
//! Only shared-secret worlds consult the limiter.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

use crate::domain::config::AccessControlConfig;
use crate::domain::world::{normalize_address, WorldName};

/// Picks the rate-limit subject for a connection attempt.
///
/// The client IP is only usable when it comes from the trusted reverse
/// proxy's own header; arbitrary forwarding headers are trivially spoofable
/// and must never reach this function. Without a trusted IP the verified
/// caller identity is the subject.
pub fn resolve_subject(trusted_client_ip: Option<&str>, identity: &str) -> String {
    match trusted_client_ip {
        Some(ip) if !ip.trim().is_empty() => ip.trim().to_string(),
        _ => normalize_address(identity),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    /// True when this attempt reached (or was already past) the threshold.
    pub rate_limited: bool,
}

#[derive(Debug)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

/// How many recorded attempts pass between full sweeps of expired entries.
const SWEEP_EVERY: u64 = 1024;

pub struct RateLimiter {
    attempts: DashMap<(WorldName, String), RateLimitEntry>,
    sweep_tick: AtomicU64,
    max_attempts: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: &AccessControlConfig) -> Self {
        Self {
            attempts: DashMap::new(),
            sweep_tick: AtomicU64::new(0),
            max_attempts: config.rate_limit_max_attempts,
            window: Duration::from_secs(config.rate_limit_window_secs),
        }
    }

    pub fn is_rate_limited(&self, world: &WorldName, subject: &str) -> bool {
        let key = (world.clone(), subject.to_string());
        // The subject key space includes client IPs, so expired entries must
        // not stay resident once observed.
        self.attempts
            .remove_if(&key, |_, entry| entry.window_start.elapsed() >= self.window);
        match self.attempts.get(&key) {
            Some(entry) => entry.count >= self.max_attempts,
            None => false,
        }
    }

    /// Counts one failed attempt and reports whether the subject is now
    /// limited.
    pub fn record_failed_attempt(&self, world: &WorldName, subject: &str) -> RateLimitOutcome {
        if self.sweep_tick.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == 0 {
            self.attempts
                .retain(|_, entry| entry.window_start.elapsed() < self.window);
        }
        let key = (world.clone(), subject.to_string());
        let mut entry = self.attempts.entry(key).or_insert_with(|| RateLimitEntry {
            count: 0,
            window_start: Instant::now(),
        });
        if entry.window_start.elapsed() >= self.window {
            entry.count = 0;
            entry.window_start = Instant::now();
        }
        entry.count += 1;
        let rate_limited = entry.count >= self.max_attempts;
        if rate_limited && entry.count == self.max_attempts {
            info!(world = %world, subject = %subject, "Subject rate limited for shared-secret attempts");
            metrics::counter!("worlds_access_rate_limited_total").increment(1);
        }
        RateLimitOutcome { rate_limited }
    }

    /// Clears the counter after a successful access.
    pub fn clear_attempts(&self, world: &WorldName, subject: &str) {
        self.attempts.remove(&(world.clone(), subject.to_string()));
    }

    #[cfg(test)]
    fn tracked_subjects(&self) -> usize {
        self.attempts.len()
    }
}
