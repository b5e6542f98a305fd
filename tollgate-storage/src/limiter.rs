//! Sliding-window rate limiter for the cache-miss path.
//!
//! Consulted only when neither cache tier can answer; cache hits never
//! consume budget, which is the primary cost-saving property of the whole
//! engine: once a response is cached, repeating the identical request is
//! free no matter how often it arrives.
//!
//! # Window model
//!
//! Sliding log: each scope keeps the unix-second timestamps of its admitted
//! requests in a `VecDeque`, and stamps older than `now - window` age out on
//! every check. Counts therefore reset gradually as the window slides, with
//! no explicit reset operation needed.
//!
//! # Atomicity
//!
//! Both scopes are checked and recorded under one mutex, so admission is a
//! single increment-and-check: two concurrent requests can never both take
//! the last slot, and a rejected request records nothing in either scope,
//! so quota is never double-charged.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tollgate_core::{LimitScope, RateLimitConfig, RateLimitExceeded};

/// Admission headroom left in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingQuota {
    /// Slots left for the queried actor; `None` when no actor was given.
    pub per_actor: Option<u32>,
    /// Slots left in the global scope.
    pub global: u32,
}

struct LimiterState {
    global: VecDeque<i64>,
    per_actor: HashMap<String, VecDeque<i64>>,
}

/// Dual-scope sliding-window rate limiter.
///
/// Limits are read once at construction; there is no runtime
/// reconfiguration.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState {
                global: VecDeque::new(),
                per_actor: HashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject one request, recording it on admission.
    ///
    /// The global scope is always enforced; the per-actor scope only when an
    /// actor key is given. A request is admitted only if BOTH scopes have
    /// room, and a rejection leaves both scopes untouched.
    pub fn check_and_record(&self, actor: Option<&str>) -> Result<(), RateLimitExceeded> {
        self.check_and_record_at(actor, Utc::now().timestamp())
    }

    fn check_and_record_at(
        &self,
        actor: Option<&str>,
        now: i64,
    ) -> Result<(), RateLimitExceeded> {
        let window = self.config.window.as_secs() as i64;
        // A poisoned mutex still holds consistent timestamps.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let cutoff = now - window;

        prune(&mut state.global, cutoff);
        if state.global.len() as u64 >= u64::from(self.config.global_limit) {
            return Err(RateLimitExceeded {
                scope: LimitScope::Global,
                retry_after: retry_after(&state.global, window, now),
            });
        }

        if let Some(actor) = actor {
            let log = state.per_actor.entry(actor.to_string()).or_default();
            prune(log, cutoff);
            if log.len() as u64 >= u64::from(self.config.per_actor_limit) {
                return Err(RateLimitExceeded {
                    scope: LimitScope::PerActor,
                    retry_after: retry_after(log, window, now),
                });
            }
            log.push_back(now);
        }

        state.global.push_back(now);
        Ok(())
    }

    /// Current headroom without recording anything.
    pub fn remaining(&self, actor: Option<&str>) -> RemainingQuota {
        self.remaining_at(actor, Utc::now().timestamp())
    }

    fn remaining_at(&self, actor: Option<&str>, now: i64) -> RemainingQuota {
        let window = self.config.window.as_secs() as i64;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let cutoff = now - window;

        prune(&mut state.global, cutoff);
        let global = self
            .config
            .global_limit
            .saturating_sub(state.global.len() as u32);

        let per_actor = actor.map(|actor| {
            let used = match state.per_actor.get_mut(actor) {
                Some(log) => {
                    prune(log, cutoff);
                    log.len() as u32
                }
                None => 0,
            };
            self.config.per_actor_limit.saturating_sub(used)
        });

        RemainingQuota { per_actor, global }
    }

    /// Forget one actor's admissions (admin operation). Global counts are
    /// unaffected.
    pub fn reset_actor(&self, actor: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.per_actor.remove(actor);
    }

    /// Forget all global admissions (admin operation).
    pub fn reset_global(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.global.clear();
    }
}

fn prune(log: &mut VecDeque<i64>, cutoff: i64) {
    while log.front().is_some_and(|&stamp| stamp <= cutoff) {
        log.pop_front();
    }
}

/// Seconds until the oldest stamp in the window ages out, floored at 1.
fn retry_after(log: &VecDeque<i64>, window: i64, now: i64) -> Duration {
    let seconds = match log.front() {
        Some(&oldest) => (oldest + window - now).max(1),
        None => window.max(1),
    };
    Duration::from_secs(seconds as u64)
}
