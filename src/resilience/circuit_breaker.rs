//! Circuit breaker for provider protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: provider assumed down, calls fail fast
//! - Half-Open: a bounded number of trial calls probe recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: timeout elapsed since last failure (checked on read)
//! Half-Open → Closed: successes >= success_threshold
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - Per-provider circuit breaker (not global), created lazily
//! - No background timer; the Open → Half-Open move happens when state is read
//! - Critical sections never suspend, so a plain mutex is enough
//! - Trial slots are held by an RAII permit and released if no outcome is recorded

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::{CircuitBreakerConfig, CircuitBreakerSettings};
use crate::observability::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerStats {
    pub provider_id: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub half_open_calls: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub since_last_failure: Option<Duration>,
}

impl CircuitBreakerStats {
    /// Failure rate over the breaker's lifetime, as a fraction.
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_calls as f64
        }
    }
}

/// Which half-open trial slot an outcome settles.
#[derive(Debug, Clone, Copy)]
enum TrialSlot {
    /// The caller did not hold a trial slot.
    None,
    /// The caller holds the slot handed out in this generation.
    Held(u64),
    /// Direct `record_*` call: release one slot if any are taken.
    Unknown,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    /// Bumped on every transition; stale trial permits are ignored.
    generation: u64,
    failure_count: u32,
    success_count: u32,
    half_open_calls: u32,
    last_failure: Option<Instant>,
    total_calls: u64,
    total_failures: u64,
}

/// Failure-isolation state machine for one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider_id: String,
    settings: CircuitBreakerSettings,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(provider_id: impl Into<String>, settings: CircuitBreakerSettings) -> Self {
        Self {
            provider_id: provider_id.into(),
            settings,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                generation: 0,
                failure_count: 0,
                success_count: 0,
                half_open_calls: 0,
                last_failure: None,
                total_calls: 0,
                total_failures: 0,
            }),
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn settings(&self) -> &CircuitBreakerSettings {
        &self.settings
    }

    /// Current state, applying the Open → Half-Open timeout if due.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.observe(&mut inner)
    }

    /// True iff Closed, or Half-Open with trial budget left.
    ///
    /// Does not reserve a trial slot; use [`CircuitBreaker::try_acquire`] for that.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.lock();
        match self.observe(&mut inner) {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => inner.half_open_calls < self.settings.half_open_max_calls,
        }
    }

    /// Ask permission for a call, reserving a trial slot when Half-Open.
    pub fn try_acquire(self: &Arc<Self>) -> Option<CircuitPermit> {
        let mut inner = self.lock();
        let trial = match self.observe(&mut inner) {
            CircuitState::Closed => None,
            CircuitState::Open => return None,
            CircuitState::HalfOpen => {
                if inner.half_open_calls >= self.settings.half_open_max_calls {
                    return None;
                }
                inner.half_open_calls += 1;
                Some(inner.generation)
            }
        };
        Some(CircuitPermit {
            breaker: Arc::clone(self),
            trial_generation: trial,
            settled: false,
        })
    }

    /// Report a successful call.
    pub fn record_success(&self) {
        self.settle(true, TrialSlot::Unknown);
    }

    /// Report a failed call.
    pub fn record_failure(&self) {
        self.settle(false, TrialSlot::Unknown);
    }

    /// Force the breaker back to Closed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitState::Closed);
        inner.last_failure = None;
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.lock();
        let state = self.observe(&mut inner);
        CircuitBreakerStats {
            provider_id: self.provider_id.clone(),
            state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            half_open_calls: inner.half_open_calls,
            total_calls: inner.total_calls,
            total_failures: inner.total_failures,
            since_last_failure: inner.last_failure.map(|t| t.elapsed()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    fn observe(&self, inner: &mut BreakerState) -> CircuitState {
        if inner.state == CircuitState::Open {
            let due = inner
                .last_failure
                .map(|t| t.elapsed() >= self.settings.timeout())
                .unwrap_or(true);
            if due {
                self.transition(inner, CircuitState::HalfOpen);
            }
        }
        inner.state
    }

    fn settle(&self, success: bool, slot: TrialSlot) {
        let mut inner = self.lock();
        inner.total_calls += 1;
        let state = self.observe(&mut inner);

        if state == CircuitState::HalfOpen {
            let release = match slot {
                TrialSlot::None => false,
                TrialSlot::Held(generation) => generation == inner.generation,
                TrialSlot::Unknown => true,
            };
            if release {
                inner.half_open_calls = inner.half_open_calls.saturating_sub(1);
            }
        }

        if success {
            match state {
                CircuitState::Closed => inner.failure_count = 0,
                CircuitState::HalfOpen => {
                    inner.success_count += 1;
                    if inner.success_count >= self.settings.success_threshold {
                        self.transition(&mut inner, CircuitState::Closed);
                    }
                }
                CircuitState::Open => {}
            }
            return;
        }

        inner.total_failures += 1;
        inner.last_failure = Some(Instant::now());
        match state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.settings.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
            CircuitState::Open => {}
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.half_open_calls = inner.half_open_calls.saturating_sub(1);
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.success_count = 0;
        inner.half_open_calls = 0;
        if to == CircuitState::Closed {
            inner.failure_count = 0;
        }
        if from == to {
            return;
        }

        match to {
            CircuitState::Open => tracing::warn!(
                provider = %self.provider_id,
                from = from.as_str(),
                failures = inner.failure_count,
                timeout_secs = self.settings.timeout_secs,
                "Circuit opened"
            ),
            _ => tracing::info!(
                provider = %self.provider_id,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit state changed"
            ),
        }
        metrics::record_circuit_transition(&self.provider_id, to);
    }
}

/// Permission to make one call through a breaker.
///
/// Recording the outcome consumes the permit. Dropping it unrecorded gives a
/// held Half-Open trial slot back.
#[derive(Debug)]
pub struct CircuitPermit {
    breaker: Arc<CircuitBreaker>,
    trial_generation: Option<u64>,
    settled: bool,
}

impl CircuitPermit {
    /// Whether this permit holds a Half-Open trial slot.
    pub fn is_trial(&self) -> bool {
        self.trial_generation.is_some()
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.settle(true, self.slot());
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.settle(false, self.slot());
    }

    fn slot(&self) -> TrialSlot {
        match self.trial_generation {
            Some(generation) => TrialSlot::Held(generation),
            None => TrialSlot::None,
        }
    }
}

impl Drop for CircuitPermit {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(generation) = self.trial_generation {
            self.breaker.release_trial(generation);
        }
    }
}

/// Lazily-populated set of per-provider breakers.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// Get or create the breaker for a provider.
    pub fn get(&self, provider_id: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(provider_id) {
            return existing.value().clone();
        }
        self.breakers
            .entry(provider_id.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    provider_id,
                    self.config.settings_for(provider_id),
                ))
            })
            .value()
            .clone()
    }

    /// Existing breaker, without creating one.
    pub fn peek(&self, provider_id: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(provider_id).map(|b| b.value().clone())
    }

    /// State of a provider's breaker; Closed if none exists yet.
    pub fn state_of(&self, provider_id: &str) -> CircuitState {
        self.peek(provider_id)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Stats for every breaker, ordered by provider id.
    pub fn all_stats(&self) -> Vec<CircuitBreakerStats> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|b| b.value().clone()).collect();
        let mut stats: Vec<_> = breakers.iter().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        stats
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.iter() {
            breaker.value().reset();
        }
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
