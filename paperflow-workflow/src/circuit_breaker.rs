//! Three-state circuit breaker for protecting external service calls.
//!
//! CLOSED → OPEN when consecutive failures reach the threshold;
//! OPEN → HALF_OPEN lazily once the recovery timeout elapses;
//! HALF_OPEN → CLOSED after enough probe successes, back to OPEN on any
//! probe failure.

use std::future::Future;
use std::sync::Mutex;
use std::time::Instant;

use tracing::info;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Thresholds and timing for one breaker instance.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Seconds to wait in OPEN before allowing probes.
    pub recovery_timeout_seconds: f64,
    /// Probe calls admitted (and successes required) in HALF_OPEN.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_seconds: 60.0,
            half_open_max_calls: 2,
        }
    }
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, thiserror::Error)]
pub enum CircuitCallError<E>
where
    E: std::error::Error,
{
    /// The circuit is open; the inner future was never polled.
    #[error("circuit '{name}' is OPEN, retry in {remaining_seconds:.0}s")]
    Open {
        name: String,
        remaining_seconds: f64,
    },
    #[error(transparent)]
    Inner(E),
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_calls: u32,
    last_failure: Option<Instant>,
}

/// Thread-safe circuit breaker; all transitions happen under one mutex.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_calls: 0,
                last_failure: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state; may transition OPEN → HALF_OPEN on read.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().unwrap();
        self.maybe_half_open(&mut inner);
        inner.state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().unwrap().failure_count
    }

    /// Whether a request should be admitted. In HALF_OPEN at most
    /// `half_open_max_calls` probes pass; each admission is counted.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        self.maybe_half_open(&mut inner);

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.half_open_calls < self.config.half_open_max_calls {
                    inner.half_open_calls += 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::Open => false,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.half_open_max_calls {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Seconds until the next OPEN → HALF_OPEN transition; 0 when not open.
    pub fn remaining_recovery_seconds(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        match (inner.state, inner.last_failure) {
            (CircuitState::Open, Some(at)) => {
                (self.config.recovery_timeout_seconds - at.elapsed().as_secs_f64()).max(0.0)
            }
            _ => 0.0,
        }
    }

    /// Manually reset the circuit to CLOSED.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.transition(&mut inner, CircuitState::Closed);
    }

    /// Run `fut` under the breaker: denied admission returns
    /// [`CircuitCallError::Open`] without polling the future; otherwise the
    /// outcome is recorded as success or failure.
    pub async fn call<T, E, Fut>(&self, fut: Fut) -> Result<T, CircuitCallError<E>>
    where
        E: std::error::Error,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.allow() {
            return Err(CircuitCallError::Open {
                name: self.name.clone(),
                remaining_seconds: self.remaining_recovery_seconds(),
            });
        }

        match fut.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitCallError::Inner(e))
            }
        }
    }

    fn maybe_half_open(&self, inner: &mut BreakerState) {
        if inner.state == CircuitState::Open {
            if let Some(at) = inner.last_failure {
                if at.elapsed().as_secs_f64() >= self.config.recovery_timeout_seconds {
                    self.transition(inner, CircuitState::HalfOpen);
                }
            }
        }
    }

    fn transition(&self, inner: &mut BreakerState, new_state: CircuitState) {
        let old = inner.state;
        inner.state = new_state;

        match new_state {
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.half_open_calls = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_calls = 0;
                inner.success_count = 0;
            }
            CircuitState::Open => {}
        }

        info!(
            breaker = %self.name,
            from = old.as_str(),
            to = new_state.as_str(),
            failures = inner.failure_count,
            "circuit transition"
        );
    }
}
