//! # paperflow-workflow
//!
//! General-purpose DAG workflow executor: layered parallel execution under a
//! global concurrency cap, per-resource token-bucket rate limiting, per-step
//! retries with jittered exponential backoff, per-attempt timeouts,
//! conditional skipping, and failure propagation to dependents. Also home to
//! the circuit breaker guarding unreliable downstreams.

pub mod circuit_breaker;
pub mod dag;
pub mod executor;
pub mod rate_limiter;
pub mod step;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitCallError, CircuitState};
pub use dag::{StepOptions, WorkflowDag, WorkflowStep};
pub use executor::WorkflowExecutor;
pub use rate_limiter::TokenBucketRateLimiter;
pub use step::{step_fn, StepContext, StepResult, StepStatus, WorkflowResult};
