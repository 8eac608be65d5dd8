//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the engines and their drivers from system
//! time. Credentials are stamped with `now()` when issued, and the push
//! channel waits out its reconnect backoff through `sleep()`, so tests can run
//! both against a virtual clock.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time and async sleeping.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: Subsequent calls must return times >= previous calls.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by driver code (not by the state machines).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
