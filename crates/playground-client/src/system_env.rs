//! Production Environment implementation using system time.
//!
//! `SystemEnv` stamps credentials with `Instant::now()` and waits out push
//! channel backoff with `tokio::time::sleep()`.

use std::time::{Duration, Instant};

use playground_core::Environment;

/// Production environment backed by the system clock and the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
