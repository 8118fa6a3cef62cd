//! # Supervisor runtime configuration.
//!
//! [`SupervisorConfig`] holds the settings that belong to the supervisor itself
//! rather than to a program: everything per-program lives in
//! [`ProcessSpec`](crate::ProcessSpec).
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → clamped to 1
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `queue_capacity`: start/stop request queue size (min 1)
/// - `backoff`: delay between failed start attempts
/// - `shutdown_slack`: extra wait on top of the longest grace period during shutdown
/// - `handle_os_signals`: whether `run` listens for SIGINT/SIGTERM/SIGQUIT
///
/// ## Notes
/// All fields are public. Prefer the accessors to sprinkling `max(1)` checks
/// across the codebase.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Capacity of the event bus broadcast channel.
    ///
    /// Slow listeners that lag behind more than `bus_capacity` events skip
    /// the oldest ones.
    pub bus_capacity: usize,

    /// Capacity of each request queue.
    ///
    /// A full queue makes `submit_start`/`submit_stop` return
    /// [`SubmitError::Full`](crate::SubmitError::Full).
    pub queue_capacity: usize,

    /// Delay between failed start attempts.
    pub backoff: BackoffPolicy,

    /// Added to the longest per-process grace period to bound shutdown.
    ///
    /// Covers the time between `SIGKILL` and the OS reporting the exit.
    pub shutdown_slack: Duration,

    /// Listen for termination signals inside [`Supervisor::run`](crate::Supervisor::run).
    pub handle_os_signals: bool,
}

impl SupervisorConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a request queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `queue_capacity = 256`
    /// - `backoff = BackoffPolicy::default()` (100ms doubling up to 10s)
    /// - `shutdown_slack = 1s`
    /// - `handle_os_signals = true`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            queue_capacity: 256,
            backoff: BackoffPolicy::default(),
            shutdown_slack: Duration::from_secs(1),
            handle_os_signals: true,
        }
    }
}
