//! Restart and retry pacing policies.
//!
//! This module groups the knobs that control **whether** an exited child is
//! spawned again and **how long** the core waits before a retry.
//!
//! ## Contents
//! - [`AutoRestart`] whether an exit from `running` re-spawns the child (always / never / unexpected)
//! - [`BackoffPolicy`] delay between failed start attempts (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization of that delay
//!
//! ## Quick wiring
//! ```text
//! ProcessSpec { autorestart: AutoRestart, exitcodes, startretries, .. }
//!      └─► core::process::Process uses:
//!           - autorestart.on_exit(code, exitcodes) to decide stop/restart/retry
//!           - SupervisorConfig::backoff.next(retries) to schedule a retry
//! ```

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::{AutoRestart, ExitDecision};
