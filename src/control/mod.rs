//! Operator control surface.
//!
//! - [`command`]: parses one console line into a [`Command`]
//! - [`Console`]: runs commands against a [`SupervisorHandle`](crate::SupervisorHandle)
//!
//! The console is read-only with respect to the core: it validates targets
//! against the published snapshot and submits requests to the core's queues.

mod command;
mod console;

pub use command::{Command, HELP, Target, parse};
pub use console::{Console, Flow};
