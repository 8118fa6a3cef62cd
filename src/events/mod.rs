//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to publish
//! lifecycle reports emitted by the supervisor core and the subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the supervisor core (every state transition, reloads, shutdown)
//!   and `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the supervisor's listener, which fans events out to the
//!   configured [`Subscribe`](crate::Subscribe) sinks.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
