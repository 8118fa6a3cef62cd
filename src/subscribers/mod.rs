//! # Report sinks for lifecycle events.
//!
//! Every state transition the core makes is published on the [`Bus`](crate::events::Bus).
//! The supervisor forwards each event to a [`SubscriberSet`], which hands it to
//! every configured [`Subscribe`] sink through its own bounded queue.
//!
//! ```text
//! core ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//!                                                   ├──► [queue] ─► LogWriter (tracing)
//!                                                   └──► [queue] ─► custom sink
//! ```
//!
//! Sinks are the crate's logging seam: [`LogWriter`] turns events into
//! structured `tracing` records; the binary decides where those go.

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
