//! # Report sink trait.
//!
//! [`Subscribe`] is the `report(event)` seam of the supervisor. Each sink runs on
//! a dedicated worker fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::SubscriberSet), so a slow sink never delays the core.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use procvisor::{Event, EventKind, Subscribe};
//!
//! struct FatalAlerts;
//!
//! #[async_trait]
//! impl Subscribe for FatalAlerts {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ProcessFatal {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "fatal-alerts" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of lifecycle reports.
///
/// Called from a sink-dedicated worker task, in publish order.
/// Implementations should use async I/O and must not assume they see every
/// event: on queue overflow events are dropped for this sink only.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this sink's queue (clamped to at least 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
