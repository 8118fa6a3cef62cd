use std::sync::Arc;

use crate::core::{SupervisorConfig, supervisor::Supervisor};
use crate::subscribers::Subscribe;

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets report sinks.
    ///
    /// Sinks receive every lifecycle event through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one report sink.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the supervisor.
    ///
    /// Only channels are created here; tasks are spawned by
    /// [`Supervisor::run`], so no runtime is needed yet.
    pub fn build(self) -> Supervisor {
        Supervisor::new_internal(self.cfg, self.subscribers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::LogWriter;

    #[test]
    fn builds_without_a_runtime() {
        let mut cfg = SupervisorConfig::default();
        cfg.queue_capacity = 0;
        let sup = SupervisorBuilder::new(cfg)
            .with_subscriber(Arc::new(LogWriter::new()))
            .build();
        assert_eq!(sup.config().queue_capacity_clamped(), 1);
        assert!(!sup.handle().is_closed());
        assert!(sup.handle().snapshot().programs.is_empty());
    }
}
