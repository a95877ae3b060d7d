//! Kernel event system: lets observers follow pipelines and planners
//! without being wired into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All kernel events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KernelEvent {
    /// A function ran to completion (or failed)
    FunctionInvoked {
        plugin: String,
        function: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A pipeline run ended
    PipelineFinished {
        executed: usize,
        skipped: usize,
        cancelled: bool,
        timestamp: DateTime<Utc>,
    },

    /// A planner iteration produced a step
    PlannerIteration {
        iteration: u32,
        action: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A planner run ended
    PlannerFinished {
        iterations: u32,
        answered: bool,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for kernel events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<KernelEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: KernelEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<KernelEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(KernelEvent::FunctionInvoked {
            plugin: "text".into(),
            function: "uppercase".into(),
            success: true,
            duration_ms: 3,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            KernelEvent::FunctionInvoked { function, success, .. } => {
                assert_eq!(function, "uppercase");
                assert!(success);
            }
            _ => panic!("Expected FunctionInvoked event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(KernelEvent::ErrorOccurred {
            context: "test".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
