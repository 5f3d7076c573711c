// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Event Bus Implementation - Pub/Sub for evaluation events
//
// In-memory event streaming over a tokio broadcast channel. Used by the CLI
// for progress output and by anything that wants to observe evaluations.
// Events are lost on restart.

use crate::domain::events::EvaluationEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Event bus for publishing and subscribing to evaluation events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<EvaluationEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Slow receivers lose the oldest events once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish to all subscribers. Never blocks and never fails.
    pub fn publish(&self, event: EvaluationEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single inspection
    pub fn subscribe_inspection(&self, inspection_id: Uuid) -> InspectionEventReceiver {
        InspectionEventReceiver {
            receiver: self.sender.subscribe(),
            inspection_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all evaluation events
pub struct EventReceiver {
    receiver: broadcast::Receiver<EvaluationEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<EvaluationEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<EvaluationEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one inspection id
pub struct InspectionEventReceiver {
    receiver: broadcast::Receiver<EvaluationEvent>,
    inspection_id: Uuid,
}

impl InspectionEventReceiver {
    pub async fn recv(&mut self) -> Result<EvaluationEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.inspection_id() == self.inspection_id {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rejected(inspection_id: Uuid) -> EvaluationEvent {
        EvaluationEvent::EvaluationRejected {
            inspection_id,
            account_id: "acct-1".to_string(),
            reason: "insufficient credits".to_string(),
            rejected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let id = Uuid::new_v4();

        event_bus.publish(rejected(id));

        match receiver.recv().await.unwrap() {
            EvaluationEvent::EvaluationRejected { inspection_id, .. } => assert_eq!(inspection_id, id),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inspection_filtering() {
        let event_bus = EventBus::new(10);
        let ours = Uuid::new_v4();
        let mut receiver = event_bus.subscribe_inspection(ours);

        event_bus.publish(rejected(Uuid::new_v4()));
        event_bus.publish(rejected(ours));

        assert_eq!(receiver.recv().await.unwrap().inspection_id(), ours);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(rejected(Uuid::new_v4()));

        assert!(receiver1.recv().await.is_ok());
        assert!(receiver2.recv().await.is_ok());
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let event_bus = EventBus::default();
        event_bus.publish(rejected(Uuid::new_v4()));
        assert_eq!(event_bus.subscriber_count(), 0);
    }

    #[test]
    fn test_try_recv_empty() {
        let event_bus = EventBus::new(4);
        let mut receiver = event_bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
