// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Settings notification bus - Pub/Sub for world-settings changes
//
// In-memory event streaming using tokio broadcast channels. One event is
// published per successful access-setting replacement; subscribers that
// fall behind see a lag error, never a stalled publisher.

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::WorldSettingsChangedEvent;

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("Event bus closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events")]
    Lagged(u64),
}

/// Bus for world-settings-changed notifications.
#[derive(Clone)]
pub struct SettingsEventBus {
    sender: broadcast::Sender<WorldSettingsChangedEvent>,
}

impl SettingsEventBus {
    /// Capacity bounds how many events buffer before old ones drop.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Fire-and-forget publish; runs after the setting write has committed
    /// and never propagates failure back to the writer.
    pub fn publish(&self, event: WorldSettingsChangedEvent) {
        debug!(world = %event.world, access_type = %event.access_type, "Publishing settings-changed event");
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening for settings changes");
        }
    }

    pub fn subscribe(&self) -> SettingsEventReceiver {
        SettingsEventReceiver { receiver: self.sender.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct SettingsEventReceiver {
    receiver: broadcast::Receiver<WorldSettingsChangedEvent>,
}

impl SettingsEventReceiver {
    pub async fn recv(&mut self) -> Result<WorldSettingsChangedEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Settings event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<WorldSettingsChangedEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => EventBusError::Lagged(n),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::AccessSetting;
    use crate::domain::world::WorldName;

    #[tokio::test]
    async fn subscribers_see_published_events() {
        let bus = SettingsEventBus::with_default_capacity();
        let mut receiver = bus.subscribe();

        let event = WorldSettingsChangedEvent::new(
            WorldName::new("w.eth"),
            &AccessSetting::Unrestricted,
        );
        bus.publish(event.clone());

        let seen = receiver.recv().await.unwrap();
        assert_eq!(seen.event_id, event.event_id);
        assert_eq!(seen.access_type, "unrestricted");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = SettingsEventBus::with_default_capacity();
        bus.publish(WorldSettingsChangedEvent::new(
            WorldName::new("w.eth"),
            &AccessSetting::Unrestricted,
        ));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
