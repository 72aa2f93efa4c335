//! Notification handling for the Ember mug
//! This module subscribes to a characteristic and forwards every value the
//! mug pushes onto the transport event channel.

use anyhow::Result;
use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::transport::{EventSender, TransportEvent};
use crate::core::bluetooth::types::CharacteristicHandle;

/// Notification handler for mug characteristics
#[derive(Clone)]
pub struct NotificationHandler {
    events: EventSender,
    cancel_token: CancellationToken,
}

impl NotificationHandler {
    pub fn new(events: EventSender, cancel_token: CancellationToken) -> Self {
        Self { events, cancel_token }
    }

    /// Set up notifications for one characteristic
    pub fn setup_notifications(
        &self,
        handle: CharacteristicHandle,
        characteristic: Characteristic,
    ) -> Result<()> {
        info!("Subscribing to notifications on {}...", characteristic.uuid());

        let events = self.events.clone();
        let cancel_token = self.cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = Self::process_notifications(handle, characteristic, events) => {}
                _ = cancel_token.cancelled() => {}
            }
        });

        Ok(())
    }

    /// Stop every running notification task
    pub fn stop_notifications(&self) {
        self.cancel_token.cancel();
    }

    async fn process_notifications(
        handle: CharacteristicHandle,
        characteristic: Characteristic,
        events: EventSender,
    ) {
        match characteristic.notify().await {
            Ok(mut notification_stream) => {
                while let Some(result) = notification_stream.next().await {
                    match result {
                        Ok(value) => {
                            debug!("Received notification on {:?}: {:?}", handle, value);
                            let event = TransportEvent::ValueChanged {
                                characteristic: handle,
                                value,
                            };
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Error in notification stream: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to subscribe to notifications: {}", e);
            }
        }

        info!("Notification stream ended");
    }
}
