use rumqttc::{AsyncClient, QoS};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tracing::{error, info};

/// Remembers which topics were handed to the client, in send order.
///
/// The event loop reports each outgoing SUBSCRIBE only by packet id, and
/// requests leave in the order they were queued, so popping the front on
/// every `Outgoing::Subscribe` recovers the topic for that packet id.
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    send: tokio::sync::Mutex<()>,
    queued: Mutex<VecDeque<String>>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to every topic, logging failures without stopping.
    pub async fn subscribe_all(&self, client: &AsyncClient, topics: &[String]) {
        // Concurrent callers must not interleave their requests
        let _send = self.send.lock().await;
        for topic in topics {
            self.queue().push_back(topic.clone());
            match client.subscribe(topic.as_str(), QoS::AtLeastOnce).await {
                Ok(()) => info!("Subscribed to MQTT topic: {}", topic),
                Err(e) => {
                    self.queue().pop_back();
                    error!("Failed to subscribe to MQTT topic {}: {}", topic, e);
                }
            }
        }
    }

    /// Topic of the oldest request not yet seen leaving the client.
    pub fn next_sent(&self) -> Option<String> {
        self.queue().pop_front()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.queued.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
