//! MQTT subscription feeding the status cache.
//!
//! One wildcard subscription is held per car. Every inbound publish is mapped
//! back to `(car, metric)` from its topic and written to the cache verbatim.
//! The broker session is clean, so subscriptions are re-issued after every
//! reconnect.

mod backoff;
mod subscriptions;
mod topic;

pub use self::backoff::Backoff;
pub use self::subscriptions::SubscriptionTracker;
pub use self::topic::TopicFilter;

use crate::cache::{CarId, StatusCache};
use crate::config::MqttConfig;
use crate::stats::IngressStats;
use anyhow::{anyhow, Context, Result};
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet,
    SubscribeReasonCode,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Applies inbound publishes to the cache.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    filter: TopicFilter,
    cache: StatusCache,
    stats: Arc<IngressStats>,
}

impl MessageRouter {
    pub fn new(filter: TopicFilter, cache: StatusCache, stats: Arc<IngressStats>) -> Self {
        Self {
            filter,
            cache,
            stats,
        }
    }

    /// Writes `payload` under the car and metric named by `topic`.
    ///
    /// Payloads are decoded as lossy UTF-8, so invalid bytes are stored as U+FFFD.
    ///
    /// Returns `false` when the topic does not parse; such messages are
    /// dropped without further action.
    pub fn handle(&self, topic: &str, payload: &[u8]) -> bool {
        match self.filter.parse(topic) {
            Some((car, metric)) => {
                let value = String::from_utf8_lossy(payload);
                trace!("MQTT update car {} {}: {}", car, metric, value);
                self.cache.set(car, metric, value);
                self.stats.inc_applied();
                true
            }
            None => {
                self.stats.inc_dropped();
                false
            }
        }
    }
}

/// Live connection to the TeslaMate MQTT broker.
pub struct TelemetryIngress {
    client: AsyncClient,
    stats: Arc<IngressStats>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    disconnect_grace: Duration,
}

impl TelemetryIngress {
    /// Connects to the broker and subscribes for every car in `car_ids`.
    ///
    /// Fails if the broker does not acknowledge the connection within
    /// `connect_timeout`, or refuses it.
    pub async fn connect(
        config: &MqttConfig,
        car_ids: Vec<CarId>,
        cache: StatusCache,
        stats: Arc<IngressStats>,
    ) -> Result<Self> {
        let mut options =
            MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);
        if let Some(username) = &config.username {
            options.set_credentials(username.clone(), config.password.clone().unwrap_or_default());
        }

        let (client, mut eventloop) = AsyncClient::new(options, config.request_capacity.max(1));

        info!("Connecting to MQTT broker {}:{}", config.host, config.port);
        let timeout = config.connect_timeout();
        time::timeout(timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| anyhow!("MQTT connect timed out after {:?}", timeout))?
            .with_context(|| format!("MQTT connect error ({}:{})", config.host, config.port))?;

        stats.on_connected();
        info!("Connected to TeslaMate MQTT broker");

        let filter = TopicFilter::new(&config.namespace);
        let topics: Arc<[String]> = car_ids.iter().map(|id| filter.subscription(*id)).collect();
        let shutdown = CancellationToken::new();
        let subscriptions = Arc::new(SubscriptionTracker::new());

        let ingress_loop = IngressLoop {
            eventloop,
            client: client.clone(),
            router: MessageRouter::new(filter, cache, stats.clone()),
            topics: topics.clone(),
            subscriptions: subscriptions.clone(),
            inflight: HashMap::new(),
            stats: stats.clone(),
            backoff: Backoff::new(config.reconnect_min(), config.max_reconnect_interval()),
            shutdown: shutdown.clone(),
        };
        // The event loop must be running before subscribing, otherwise a
        // full request channel would never drain.
        let task = tokio::spawn(ingress_loop.run());

        subscriptions.subscribe_all(&client, &topics).await;

        Ok(Self {
            client,
            stats,
            shutdown,
            task,
            disconnect_grace: config.disconnect_grace(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.stats.is_connected()
    }

    /// Closes the connection, waiting at most the configured grace period.
    pub async fn disconnect(self) {
        let Self {
            client,
            stats,
            shutdown,
            mut task,
            disconnect_grace,
        } = self;

        let queued = stats.is_connected()
            && match client.disconnect().await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to queue MQTT disconnect: {}", e);
                    false
                }
            };
        if !queued {
            shutdown.cancel();
        }

        if !finish_within(&mut task, disconnect_grace).await {
            warn!("MQTT event loop did not stop within {:?}, aborted", disconnect_grace);
        }
        stats.on_disconnected();
        info!("Disconnected from MQTT broker");
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

/// Waits up to `grace` for `task` to finish, aborting it otherwise.
///
/// Returns whether the task finished on its own.
async fn finish_within(task: &mut JoinHandle<()>, grace: Duration) -> bool {
    if time::timeout(grace, &mut *task).await.is_ok() {
        return true;
    }
    task.abort();
    false
}

struct IngressLoop {
    eventloop: EventLoop,
    client: AsyncClient,
    router: MessageRouter,
    topics: Arc<[String]>,
    subscriptions: Arc<SubscriptionTracker>,
    /// Topic of each SUBSCRIBE still waiting for its SUBACK, by packet id.
    inflight: HashMap<u16, String>,
    stats: Arc<IngressStats>,
    backoff: Backoff,
    shutdown: CancellationToken,
}

impl IngressLoop {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if !self.router.handle(&publish.topic, &publish.payload) {
                        debug!("Dropped MQTT message on topic {}", publish.topic);
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.backoff.reset();
                    self.stats.on_connected();
                    self.inflight.clear();
                    info!("Reconnected to TeslaMate MQTT broker, restoring subscriptions");
                    // Resubscribe from a separate task: this one has to keep
                    // polling for the requests to go out.
                    let client = self.client.clone();
                    let topics = self.topics.clone();
                    let subscriptions = self.subscriptions.clone();
                    tokio::spawn(async move { subscriptions.subscribe_all(&client, &topics).await });
                }
                Ok(Event::Outgoing(Outgoing::Subscribe(pkid))) => {
                    if let Some(topic) = self.subscriptions.next_sent() {
                        self.inflight.insert(pkid, topic);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let topic = self.inflight.remove(&ack.pkid);
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        error!(
                            "MQTT broker rejected subscription to {} (pkid {})",
                            topic.as_deref().unwrap_or("unknown topic"),
                            ack.pkid
                        );
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    self.stats.on_disconnected();
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    self.stats.on_connection_error();
                    error!("Lost connection to TeslaMate MQTT broker: {}", e);
                    let delay = self.backoff.next_delay();
                    debug!("Reconnecting to MQTT broker in {:?}", delay);
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
