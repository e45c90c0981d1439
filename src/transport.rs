//! Hardware MQTT transport with supervised reconnect-and-resubscribe.

use std::time::Duration;

use rand::Rng;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::{sync::mpsc, time::sleep};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{config::MqttEndpoint, state::SharedState};

/// Broker keep-alive interval.
const KEEP_ALIVE: Duration = Duration::from_secs(30);
/// Request queue capacity of the underlying client.
const CLIENT_CAPACITY: usize = 64;
/// Buffer between the transport loop and the gateway worker.
const RAW_CHANNEL_CAPACITY: usize = 256;
/// First reconnect backoff delay.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Upper bound on the reconnect backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// One raw message received from the hardware bus, before any decoding.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Untouched payload bytes.
    pub payload: Vec<u8>,
}

/// Connection to the hardware broker plus its desired subscription set.
///
/// Subscriptions registered here survive reconnects: every time the broker
/// acknowledges a new connection the whole set is re-issued, so handlers
/// registered before a disconnect keep receiving messages afterwards without
/// caller action. Messages in flight across the reconnect boundary may be
/// lost; consumers tolerate gaps.
pub struct HardwareTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    subscriptions: Vec<String>,
}

impl HardwareTransport {
    /// Set up a broker connection with the given subscription patterns.
    ///
    /// The connection is established lazily by the supervisor loop; this only
    /// prepares the client.
    pub fn connect(endpoint: &MqttEndpoint, subscriptions: Vec<String>) -> Self {
        let client_id = format!("warden-back-{}", Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, &endpoint.host, endpoint.port);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, eventloop) = AsyncClient::new(options, CLIENT_CAPACITY);
        Self {
            client,
            eventloop,
            subscriptions,
        }
    }

    /// Spawn the supervised event loop and hand back the raw-message stream.
    ///
    /// The loop flips the shared connection signal on connect/disconnect and
    /// retries failed connections with bounded exponential backoff. It ends
    /// when the consuming side of the channel is dropped, which is how
    /// shutdown drains the transport.
    pub fn spawn(self, state: SharedState) -> mpsc::Receiver<RawMessage> {
        let (raw_tx, raw_rx) = mpsc::channel(RAW_CHANNEL_CAPACITY);
        tokio::spawn(run_event_loop(
            self.client,
            self.eventloop,
            self.subscriptions,
            raw_tx,
            state,
        ));
        raw_rx
    }
}

/// Supervised poll loop owning the broker connection.
async fn run_event_loop(
    client: AsyncClient,
    mut eventloop: EventLoop,
    subscriptions: Vec<String>,
    raw_tx: mpsc::Sender<RawMessage>,
    state: SharedState,
) {
    let mut delay = INITIAL_BACKOFF;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("connected to MQTT broker");
                state.set_connected(true);
                delay = INITIAL_BACKOFF;

                // Re-issue every registered subscription; the broker session
                // is clean, so nothing survives a reconnect on its own.
                for pattern in &subscriptions {
                    if let Err(err) = client.subscribe(pattern, QoS::AtLeastOnce).await {
                        warn!(%pattern, error = %err, "failed to issue subscription");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = RawMessage {
                    payload: publish.payload.to_vec(),
                    topic: publish.topic,
                };
                if raw_tx.send(message).await.is_err() {
                    info!("raw message consumer dropped; stopping transport loop");
                    break;
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "MQTT connection error; backing off before reconnecting");
                state.set_connected(false);
                sleep(with_jitter(delay)).await;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
        }
    }
}

/// Spread reconnect attempts out so a broker restart does not get a
/// synchronized thundering herd from every service instance.
fn with_jitter(delay: Duration) -> Duration {
    let spread = delay.as_millis() as u64 / 4;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..spread))
}
