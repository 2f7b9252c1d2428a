use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, Outgoing};
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use fieldgate_core::topics::STATUS_KEY;

use crate::certs::CertificateBundle;
use crate::config::MqttConfig;
use crate::error::MqttError;

const MAX_BACKOFF_SECS: u64 = 60;

/// Receives commands decoded off the command topic.
///
/// Injected into the subscriber so the server can route broker commands
/// straight into its status store, and so tests can observe deliveries
/// without a broker.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: Value);
}

/// Connection lifecycle of the long-lived subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    Receiving,
    ConnectionLost,
}

/// Long-lived subscription to the command topic.
///
/// Created once per process. The event loop runs in its own task until
/// `stop` requests a disconnect; transport errors reconnect with bounded
/// exponential backoff rather than ending the task.
pub struct Subscriber {
    client: Arc<Mutex<AsyncClient>>,
    state_rx: watch::Receiver<ConnectionState>,
    _loop_handle: Arc<JoinHandle<()>>,
}

impl Subscriber {
    pub fn start(
        config: MqttConfig,
        certs: CertificateBundle,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        let (client, eventloop) = build_client(&config, &certs);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let client_shared = Arc::new(Mutex::new(client));
        let client_clone = client_shared.clone();
        let loop_handle = tokio::spawn(async move {
            run_eventloop(eventloop, client_clone, config, certs, handler, state_tx).await;
        });
        Self {
            client: client_shared,
            state_rx,
            _loop_handle: Arc::new(loop_handle),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch endpoint for state transitions; used by tests and health
    /// reporting rather than polled in a loop.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Requests a clean disconnect. The event-loop task observes the
    /// outgoing disconnect and exits on its own.
    pub async fn stop(&self) -> Result<(), MqttError> {
        let client = self.client.lock().await;
        client.disconnect().await.map_err(MqttError::from)
    }
}

fn build_client(config: &MqttConfig, certs: &CertificateBundle) -> (AsyncClient, EventLoop) {
    let client_id = format!("{}-sub", config.client_id);
    AsyncClient::new(config.broker_options(&client_id, certs), 64)
}

async fn run_eventloop(
    mut eventloop: EventLoop,
    client_shared: Arc<Mutex<AsyncClient>>,
    config: MqttConfig,
    certs: CertificateBundle,
    handler: Arc<dyn CommandHandler>,
    state_tx: watch::Sender<ConnectionState>,
) {
    let mut backoff_secs = 1u64;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                if ack.code != ConnectReturnCode::Success {
                    // Transport came up but the broker refused the session;
                    // stay unsubscribed and let the error path drive retry.
                    error!(code = ?ack.code, "broker rejected subscriber session");
                    continue;
                }
                info!(topic = %config.command_topic, "connected; subscribing to command topic");
                let client = client_shared.lock().await;
                match client.subscribe(&config.command_topic, config.qos).await {
                    Ok(()) => {
                        let _ = state_tx.send(ConnectionState::Subscribed);
                    }
                    Err(e) => warn!(error = %e, "subscribe request failed"),
                }
                backoff_secs = 1;
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                let _ = state_tx.send(ConnectionState::Receiving);
                dispatch_command(&publish.topic, &publish.payload, handler.as_ref()).await;
                let _ = state_tx.send(ConnectionState::Subscribed);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("subscriber disconnected cleanly");
                let _ = state_tx.send(ConnectionState::Disconnected);
                return;
            }
            Ok(other) => debug!(?other, "subscriber event"),
            Err(e) => {
                warn!(error = %e, "subscriber connection lost; reconnecting");
                let _ = state_tx.send(ConnectionState::ConnectionLost);
                let wait = backoff_secs.min(MAX_BACKOFF_SECS);
                sleep(Duration::from_secs(wait)).await;
                backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);

                let _ = state_tx.send(ConnectionState::Connecting);
                let (new_client, new_eventloop) = build_client(&config, &certs);
                eventloop = new_eventloop;
                *client_shared.lock().await = new_client;
                // Re-subscription happens on the next ConnAck.
            }
        }
    }
}

/// Decodes one broker message and forwards it when it carries a status.
///
/// Malformed payloads and commands without a `status` key are logged and
/// dropped; nothing on this path may crash the subscriber.
pub async fn dispatch_command(topic: &str, payload: &[u8], handler: &dyn CommandHandler) {
    let text = match std::str::from_utf8(payload) {
        Ok(t) => t,
        Err(e) => {
            error!(topic, error = %e, "command payload is not valid UTF-8");
            return;
        }
    };
    info!(topic, payload = text, "command received");
    let command: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            error!(topic, error = %e, "command payload is not valid JSON");
            return;
        }
    };
    if command.get(STATUS_KEY).is_some() {
        handler.handle(command).await;
    } else {
        warn!(topic, %command, "command carries no status; dropping");
    }
}
