use super::protocol::{ClientCommand, ServerEvent};
use super::CONNECT_TIMEOUT;
use crate::common::{ClientConfig, ClientError, Result};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type Channel = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of the persistent channel. `Closed` always leads back to
/// `Connecting` after the reconnect delay until the manager is torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Notifications from the channel task to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Opened,
    Message(ServerEvent),
    /// Transport fault; a `Closed` follows and drives the reconnect
    Error(String),
    /// Command accepted by `send` whose socket write then failed
    Undelivered(ClientCommand),
    Closed,
}

#[derive(Clone, Copy, Debug)]
pub struct ChannelSettings {
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl From<&ClientConfig> for ChannelSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            reconnect_delay: config.reconnect_delay(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// Anything a start command can be written to
pub trait CommandSink {
    fn state(&self) -> ConnectionState;

    /// Only valid while `state() == Open`. `Ok` means queued for the socket;
    /// a write that fails later comes back as `ChannelEvent::Undelivered`.
    fn send(&self, command: &ClientCommand) -> Result<()>;
}

/// Owns the single persistent channel and its reconnect task.
///
/// The task is cancelled when the manager is shut down or dropped, so no
/// reconnect can fire after the owner is gone.
pub struct ConnectionManager {
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::UnboundedSender<ClientCommand>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Spawn the channel task. Must be called from within a tokio runtime.
    pub fn connect(
        url: Url,
        settings: ChannelSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_channel(
            url,
            settings,
            state_tx,
            events_tx,
            outbound_rx,
            cancel.clone(),
        ));

        let manager = Self {
            state: state_rx,
            outbound: outbound_tx,
            cancel,
            task: Some(task),
        };
        (manager, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Cancel the channel and any pending reconnect, then wait for the task
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "channel task ended abnormally");
            }
        }
    }
}

impl CommandSink for ConnectionManager {
    fn state(&self) -> ConnectionState {
        ConnectionManager::state(self)
    }

    fn send(&self, command: &ClientCommand) -> Result<()> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(ClientError::NotConnected(state));
        }

        self.outbound
            .send(command.clone())
            .map_err(|_| ClientError::NotConnected(ConnectionState::Closed))
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum PumpExit {
    Dropped,
    Cancelled,
}

async fn run_channel(
    url: Url,
    settings: ChannelSettings,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut outbound: mpsc::UnboundedReceiver<ClientCommand>,
    cancel: CancellationToken,
) {
    loop {
        let _ = state.send(ConnectionState::Connecting);
        tracing::debug!(%url, "opening channel");

        let attempt = tokio::select! {
            _ = cancel.cancelled() => break,
            attempt = open_channel(&url, settings.connect_timeout) => attempt,
        };

        match attempt {
            Ok(channel) => {
                let _ = state.send(ConnectionState::Open);
                let _ = events.send(ChannelEvent::Opened);
                tracing::info!(%url, "channel open");

                if let PumpExit::Cancelled = pump(channel, &events, &mut outbound, &cancel).await {
                    break;
                }
            }
            Err(message) => {
                tracing::warn!(error = %message, "channel connect failed");
                let _ = events.send(ChannelEvent::Error(message));
            }
        }

        let _ = state.send(ConnectionState::Closed);
        let _ = events.send(ChannelEvent::Closed);
        tracing::info!(delay = ?settings.reconnect_delay, "channel closed, reconnect scheduled");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(settings.reconnect_delay) => {}
        }
    }

    let _ = state.send(ConnectionState::Closed);
    tracing::debug!("channel task stopped");
}

/// One handshake attempt; failures and timeouts come back as the text of
/// the `ChannelEvent::Error` to report
async fn open_channel(url: &Url, timeout: Duration) -> std::result::Result<Channel, String> {
    match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
        Ok(Ok((channel, _response))) => Ok(channel),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("connect timed out after {:?}", timeout)),
    }
}

/// Shuttle frames until the channel drops or the owner cancels
async fn pump(
    channel: Channel,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    outbound: &mut mpsc::UnboundedReceiver<ClientCommand>,
    cancel: &CancellationToken,
) -> PumpExit {
    let (mut sink, mut source) = channel.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return PumpExit::Cancelled;
            }
            Some(command) = outbound.recv() => {
                let text = match serde_json::to_string(&command) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode channel command");
                        let _ = events.send(ChannelEvent::Undelivered(command));
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, "channel write failed");
                    let _ = events.send(ChannelEvent::Undelivered(command));
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                    return PumpExit::Dropped;
                }
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => forward(events, &text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => forward(events, &text),
                    Err(_) => tracing::debug!("dropping non-utf8 binary frame"),
                },
                Some(Ok(Message::Close(_))) | None => return PumpExit::Dropped,
                // ping/pong are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "channel read failed");
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                    return PumpExit::Dropped;
                }
            }
        }
    }
}

fn forward(events: &mpsc::UnboundedSender<ChannelEvent>, text: &str) {
    if let Some(event) = ServerEvent::decode(text) {
        let _ = events.send(ChannelEvent::Message(event));
    }
}
