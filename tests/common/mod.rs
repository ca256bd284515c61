//! In-process stand-in for the download engine: one WebSocket route plus the
//! three HTTP endpoints the client calls.

#![allow(dead_code)]

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tubedrop::{ClientConfig, ClientUpdate, DownloadClient};

pub const VALID_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
/// Locator the mock refuses to describe
pub const UNKNOWN_VIDEO_URL: &str = "https://youtu.be/missing0000";
/// Artifact name the mock answers 404 for
pub const ABSENT_ARTIFACT: &str = "absent.mp4";

const WAIT: Duration = Duration::from_secs(5);

enum Outgoing {
    Text(String),
    Hangup,
}

struct EngineState {
    live: Mutex<Option<mpsc::UnboundedSender<Outgoing>>>,
    commands: mpsc::UnboundedSender<Value>,
    connections: AtomicUsize,
    artifact_hits: AtomicUsize,
    /// Upgrades wait while this is false
    accepting: tokio::sync::watch::Sender<bool>,
}

pub struct MockEngine {
    pub addr: SocketAddr,
    state: Arc<EngineState>,
    commands: tokio::sync::Mutex<mpsc::UnboundedReceiver<Value>>,
}

impl MockEngine {
    pub async fn start() -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let state = Arc::new(EngineState {
            live: Mutex::new(None),
            commands: commands_tx,
            connections: AtomicUsize::new(0),
            artifact_hits: AtomicUsize::new(0),
            accepting: tokio::sync::watch::channel(true).0,
        });

        let app = Router::new()
            .route("/ws/:client_id", get(channel))
            .route("/video-info", post(video_info))
            .route("/download/:filename", get(artifact))
            .route("/downloads", get(listing))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock engine");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            commands: tokio::sync::Mutex::new(commands_rx),
        }
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Config pointing at this engine, with a short reconnect delay
    pub fn config(&self, download_dir: &TempDir) -> ClientConfig {
        ClientConfig {
            api_origin: self.origin(),
            reconnect_delay_ms: 50,
            connect_timeout_ms: 2_000,
            download_dir: download_dir.path().to_path_buf(),
        }
    }

    /// Send a raw text frame, waiting for a connection if the upgrade is
    /// still settling on this side
    pub async fn push_raw(&self, text: &str) {
        let sender = tokio::time::timeout(WAIT, async {
            loop {
                if let Some(sender) = self.state.live.lock().unwrap().clone() {
                    return sender;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("no client connected");
        sender.send(Outgoing::Text(text.to_string())).unwrap();
    }

    pub async fn push(&self, record: Value) {
        self.push_raw(&record.to_string()).await;
    }

    /// Close the current connection from the engine side
    pub fn drop_connection(&self) {
        if let Some(sender) = self.state.live.lock().unwrap().take() {
            let _ = sender.send(Outgoing::Hangup);
        }
    }

    /// Stall new handshakes until [`resume_accepts`](Self::resume_accepts)
    pub fn pause_accepts(&self) {
        self.state.accepting.send_replace(false);
    }

    pub fn resume_accepts(&self) {
        self.state.accepting.send_replace(true);
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn artifact_hits(&self) -> usize {
        self.state.artifact_hits.load(Ordering::SeqCst)
    }

    /// Next command the client wrote to the channel
    pub async fn next_command(&self) -> Value {
        let mut commands = self.commands.lock().await;
        tokio::time::timeout(WAIT, commands.recv())
            .await
            .expect("timed out waiting for a client command")
            .expect("command stream ended")
    }
}

async fn channel(
    ws: WebSocketUpgrade,
    Path(_client_id): Path<String>,
    State(state): State<Arc<EngineState>>,
) -> impl IntoResponse {
    let mut accepting = state.accepting.subscribe();
    let _ = accepting.wait_for(|open| *open).await;
    ws.on_upgrade(move |socket| serve_channel(socket, state))
}

async fn serve_channel(socket: WebSocket, state: Arc<EngineState>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    *state.live.lock().unwrap() = Some(tx);
    state.connections.fetch_add(1, Ordering::SeqCst);

    let (mut sink, mut source) = socket.split();
    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(Outgoing::Text(text)) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Outgoing::Hangup) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(value) = serde_json::from_str(&text) {
                        let _ = state.commands.send(value);
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    }
}

async fn video_info(Json(body): Json<Value>) -> impl IntoResponse {
    let url = body["url"].as_str().unwrap_or_default();
    if url.contains("missing") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Could not fetch video info" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "title": "Test Clip",
            "thumbnail": "http://img/thumb.jpg",
            "duration": 212,
            "uploader": "Uploader",
            "view_count": 1000,
            "upload_date": "20240102",
            "formats": [
                { "height": 720, "format_note": "720p", "ext": "mp4", "filesize": 1048576 },
                { "height": "N/A", "format_note": "Audio Only (MP3)", "ext": "mp3", "filesize": null }
            ]
        })),
    )
}

async fn artifact(
    Path(filename): Path<String>,
    State(state): State<Arc<EngineState>>,
) -> impl IntoResponse {
    state.artifact_hits.fetch_add(1, Ordering::SeqCst);
    if filename == ABSENT_ARTIFACT {
        return (StatusCode::NOT_FOUND, Vec::new());
    }
    (StatusCode::OK, artifact_body(&filename))
}

async fn listing() -> Json<Value> {
    Json(json!({
        "files": [
            { "filename": "x.mp4", "size": "1.0 MB", "created": "2024-01-02 10:00:00" }
        ]
    }))
}

/// Bytes the mock serves for an artifact name
pub fn artifact_body(filename: &str) -> Vec<u8> {
    format!("artifact:{}", filename).into_bytes()
}

/// Poll the client until an update matches, failing after a timeout
pub async fn wait_for<F>(client: &mut DownloadClient, mut matches: F) -> ClientUpdate
where
    F: FnMut(&ClientUpdate) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let update = client.next_update().await.expect("client stopped");
            if matches(&update) {
                return update;
            }
        }
    })
    .await
    .expect("timed out waiting for client update")
}

pub async fn wait_connected(client: &mut DownloadClient) {
    wait_for(client, |u| matches!(u, ClientUpdate::Connected)).await;
}

/// Push a channel notice and collect every update up to it. Since the channel
/// is ordered, everything pushed before has been routed by then.
pub async fn drain_until_notice(
    engine: &MockEngine,
    client: &mut DownloadClient,
) -> Vec<ClientUpdate> {
    engine
        .push(json!({ "type": "error", "message": "fence" }))
        .await;
    let mut seen = Vec::new();
    tokio::time::timeout(WAIT, async {
        loop {
            match client.next_update().await.expect("client stopped") {
                ClientUpdate::ServerNotice(m) if m == "fence" => return,
                other => seen.push(other),
            }
        }
    })
    .await
    .expect("timed out waiting for notice");
    seen
}
