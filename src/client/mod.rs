//! Client facade tying the channel, the registry and the HTTP side together.
//!
//! [`DownloadClient`] owns every piece of mutable state and is driven by a
//! single task calling [`DownloadClient::next_update`]; nothing here needs
//! a lock.

pub mod api;
pub mod completion;
pub mod initiator;
pub mod router;

pub use api::{ApiClient, RemoteFile};
pub use completion::{ArtifactRetriever, CompletionEffector, HttpRetriever, RetrievalOutcome};
pub use router::{route, Routed};

use crate::common::{ClientConfig, ClientIdentity, Result};
use crate::session::{
    QualitySelector, Session, SessionRegistry, SessionStatus, Transition, VideoMetadata,
};
use crate::transport::{
    ChannelEvent, ChannelSettings, ClientCommand, CommandSink, ConnectionManager, ConnectionState,
};
use crate::utils::locator::validate_locator;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Something the caller may want to render or react to
#[derive(Debug, Clone, PartialEq)]
pub enum ClientUpdate {
    Connected,
    Disconnected,
    ConnectivityError(String),
    /// Engine confirmed a session we started
    Acknowledged { id: String },
    SessionChanged { id: String, status: SessionStatus },
    /// Channel-level error text from the engine
    ServerNotice(String),
    /// Reply to [`DownloadClient::request_server_snapshot`]
    ServerSnapshot(HashMap<String, serde_json::Value>),
    ArtifactSaved { id: String, path: PathBuf },
    ArtifactFailed { id: String, error: String },
}

pub struct DownloadClient {
    identity: ClientIdentity,
    registry: SessionRegistry,
    connection: ConnectionManager,
    channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    api: ApiClient,
    effector: Option<CompletionEffector>,
    retrievals: Option<mpsc::UnboundedReceiver<RetrievalOutcome>>,
}

impl DownloadClient {
    /// Open the channel and fetch finished artifacts into `config.download_dir`
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let api = ApiClient::from_config(config)?;
        let retriever = HttpRetriever::new(
            api.http().clone(),
            api.origin().clone(),
            config.download_dir.clone(),
        );
        Self::connect_with(config, api, Some(Arc::new(retriever)))
    }

    /// Open the channel with a custom retriever, or none to skip retrieval
    pub fn connect_with_retriever(
        config: &ClientConfig,
        retriever: Option<Arc<dyn ArtifactRetriever>>,
    ) -> Result<Self> {
        let api = ApiClient::from_config(config)?;
        Self::connect_with(config, api, retriever)
    }

    fn connect_with(
        config: &ClientConfig,
        api: ApiClient,
        retriever: Option<Arc<dyn ArtifactRetriever>>,
    ) -> Result<Self> {
        let identity = ClientIdentity::generate();
        let url = config.channel_url(&identity)?;
        let (connection, channel_events) =
            ConnectionManager::connect(url, ChannelSettings::from(config));

        let (effector, retrievals) = match retriever {
            Some(retriever) => {
                let (effector, outcomes) = CompletionEffector::new(retriever);
                (Some(effector), Some(outcomes))
            }
            None => (None, None),
        };

        tracing::debug!(client_id = %identity, "client created");
        Ok(Self {
            identity,
            registry: SessionRegistry::new(),
            connection,
            channel_events,
            api,
            effector,
            retrievals,
        })
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.registry.get(id)
    }

    /// Sessions in the order they were started
    pub fn sessions(&self) -> impl Iterator<Item = &Session> + '_ {
        self.registry.list()
    }

    /// Metadata preview; invalid locators fail before any request
    pub async fn preview(&self, locator: &str) -> Result<VideoMetadata> {
        validate_locator(locator)?;
        self.api.video_info(locator.trim()).await
    }

    pub async fn remote_files(&self) -> Result<Vec<RemoteFile>> {
        self.api.list_files().await
    }

    pub fn start_download(&mut self, locator: &str, quality: QualitySelector) -> Result<String> {
        initiator::start_download(&mut self.registry, &self.connection, locator, quality, None)
    }

    /// Like [`start_download`](Self::start_download), keeping a preview on the session
    pub fn start_download_with_preview(
        &mut self,
        locator: &str,
        quality: QualitySelector,
        metadata: VideoMetadata,
    ) -> Result<String> {
        initiator::start_download(
            &mut self.registry,
            &self.connection,
            locator,
            quality,
            Some(metadata),
        )
    }

    /// Ask the engine for its view of our downloads; answered by a `ServerSnapshot`
    pub fn request_server_snapshot(&self) -> Result<()> {
        self.connection.send(&ClientCommand::GetDownloads)
    }

    /// Wait for the next update worth surfacing.
    ///
    /// Routing happens here, so sessions only advance while someone is
    /// polling. Returns `None` once the channel task has stopped.
    pub async fn next_update(&mut self) -> Option<ClientUpdate> {
        loop {
            tokio::select! {
                event = self.channel_events.recv() => {
                    if let Some(update) = self.handle_channel_event(event?) {
                        return Some(update);
                    }
                }
                Some(outcome) = recv_outcome(&mut self.retrievals) => {
                    return Some(match outcome.result {
                        Ok(path) => ClientUpdate::ArtifactSaved { id: outcome.session_id, path },
                        Err(e) => ClientUpdate::ArtifactFailed {
                            id: outcome.session_id,
                            error: format!("{:#}", e),
                        },
                    });
                }
            }
        }
    }

    fn handle_channel_event(&mut self, event: ChannelEvent) -> Option<ClientUpdate> {
        match event {
            ChannelEvent::Opened => Some(ClientUpdate::Connected),
            ChannelEvent::Closed => Some(ClientUpdate::Disconnected),
            ChannelEvent::Error(message) => Some(ClientUpdate::ConnectivityError(message)),
            ChannelEvent::Undelivered(command) => {
                let (id, transition) = initiator::fail_undelivered(&mut self.registry, &command)?;
                self.session_changed(id, transition)
            }
            ChannelEvent::Message(event) => match route(&mut self.registry, event) {
                Routed::Session { id, transition } => self.session_changed(id, transition),
                Routed::Acknowledged { id } => Some(ClientUpdate::Acknowledged { id }),
                Routed::Notice(message) => Some(ClientUpdate::ServerNotice(message)),
                Routed::Snapshot(downloads) => Some(ClientUpdate::ServerSnapshot(downloads)),
                Routed::Ignored => None,
            },
        }
    }

    fn session_changed(&self, id: String, transition: Transition) -> Option<ClientUpdate> {
        if !transition.changed_state() {
            return None;
        }
        if let Some(effector) = &self.effector {
            effector.observe(&id, &transition);
        }
        let status = self.registry.get(&id)?.status();
        Some(ClientUpdate::SessionChanged { id, status })
    }

    /// Tear down the channel; no reconnect fires afterwards
    pub async fn shutdown(self) {
        tracing::debug!(client_id = %self.identity, "shutting down client");
        self.connection.shutdown().await;
    }
}

async fn recv_outcome(
    retrievals: &mut Option<mpsc::UnboundedReceiver<RetrievalOutcome>>,
) -> Option<RetrievalOutcome> {
    match retrievals {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
