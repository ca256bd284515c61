//! JSON records exchanged over the persistent channel.
//!
//! Every record carries a `type` tag. Inbound records decode into the closed
//! [`ServerEvent`] set; tags we do not know land in `Unrecognized`.

use crate::session::QualitySelector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Client -> engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    StartDownload {
        url: String,
        quality: QualitySelector,
        download_id: String,
    },
    /// Ask for the engine's view of this client's downloads
    GetDownloads,
}

/// Body of a `progress` record. Sizes, speed and eta come preformatted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub download_id: String,
    pub percentage: f64,
    #[serde(default)]
    pub downloaded: String,
    #[serde(default)]
    pub total: String,
    #[serde(default)]
    pub speed: String,
    #[serde(default)]
    pub eta: String,
    #[serde(default)]
    pub filename: String,
}

/// Engine -> client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    DownloadStarted {
        download_id: String,
    },
    Progress(ProgressEvent),
    Completed {
        download_id: String,
        filename: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_size: Option<String>,
    },
    /// Without a `download_id` this is a channel-level fault, not a session failure
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        download_id: Option<String>,
        message: String,
    },
    DownloadsStatus {
        #[serde(default)]
        downloads: HashMap<String, serde_json::Value>,
    },
    #[serde(other)]
    Unrecognized,
}

impl ServerEvent {
    /// Decode one text frame. Malformed frames yield `None` and are logged, not raised.
    pub fn decode(payload: &str) -> Option<Self> {
        match serde_json::from_str(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(error = %e, len = payload.len(), "dropping malformed channel payload");
                None
            }
        }
    }

    pub fn download_id(&self) -> Option<&str> {
        match self {
            ServerEvent::DownloadStarted { download_id }
            | ServerEvent::Completed { download_id, .. } => Some(download_id),
            ServerEvent::Progress(progress) => Some(&progress.download_id),
            ServerEvent::Error { download_id, .. } => download_id.as_deref(),
            ServerEvent::DownloadsStatus { .. } | ServerEvent::Unrecognized => None,
        }
    }
}
