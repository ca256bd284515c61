use crate::session::{ProgressSnapshot, SessionRegistry, Transition};
use crate::transport::ServerEvent;
use std::collections::HashMap;

/// Result of dispatching one inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Event addressed a session id; `transition` says what happened to it
    Session { id: String, transition: Transition },
    /// Engine confirmed it picked up a session we own
    Acknowledged { id: String },
    /// Channel-level error message not tied to any session
    Notice(String),
    /// Engine's own view of our downloads, read-only
    Snapshot(HashMap<String, serde_json::Value>),
    Ignored,
}

/// Apply one inbound event to the registry.
///
/// Pure dispatch: no retries, and events naming an id we never issued
/// never create a session.
pub fn route(registry: &mut SessionRegistry, event: ServerEvent) -> Routed {
    let routed = match event {
        ServerEvent::DownloadStarted { download_id } => {
            if registry.contains(&download_id) {
                Routed::Acknowledged { id: download_id }
            } else {
                Routed::Session {
                    id: download_id,
                    transition: Transition::UnknownSession,
                }
            }
        }
        ServerEvent::Progress(progress) => {
            let id = progress.download_id.clone();
            let transition = registry.apply_progress(&id, ProgressSnapshot::from(progress));
            Routed::Session { id, transition }
        }
        ServerEvent::Completed {
            download_id,
            filename,
            ..
        } => {
            let transition = registry.apply_completion(&download_id, &filename);
            Routed::Session {
                id: download_id,
                transition,
            }
        }
        ServerEvent::Error {
            download_id: Some(download_id),
            message,
        } => {
            let transition = registry.apply_error(&download_id, &message);
            Routed::Session {
                id: download_id,
                transition,
            }
        }
        ServerEvent::Error {
            download_id: None,
            message,
        } => Routed::Notice(message),
        ServerEvent::DownloadsStatus { downloads } => Routed::Snapshot(downloads),
        ServerEvent::Unrecognized => Routed::Ignored,
    };

    match &routed {
        Routed::Session {
            id,
            transition: Transition::UnknownSession,
        } => tracing::debug!(download_id = %id, "event for unknown session ignored"),
        Routed::Session {
            id,
            transition: Transition::Discarded,
        } => tracing::debug!(download_id = %id, "late event for finished session discarded"),
        Routed::Ignored => tracing::debug!("unrecognized event type ignored"),
        _ => {}
    }

    routed
}
