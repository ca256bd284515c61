use crate::common::{ClientError, Result};
use crate::session::{QualitySelector, SessionRegistry, Transition, VideoMetadata};
use crate::transport::{ClientCommand, CommandSink, ConnectionState};
use crate::utils::locator::validate_locator;

/// Validate, register, then emit `start_download`.
///
/// The session is in the registry before the command is written so a fast
/// reply can never race an unregistered id. Nothing is registered when
/// validation or the connectivity check fails.
pub fn start_download<S>(
    registry: &mut SessionRegistry,
    sink: &S,
    locator: &str,
    quality: QualitySelector,
    metadata: Option<VideoMetadata>,
) -> Result<String>
where
    S: CommandSink + ?Sized,
{
    validate_locator(locator)?;
    let locator = locator.trim();

    let state = sink.state();
    if state != ConnectionState::Open {
        return Err(ClientError::NotConnected(state));
    }

    let id = registry.create_session(locator, quality, metadata)?;
    let command = ClientCommand::StartDownload {
        url: locator.to_string(),
        quality,
        download_id: id.clone(),
    };

    if let Err(e) = sink.send(&command) {
        // channel went away between the check and the write
        registry.remove(&id);
        return Err(e);
    }

    tracing::info!(download_id = %id, %quality, "download requested");
    Ok(id)
}

/// Message recorded on a session whose start command never left the socket
pub const UNDELIVERED_MESSAGE: &str = "start_download was not delivered before the channel dropped";

/// Fail the session behind a `start_download` whose write failed after
/// [`start_download`] already returned. Other commands carry no session.
pub fn fail_undelivered(
    registry: &mut SessionRegistry,
    command: &ClientCommand,
) -> Option<(String, Transition)> {
    let ClientCommand::StartDownload { download_id, .. } = command else {
        tracing::debug!(?command, "command not delivered");
        return None;
    };

    tracing::warn!(%download_id, "start command lost with the channel");
    let transition = registry.apply_error(download_id, UNDELIVERED_MESSAGE);
    Some((download_id.clone(), transition))
}
