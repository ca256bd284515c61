use crate::transport::protocol::ProgressEvent;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output profile requested for a download. Closed set, the engine
/// understands nothing else.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualitySelector {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "audio_only")]
    AudioOnly,
}

impl QualitySelector {
    pub const ALL: [QualitySelector; 5] = [
        QualitySelector::Best,
        QualitySelector::P1080,
        QualitySelector::P720,
        QualitySelector::P480,
        QualitySelector::AudioOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualitySelector::Best => "best",
            QualitySelector::P1080 => "1080p",
            QualitySelector::P720 => "720p",
            QualitySelector::P480 => "480p",
            QualitySelector::AudioOnly => "audio_only",
        }
    }
}

impl fmt::Display for QualitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported quality '{0}' (expected one of: best, 1080p, 720p, 480p, audio_only)")]
pub struct QualityError(pub String);

impl FromStr for QualitySelector {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualitySelector::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| QualityError(s.to_string()))
    }
}

/// Lifecycle of one download. `Completed` and `Error` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Downloading,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Starting => "starting",
            SessionStatus::Downloading => "downloading",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Latest progress report, replaced wholesale on every event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Always within 0.0..=100.0
    pub percentage: f64,
    pub downloaded: String,
    pub total: String,
    pub speed: String,
    pub eta: String,
    pub filename: String,
}

impl From<ProgressEvent> for ProgressSnapshot {
    fn from(event: ProgressEvent) -> Self {
        Self {
            percentage: clamp_percentage(event.percentage),
            downloaded: event.downloaded,
            total: event.total,
            speed: event.speed,
            eta: event.eta,
            filename: event.filename,
        }
    }
}

fn clamp_percentage(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 100.0)
    }
}

/// One entry of the preview's available-format list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// `None` for the audio-only entry (the engine sends "N/A")
    #[serde(default, deserialize_with = "lenient_height")]
    pub height: Option<u32>,
    #[serde(default)]
    pub format_note: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
}

/// Preview metadata from `POST /video-info`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    /// Seconds
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub uploader: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub view_count: Option<u64>,
    /// `YYYYMMDD` as reported by the extractor
    #[serde(default)]
    pub upload_date: String,
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
}

// Extractor numbers arrive as ints, floats, null or placeholder strings
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }))
}

fn lenient_height<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_u64(deserializer)?.and_then(|h| u32::try_from(h).ok()))
}

/// Terminal result; a session carries exactly one once it is terminal
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Saved { filename: String },
    Failed { message: String },
}

/// Client-side record of one requested download.
///
/// Fields are read-only from outside the crate; only the
/// [`SessionRegistry`](super::SessionRegistry) mutates them.
#[derive(Clone, Debug)]
pub struct Session {
    id: String,
    locator: String,
    quality: QualitySelector,
    status: SessionStatus,
    metadata: Option<VideoMetadata>,
    progress: Option<ProgressSnapshot>,
    outcome: Option<SessionOutcome>,
}

impl Session {
    pub(super) fn new(
        id: String,
        locator: String,
        quality: QualitySelector,
        metadata: Option<VideoMetadata>,
    ) -> Self {
        Self {
            id,
            locator,
            quality,
            status: SessionStatus::Starting,
            metadata,
            progress: None,
            outcome: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn quality(&self) -> QualitySelector {
        self.quality
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    pub fn progress(&self) -> Option<&ProgressSnapshot> {
        self.progress.as_ref()
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn result_filename(&self) -> Option<&str> {
        match &self.outcome {
            Some(SessionOutcome::Saved { filename }) => Some(filename),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Some(SessionOutcome::Failed { message }) => Some(message),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(super) fn record_progress(&mut self, snapshot: ProgressSnapshot) {
        self.status = SessionStatus::Downloading;
        self.progress = Some(snapshot);
    }

    pub(super) fn finish(&mut self, outcome: SessionOutcome) {
        self.status = match outcome {
            SessionOutcome::Saved { .. } => SessionStatus::Completed,
            SessionOutcome::Failed { .. } => SessionStatus::Error,
        };
        self.outcome = Some(outcome);
    }
}
