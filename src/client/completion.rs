use crate::session::Transition;
use crate::utils::security::validate_filename;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Boundary to the engine's file-retrieval endpoint
#[async_trait]
pub trait ArtifactRetriever: Send + Sync {
    /// Fetch a finished artifact, returning where it was stored
    async fn retrieve(&self, filename: &str) -> Result<PathBuf>;
}

/// Streams `GET /download/{filename}` into a local directory
pub struct HttpRetriever {
    http: reqwest::Client,
    origin: Url,
    destination: PathBuf,
}

impl HttpRetriever {
    pub fn new(http: reqwest::Client, origin: Url, destination: PathBuf) -> Self {
        Self {
            http,
            origin,
            destination,
        }
    }

    fn artifact_url(&self, filename: &str) -> Result<Url> {
        let mut url = self.origin.join("download/")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("origin {} cannot carry a path", self.origin))?
            .pop_if_empty()
            .push(filename);
        Ok(url)
    }

    async fn stream_to(&self, url: Url, part_path: &Path) -> Result<()> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("engine answered {} for {}", status, url);
        }

        let mut file = tokio::fs::File::create(part_path)
            .await
            .with_context(|| format!("Failed to create {}", part_path.display()))?;

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("Artifact stream interrupted")?;
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", part_path.display()))?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactRetriever for HttpRetriever {
    async fn retrieve(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)
            .with_context(|| format!("Refusing artifact name {:?}", filename))?;

        tokio::fs::create_dir_all(&self.destination)
            .await
            .with_context(|| format!("Failed to create {}", self.destination.display()))?;

        let url = self.artifact_url(filename)?;
        let final_path = self.destination.join(filename);
        let part_path = self.destination.join(format!("{}.part", filename));

        if let Err(e) = self.stream_to(url, &part_path).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e);
        }

        tokio::fs::rename(&part_path, &final_path)
            .await
            .with_context(|| format!("Failed to move artifact into {}", final_path.display()))?;

        tracing::info!(path = %final_path.display(), "artifact saved");
        Ok(final_path)
    }
}

/// Result of one retrieval, reported back to the owning client
#[derive(Debug)]
pub struct RetrievalOutcome {
    pub session_id: String,
    pub result: Result<PathBuf>,
}

/// Fires retrieval on the edge into `completed`.
///
/// The registry only reports `Transition::Completed` once per session, so
/// observing transitions (not session state) gives exactly-once retrieval.
pub struct CompletionEffector {
    retriever: Arc<dyn ArtifactRetriever>,
    outcomes: mpsc::UnboundedSender<RetrievalOutcome>,
}

impl CompletionEffector {
    pub fn new(
        retriever: Arc<dyn ArtifactRetriever>,
    ) -> (Self, mpsc::UnboundedReceiver<RetrievalOutcome>) {
        let (outcomes, receiver) = mpsc::unbounded_channel();
        (
            Self {
                retriever,
                outcomes,
            },
            receiver,
        )
    }

    /// Returns true when a retrieval was started
    pub fn observe(&self, session_id: &str, transition: &Transition) -> bool {
        let Transition::Completed { filename } = transition else {
            return false;
        };

        let retriever = Arc::clone(&self.retriever);
        let outcomes = self.outcomes.clone();
        let session_id = session_id.to_string();
        let filename = filename.clone();

        tracing::debug!(download_id = %session_id, %filename, "retrieving artifact");
        tokio::spawn(async move {
            let result = retriever.retrieve(&filename).await;
            if let Err(e) = &result {
                tracing::warn!(download_id = %session_id, error = %e, "artifact retrieval failed");
            }
            let _ = outcomes.send(RetrievalOutcome { session_id, result });
        });
        true
    }
}
