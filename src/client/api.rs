use crate::common::{ClientConfig, ClientError, Result};
use crate::session::VideoMetadata;
use reqwest::{Response, Url};
use serde::{Deserialize, Serialize};

/// Artifact sitting in the engine's download directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub filename: String,
    /// Preformatted, e.g. "12.4 MB"
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub created: String,
}

#[derive(Deserialize)]
struct FileListing {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Serialize)]
struct VideoInfoRequest<'a> {
    url: &'a str,
}

/// Request/response side of the engine: metadata preview and listings
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    origin: Url,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, origin: Url) -> Self {
        Self { http, origin }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(build_http_client(config)?, config.origin()?))
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.origin
            .join(path)
            .map_err(|e| ClientError::Config(format!("endpoint {}: {}", path, e)))
    }

    /// `POST /video-info`. Callers validate the locator first.
    pub async fn video_info(&self, locator: &str) -> Result<VideoMetadata> {
        let response = self
            .http
            .post(self.endpoint("video-info")?)
            .json(&VideoInfoRequest { url: locator })
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    /// `GET /downloads`
    pub async fn list_files(&self) -> Result<Vec<RemoteFile>> {
        let response = self.http.get(self.endpoint("downloads")?).send().await?;
        let listing: FileListing = ensure_success(response).await?.json().await?;
        Ok(listing.files)
    }
}

pub fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .build()?)
}

// Non-2xx answers carry `{"detail": ...}`; fall back to the raw body
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body,
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        detail,
    })
}
