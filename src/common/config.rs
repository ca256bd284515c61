use crate::common::errors::{ClientError, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Client settings, layered defaults <- TOML file <- `TUBEDROP_*` env vars
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// HTTP origin of the engine, e.g. `http://localhost:8000`
    pub api_origin: String,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// Where retrieved artifacts are written
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_origin: "http://localhost:8000".to_string(),
            reconnect_delay_ms: 3_000,
            connect_timeout_ms: 15_000,
            download_dir: default_download_dir(),
        }
    }
}

impl ClientConfig {
    /// Load config. An explicit path must exist, the platform config file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(ClientConfig::default()));

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ClientError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(dirs) = directories::ProjectDirs::from("", "", "tubedrop") {
                    figment = figment.merge(Toml::file(dirs.config_dir().join("config.toml")));
                }
            }
        }

        figment
            .merge(Env::prefixed("TUBEDROP_"))
            .extract()
            .map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Parsed HTTP origin, always ending in `/` so relative joins stay under it
    pub fn origin(&self) -> Result<Url> {
        let mut url = Url::parse(&self.api_origin)
            .map_err(|e| ClientError::Config(format!("api_origin: {}", e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "api_origin must be http or https, got {}",
                url.scheme()
            )));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Channel address: origin with its duplex scheme plus `ws/<identity>`
    pub fn channel_url(&self, identity: &ClientIdentity) -> Result<Url> {
        let origin = self.origin()?;
        let mut url = origin
            .join(&format!("ws/{}", identity.as_str()))
            .map_err(|e| ClientError::Config(format!("channel path: {}", e)))?;

        let duplex = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(duplex)
            .map_err(|_| ClientError::Config(format!("cannot switch scheme to {}", duplex)))?;
        Ok(url)
    }
}

fn default_download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Per-process token the engine uses to route channel traffic back to us
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
