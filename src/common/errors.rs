use crate::session::{QualityError, RegistryError};
use crate::transport::ConnectionState;
use crate::utils::locator::LocatorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Everything a client operation can fail with
#[derive(Error, Debug)]
pub enum ClientError {
    /// Bad or empty locator, rejected before any I/O
    #[error("Invalid locator: {0}")]
    InvalidLocator(#[from] LocatorError),

    #[error(transparent)]
    InvalidQuality(#[from] QualityError),

    /// Channel is not open; the reconnect loop fixes this, not a retry
    #[error("Not connected: channel is {0}")]
    NotConnected(ConnectionState),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Engine answered with a non-success status
    #[error("Server rejected request ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// True when the user has to change their input before trying again
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidLocator(_) | ClientError::InvalidQuality(_)
        )
    }
}
