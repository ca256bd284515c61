pub mod config;
pub mod errors;

pub use config::{ClientConfig, ClientIdentity};
pub use errors::{ClientError, Result};
