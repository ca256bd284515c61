//! Client side of a video download service.
//!
//! A [`client::DownloadClient`] keeps one persistent channel to the engine,
//! tracks every requested download as a session and pulls finished
//! artifacts back over HTTP.

pub mod client;
pub mod common;
pub mod session;
pub mod transport;
pub mod ui;
pub mod utils;

pub use client::{ClientUpdate, DownloadClient};
pub use common::{ClientConfig, ClientError};
pub use session::{QualitySelector, Session, SessionRegistry, SessionStatus};
pub use transport::ConnectionState;
