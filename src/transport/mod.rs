pub mod connection;
pub mod protocol;

pub use connection::{ChannelEvent, ChannelSettings, CommandSink, ConnectionManager, ConnectionState};
pub use protocol::{ClientCommand, ProgressEvent, ServerEvent};

use std::time::Duration;

/// Default bound on a single channel handshake
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
