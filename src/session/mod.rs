mod registry;
mod types;

pub use registry::{mint_session_id, RegistryError, SessionRegistry, Transition, MAX_MINT_ATTEMPTS};
pub use types::{
    FormatDescriptor, ProgressSnapshot, QualityError, QualitySelector, Session, SessionOutcome,
    SessionStatus, VideoMetadata,
};
