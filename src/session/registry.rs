use super::types::{ProgressSnapshot, QualitySelector, Session, SessionOutcome, VideoMetadata};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use thiserror::Error;

const SESSION_ID_LEN: usize = 12;

/// Remint budget before `create_session` gives up on a colliding id source
pub const MAX_MINT_ATTEMPTS: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session id already in use: {0}")]
    DuplicateId(String),

    #[error("Could not mint a unique session id after {0} attempts")]
    MintExhausted(usize),
}

/// What applying an event did to the registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// No session with that id; nothing was created
    UnknownSession,
    /// Session is already terminal, event dropped
    Discarded,
    /// Progress snapshot replaced, status is `downloading`
    Progressed,
    /// Edge into `completed`
    Completed { filename: String },
    /// Edge into `error`
    Failed { message: String },
}

impl Transition {
    pub fn changed_state(&self) -> bool {
        !matches!(self, Transition::UnknownSession | Transition::Discarded)
    }
}

/// Random alphanumeric session token
pub fn mint_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// In-memory id -> session map. The only place session state changes.
///
/// Owned by a single control flow, so no interior locking: callers hold
/// `&mut` for every mutation.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    // creation order, untouched by updates
    order: Vec<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new `starting` session under a freshly minted id
    pub fn create_session(
        &mut self,
        locator: &str,
        quality: QualitySelector,
        metadata: Option<VideoMetadata>,
    ) -> Result<String, RegistryError> {
        self.create_session_with(locator, quality, metadata, mint_session_id)
    }

    /// Same as [`create_session`](Self::create_session) with a caller-supplied id source.
    /// A colliding id is rejected and reminted, never overwritten.
    pub fn create_session_with<F>(
        &mut self,
        locator: &str,
        quality: QualitySelector,
        metadata: Option<VideoMetadata>,
        mut mint: F,
    ) -> Result<String, RegistryError>
    where
        F: FnMut() -> String,
    {
        for attempt in 1..=MAX_MINT_ATTEMPTS {
            let id = mint();
            match self.insert(Session::new(
                id.clone(),
                locator.to_string(),
                quality,
                metadata.clone(),
            )) {
                Ok(()) => {
                    tracing::debug!(session_id = %id, %quality, "session registered");
                    return Ok(id);
                }
                Err(RegistryError::DuplicateId(_)) => {
                    tracing::warn!(attempt, "session id collision, reminting");
                }
                Err(e) => return Err(e),
            }
        }

        Err(RegistryError::MintExhausted(MAX_MINT_ATTEMPTS))
    }

    fn insert(&mut self, session: Session) -> Result<(), RegistryError> {
        if self.sessions.contains_key(session.id()) {
            return Err(RegistryError::DuplicateId(session.id().to_string()));
        }
        self.order.push(session.id().to_string());
        self.sessions.insert(session.id().to_string(), session);
        Ok(())
    }

    /// Drop a session that never made it onto the wire
    pub(crate) fn remove(&mut self, id: &str) -> Option<Session> {
        let removed = self.sessions.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    pub fn apply_progress(&mut self, id: &str, snapshot: ProgressSnapshot) -> Transition {
        let Some(session) = self.sessions.get_mut(id) else {
            return Transition::UnknownSession;
        };
        if session.is_terminal() {
            return Transition::Discarded;
        }
        session.record_progress(snapshot);
        Transition::Progressed
    }

    pub fn apply_completion(&mut self, id: &str, filename: &str) -> Transition {
        let Some(session) = self.sessions.get_mut(id) else {
            return Transition::UnknownSession;
        };
        if session.is_terminal() {
            return Transition::Discarded;
        }
        session.finish(SessionOutcome::Saved {
            filename: filename.to_string(),
        });
        Transition::Completed {
            filename: filename.to_string(),
        }
    }

    pub fn apply_error(&mut self, id: &str, message: &str) -> Transition {
        let Some(session) = self.sessions.get_mut(id) else {
            return Transition::UnknownSession;
        };
        if session.is_terminal() {
            return Transition::Discarded;
        }
        session.finish(SessionOutcome::Failed {
            message: message.to_string(),
        });
        Transition::Failed {
            message: message.to_string(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Sessions in creation order
    pub fn list(&self) -> impl Iterator<Item = &Session> + '_ {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    const LOCATOR: &str = "https://youtu.be/abc123";

    fn snapshot(percentage: f64) -> ProgressSnapshot {
        ProgressSnapshot {
            percentage,
            downloaded: "1.0 MB".to_string(),
            total: "10.0 MB".to_string(),
            speed: "4.0 Mbps".to_string(),
            eta: "0m 9s".to_string(),
            filename: "clip.mp4.part".to_string(),
        }
    }

    #[test]
    fn minted_ids_are_alphanumeric() {
        let id = mint_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn new_sessions_start_in_starting() {
        let mut registry = SessionRegistry::new();
        let id = registry
            .create_session(LOCATOR, QualitySelector::P720, None)
            .unwrap();

        let session = registry.get(&id).unwrap();
        assert_eq!(session.status(), SessionStatus::Starting);
        assert_eq!(session.quality(), QualitySelector::P720);
        assert_eq!(session.locator(), LOCATOR);
        assert!(session.progress().is_none());
        assert!(session.outcome().is_none());
    }

    #[test]
    fn collision_forces_a_remint() {
        let mut registry = SessionRegistry::new();
        let mut ids = vec!["b".to_string(), "a".to_string(), "a".to_string()];
        let first = registry
            .create_session_with(LOCATOR, QualitySelector::Best, None, || ids.pop().unwrap())
            .unwrap();
        let second = registry
            .create_session_with(LOCATOR, QualitySelector::Best, None, || ids.pop().unwrap())
            .unwrap();

        assert_eq!(first, "a");
        assert_eq!(second, "b");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn exhausted_id_source_fails_without_overwriting() {
        let mut registry = SessionRegistry::new();
        registry
            .create_session_with(LOCATOR, QualitySelector::Best, None, || "same".to_string())
            .unwrap();

        let result = registry.create_session_with(
            "https://youtu.be/other",
            QualitySelector::P480,
            None,
            || "same".to_string(),
        );

        assert_eq!(result, Err(RegistryError::MintExhausted(MAX_MINT_ATTEMPTS)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("same").unwrap().locator(), LOCATOR);
    }

    #[test]
    fn progress_moves_to_downloading_and_replaces_snapshot() {
        let mut registry = SessionRegistry::new();
        let id = registry
            .create_session(LOCATOR, QualitySelector::Best, None)
            .unwrap();

        assert_eq!(registry.apply_progress(&id, snapshot(10.0)), Transition::Progressed);
        let mut second = snapshot(55.0);
        second.speed = String::new();
        registry.apply_progress(&id, second.clone());

        let session = registry.get(&id).unwrap();
        assert_eq!(session.status(), SessionStatus::Downloading);
        // wholesale replacement, the emptied field is not merged back
        assert_eq!(session.progress(), Some(&second));
    }

    #[test]
    fn completion_directly_from_starting() {
        let mut registry = SessionRegistry::new();
        let id = registry
            .create_session(LOCATOR, QualitySelector::Best, None)
            .unwrap();

        let transition = registry.apply_completion(&id, "x.mp4");
        assert_eq!(
            transition,
            Transition::Completed {
                filename: "x.mp4".to_string()
            }
        );
        let session = registry.get(&id).unwrap();
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(session.result_filename(), Some("x.mp4"));
        assert_eq!(session.error_message(), None);
    }

    #[test]
    fn terminal_sessions_ignore_late_events() {
        let mut registry = SessionRegistry::new();
        let id = registry
            .create_session(LOCATOR, QualitySelector::Best, None)
            .unwrap();
        registry.apply_progress(&id, snapshot(80.0));
        registry.apply_error(&id, "YouTube-DL Error: boom");

        assert_eq!(registry.apply_progress(&id, snapshot(90.0)), Transition::Discarded);
        assert_eq!(registry.apply_completion(&id, "x.mp4"), Transition::Discarded);
        assert_eq!(registry.apply_error(&id, "again"), Transition::Discarded);

        let session = registry.get(&id).unwrap();
        assert_eq!(session.status(), SessionStatus::Error);
        assert_eq!(session.error_message(), Some("YouTube-DL Error: boom"));
        assert_eq!(session.result_filename(), None);
        assert_eq!(session.progress().unwrap().percentage, 80.0);
    }

    #[test]
    fn duplicate_completion_is_a_no_op() {
        let mut registry = SessionRegistry::new();
        let id = registry
            .create_session(LOCATOR, QualitySelector::Best, None)
            .unwrap();

        assert!(registry.apply_completion(&id, "first.mp4").changed_state());
        assert!(!registry.apply_completion(&id, "second.mp4").changed_state());
        assert_eq!(registry.get(&id).unwrap().result_filename(), Some("first.mp4"));
    }

    #[test]
    fn unknown_ids_never_create_sessions() {
        let mut registry = SessionRegistry::new();
        assert_eq!(
            registry.apply_progress("ghost", snapshot(1.0)),
            Transition::UnknownSession
        );
        assert_eq!(
            registry.apply_completion("ghost", "x.mp4"),
            Transition::UnknownSession
        );
        assert_eq!(registry.apply_error("ghost", "nope"), Transition::UnknownSession);
        assert!(registry.is_empty());
    }

    #[test]
    fn list_keeps_creation_order() {
        let mut registry = SessionRegistry::new();
        let mut ids = vec!["c", "a", "b"].into_iter();
        for _ in 0..3 {
            registry
                .create_session_with(LOCATOR, QualitySelector::Best, None, || {
                    ids.next().unwrap().to_string()
                })
                .unwrap();
        }
        registry.apply_completion("a", "a.mp4");
        registry.apply_progress("c", snapshot(3.0));

        let listed: Vec<&str> = registry.list().map(|s| s.id()).collect();
        assert_eq!(listed, vec!["c", "a", "b"]);
    }

    #[test]
    fn remove_drops_from_listing() {
        let mut registry = SessionRegistry::new();
        let id = registry
            .create_session(LOCATOR, QualitySelector::Best, None)
            .unwrap();
        assert!(registry.remove(&id).is_some());
        assert!(registry.is_empty());
        assert_eq!(registry.list().count(), 0);
    }
}
