use crate::round::Round;
use crate::score::Scoreboard;
use crate::search::SearchSession;
use parking_lot::RwLock;
use rand::{Rng, SeedableRng, distributions::Alphanumeric, rngs::SmallRng, thread_rng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const MAX_SESSION_COUNT: usize = 4096;
const SESSION_ID_LEN: usize = 24;

/// The round a player is currently answering.
#[derive(Debug, Clone)]
pub struct ActiveRound {
    pub dataset: String,
    pub round: Round,
}

/// Everything the server remembers about one browser.
pub struct PlayerSession {
    last_seen_ts: u64,
    pub scoreboard: Scoreboard,
    pub round: Option<ActiveRound>,
    pub search: SearchSession,
    pub rng: SmallRng,
}

impl PlayerSession {
    fn new(now: u64) -> Self {
        Self {
            last_seen_ts: now,
            scoreboard: Scoreboard::new(),
            round: None,
            search: SearchSession::new(),
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn last_seen_ts(&self) -> u64 {
        self.last_seen_ts
    }
}

/// Shared, bounded map of player sessions keyed by cookie value.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, PlayerSession>>>,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSION_COUNT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.read().contains_key(session_id)
    }

    /// Keeps a known session id, or issues a new one. The flag is true when
    /// the id is new and must be handed back to the client.
    pub fn resolve(&self, candidate: Option<&str>) -> (String, bool) {
        match candidate {
            Some(id) if self.contains(id) => (id.to_string(), false),
            _ => (generate_session_id(), true),
        }
    }

    /// Runs `f` against the session, creating it when missing. The least
    /// recently seen session is dropped once the store is full.
    pub fn with_session<T>(&self, session_id: &str, f: impl FnOnce(&mut PlayerSession) -> T) -> T {
        let now = now_ts();
        let mut guard = self.inner.write();
        if guard.len() >= self.capacity && !guard.contains_key(session_id) {
            if let Some(oldest) = oldest_session_key(&guard) {
                debug!(session = %oldest, "evicting idle session");
                guard.remove(&oldest);
            }
        }
        let session = guard
            .entry(session_id.to_string())
            .or_insert_with(|| PlayerSession::new(now));
        session.last_seen_ts = now;
        f(session)
    }
}

fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn oldest_session_key(sessions: &HashMap<String, PlayerSession>) -> Option<String> {
    sessions
        .iter()
        .min_by_key(|(_, session)| session.last_seen_ts)
        .map(|(key, _)| key.clone())
}

pub fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PageScope;

    #[test]
    fn session_ids_are_alphanumeric() {
        let id = generate_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn sessions_keep_state_between_calls() {
        let store = SessionStore::new();
        store.with_session("abc", |session| {
            session.scoreboard.record_success(1);
            session.search.submit(PageScope::Taxonomy, "ray");
        });
        let (correct, query, scope) = store.with_session("abc", |session| {
            (
                session.scoreboard.correct,
                session.search.query().to_string(),
                session.search.scope(),
            )
        });
        assert_eq!(correct, 1);
        assert_eq!(query, "ray");
        assert_eq!(scope, PageScope::Taxonomy);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_ids_are_replaced() {
        let store = SessionStore::new();
        let (fresh, is_new) = store.resolve(Some("forged"));
        assert!(is_new);
        assert_ne!(fresh, "forged");
        store.with_session(&fresh, |_| ());
        assert_eq!(store.resolve(Some(&fresh)), (fresh.clone(), false));
        assert!(store.resolve(None).1);
    }

    #[test]
    fn full_store_evicts_the_oldest_session() {
        let store = SessionStore::with_capacity(2);
        store.with_session("first", |_| ());
        store.with_session("second", |_| ());
        store.inner.write().get_mut("first").expect("first").last_seen_ts = 0;
        store.with_session("third", |_| ());
        assert_eq!(store.len(), 2);
        assert!(!store.contains("first"));
        assert!(store.contains("second"));
        assert!(store.contains("third"));
    }
}
