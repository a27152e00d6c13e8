//! Per-session bearer token cache.
//!
//! Entries are keyed by session identity and hold only a [`Weak`] reference
//! to the session handle, so remembering a token never extends a session's
//! lifetime. Dead entries are pruned opportunistically on mutation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity for one invocation-transport session.
///
/// The transport layer owns the `Arc`; once it drops the handle, any cached
/// token for the session becomes unreachable.
#[derive(Debug)]
pub struct SessionHandle {
    id: u64,
}

impl SessionHandle {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct Entry {
    session: Weak<SessionHandle>,
    token: String,
}

/// Session-scoped token store shared by all tool handlers.
#[derive(Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<u64, Entry>>,
}

impl TokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `token` for the given session.
    pub fn remember(&self, session: &Arc<SessionHandle>, token: &str) {
        let mut entries = self.entries.lock().expect("token cache poisoned");
        prune_dead(&mut entries);
        entries.insert(
            session.id,
            Entry {
                session: Arc::downgrade(session),
                token: token.to_string(),
            },
        );
    }

    /// Forget any token cached for the given session.
    pub fn clear(&self, session: &SessionHandle) {
        let mut entries = self.entries.lock().expect("token cache poisoned");
        entries.remove(&session.id);
        prune_dead(&mut entries);
    }

    /// Token cached for the session, if the session is still alive.
    #[must_use]
    pub fn lookup(&self, session: &SessionHandle) -> Option<String> {
        let entries = self.entries.lock().expect("token cache poisoned");
        entries
            .get(&session.id)
            .filter(|entry| entry.session.strong_count() > 0)
            .map(|entry| entry.token.clone())
    }

    /// Resolve the token to use for one call.
    ///
    /// Priority: a non-blank explicit token (remembered for the session),
    /// then the session's cached token, then `fallback`. A blank explicit
    /// token clears the session entry instead of selecting a token.
    #[must_use]
    pub fn resolve(
        &self,
        session: &Arc<SessionHandle>,
        explicit: Option<&str>,
        fallback: Option<&str>,
    ) -> Option<String> {
        match explicit.map(str::trim) {
            Some(token) if !token.is_empty() => {
                self.remember(session, token);
                Some(token.to_string())
            }
            Some(_) => {
                self.clear(session);
                fallback.map(ToString::to_string)
            }
            None => self
                .lookup(session)
                .or_else(|| fallback.map(ToString::to_string)),
        }
    }

    /// Number of live entries; dead sessions are not counted.
    #[must_use]
    pub fn live_entries(&self) -> usize {
        let entries = self.entries.lock().expect("token cache poisoned");
        entries
            .values()
            .filter(|entry| entry.session.strong_count() > 0)
            .count()
    }
}

fn prune_dead(entries: &mut HashMap<u64, Entry>) {
    entries.retain(|_, entry| entry.session.strong_count() > 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_token_wins_and_is_remembered() {
        let cache = TokenCache::new();
        let session = SessionHandle::new();

        let resolved = cache.resolve(&session, Some(" explicit "), Some("default"));
        assert_eq!(resolved.as_deref(), Some("explicit"));
        assert_eq!(cache.lookup(&session).as_deref(), Some("explicit"));
    }

    #[test]
    fn test_cached_token_beats_default() {
        let cache = TokenCache::new();
        let session = SessionHandle::new();
        cache.remember(&session, "cached");

        let resolved = cache.resolve(&session, None, Some("default"));
        assert_eq!(resolved.as_deref(), Some("cached"));
    }

    #[test]
    fn test_default_used_when_nothing_cached() {
        let cache = TokenCache::new();
        let session = SessionHandle::new();

        let resolved = cache.resolve(&session, None, Some("default"));
        assert_eq!(resolved.as_deref(), Some("default"));
    }

    #[test]
    fn test_no_token_resolves_to_none() {
        let cache = TokenCache::new();
        let session = SessionHandle::new();

        assert!(cache.resolve(&session, None, None).is_none());
    }

    #[test]
    fn test_blank_explicit_clears_cache() {
        let cache = TokenCache::new();
        let session = SessionHandle::new();
        cache.remember(&session, "cached");

        let resolved = cache.resolve(&session, Some("   "), Some("default"));
        assert_eq!(resolved.as_deref(), Some("default"));
        assert!(cache.lookup(&session).is_none());
    }

    #[test]
    fn test_dropping_session_invalidates_entry() {
        let cache = TokenCache::new();
        let session = SessionHandle::new();
        cache.remember(&session, "cached");
        assert_eq!(cache.live_entries(), 1);

        drop(session);
        assert_eq!(cache.live_entries(), 0);

        // A new session with its own identity starts empty.
        let fresh = SessionHandle::new();
        assert!(cache.lookup(&fresh).is_none());
    }

    #[test]
    fn test_sessions_do_not_share_tokens() {
        let cache = TokenCache::new();
        let first = SessionHandle::new();
        let second = SessionHandle::new();
        cache.remember(&first, "one");

        assert!(cache.lookup(&second).is_none());
        assert_eq!(cache.lookup(&first).as_deref(), Some("one"));
    }
}
