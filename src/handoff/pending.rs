//! Usage: Holds at most one credential between discovery and exchange.

use crate::handoff::parser::RedirectCredential;
use std::sync::Mutex;

/// Single-slot cache. `take` clears the slot, so a credential can be consumed exactly once.
#[derive(Default)]
pub struct PendingCredentialCache {
    slot: Mutex<Option<RedirectCredential>>,
}

impl PendingCredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `credential`, replacing any previous occupant.
    pub fn put(&self, credential: RedirectCredential) {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(credential);
    }

    pub fn take(&self) -> Option<RedirectCredential> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(token: &str) -> RedirectCredential {
        RedirectCredential {
            access_token: token.to_string(),
            refresh_token: None,
        }
    }

    #[test]
    fn take_clears_the_slot() {
        let cache = PendingCredentialCache::new();
        cache.put(cred("AT"));
        assert_eq!(cache.take().unwrap().access_token, "AT");
        assert!(cache.take().is_none());
    }

    #[test]
    fn put_replaces_previous_occupant() {
        let cache = PendingCredentialCache::new();
        cache.put(cred("OLD"));
        cache.put(cred("NEW"));
        assert_eq!(cache.take().unwrap().access_token, "NEW");
    }

    #[test]
    fn take_on_empty_returns_none() {
        let cache = PendingCredentialCache::new();
        assert!(cache.take().is_none());
    }
}
