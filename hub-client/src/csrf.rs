//! The [`CsrfStore`] holding the token for the current Hub session.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use hub_api::{def::HubApi, error::HubApiError, types::CsrfToken};
use tracing::{debug, warn};

/// Holds the CSRF token fetched from `GET /api/csrf`.
///
/// Mutating requests read the token without locking; it is only replaced on
/// (re)login or when the Hub rotates the session.
#[derive(Default)]
pub struct CsrfStore {
    token: ArcSwapOption<CsrfToken>,
}

impl CsrfStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current token, or `None` if it hasn't been loaded yet.
    #[inline]
    pub fn current(&self) -> Option<Arc<CsrfToken>> {
        self.token.load_full()
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.token.load().is_some()
    }

    pub fn set(&self, token: CsrfToken) {
        self.token.store(Some(Arc::new(token)));
    }

    /// Forget the token, e.g. after the Hub reports the session is invalid.
    pub fn clear(&self) {
        self.token.store(None);
    }

    /// Fetch a fresh token from the Hub and store it. On failure the
    /// previous token (if any) is left in place.
    pub async fn refresh(
        &self,
        hub: &impl HubApi,
    ) -> Result<Arc<CsrfToken>, HubApiError> {
        let token = hub
            .csrf()
            .await
            .map(Arc::new)
            .inspect_err(|e| warn!("Failed to fetch CSRF token: {e:#}"))?;
        self.token.store(Some(token.clone()));
        debug!("Refreshed CSRF token");
        Ok(token)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_and_clear() {
        let store = CsrfStore::new();
        assert!(store.current().is_none());
        assert!(!store.is_loaded());

        store.set(CsrfToken::new("first"));
        let first = store.current().unwrap();
        assert_eq!(first.as_str(), "first");

        // Readers holding the old token are unaffected by a swap.
        store.set(CsrfToken::new("second"));
        assert_eq!(first.as_str(), "first");
        assert_eq!(store.current().unwrap().as_str(), "second");

        store.clear();
        assert!(store.current().is_none());
    }
}
