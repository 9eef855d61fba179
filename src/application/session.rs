// Session credential ownership and renewal
use std::sync::Arc;

use tracing::{info, warn};

use crate::application::ports::{Authenticator, CredentialSource};

const NO_SESSION: &str = "xx";
const REJECTED: &str = "401";

// Anything at or under this length is a sentinel, not a real session id.
// The device hands out long opaque ids, so the length test distinguishes
// them from both markers above.
const MIN_TOKEN_LEN: usize = 4;

/// Owns the current session credential. Only the polling worker holds a
/// `SessionManager`, so handshake attempts are naturally serialized.
pub struct SessionManager {
    credential: String,
    authenticator: Arc<dyn Authenticator>,
}

impl SessionManager {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            credential: NO_SESSION.to_string(),
            authenticator,
        }
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn is_valid(&self) -> bool {
        self.credential.len() > MIN_TOKEN_LEN
    }

    /// Runs the handshake if the current credential is a sentinel. A failed
    /// handshake leaves the old credential in place, so callers observe a
    /// still-invalid session.
    pub async fn ensure_valid(&mut self, credentials: &dyn CredentialSource) {
        if self.is_valid() {
            return;
        }
        match self.authenticator.authenticate(credentials.password()).await {
            Ok(session_id) => {
                info!("established inverter session");
                self.credential = session_id;
            }
            Err(err) => warn!("authentication failed: {err}"),
        }
    }

    /// Called after any authenticated request came back 401. Forces a fresh
    /// handshake on the next `ensure_valid`.
    pub fn mark_rejected(&mut self) {
        self.credential = REJECTED.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::AuthError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubCredentials;

    impl CredentialSource for StubCredentials {
        fn password(&self) -> &str {
            "secret"
        }
    }

    struct StubAuthenticator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubAuthenticator {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Authenticator for StubAuthenticator {
        async fn authenticate(&self, _password: &str) -> Result<String, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AuthError::SignatureMismatch)
            } else {
                Ok("f3cda1e0-5cb2-47a8-9d9e-8e1b7f9a52d4".to_string())
            }
        }
    }

    #[test]
    fn test_sentinels_are_invalid() {
        let manager = SessionManager::new(StubAuthenticator::new(false));
        assert_eq!(manager.credential(), "xx");
        assert!(!manager.is_valid());

        let mut rejected = SessionManager::new(StubAuthenticator::new(false));
        rejected.mark_rejected();
        assert_eq!(rejected.credential(), "401");
        assert!(!rejected.is_valid());
    }

    #[test]
    fn test_threshold_boundary() {
        let mut manager = SessionManager::new(StubAuthenticator::new(false));
        manager.credential = "abcd".to_string();
        assert!(!manager.is_valid());
        manager.credential = "abcde".to_string();
        assert!(manager.is_valid());
    }

    #[tokio::test]
    async fn test_ensure_valid_authenticates_once() {
        let authenticator = StubAuthenticator::new(false);
        let mut manager = SessionManager::new(authenticator.clone());

        manager.ensure_valid(&StubCredentials).await;
        assert!(manager.is_valid());
        assert_eq!(authenticator.calls.load(Ordering::SeqCst), 1);

        // Valid session is reused, no second handshake.
        manager.ensure_valid(&StubCredentials).await;
        assert_eq!(authenticator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_handshake_leaves_session_invalid() {
        let authenticator = StubAuthenticator::new(true);
        let mut manager = SessionManager::new(authenticator.clone());

        manager.ensure_valid(&StubCredentials).await;
        assert!(!manager.is_valid());
        assert_eq!(manager.credential(), "xx");
        assert_eq!(authenticator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejection_forces_new_handshake() {
        let authenticator = StubAuthenticator::new(false);
        let mut manager = SessionManager::new(authenticator.clone());

        manager.ensure_valid(&StubCredentials).await;
        manager.mark_rejected();
        assert!(!manager.is_valid());

        manager.ensure_valid(&StubCredentials).await;
        assert!(manager.is_valid());
        assert_eq!(authenticator.calls.load(Ordering::SeqCst), 2);
    }
}
