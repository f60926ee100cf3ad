//! Session-scoped credential state
//!
//! The bearer token is written by an external auth flow and only read by the
//! transport layer. Cloning a [`SessionState`] shares the same credential slot.

use std::sync::{Arc, RwLock};

/// Shared holder for the session's bearer credential
#[derive(Clone, Default)]
pub struct SessionState {
    token: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl SessionState {
    /// Create an anonymous session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session holding `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        let state = Self::new();
        state.set_token(token);
        state
    }

    /// Current bearer token, if the user is signed in
    pub fn bearer_token(&self) -> Option<String> {
        // A poisoned lock still holds a valid Option<String>
        let guard = self.token.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Store a new token (called by the auth flow)
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = if token.is_empty() { None } else { Some(token) };
    }

    /// Forget the token (sign-out)
    pub fn clear(&self) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// True when a token is present
    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .map(|g| g.is_some())
            .unwrap_or_else(|e| e.into_inner().is_some())
    }
}
