//! The client-side auth store.
//!
//! A [`SessionContext`] is created once and handed to the HTTP adapter, so the
//! request path can read the current token without locking.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::User;
use crate::session_store::{SessionError, SessionStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub is_authenticated: bool,
}

impl AuthSession {
    pub fn authenticated(user: User, token: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            access_token: Some(token.into()),
            is_authenticated: true,
        }
    }
}

pub struct SessionContext {
    current: ArcSwap<AuthSession>,
    store: Box<dyn SessionStore>,
    /// Held across save + swap so memory and disk change together.
    write: Mutex<()>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("is_authenticated", &self.current.load().is_authenticated)
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// Start logged out, without reading the store.
    pub fn new(store: impl SessionStore + 'static) -> Self {
        Self {
            current: ArcSwap::from_pointee(AuthSession::default()),
            store: Box::new(store),
            write: Mutex::new(()),
        }
    }

    /// Start from whatever the store persisted last.
    pub fn restore(store: impl SessionStore + 'static) -> Result<Self, SessionError> {
        let persisted = store.load()?.unwrap_or_default();
        Ok(Self {
            current: ArcSwap::from_pointee(persisted),
            store: Box::new(store),
            write: Mutex::new(()),
        })
    }

    pub fn login(&self, user: User, token: impl Into<String>) -> Result<(), SessionError> {
        self.replace(AuthSession::authenticated(user, token))
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        self.replace(AuthSession::default())
    }

    fn replace(&self, next: AuthSession) -> Result<(), SessionError> {
        let _write = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.save(&next)?;
        let next = Arc::new(next);
        self.current.store(next.clone());
        tracing::debug!(authenticated = next.is_authenticated, "session updated");
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<AuthSession> {
        self.current.load_full()
    }

    pub fn current_token(&self) -> Option<String> {
        self.current.load().access_token.clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current.load().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.load().is_authenticated
    }
}
