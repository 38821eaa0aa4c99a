//! Session/identity boundary.
//!
//! The core never runs a sign-in flow; it only asks a provider for the
//! current opaque user id and reacts when it changes. `None` means no one
//! is signed in, in which case the manager operates in local, unscoped
//! mode.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Callback invoked when the signed-in user changes. Receives the new
/// user id, or `None` on sign-out.
pub type SessionListener = Box<dyn Fn(Option<String>) + Send + Sync>;

/// Unsubscribe guard shared by the session and store watch APIs.
/// Dropping it removes the registered listener.
pub struct Watch {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Watch {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// The identity provider boundary.
pub trait SessionProvider: Send {
    /// The opaque id of the signed-in user, or `None`.
    fn current_user_id(&self) -> Option<String>;

    /// Register for sign-in/sign-out notifications. Providers with a
    /// fixed identity return `None`.
    fn watch(&self, listener: SessionListener) -> Option<Watch> {
        let _ = listener;
        None
    }
}

/// Fixed-identity provider for local deployments and tests.
///
/// `LocalSession::anonymous()` is the signed-out state; sign-in and
/// sign-out can be driven programmatically, which stands in for the
/// collaborator-owned auth flow.
#[derive(Clone, Default)]
pub struct LocalSession {
    inner: Arc<LocalSessionInner>,
}

#[derive(Default)]
struct LocalSessionInner {
    user: Mutex<Option<String>>,
    listeners: Mutex<Vec<(u64, SessionListener)>>,
    next_listener: AtomicU64,
}

impl LocalSession {
    /// Signed-out session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Session fixed to one user id.
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let session = Self::default();
        *session.inner.user.lock().unwrap() = Some(user_id.into());
        session
    }

    /// Change the current user and notify listeners.
    pub fn sign_in(&self, user_id: impl Into<String>) {
        self.set_user(Some(user_id.into()));
    }

    pub fn sign_out(&self) {
        self.set_user(None);
    }

    fn set_user(&self, user: Option<String>) {
        *self.inner.user.lock().unwrap() = user.clone();
        for (_, listener) in self.inner.listeners.lock().unwrap().iter() {
            listener(user.clone());
        }
    }
}

impl SessionProvider for LocalSession {
    fn current_user_id(&self) -> Option<String> {
        self.inner.user.lock().unwrap().clone()
    }

    fn watch(&self, listener: SessionListener) -> Option<Watch> {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners.lock().unwrap().push((id, listener));
        let inner = Arc::clone(&self.inner);
        Some(Watch::new(move || {
            inner
                .listeners
                .lock()
                .unwrap()
                .retain(|(entry, _)| *entry != id);
        }))
    }
}
