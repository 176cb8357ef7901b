// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Authentication
//!
//! Signing in is delegated to an [`IdentityProvider`] offering passwordless email-link sign-in.
//! On top of it this module provides:
//!
//! * [`SessionStore`](session::SessionStore), tracking the currently authenticated identity
//! * [`SignInFlow`](sign_in::SignInFlow) and [`complete_sign_in`](sign_in::complete_sign_in),
//!   sending the link and consuming it when the user comes back
//!
//! The `firebase` feature enables [`FirebaseAuth`](firebase::FirebaseAuth), backed by the
//! Identity Toolkit REST API.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

#[allow(unused_imports)]
use log::{debug, trace};

use crate::error::Error;
use crate::types::Identity;

#[cfg(feature = "firebase")]
pub mod firebase;
pub mod session;
pub mod sign_in;

#[cfg(feature = "firebase")]
pub use self::firebase::FirebaseAuth;
pub use self::session::SessionStore;
pub use self::sign_in::{
    complete_sign_in, restore_session, RedirectOutcome, SignInFlow, SignInState,
};

/// Callback invoked every time the authenticated identity changes
pub type AuthCallback = Box<dyn Fn(Option<&Identity>) + Send + Sync>;

/// Trait for a passwordless email-link identity provider
#[async_trait(?Send)]
pub trait IdentityProvider {
    /// Register `callback` for identity changes
    ///
    /// The callback is invoked right away with the current identity, then on every change
    /// until the returned [`Subscription`] is dropped.
    fn subscribe(&self, callback: AuthCallback) -> Subscription;

    /// Email a sign-in link to `email`, the link points back to `return_url`
    async fn send_sign_in_link(&self, email: &str, return_url: &str) -> Result<(), Error>;

    /// Exchange the sign-in `link` received by `email` for an identity
    async fn complete_sign_in_with_link(&self, email: &str, link: &str)
        -> Result<Identity, Error>;

    /// Forget the current identity
    async fn sign_out(&self) -> Result<(), Error>;

    /// Resume a session persisted by an earlier run, notifying the subscribers
    fn restore(&self, identity: Identity);

    /// Whether `link` looks like a sign-in link issued by this provider
    fn is_sign_in_link(&self, link: &str) -> bool;
}

type SharedCallback = Arc<dyn Fn(Option<&Identity>) + Send + Sync>;

#[derive(Default)]
struct NotifierInner {
    current: Option<Identity>,
    subscribers: BTreeMap<u64, SharedCallback>,
    next_id: u64,
}

/// Subscriber registry holding the current identity of a provider
#[derive(Clone, Default)]
pub struct AuthNotifier {
    inner: Arc<Mutex<NotifierInner>>,
}

impl std::fmt::Debug for AuthNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("AuthNotifier")
            .field("current", &inner.current)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

fn lock(inner: &Mutex<NotifierInner>) -> MutexGuard<'_, NotifierInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AuthNotifier {
    /// Create a new registry with no identity
    pub fn new() -> Self {
        AuthNotifier::default()
    }

    /// Register `callback` and invoke it with the current identity
    pub fn subscribe(&self, callback: AuthCallback) -> Subscription {
        let callback: SharedCallback = Arc::from(callback);
        let (subscription, current) = self.insert(Arc::clone(&callback));

        callback(current.as_ref());

        subscription
    }

    /// Register `callback` without invoking it
    ///
    /// The first call happens on the next [`set`](Self::set). Providers resolving their
    /// initial state asynchronously use this instead of [`subscribe`](Self::subscribe).
    pub fn register(&self, callback: AuthCallback) -> Subscription {
        self.insert(Arc::from(callback)).0
    }

    fn insert(&self, callback: SharedCallback) -> (Subscription, Option<Identity>) {
        let (id, current) = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.insert(id, callback);

            (id, inner.current.clone())
        };
        trace!("Auth subscriber {} registered", id);

        let subscription = Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        };
        (subscription, current)
    }

    /// Replace the current identity and notify every subscriber
    pub fn set(&self, identity: Option<Identity>) {
        let callbacks: Vec<SharedCallback> = {
            let mut inner = lock(&self.inner);
            inner.current = identity.clone();
            inner.subscribers.values().cloned().collect()
        };
        debug!(
            "Auth state changed: {:?}, notifying {} subscribers",
            identity.as_ref().map(|i| &i.uid),
            callbacks.len()
        );

        // the lock is released, callbacks may call back into the notifier
        for callback in callbacks {
            callback(identity.as_ref());
        }
    }

    /// Return the current identity
    pub fn current(&self) -> Option<Identity> {
        lock(&self.inner).current.clone()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

/// Handle of a registered [`AuthCallback`], unsubscribes when dropped
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<NotifierInner>>,
}

impl Subscription {
    /// Stop receiving notifications
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner).subscribers.remove(&self.id);
            trace!("Auth subscriber {} removed", self.id);
        }
    }
}
