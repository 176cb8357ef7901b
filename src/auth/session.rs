// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Session store

use std::sync::{Arc, PoisonError, RwLock};

#[allow(unused_imports)]
use log::{debug, info};

use super::{IdentityProvider, Subscription};
use crate::error::Error;
use crate::types::Identity;

#[derive(Debug)]
struct SessionState {
    identity: Option<Identity>,
    loading: bool,
}

/// Currently authenticated identity, kept up to date by the provider's notifications
///
/// The store subscribes when created and unsubscribes when dropped. It owns the provider, pass
/// it around by reference wherever the session is needed.
#[derive(Debug)]
pub struct SessionStore<P> {
    provider: P,
    state: Arc<RwLock<SessionState>>,
    subscription: Option<Subscription>,
}

impl<P: IdentityProvider> SessionStore<P> {
    /// Create a new store and subscribe to `provider`
    pub fn new(provider: P) -> Self {
        let state = Arc::new(RwLock::new(SessionState {
            identity: None,
            loading: true,
        }));

        let state_cb = Arc::clone(&state);
        let subscription = provider.subscribe(Box::new(move |identity| {
            let mut state = state_cb.write().unwrap_or_else(PoisonError::into_inner);
            debug!(
                "Session identity: {:?}",
                identity.map(|i| i.email.as_deref().unwrap_or(i.uid.as_str()))
            );
            state.identity = identity.cloned();
            state.loading = false;
        }));

        SessionStore {
            provider,
            state,
            subscription: Some(subscription),
        }
    }

    /// The authenticated identity, `None` when signed out
    pub fn current_identity(&self) -> Option<Identity> {
        self.read(|s| s.identity.clone())
    }

    /// `true` until the provider delivered its first notification
    pub fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    /// Sign out through the provider
    ///
    /// The local state is updated by the notification that follows, not by this call.
    pub async fn sign_out(&self) -> Result<(), Error> {
        info!("Signing out");
        self.provider.sign_out().await
    }

    /// Return a reference to the identity provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Unsubscribe from the provider and return it
    pub fn close(mut self) -> P {
        self.subscription.take();
        let SessionStore { provider, .. } = self;
        provider
    }

    fn read<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::auth::test::{identity, FakeProvider, VALID_LINK};
    use crate::routes::{self, Guard, Route};

    #[test]
    fn test_first_notification_clears_loading() {
        let provider = FakeProvider::default();
        provider
            .notifier
            .set(Some(identity("alice@example.com")));

        let session = SessionStore::new(provider);
        assert!(!session.is_loading());
        assert_eq!(
            session.current_identity().and_then(|i| i.email).as_deref(),
            Some("alice@example.com")
        );
    }

    #[test]
    fn test_loading_until_first_notification() {
        let session = SessionStore::new(FakeProvider::deferred());
        assert!(session.is_loading());
        assert_eq!(session.current_identity(), None);
        assert_eq!(routes::guard(Route::Dashboard, &session), Guard::Loading);

        session.provider().notifier.set(None);
        assert!(!session.is_loading());
        assert_eq!(
            routes::guard(Route::Dashboard, &session),
            Guard::Redirect(Route::SignIn)
        );
    }

    #[test]
    fn test_loading_resolves_to_identity() {
        let session = SessionStore::new(FakeProvider::deferred());
        assert_eq!(routes::guard(Route::Dashboard, &session), Guard::Loading);

        session
            .provider()
            .notifier
            .set(Some(identity("alice@example.com")));
        assert!(!session.is_loading());
        assert_eq!(
            routes::guard(Route::Dashboard, &session),
            Guard::Render(Route::Dashboard)
        );
    }

    #[tokio::test]
    async fn test_follows_provider() {
        let session = SessionStore::new(FakeProvider::default());
        assert_eq!(session.current_identity(), None);

        session
            .provider()
            .complete_sign_in_with_link("bob@example.com", VALID_LINK)
            .await
            .unwrap();
        assert_eq!(
            session.current_identity().map(|i| i.uid).as_deref(),
            Some("uid-bob@example.com")
        );

        session.sign_out().await.unwrap();
        assert_eq!(session.current_identity(), None);
    }

    #[tokio::test]
    async fn test_sign_out_error_propagates() {
        let provider = FakeProvider::default();
        provider.notifier.set(Some(identity("alice@example.com")));
        *provider.fail_sign_out.borrow_mut() = true;

        let session = SessionStore::new(provider);
        let err = session.sign_out().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(session.current_identity().is_some());
    }

    #[test]
    fn test_close_unsubscribes() {
        let session = SessionStore::new(FakeProvider::default());
        assert_eq!(session.provider().notifier.subscriber_count(), 1);

        let provider = session.close();
        assert_eq!(provider.notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let provider = FakeProvider::default();
        let notifier = provider.notifier.clone();

        let session = SessionStore::new(provider);
        assert_eq!(notifier.subscriber_count(), 1);
        drop(session);
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
