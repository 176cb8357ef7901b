// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Email-link sign-in
//!
//! Signing in happens in two steps. [`SignInFlow::send_link`] asks the provider to email a
//! link and remembers the address in the [`Store`]. When the user follows the link,
//! [`complete_sign_in`] exchanges it for an identity using the remembered address.
//!
//! The identity is saved in the [`Store`] too, [`restore_session`] hands it back to the
//! provider on the next start.

use std::time::{Duration, Instant};

#[allow(unused_imports)]
use log::{debug, error, info};

use super::IdentityProvider;
use crate::database::Store;
use crate::error::Error;
use crate::routes::Route;
use crate::types::Identity;

/// Time to wait before another link can be requested
pub const RESEND_COOLDOWN: Duration = Duration::from_secs(30);

/// Message displayed once a link has been sent
pub const LINK_SENT_MESSAGE: &str = "Check your inbox for a sign-in link, which is valid for 10 \
    minutes. If you don't receive it in 30 seconds, press resend to receive another link.";

/// State of the sign-in form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInState {
    /// Waiting for the user to request a link
    Idle,
    /// A link was sent to `email` at `sent_at`
    LinkSent {
        /// Address the link was sent to
        email: String,
        /// When the link was sent
        sent_at: Instant,
    },
}

/// The sign-in form
#[derive(Debug, Clone)]
pub struct SignInFlow {
    email: String,
    state: SignInState,
    message: Option<String>,
    error: Option<String>,
}

impl Default for SignInFlow {
    fn default() -> Self {
        SignInFlow::new()
    }
}

impl SignInFlow {
    /// Create an empty form
    pub fn new() -> Self {
        SignInFlow {
            email: String::new(),
            state: SignInState::Idle,
            message: None,
            error: None,
        }
    }

    /// Update the email field, going back to [`SignInState::Idle`] if it changed
    pub fn set_email(&mut self, email: &str) {
        if email == self.email {
            return;
        }

        self.email = email.to_string();
        self.state = SignInState::Idle;
        self.message = None;
        self.error = None;
    }

    /// Ask `provider` to send a sign-in link to the current email
    ///
    /// On success the email is remembered in `store` for [`complete_sign_in`] and resending is
    /// disabled for [`RESEND_COOLDOWN`].
    pub async fn send_link<P, D>(
        &mut self,
        provider: &P,
        store: &mut D,
        return_url: &str,
        now: Instant,
    ) -> Result<(), Error>
    where
        P: IdentityProvider + ?Sized,
        D: Store + ?Sized,
    {
        if let Some(remaining) = self.resend_available_in(now) {
            return Err(Error::ResendCooldown(remaining));
        }

        match provider.send_sign_in_link(&self.email, return_url).await {
            Ok(()) => {
                info!("Sign-in link sent to {}", self.email);
                store.set_pending_email(&self.email)?;

                self.state = SignInState::LinkSent {
                    email: self.email.clone(),
                    sent_at: now,
                };
                self.message = Some(LINK_SENT_MESSAGE.to_string());
                self.error = None;

                Ok(())
            }
            Err(e) => {
                debug!("Sending a sign-in link to {} failed: {}", self.email, e);
                // `InvalidEmailFormat` displays as "Incorrect email address"
                self.error = Some(e.to_string());

                Err(e)
            }
        }
    }

    /// Time left before a new link can be requested, `None` if it can be requested now
    pub fn resend_available_in(&self, now: Instant) -> Option<Duration> {
        match &self.state {
            SignInState::Idle => None,
            SignInState::LinkSent { sent_at, .. } => {
                let elapsed = now.saturating_duration_since(*sent_at);
                RESEND_COOLDOWN.checked_sub(elapsed).filter(|d| *d > Duration::ZERO)
            }
        }
    }

    /// Whether the resend button is enabled
    pub fn can_resend(&self, now: Instant) -> bool {
        matches!(self.state, SignInState::LinkSent { .. })
            && self.resend_available_in(now).is_none()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn state(&self) -> &SignInState {
        &self.state
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// What the redirect handler decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// The user is signed in
    Completed(Identity),
    /// No email is waiting for a link on this device, the user has to start over
    MissingEmail,
    /// The URL isn't a sign-in link, nothing was attempted
    NotASignInLink,
}

impl RedirectOutcome {
    /// Where the view should navigate next
    pub fn route(&self) -> Option<Route> {
        match self {
            RedirectOutcome::Completed(_) => Some(Route::Dashboard),
            RedirectOutcome::MissingEmail => Some(Route::SignIn),
            RedirectOutcome::NotASignInLink => None,
        }
    }
}

/// Consume the sign-in `link` the user arrived with
///
/// The pending email is cleared and the identity saved once the provider accepted the link. A
/// rejected link is reported as [`Error::AuthLinkInvalid`] and the pending email is kept.
pub async fn complete_sign_in<P, D>(
    provider: &P,
    store: &mut D,
    link: &str,
) -> Result<RedirectOutcome, Error>
where
    P: IdentityProvider + ?Sized,
    D: Store + ?Sized,
{
    let email = match store.get_pending_email()?.ok_or(Error::NoPendingEmail) {
        Ok(email) => email,
        Err(e) => {
            debug!("{}, redirecting", e);
            return Ok(RedirectOutcome::MissingEmail);
        }
    };

    if !provider.is_sign_in_link(link) {
        debug!("Not a sign-in link: {}", link);
        return Ok(RedirectOutcome::NotASignInLink);
    }

    match provider.complete_sign_in_with_link(&email, link).await {
        Ok(identity) => {
            info!("Signed in as {}", email);
            store.del_pending_email()?;
            store.set_identity(&identity)?;

            Ok(RedirectOutcome::Completed(identity))
        }
        Err(e) => {
            error!("Error signing in with email link: {}", e);

            Err(match e {
                Error::AuthLinkInvalid(reason) => Error::AuthLinkInvalid(reason),
                e => Error::AuthLinkInvalid(e.to_string()),
            })
        }
    }
}

/// Resume the session saved by [`complete_sign_in`], if any
pub fn restore_session<P, D>(provider: &P, store: &D) -> Result<Option<Identity>, Error>
where
    P: IdentityProvider + ?Sized,
    D: Store + ?Sized,
{
    let identity = store.get_identity()?;
    match &identity {
        Some(identity) => {
            info!(
                "Resuming session of {}",
                identity.email.as_deref().unwrap_or(identity.uid.as_str())
            );
            provider.restore(identity.clone());
        }
        None => debug!("No saved session"),
    }

    Ok(identity)
}
