// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Local storage
//!
//! This module provides the [`Store`] trait for the small amount of state that has to survive a
//! restart: the set of favorite transactions, the email a sign-in link was sent to and the
//! signed-in identity.
//!
//! [`MemoryStore`](memory::MemoryStore) keeps everything in memory, the `key-value-db` feature
//! implements [`Store`] for [`sled::Tree`].

use std::collections::BTreeSet;

use crate::error::Error;
use crate::types::Identity;

#[cfg(feature = "key-value-db")]
pub mod keyvalue;
pub mod memory;

pub use memory::MemoryStore;

// favorites            favorites -> json array of txids
// pending email        emailForSignIn -> json string
// identity             identity -> json object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum StoreKey {
    Favorites,
    PendingEmail,
    Identity,
}

impl StoreKey {
    pub fn as_key(&self) -> &'static [u8] {
        match self {
            StoreKey::Favorites => b"favorites",
            StoreKey::PendingEmail => b"emailForSignIn",
            StoreKey::Identity => b"identity",
        }
    }
}

/// Persistent key-value state
pub trait Store {
    /// Read the set of favorite transaction ids, empty if never written
    fn get_favorites(&self) -> Result<BTreeSet<String>, Error>;
    /// Replace the set of favorite transaction ids
    fn set_favorites(&mut self, favorites: &BTreeSet<String>) -> Result<(), Error>;

    /// Read the email a sign-in link was last sent to
    fn get_pending_email(&self) -> Result<Option<String>, Error>;
    /// Remember the email a sign-in link was sent to
    fn set_pending_email(&mut self, email: &str) -> Result<(), Error>;
    /// Forget the pending email, returning it if it was present
    fn del_pending_email(&mut self) -> Result<Option<String>, Error>;

    /// Read the identity of the last session
    fn get_identity(&self) -> Result<Option<Identity>, Error>;
    /// Remember the signed-in identity, tokens included
    fn set_identity(&mut self, identity: &Identity) -> Result<(), Error>;
    /// Forget the identity, returning it if it was present
    fn del_identity(&mut self) -> Result<Option<Identity>, Error>;
}

impl<T: Store + ?Sized> Store for &mut T {
    fn get_favorites(&self) -> Result<BTreeSet<String>, Error> {
        (**self).get_favorites()
    }
    fn set_favorites(&mut self, favorites: &BTreeSet<String>) -> Result<(), Error> {
        (**self).set_favorites(favorites)
    }

    fn get_pending_email(&self) -> Result<Option<String>, Error> {
        (**self).get_pending_email()
    }
    fn set_pending_email(&mut self, email: &str) -> Result<(), Error> {
        (**self).set_pending_email(email)
    }
    fn del_pending_email(&mut self) -> Result<Option<String>, Error> {
        (**self).del_pending_email()
    }

    fn get_identity(&self) -> Result<Option<Identity>, Error> {
        (**self).get_identity()
    }
    fn set_identity(&mut self, identity: &Identity) -> Result<(), Error> {
        (**self).set_identity(identity)
    }
    fn del_identity(&mut self) -> Result<Option<Identity>, Error> {
        (**self).del_identity()
    }
}
