// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! In-memory ephemeral store
//!
//! Values are kept JSON-encoded, the same way the persistent backends write them.

use std::collections::{BTreeMap, BTreeSet};

use crate::database::{Store, StoreKey};
use crate::error::Error;
use crate::types::Identity;

/// In-memory ephemeral store
///
/// Nothing survives the process, mostly useful for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    map: BTreeMap<StoreKey, Vec<u8>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        MemoryStore {
            map: BTreeMap::new(),
        }
    }
}

impl Store for MemoryStore {
    fn get_favorites(&self) -> Result<BTreeSet<String>, Error> {
        self.map
            .get(&StoreKey::Favorites)
            .map_or(Ok(BTreeSet::new()), |b| Ok(serde_json::from_slice(b)?))
    }
    fn set_favorites(&mut self, favorites: &BTreeSet<String>) -> Result<(), Error> {
        self.map
            .insert(StoreKey::Favorites, serde_json::to_vec(favorites)?);

        Ok(())
    }

    fn get_pending_email(&self) -> Result<Option<String>, Error> {
        self.map
            .get(&StoreKey::PendingEmail)
            .map(|b| serde_json::from_slice(b))
            .transpose()
            .map_err(Error::from)
    }
    fn set_pending_email(&mut self, email: &str) -> Result<(), Error> {
        self.map
            .insert(StoreKey::PendingEmail, serde_json::to_vec(email)?);

        Ok(())
    }
    fn del_pending_email(&mut self) -> Result<Option<String>, Error> {
        self.map
            .remove(&StoreKey::PendingEmail)
            .map(|b| serde_json::from_slice(&b))
            .transpose()
            .map_err(Error::from)
    }

    fn get_identity(&self) -> Result<Option<Identity>, Error> {
        self.map
            .get(&StoreKey::Identity)
            .map(|b| serde_json::from_slice(b))
            .transpose()
            .map_err(Error::from)
    }
    fn set_identity(&mut self, identity: &Identity) -> Result<(), Error> {
        self.map
            .insert(StoreKey::Identity, serde_json::to_vec(identity)?);

        Ok(())
    }
    fn del_identity(&mut self) -> Result<Option<Identity>, Error> {
        self.map
            .remove(&StoreKey::Identity)
            .map(|b| serde_json::from_slice(&b))
            .transpose()
            .map_err(Error::from)
    }
}
