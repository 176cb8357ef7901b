// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::collections::BTreeSet;

use sled::Tree;

use crate::database::{Store, StoreKey};
use crate::error::Error;
use crate::types::Identity;

impl Store for Tree {
    fn get_favorites(&self) -> Result<BTreeSet<String>, Error> {
        let key = StoreKey::Favorites.as_key();
        self.get(key)?
            .map_or(Ok(BTreeSet::new()), |b| Ok(serde_json::from_slice(&b)?))
    }
    fn set_favorites(&mut self, favorites: &BTreeSet<String>) -> Result<(), Error> {
        let key = StoreKey::Favorites.as_key();
        self.insert(key, serde_json::to_vec(favorites)?)?;
        self.flush()?;

        Ok(())
    }

    fn get_pending_email(&self) -> Result<Option<String>, Error> {
        let key = StoreKey::PendingEmail.as_key();
        self.get(key)?
            .map(|b| serde_json::from_slice(&b))
            .transpose()
            .map_err(Error::from)
    }
    fn set_pending_email(&mut self, email: &str) -> Result<(), Error> {
        let key = StoreKey::PendingEmail.as_key();
        self.insert(key, serde_json::to_vec(email)?)?;
        self.flush()?;

        Ok(())
    }
    fn del_pending_email(&mut self) -> Result<Option<String>, Error> {
        let key = StoreKey::PendingEmail.as_key();
        let res = self.remove(key)?;
        self.flush()?;

        res.map(|b| serde_json::from_slice(&b))
            .transpose()
            .map_err(Error::from)
    }

    fn get_identity(&self) -> Result<Option<Identity>, Error> {
        let key = StoreKey::Identity.as_key();
        self.get(key)?
            .map(|b| serde_json::from_slice(&b))
            .transpose()
            .map_err(Error::from)
    }
    fn set_identity(&mut self, identity: &Identity) -> Result<(), Error> {
        let key = StoreKey::Identity.as_key();
        self.insert(key, serde_json::to_vec(identity)?)?;
        self.flush()?;

        Ok(())
    }
    fn del_identity(&mut self) -> Result<Option<Identity>, Error> {
        let key = StoreKey::Identity.as_key();
        let res = self.remove(key)?;
        self.flush()?;

        res.map(|b| serde_json::from_slice(&b))
            .transpose()
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod test {
    use sled::Tree;

    use crate::database::Store;

    fn get_tree() -> Tree {
        let db = sled::Config::new().temporary(true).open().unwrap();
        db.open_tree("anchorwatch").unwrap()
    }

    #[test]
    fn test_favorites() {
        crate::database::test::test_favorites(get_tree());
    }

    #[test]
    fn test_pending_email() {
        crate::database::test::test_pending_email(get_tree());
    }

    #[test]
    fn test_identity() {
        crate::database::test::test_identity(get_tree());
    }

    #[test]
    fn test_independent_keys() {
        crate::database::test::test_independent_keys(get_tree());
    }

    #[test]
    fn test_favorites_survive_reopen() {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "anchorwatch_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));

        let favorites = vec!["t7".to_string()].into_iter().collect();
        {
            let mut tree = sled::open(&dir).unwrap().open_tree("anchorwatch").unwrap();
            tree.set_favorites(&favorites).unwrap();
        }

        let tree = sled::open(&dir).unwrap().open_tree("anchorwatch").unwrap();
        assert_eq!(tree.get_favorites().unwrap(), favorites);

        drop(tree);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
