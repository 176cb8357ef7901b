// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Application configuration
//!
//! Read from a JSON file, every field is optional:
//!
//! ```json
//! {
//!     "network": "testnet",
//!     "esplora": { "base_url": "https://blockstream.info/testnet/api", "timeout": 10 },
//!     "auth": { "api_key": "AIza..." },
//!     "data_dir": "/var/lib/anchorwatch"
//! }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[allow(unused_imports)]
use log::{debug, info};
use serde::{Deserialize, Serialize};

use bitcoin::Network;

#[cfg(feature = "firebase")]
use crate::auth::firebase::FirebaseConfig;
#[cfg(feature = "esplora")]
use crate::blockchain::esplora::EsploraConfig;
use crate::error::Error;

/// Location of the sled database when none is configured
pub const DEFAULT_DATA_DIR: &str = "./anchorwatch-db";

/// Configuration of the whole application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bitcoin network, defaults to `bitcoin`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Esplora server, defaults to the public explorer of the network
    #[cfg(feature = "esplora")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esplora: Option<EsploraConfig>,
    /// Identity provider settings
    #[cfg(feature = "firebase")]
    #[serde(default)]
    pub auth: FirebaseConfig,
    /// Directory of the local database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load the configuration from `path`, a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                debug!("Loading configuration from {}", path.display());
                Ok(serde_json::from_str(&content)?)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No configuration at {}, using defaults", path.display());
                Ok(AppConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Return the configured network
    pub fn network(&self) -> Result<Network, Error> {
        match &self.network {
            None => Ok(Network::Bitcoin),
            Some(name) => Network::from_str(name)
                .map_err(|_| Error::Generic(format!("Unknown network `{}`", name))),
        }
    }

    /// Return the Esplora configuration, falling back to the public explorer of the network
    #[cfg(feature = "esplora")]
    pub fn esplora(&self) -> Result<EsploraConfig, Error> {
        match &self.esplora {
            Some(config) => Ok(config.clone()),
            None => Ok(EsploraConfig::for_network(self.network()?)),
        }
    }

    /// Return the database directory
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }
}
