// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Esplora
//!
//! This module defines an [`EsploraClient`] struct that lists the transactions of an address
//! from an Esplora backend, such as `mempool.space` or `blockstream.info`.
//!
//! ## Example
//!
//! ```no_run
//! # use anchorwatch::blockchain::esplora::EsploraClient;
//! let client = EsploraClient::new("https://mempool.space/api");
//! # Ok::<(), anchorwatch::Error>(())
//! ```
use std::fmt;

use bitcoin::Network;

mod api;
mod reqwest;

pub use self::api::{PrevOut, Tx, TxStatus, Vin, Vout};
pub use self::reqwest::*;

/// Errors that can happen while talking to an Esplora server
#[derive(Debug)]
pub enum EsploraError {
    /// Error during reqwest HTTP request
    Reqwest(::reqwest::Error),
    /// HTTP response error
    HttpResponse(u16),
    /// The configured base URL can't be parsed
    InvalidUrl(String),
}

impl fmt::Display for EsploraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EsploraError::Reqwest(err) => write!(f, "HTTP request failed: {}", err),
            EsploraError::HttpResponse(status) => write!(f, "HTTP status {}", status),
            EsploraError::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
        }
    }
}

impl std::error::Error for EsploraError {}

impl_error!(::reqwest::Error, Reqwest, EsploraError);

/// Configuration for an [`EsploraClient`]
#[derive(Debug, serde::Deserialize, serde::Serialize, Clone, PartialEq)]
pub struct EsploraConfig {
    /// Base URL of the esplora service
    ///
    /// eg. `https://mempool.space/api`
    pub base_url: String,
    /// Optional URL of the proxy to use to make requests to the Esplora server
    ///
    /// The string should be formatted as: `<protocol>://<user>:<password>@host:<port>`.
    ///
    /// The proxy is ignored when targeting `wasm32`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Socket timeout, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl EsploraConfig {
    /// Create a config with default values given the base url
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            proxy: None,
            timeout: None,
        }
    }

    /// Create a config pointing to the public `mempool.space` instance for `network`
    pub fn for_network(network: Network) -> Self {
        Self::new(default_base_url(network).to_string())
    }
}

/// Public explorer used when no base URL is configured
pub fn default_base_url(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => "https://mempool.space/api",
        Network::Testnet => "https://mempool.space/testnet/api",
        Network::Regtest => "http://127.0.0.1:3002",
        #[allow(unreachable_patterns)]
        _ => "https://mempool.space/signet/api",
    }
}
