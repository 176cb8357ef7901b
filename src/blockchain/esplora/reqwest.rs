// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Esplora by way of `reqwest` HTTP client.

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use ::reqwest::{Client, Url};

use super::api::Tx;
use super::{EsploraConfig, EsploraError};
use crate::blockchain::TransactionSource;
use crate::error::Error;
use crate::types::Transaction;

/// Structure that implements [`TransactionSource`] on top of an Esplora server
///
/// ## Example
/// See the [`blockchain::esplora`](crate::blockchain::esplora) module for a usage example.
#[derive(Debug, Clone)]
pub struct EsploraClient {
    url: String,
    client: Client,
}

impl EsploraClient {
    /// Create a new instance of the client from a base URL
    pub fn new(base_url: &str) -> Self {
        EsploraClient {
            url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a new instance of the client from an [`EsploraConfig`]
    pub fn from_config(config: &EsploraConfig) -> Result<Self, Error> {
        let mut client = EsploraClient::new(&config.base_url);

        #[allow(unused_mut)]
        let mut builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(::reqwest::Proxy::all(proxy).map_err(EsploraError::from)?);
        }

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(core::time::Duration::from_secs(timeout));
        }

        client.client = builder.build().map_err(EsploraError::from)?;

        Ok(client)
    }

    /// Return the base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.url
    }

    pub(crate) fn address_txs_url(
        &self,
        address: &str,
        after: Option<&str>,
    ) -> Result<Url, EsploraError> {
        let invalid_url = || EsploraError::InvalidUrl(self.url.clone());

        let mut url = Url::parse(&self.url).map_err(|_| invalid_url())?;
        // the address is a single segment, whatever it contains
        url.path_segments_mut()
            .map_err(|_| invalid_url())?
            .pop_if_empty()
            .extend(&["address", address, "txs"]);
        if let Some(after) = after {
            url.query_pairs_mut().append_pair("after_txid", after);
        }

        Ok(url)
    }

    async fn _address_txs(
        &self,
        address: &str,
        after: Option<&str>,
    ) -> Result<Vec<Tx>, EsploraError> {
        let url = self.address_txs_url(address, after)?;
        trace!("GET {}", url);

        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(EsploraError::HttpResponse(resp.status().as_u16()));
        }

        Ok(resp.json::<Vec<Tx>>().await?)
    }
}

#[async_trait(?Send)]
impl TransactionSource for EsploraClient {
    async fn address_txs(
        &self,
        address: &str,
        after: Option<&str>,
    ) -> Result<Vec<Transaction>, Error> {
        let txs = self._address_txs(address, after).await.map_err(|e| {
            debug!("Listing {} after {:?} failed: {}", address, after, e);
            Error::FetchFailed(e.to_string())
        })?;

        Ok(txs.into_iter().map(Tx::into_transaction).collect())
    }
}
