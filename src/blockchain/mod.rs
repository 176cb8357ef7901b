// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Upstream transaction listing
//!
//! This module defines the [`TransactionSource`] trait, the only thing the
//! [`AddressBrowser`](crate::browser::AddressBrowser) needs from a block explorer.
//!
//! The `esplora` feature enables [`EsploraClient`], which talks to an Esplora or mempool.space
//! HTTP server.

use std::ops::Deref;

use crate::error::Error;
use crate::types::Transaction;

#[cfg(feature = "esplora")]
pub mod esplora;
#[cfg(feature = "esplora")]
pub use self::esplora::EsploraClient;

/// Number of transactions returned by a full upstream page
///
/// A shorter page means the history has been exhausted.
pub const PROVIDER_PAGE_SIZE: usize = 50;

/// Trait for a backend able to list the transactions of an address
#[async_trait(?Send)]
pub trait TransactionSource {
    /// List the transactions of `address`, newest first
    ///
    /// When `after` is set only the transactions following that transaction id are returned.
    async fn address_txs(
        &self,
        address: &str,
        after: Option<&str>,
    ) -> Result<Vec<Transaction>, Error>;
}

#[async_trait(?Send)]
impl<T: TransactionSource> TransactionSource for std::sync::Arc<T> {
    async fn address_txs(
        &self,
        address: &str,
        after: Option<&str>,
    ) -> Result<Vec<Transaction>, Error> {
        self.deref().address_txs(address, after).await
    }
}
