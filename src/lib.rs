// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

// only enables the `doc_cfg` feature when
// the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Browse the transaction history of a Bitcoin address
//!
//! AnchorWatch lists the transactions of an address from an Esplora server, a few at a time,
//! and lets the user sort them, page through them and mark favorites. Access is gated by a
//! passwordless email-link sign-in.
//!
//! The building blocks are:
//!
//! * [`AddressBrowser`], driving a [`BrowserState`](browser::BrowserState) with a
//!   [`TransactionSource`](blockchain::TransactionSource) and a [`Store`](database::Store)
//! * [`SessionStore`](auth::SessionStore), [`SignInFlow`](auth::SignInFlow) and
//!   [`complete_sign_in`](auth::complete_sign_in) on top of an
//!   [`IdentityProvider`](auth::IdentityProvider)
//! * [`routes`], deciding what a front-end shows for the current session
//!
//! ## Example
//!
//! ```no_run
//! use anchorwatch::blockchain::EsploraClient;
//! use anchorwatch::database::MemoryStore;
//! use anchorwatch::AddressBrowser;
//!
//! # async fn run() -> Result<(), anchorwatch::Error> {
//! let client = EsploraClient::new("https://mempool.space/api");
//! let mut browser = AddressBrowser::new(client, MemoryStore::new())?;
//!
//! browser
//!     .submit_query("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq")
//!     .await?;
//! for row in browser.view().rows {
//!     println!("{} {}", row.transaction.id, row.display_amount);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! * `key-value-db`: [`Store`](database::Store) implementation for [`sled::Tree`]
//! * `esplora`: [`EsploraClient`](blockchain::EsploraClient) built on `reqwest`
//! * `firebase`: [`FirebaseAuth`](auth::FirebaseAuth), over the Identity Toolkit REST API
//! * `cli-utils`: the `anchorwatch` command line front-end

pub extern crate bitcoin;
#[macro_use]
extern crate async_trait;
extern crate log;
extern crate serde;
extern crate serde_json;

#[cfg(any(feature = "esplora", feature = "firebase"))]
pub extern crate reqwest;

#[cfg(feature = "key-value-db")]
pub extern crate sled;

#[macro_use]
pub(crate) mod error;
pub mod auth;
pub mod blockchain;
pub mod browser;
pub mod config;
pub mod database;
pub mod routes;
pub(crate) mod types;

#[cfg(feature = "cli-utils")]
pub mod cli;

pub use browser::AddressBrowser;
pub use config::AppConfig;
pub use error::Error;
pub use types::*;
