// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Browser state machine
//!
//! [`BrowserState`] holds everything the transaction browser knows about the address being
//! browsed. Every transition is a plain method call, fetching is modeled by handing out a
//! [`FetchTicket`] and later feeding the upstream response back with
//! [`BrowserState::complete_fetch`]. No I/O happens here.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

#[allow(unused_imports)]
use log::{debug, info, trace, warn};

use crate::blockchain::PROVIDER_PAGE_SIZE;
use crate::error::Error;
use crate::types::{format_btc, SortDirection, SortKey, Transaction};

/// Number of rows displayed per page
pub const PAGE_SIZE: usize = 10;

/// Message shown to the user when listing transactions fails
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch transactions";

/// Permission to run one upstream fetch
///
/// At most one ticket is outstanding per [`BrowserState`]. A ticket issued for a previous query
/// is recognized as stale when it comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    address: String,
    cursor: Option<String>,
}

impl FetchTicket {
    /// Address to list the transactions of
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Continuation token, `None` for the first page
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Query generation the ticket was issued for
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of feeding a response back into the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response was applied, `appended` new rows were added to the buffer
    Applied {
        /// Rows left after removing ids already buffered
        appended: usize,
    },
    /// The response belongs to a query that is no longer current and was discarded
    Stale,
}

/// One row of the current page
#[derive(Debug, Clone, PartialEq)]
pub struct TxRow<'a> {
    /// The buffered transaction
    pub transaction: &'a Transaction,
    /// Signed amount relative to the queried address, in satoshi
    pub net_amount: i64,
    /// `net_amount` in BTC, 8 decimals
    pub display_amount: String,
    /// Whether the transaction is in the favorites
    pub is_favorite: bool,
}

/// Read-only snapshot of what the view renders
#[derive(Debug, Clone, PartialEq)]
pub struct PageView<'a> {
    /// Address being browsed, empty before the first query
    pub address: &'a str,
    /// Rows of the current page, sorted
    pub rows: Vec<TxRow<'a>>,
    /// 1-based page index
    pub page: usize,
    /// Pages available in the buffer
    pub total_pages: usize,
    /// Whether the upstream may have more transactions
    pub has_more: bool,
    /// Whether a fetch is in flight
    pub is_loading: bool,
    /// Banner to display after a failed fetch
    pub error: Option<&'a str>,
    /// Active sort column
    pub sort_key: SortKey,
    /// Active sort direction
    pub sort_direction: SortDirection,
    /// Number of buffered transactions
    pub buffered: usize,
}

/// State of the transaction browser for one address at a time
#[derive(Debug, Clone)]
pub struct BrowserState {
    queried_address: String,
    buffer: Vec<Transaction>,
    buffered_ids: HashSet<String>,
    cursor: Option<String>,
    exhausted: bool,
    page: usize,
    sort_key: SortKey,
    sort_direction: SortDirection,
    favorites: BTreeSet<String>,

    generation: u64,
    in_flight: Option<u64>,
    error: Option<String>,
}

impl Default for BrowserState {
    fn default() -> Self {
        BrowserState::new(BTreeSet::new())
    }
}

impl BrowserState {
    /// Create an empty state, `favorites` is usually loaded from a
    /// [`Store`](crate::database::Store)
    pub fn new(favorites: BTreeSet<String>) -> Self {
        BrowserState {
            queried_address: String::new(),
            buffer: Vec::new(),
            buffered_ids: HashSet::new(),
            cursor: None,
            exhausted: false,
            page: 1,
            sort_key: SortKey::Time,
            sort_direction: SortDirection::Desc,
            favorites,

            generation: 0,
            in_flight: None,
            error: None,
        }
    }

    /// Start browsing `address`
    ///
    /// Resets the buffer, the cursor and the page, then returns the ticket for the first fetch.
    /// Returns `None` and leaves the state untouched if `address` is empty or already being
    /// browsed.
    pub fn submit_query(&mut self, address: &str) -> Option<FetchTicket> {
        if address.is_empty() || address == self.queried_address {
            return None;
        }

        info!("Browsing {}", address);

        self.queried_address = address.to_string();
        self.buffer.clear();
        self.buffered_ids.clear();
        self.cursor = None;
        self.exhausted = false;
        self.page = 1;
        self.error = None;
        // in-flight fetches of the previous query become stale
        self.generation += 1;
        self.in_flight = None;

        self.begin_fetch()
    }

    /// Whether the current page can't be filled from the buffer and the upstream may have more
    pub fn needs_fetch(&self) -> bool {
        !self.queried_address.is_empty()
            && !self.exhausted
            && self.page.saturating_mul(PAGE_SIZE) > self.buffer.len()
    }

    /// Hand out a ticket for the next upstream page
    ///
    /// Returns `None` when nothing has been queried, the upstream is exhausted or another fetch
    /// is already in flight.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        if self.queried_address.is_empty() || self.exhausted {
            return None;
        }
        if self.in_flight.is_some() {
            trace!("Fetch for {} already in flight", self.queried_address);
            return None;
        }

        self.in_flight = Some(self.generation);
        self.error = None;

        Some(FetchTicket {
            generation: self.generation,
            address: self.queried_address.clone(),
            cursor: self.cursor.clone(),
        })
    }

    /// Give back a ticket whose fetch was abandoned before its response arrived
    ///
    /// Releases the single-flight slot so the next [`begin_fetch`](Self::begin_fetch) can
    /// succeed. Tickets that are no longer in flight are ignored.
    pub fn abort_fetch(&mut self, ticket: &FetchTicket) {
        if ticket.generation == self.generation && self.in_flight == Some(ticket.generation) {
            debug!(
                "Fetch for {} after {:?} abandoned",
                ticket.address, ticket.cursor
            );
            self.in_flight = None;
        }
    }

    /// Hand out a ticket only if the current page needs more rows
    pub fn fetch_if_needed(&mut self) -> Option<FetchTicket> {
        if self.needs_fetch() {
            self.begin_fetch()
        } else {
            None
        }
    }

    /// Feed the upstream response for `ticket` back into the state
    ///
    /// Responses for a query that is no longer current are discarded. On failure the buffer,
    /// the cursor and the exhaustion flag are left untouched and the error banner is set.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Transaction>, Error>,
    ) -> Result<FetchOutcome, Error> {
        if ticket.generation != self.generation || self.in_flight != Some(ticket.generation) {
            debug!(
                "Discarding stale response for {} (generation {}, current {})",
                ticket.address, ticket.generation, self.generation
            );
            return Ok(FetchOutcome::Stale);
        }
        self.in_flight = None;

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Fetching transactions of {} failed: {}", ticket.address, e);
                self.error = Some(FETCH_FAILED_MESSAGE.to_string());

                return Err(match e {
                    Error::FetchFailed(msg) => Error::FetchFailed(msg),
                    e => Error::FetchFailed(e.to_string()),
                });
            }
        };

        let raw_len = raw.len();
        if let Some(last) = raw.last() {
            self.cursor = Some(last.id.clone());
        }
        self.exhausted = raw_len < PROVIDER_PAGE_SIZE;

        let before = self.buffer.len();
        for tx in raw {
            if self.buffered_ids.insert(tx.id.clone()) {
                self.buffer.push(tx);
            }
        }
        let appended = self.buffer.len() - before;

        debug!(
            "Fetched {} transactions of {} after {:?}: {} new, exhausted: {}",
            raw_len,
            ticket.address,
            ticket.cursor,
            appended,
            self.exhausted
        );

        Ok(FetchOutcome::Applied { appended })
    }

    /// Change the sort column
    ///
    /// Selecting the active column flips the direction when `toggle_direction_if_same` is set,
    /// selecting another column sorts it ascending.
    pub fn set_sort_key(&mut self, key: SortKey, toggle_direction_if_same: bool) {
        if key == self.sort_key {
            if toggle_direction_if_same {
                self.sort_direction = self.sort_direction.flip();
            }
        } else {
            self.sort_key = key;
            self.sort_direction = SortDirection::Asc;
        }
    }

    /// Move to page `page`, returning a ticket if the buffer can't fill it yet
    pub fn set_page(&mut self, page: usize) -> Result<Option<FetchTicket>, Error> {
        if page == 0 {
            return Err(Error::InvalidPage(page));
        }
        self.page = page;

        Ok(self.fetch_if_needed())
    }

    /// Move to the next page
    pub fn next_page(&mut self) -> Option<FetchTicket> {
        self.page = self.page.saturating_add(1);
        self.fetch_if_needed()
    }

    /// Move to the previous page, stays on the first one
    pub fn prev_page(&mut self) {
        self.page = std::cmp::max(self.page - 1, 1);
    }

    /// Add `id` to the favorites if absent, remove it otherwise
    ///
    /// Returns whether `id` is now a favorite.
    pub fn toggle_favorite(&mut self, id: &str) -> bool {
        if self.favorites.remove(id) {
            false
        } else {
            self.favorites.insert(id.to_string());
            true
        }
    }

    /// The whole buffer, sorted by the active column and direction
    ///
    /// The sort is stable: ties keep their buffer order regardless of the direction.
    pub fn sorted(&self) -> Vec<&Transaction> {
        let mut sorted: Vec<&Transaction> = self.buffer.iter().collect();
        let address = self.queried_address.as_str();
        let key = self.sort_key;
        let direction = self.sort_direction;

        sorted.sort_by(|a, b| direction.apply(compare(key, address, a, b)));
        sorted
    }

    /// Rows of the current page
    pub fn view(&self) -> PageView<'_> {
        let address = self.queried_address.as_str();
        let rows = self
            .sorted()
            .into_iter()
            .skip((self.page - 1).saturating_mul(PAGE_SIZE))
            .take(PAGE_SIZE)
            .map(|transaction| {
                let net_amount = transaction.net_amount(address);
                TxRow {
                    transaction,
                    net_amount,
                    display_amount: format_btc(net_amount),
                    is_favorite: self.favorites.contains(&transaction.id),
                }
            })
            .collect();

        PageView {
            address,
            rows,
            page: self.page,
            total_pages: self.total_pages(),
            has_more: self.has_more(),
            is_loading: self.is_loading(),
            error: self.error.as_deref(),
            sort_key: self.sort_key,
            sort_direction: self.sort_direction,
            buffered: self.buffer.len(),
        }
    }

    /// `ceil(buffer / PAGE_SIZE)`
    pub fn total_pages(&self) -> usize {
        (self.buffer.len() + PAGE_SIZE - 1) / PAGE_SIZE
    }

    /// Whether the upstream may have more transactions
    pub fn has_more(&self) -> bool {
        !self.exhausted
    }

    /// Whether a fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn queried_address(&self) -> &str {
        &self.queried_address
    }

    pub fn buffer(&self) -> &[Transaction] {
        &self.buffer
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn favorites(&self) -> &BTreeSet<String> {
        &self.favorites
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

// ascending order for `key`
fn compare(key: SortKey, address: &str, a: &Transaction, b: &Transaction) -> Ordering {
    match key {
        SortKey::Time => a.confirmed_at.unwrap_or(0).cmp(&b.confirmed_at.unwrap_or(0)),
        SortKey::Amount => a
            .net_amount(address)
            .unsigned_abs()
            .cmp(&b.net_amount(address).unsigned_abs()),
        SortKey::Confirmed => a.confirmed.cmp(&b.confirmed),
    }
}
