// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Address transaction browser
//!
//! The [`AddressBrowser`] drives a [`BrowserState`] against a [`TransactionSource`]: it runs the
//! fetches the state asks for and persists the favorites to a [`Store`].
//!
//! ## Example
//!
//! ```no_run
//! # use anchorwatch::blockchain::EsploraClient;
//! # use anchorwatch::browser::AddressBrowser;
//! # use anchorwatch::database::MemoryStore;
//! # async fn run() -> Result<(), anchorwatch::Error> {
//! let client = EsploraClient::new("https://mempool.space/api");
//! let mut browser = AddressBrowser::new(client, MemoryStore::new())?;
//!
//! browser.submit_query("bc1qm34lsc65zpw79lxes69zkqmk6ee3ewf0j77s3h").await?;
//! browser.set_page(2).await?;
//! for row in browser.view().rows {
//!     println!("{} {}", row.transaction.id, row.display_amount);
//! }
//! # Ok(())
//! # }
//! ```

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::blockchain::TransactionSource;
use crate::database::Store;
use crate::error::Error;
use crate::types::{SortKey, Transaction};

pub mod pagination;
pub mod state;

pub use pagination::{PageItem, Pagination};
pub use state::{BrowserState, FetchOutcome, FetchTicket, PageView, TxRow, PAGE_SIZE};

/// Transaction browser for one address at a time
#[derive(Debug)]
pub struct AddressBrowser<S, D> {
    source: S,
    store: D,
    state: BrowserState,
}

impl<S, D> AddressBrowser<S, D>
where
    S: TransactionSource,
    D: Store,
{
    /// Create a new browser, loading the favorites from `store`
    pub fn new(source: S, store: D) -> Result<Self, Error> {
        let favorites = store.get_favorites()?;
        debug!("Loaded {} favorites", favorites.len());

        Ok(AddressBrowser {
            source,
            store,
            state: BrowserState::new(favorites),
        })
    }

    /// Start browsing `address` and fetch its first page
    ///
    /// Does nothing if `address` is empty or already being browsed.
    pub async fn submit_query(&mut self, address: &str) -> Result<(), Error> {
        let ticket = self.state.submit_query(address);
        self.fill_page(ticket).await
    }

    /// Move to page `page`, fetching until it's filled or the upstream is exhausted
    pub async fn set_page(&mut self, page: usize) -> Result<(), Error> {
        let ticket = self.state.set_page(page)?;
        self.fill_page(ticket).await
    }

    /// Move to the next page
    pub async fn next_page(&mut self) -> Result<(), Error> {
        let page = self.state.page().saturating_add(1);
        self.set_page(page).await
    }

    /// Move to the previous page
    pub fn prev_page(&mut self) {
        self.state.prev_page();
    }

    /// Change the sort column, see [`BrowserState::set_sort_key`]
    pub fn set_sort_key(&mut self, key: SortKey, toggle_direction_if_same: bool) {
        self.state.set_sort_key(key, toggle_direction_if_same);
    }

    /// Toggle `id` in the favorites and persist them
    ///
    /// The in-memory set is updated even if persisting fails. Returns whether `id` is now a
    /// favorite.
    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool, Error> {
        let is_favorite = self.state.toggle_favorite(id);
        info!(
            "{} {} favorites",
            id,
            if is_favorite { "added to" } else { "removed from" }
        );

        self.store.set_favorites(self.state.favorites())?;

        Ok(is_favorite)
    }

    /// Rows of the current page
    pub fn view(&self) -> PageView<'_> {
        self.state.view()
    }

    /// Pagination bar for the current page
    pub fn pagination(&self) -> Pagination {
        Pagination::new(
            self.state.page(),
            self.state.total_pages(),
            self.state.has_more(),
        )
    }

    /// Return a reference to the underlying state
    pub fn state(&self) -> &BrowserState {
        &self.state
    }

    /// Return a reference to the underlying store
    pub fn store(&self) -> &D {
        &self.store
    }

    /// Return a reference to the transaction source
    pub fn source(&self) -> &S {
        &self.source
    }

    async fn fill_page(&mut self, mut ticket: Option<FetchTicket>) -> Result<(), Error> {
        while let Some(current) = ticket {
            match self.run(current).await? {
                FetchOutcome::Applied { appended: 0 } => {
                    // the upstream replayed rows we already have, asking again won't help
                    warn!(
                        "No new transactions for {} after {:?}",
                        self.state.queried_address(),
                        self.state.cursor()
                    );
                    break;
                }
                FetchOutcome::Stale => break,
                FetchOutcome::Applied { .. } => {}
            }

            ticket = self.state.fetch_if_needed();
        }

        Ok(())
    }

    async fn run(&mut self, ticket: FetchTicket) -> Result<FetchOutcome, Error> {
        debug!(
            "Listing transactions of {} after {:?}",
            ticket.address(),
            ticket.cursor()
        );

        let pending = PendingFetch {
            state: Some(&mut self.state),
            ticket: ticket.clone(),
        };
        let result = self
            .source
            .address_txs(ticket.address(), ticket.cursor())
            .await;

        pending.complete(ticket, result)
    }
}

/// Ticket awaiting its response, released if the future running it is dropped
struct PendingFetch<'a> {
    state: Option<&'a mut BrowserState>,
    ticket: FetchTicket,
}

impl PendingFetch<'_> {
    fn complete(
        mut self,
        ticket: FetchTicket,
        result: Result<Vec<Transaction>, Error>,
    ) -> Result<FetchOutcome, Error> {
        match self.state.take() {
            Some(state) => state.complete_fetch(ticket, result),
            None => Ok(FetchOutcome::Stale),
        }
    }
}

impl Drop for PendingFetch<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.abort_fetch(&self.ticket);
        }
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::collections::{BTreeSet, VecDeque};

    use super::*;
    use crate::database::MemoryStore;
    use crate::types::Transaction;

    #[derive(Debug, Default)]
    struct ScriptedSource {
        responses: RefCell<VecDeque<Result<Vec<Transaction>, Error>>>,
        requests: RefCell<Vec<(String, Option<String>)>>,
    }

    impl ScriptedSource {
        fn push(&self, response: Result<Vec<Transaction>, Error>) {
            self.responses.borrow_mut().push_back(response);
        }

        fn requests(&self) -> Vec<(String, Option<String>)> {
            self.requests.borrow().clone()
        }
    }

    #[async_trait(?Send)]
    impl TransactionSource for ScriptedSource {
        async fn address_txs(
            &self,
            address: &str,
            after: Option<&str>,
        ) -> Result<Vec<Transaction>, Error> {
            self.requests
                .borrow_mut()
                .push((address.to_string(), after.map(str::to_string)));
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![]))
        }
    }

    fn page_of(range: std::ops::RangeInclusive<usize>) -> Vec<Transaction> {
        range
            .map(|i| Transaction {
                id: format!("t{}", i),
                confirmed_at: Some(1_700_000_000 - i as u64),
                confirmed: true,
                inputs: vec![],
                outputs: vec![],
            })
            .collect()
    }

    fn browser() -> AddressBrowser<ScriptedSource, MemoryStore> {
        AddressBrowser::new(ScriptedSource::default(), MemoryStore::new()).unwrap()
    }

    #[tokio::test]
    async fn test_scenario_fetch_on_page_six() {
        let mut browser = browser();
        browser.source().push(Ok(page_of(1..=50)));
        browser.source().push(Ok(page_of(51..=62)));

        browser.submit_query("addr1").await.unwrap();
        assert_eq!(browser.state().cursor(), Some("t50"));
        assert!(!browser.state().is_exhausted());
        assert_eq!(browser.source().requests().len(), 1);

        browser.set_page(6).await.unwrap();
        assert_eq!(browser.state().buffer().len(), 62);
        assert!(browser.state().is_exhausted());
        assert_eq!(browser.view().total_pages, 7);
        assert_eq!(browser.view().rows.len(), 10);
        assert_eq!(browser.view().rows[0].transaction.id, "t51");

        assert_eq!(
            browser.source().requests(),
            vec![
                ("addr1".to_string(), None),
                ("addr1".to_string(), Some("t50".to_string()))
            ]
        );
    }

    #[tokio::test]
    async fn test_set_page_fetches_repeatedly() {
        let mut browser = browser();
        browser.source().push(Ok(page_of(1..=50)));
        browser.source().push(Ok(page_of(51..=100)));
        browser.source().push(Ok(page_of(101..=130)));

        browser.submit_query("addr1").await.unwrap();
        browser.set_page(12).await.unwrap();

        assert_eq!(browser.state().buffer().len(), 130);
        assert!(browser.state().is_exhausted());
        assert_eq!(browser.source().requests().len(), 3);
        assert_eq!(browser.view().rows.len(), 10);
        assert_eq!(browser.view().rows[0].transaction.id, "t111");
    }

    #[tokio::test]
    async fn test_fill_stops_without_progress() {
        let mut browser = browser();
        browser.source().push(Ok(page_of(1..=50)));
        browser.source().push(Ok(page_of(1..=50)));
        browser.source().push(Ok(page_of(51..=60)));

        browser.submit_query("addr1").await.unwrap();
        browser.set_page(6).await.unwrap();

        assert_eq!(browser.source().requests().len(), 2);
        assert_eq!(browser.state().buffer().len(), 50);
        assert!(!browser.state().is_exhausted());
        assert!(browser.view().rows.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let mut browser = browser();
        browser.source().push(Ok(page_of(1..=50)));
        browser
            .source()
            .push(Err(Error::FetchFailed("HTTP status 500".into())));

        browser.submit_query("addr1").await.unwrap();
        let err = browser.next_page().await;
        assert!(err.is_ok());
        let err = browser.set_page(6).await.unwrap_err();
        assert!(matches!(err, Error::FetchFailed(_)));

        let view = browser.view();
        assert_eq!(view.error, Some(state::FETCH_FAILED_MESSAGE));
        assert_eq!(view.buffered, 50);
        assert!(view.has_more);
        assert!(!view.is_loading);
    }

    #[tokio::test]
    async fn test_same_address_is_noop() {
        let mut browser = browser();
        browser.source().push(Ok(page_of(1..=10)));

        browser.submit_query("addr1").await.unwrap();
        browser.submit_query("addr1").await.unwrap();
        browser.submit_query("").await.unwrap();

        assert_eq!(browser.source().requests().len(), 1);
        assert_eq!(browser.state().queried_address(), "addr1");
    }

    #[tokio::test]
    async fn test_new_query_resets() {
        let mut browser = browser();
        browser.source().push(Ok(page_of(1..=50)));
        browser.source().push(Ok(page_of(200..=203)));

        browser.submit_query("addr1").await.unwrap();
        browser.set_page(3).await.unwrap();
        browser.submit_query("addr2").await.unwrap();

        assert_eq!(browser.state().page(), 1);
        assert_eq!(browser.state().buffer().len(), 4);
        assert_eq!(browser.state().cursor(), Some("t203"));
        assert_eq!(
            browser.source().requests()[1],
            ("addr2".to_string(), None)
        );
    }

    #[tokio::test]
    async fn test_favorites_persist() {
        let mut store = MemoryStore::new();
        let saved: BTreeSet<String> = vec!["t3".to_string()].into_iter().collect();
        store.set_favorites(&saved).unwrap();

        let mut browser = AddressBrowser::new(ScriptedSource::default(), store).unwrap();
        browser.source().push(Ok(page_of(1..=5)));
        browser.submit_query("addr1").await.unwrap();
        assert!(browser.view().rows[2].is_favorite);

        assert!(browser.toggle_favorite("t1").unwrap());
        assert!(!browser.toggle_favorite("t3").unwrap());

        let persisted = browser.store().get_favorites().unwrap();
        assert_eq!(persisted, vec!["t1".to_string()].into_iter().collect());
        assert!(browser.view().rows[0].is_favorite);
    }

    /// Never answers its first request
    #[derive(Debug, Default)]
    struct StallingSource {
        calls: std::cell::Cell<usize>,
    }

    #[async_trait(?Send)]
    impl TransactionSource for StallingSource {
        async fn address_txs(
            &self,
            _address: &str,
            _after: Option<&str>,
        ) -> Result<Vec<Transaction>, Error> {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() == 1 {
                std::future::pending::<()>().await;
            }

            Ok(page_of(1..=3))
        }
    }

    #[tokio::test]
    async fn test_dropped_fetch_releases_single_flight() {
        let mut browser =
            AddressBrowser::new(StallingSource::default(), MemoryStore::new()).unwrap();

        tokio::select! {
            biased;
            _ = browser.submit_query("addr1") => panic!("the first fetch never completes"),
            _ = async {} => {}
        }
        assert_eq!(browser.source().calls.get(), 1);
        assert!(!browser.state().is_loading());

        // same address, the query itself is a no-op but the page can be refilled
        browser.submit_query("addr1").await.unwrap();
        assert_eq!(browser.source().calls.get(), 1);

        browser.set_page(1).await.unwrap();
        assert_eq!(browser.source().calls.get(), 2);
        assert!(!browser.state().is_loading());
        assert_eq!(browser.state().buffer().len(), 3);
    }

    #[tokio::test]
    async fn test_next_page_saturates() {
        let mut browser = browser();
        browser.source().push(Ok(page_of(1..=3)));
        browser.submit_query("addr1").await.unwrap();

        browser.set_page(usize::MAX).await.unwrap();
        browser.next_page().await.unwrap();
        assert_eq!(browser.state().page(), usize::MAX);
        assert!(browser.view().rows.is_empty());
        assert_eq!(browser.source().requests().len(), 1);
    }

    #[tokio::test]
    async fn test_pagination_bar() {
        let mut browser = browser();
        browser.source().push(Ok(page_of(1..=50)));
        browser.submit_query("addr1").await.unwrap();

        let bar = browser.pagination();
        assert!(!bar.prev_enabled);
        assert!(bar.next_enabled);
        assert_eq!(bar.items.len(), 5);

        browser.prev_page();
        assert_eq!(browser.state().page(), 1);
    }
}
