// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Pagination widget model

use std::cmp;

/// Maximum number of consecutive page numbers displayed
pub const MAX_VISIBLE_PAGES: usize = 5;

/// An entry of the pagination bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    /// A clickable page number
    Page {
        /// 1-based page index
        number: usize,
        /// Whether this is the current page
        active: bool,
    },
    /// A gap of skipped page numbers
    Ellipsis,
}

/// The pagination bar under the transaction table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    /// Entries between the Prev and Next buttons
    pub items: Vec<PageItem>,
    /// Whether the Prev button is clickable
    pub prev_enabled: bool,
    /// Whether the Next button is clickable
    pub next_enabled: bool,
}

impl Pagination {
    /// Build the bar for `current` out of `total_pages`
    ///
    /// The window of numbered pages is centred on `current`, the first and last pages are
    /// always reachable. Next stays enabled past the buffered pages while the upstream may have
    /// more transactions.
    pub fn new(current: usize, total_pages: usize, has_more: bool) -> Self {
        let mut items = Vec::new();

        let start = cmp::max(1, current.saturating_sub(MAX_VISIBLE_PAGES / 2));
        let end = cmp::min(total_pages, start.saturating_add(MAX_VISIBLE_PAGES - 1));

        let item = |number| PageItem::Page {
            number,
            active: number == current,
        };

        if start > 1 {
            items.push(item(1));
            if start > 2 {
                items.push(PageItem::Ellipsis);
            }
        }

        for number in start..=end {
            items.push(item(number));
        }

        if end < total_pages {
            if end + 1 < total_pages {
                items.push(PageItem::Ellipsis);
            }
            items.push(item(total_pages));
        }

        Pagination {
            items,
            prev_enabled: current > 1,
            next_enabled: has_more || current < total_pages,
        }
    }
}
