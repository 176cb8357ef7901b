// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Number of satoshi in one bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// An input of a [`Transaction`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Address that funded the input, `None` for coinbase inputs
    pub source_address: Option<String>,
}

/// An output of a [`Transaction`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Address receiving the output, `None` for non-standard scripts
    pub destination_address: Option<String>,
    /// Value in satoshi
    pub amount: u64,
}

/// A transaction as listed by the upstream explorer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction id, unique and stable
    pub id: String,
    /// Timestamp of the confirming block, `None` while unconfirmed
    pub confirmed_at: Option<u64>,
    /// Whether the transaction is confirmed
    pub confirmed: bool,
    /// Inputs, in order
    pub inputs: Vec<TxInput>,
    /// Outputs, in order
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Sum of every output value, signed negative when one of the inputs was funded by
    /// `address`
    ///
    /// Change returning to `address` is not subtracted.
    pub fn net_amount(&self, address: &str) -> i64 {
        let total: u64 = self.outputs.iter().map(|o| o.amount).sum();
        let total = total as i64;

        if self.is_outgoing(address) {
            -total
        } else {
            total
        }
    }

    /// Whether `address` funded one of the inputs
    pub fn is_outgoing(&self, address: &str) -> bool {
        self.inputs
            .iter()
            .any(|i| i.source_address.as_deref() == Some(address))
    }
}

/// Format a signed satoshi amount as BTC with 8 decimals
pub fn format_btc(sats: i64) -> String {
    let sign = if sats < 0 { "-" } else { "" };
    let abs = sats.unsigned_abs();

    format!(
        "{}{}.{:08}",
        sign,
        abs / SATS_PER_BTC,
        abs % SATS_PER_BTC
    )
}

/// Column used to order the buffered transactions
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Confirmation time, unconfirmed transactions count as the oldest
    Time,
    /// Absolute value of the net amount
    Amount,
    /// Confirmation status
    Confirmed,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Time => write!(f, "time"),
            SortKey::Amount => write!(f, "amount"),
            SortKey::Confirmed => write!(f, "confirmed"),
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time" | "date" => Ok(SortKey::Time),
            "amount" => Ok(SortKey::Amount),
            "confirmed" | "status" => Ok(SortKey::Confirmed),
            _ => Err(Error::Generic(format!("Unknown sort key `{}`", s))),
        }
    }
}

/// Sort direction
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

impl SortDirection {
    /// Return the opposite direction
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    /// Apply the direction to an ascending ordering
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

/// An authenticated user, as handed out by an
/// [`IdentityProvider`](crate::auth::IdentityProvider)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Provider-assigned user id
    pub uid: String,
    /// Email the user signed in with
    pub email: Option<String>,
    /// Short-lived token proving the identity
    pub id_token: String,
    /// Token used to obtain new id tokens
    pub refresh_token: Option<String>,
}
