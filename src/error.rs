// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::fmt;
use std::time::Duration;

/// Errors that can be thrown by the [`AddressBrowser`](crate::browser::AddressBrowser) and the
/// authentication components
#[derive(Debug)]
pub enum Error {
    /// Generic error
    Generic(String),
    /// Listing the transactions of an address failed, the buffer was left untouched
    FetchFailed(String),
    /// The identity provider rejected the email/link pair
    AuthLinkInvalid(String),
    /// The redirect handler found no locally stored email to complete the sign-in with
    NoPendingEmail,
    /// The identity provider reported a malformed email address
    InvalidEmailFormat,
    /// Pages are 1-based, page `0` doesn't exist
    InvalidPage(usize),
    /// A new sign-in link was requested before the resend cooldown expired
    ResendCooldown(Duration),
    /// Any other identity provider failure
    Auth(String),
    /// Error serializing or deserializing JSON data
    Json(serde_json::Error),
    /// I/O error, usually while reading the configuration
    Io(std::io::Error),

    #[cfg(feature = "esplora")]
    /// Esplora client error
    Esplora(Box<crate::blockchain::esplora::EsploraError>),
    #[cfg(feature = "firebase")]
    /// Firebase identity provider error
    Firebase(Box<crate::auth::firebase::FirebaseError>),
    #[cfg(feature = "key-value-db")]
    /// Sled database error
    Sled(sled::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(err) => write!(f, "Generic error: {}", err),
            Self::FetchFailed(err) => write!(f, "Failed to fetch transactions: {}", err),
            Self::AuthLinkInvalid(err) => write!(f, "Invalid sign-in link: {}", err),
            Self::NoPendingEmail => write!(f, "No pending sign-in email"),
            Self::InvalidEmailFormat => write!(f, "Incorrect email address"),
            Self::InvalidPage(page) => write!(f, "Invalid page: {}", page),
            Self::ResendCooldown(remaining) => write!(
                f,
                "Resend available in {} seconds",
                remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
            ),
            Self::Auth(err) => write!(f, "Authentication error: {}", err),
            Self::Json(err) => write!(f, "Serialize/Deserialize JSON error: {}", err),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            #[cfg(feature = "esplora")]
            Self::Esplora(err) => write!(f, "Esplora client error: {}", err),
            #[cfg(feature = "firebase")]
            Self::Firebase(err) => write!(f, "Firebase error: {}", err),
            #[cfg(feature = "key-value-db")]
            Self::Sled(err) => write!(f, "Sled database error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

macro_rules! impl_error {
    ( $from:ty, $to:ident ) => {
        impl_error!($from, $to, Error);
    };
    ( $from:ty, $to:ident, $impl_for:ty ) => {
        impl std::convert::From<$from> for $impl_for {
            fn from(err: $from) -> Self {
                <$impl_for>::$to(err)
            }
        }
    };
}

impl_error!(serde_json::Error, Json);
impl_error!(std::io::Error, Io);

#[cfg(feature = "key-value-db")]
impl_error!(sled::Error, Sled);

#[cfg(feature = "esplora")]
impl From<crate::blockchain::esplora::EsploraError> for Error {
    fn from(other: crate::blockchain::esplora::EsploraError) -> Self {
        Error::Esplora(Box::new(other))
    }
}

#[cfg(feature = "firebase")]
impl From<crate::auth::firebase::FirebaseError> for Error {
    fn from(other: crate::auth::firebase::FirebaseError) -> Self {
        use crate::auth::firebase::FirebaseError;

        match other {
            FirebaseError::Api { ref message, .. } if message.starts_with("INVALID_EMAIL") => {
                Error::InvalidEmailFormat
            }
            err => Error::Firebase(Box::new(err)),
        }
    }
}
