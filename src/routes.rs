// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Routes
//!
//! The views a front-end can be on and the guard protecting the dashboard.

use std::fmt;
use std::str::FromStr;

use crate::auth::{IdentityProvider, SessionStore};
use crate::error::Error;

/// A view of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Email entry and link sending
    SignIn,
    /// Landing page of the sign-in link
    Callback,
    /// Address transaction browser, requires an identity
    Dashboard,
    /// Entry point, always redirects to [`Route::Dashboard`]
    Root,
}

impl Route {
    /// Path of the route
    pub fn path(&self) -> &'static str {
        match self {
            Route::SignIn => "/signin",
            Route::Callback => "/callback",
            Route::Dashboard => "/dashboard",
            Route::Root => "/",
        }
    }

    /// Whether the route needs an authenticated identity
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

impl FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ignore the query string, the callback carries the sign-in link in it
        let path = s.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
        match path.trim_end_matches('/') {
            "" => Ok(Route::Root),
            "/signin" => Ok(Route::SignIn),
            "/callback" => Ok(Route::Callback),
            "/dashboard" => Ok(Route::Dashboard),
            _ => Err(Error::Generic(format!("Unknown route `{}`", s))),
        }
    }
}

/// What to show for a requested route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// The session is still being resolved, show a loading indicator
    Loading,
    /// Navigate to another route instead
    Redirect(Route),
    /// Render the route
    Render(Route),
}

/// Resolve `route` given the state of the session
pub fn resolve(route: Route, is_loading: bool, signed_in: bool) -> Guard {
    match route {
        Route::Root => Guard::Redirect(Route::Dashboard),
        r if r.is_protected() && is_loading => Guard::Loading,
        r if r.is_protected() && !signed_in => Guard::Redirect(Route::SignIn),
        r => Guard::Render(r),
    }
}

/// Resolve `route` against the state of `session`
pub fn guard<P: IdentityProvider>(route: Route, session: &SessionStore<P>) -> Guard {
    resolve(
        route,
        session.is_loading(),
        session.current_identity().is_some(),
    )
}
