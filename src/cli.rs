// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Command line front-end
//!
//! [`make_cli`] describes the flags of the `anchorwatch` binary, [`make_repl_subcommands`] the
//! commands accepted by its interactive shell. A [`Repl`] executes the parsed commands against
//! an [`AddressBrowser`], a [`SessionStore`] and a [`SignInFlow`].

use std::fmt::Write;
use std::str::FromStr;
use std::time::Instant;

use chrono::{Local, TimeZone};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

#[allow(unused_imports)]
use log::{debug, error, info, trace, LevelFilter};

use bitcoin::Address;

use crate::auth::{complete_sign_in, IdentityProvider, RedirectOutcome, SessionStore, SignInFlow};
use crate::blockchain::TransactionSource;
use crate::browser::{AddressBrowser, PageItem, PageView, Pagination};
use crate::config::AppConfig;
use crate::database::Store;
use crate::error::Error;
use crate::routes::{self, Guard, Route};
use crate::types::SortKey;

/// Configuration file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "anchorwatch.json";

fn address_validator(s: String) -> Result<(), String> {
    Address::from_str(&s)
        .map(|_| ())
        .map_err(|e| format!("Invalid address: {}", e))
}

fn page_validator(s: String) -> Result<(), String> {
    match usize::from_str(&s) {
        Ok(n) if n > 0 => Ok(()),
        Ok(_) => Err("Pages start at 1".to_string()),
        Err(e) => Err(format!("{:?}", e)),
    }
}

/// Flags of the `anchorwatch` binary
pub fn make_cli<'a, 'b>() -> App<'a, 'b> {
    App::new("AnchorWatch")
        .version(option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"))
        .author(option_env!("CARGO_PKG_AUTHORS").unwrap_or(""))
        .about("Browse the transaction history of a Bitcoin address")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Sets the configuration file")
                .takes_value(true)
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::with_name("network")
                .short("n")
                .long("network")
                .value_name("NETWORK")
                .help("Overrides the network of the configuration")
                .takes_value(true)
                .possible_values(&["bitcoin", "testnet", "signet", "regtest"]),
        )
        .arg(
            Arg::with_name("esplora")
                .short("e")
                .long("esplora")
                .value_name("URL")
                .help("Overrides the Esplora server, eg. https://blockstream.info/api")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("data_dir")
                .short("d")
                .long("data_dir")
                .value_name("DIR")
                .help("Overrides the directory of the local database")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
}

/// Apply the command line overrides to `config`
pub fn apply_overrides(config: &mut AppConfig, matches: &ArgMatches<'_>) {
    if let Some(network) = matches.value_of("network") {
        config.network = Some(network.to_string());
    }
    if let Some(url) = matches.value_of("esplora") {
        config.esplora = Some(crate::blockchain::esplora::EsploraConfig::new(
            url.to_string(),
        ));
    }
    if let Some(dir) = matches.value_of("data_dir") {
        config.data_dir = Some(dir.into());
    }
}

/// Log level for the number of `-v` flags
pub fn log_level(matches: &ArgMatches<'_>) -> LevelFilter {
    match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Commands of the interactive shell
pub fn make_repl_subcommands<'a, 'b>() -> App<'a, 'b> {
    App::new("")
        .setting(AppSettings::NoBinaryName)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .setting(AppSettings::DisableVersion)
        .subcommand(
            SubCommand::with_name("signin")
                .about("Emails a sign-in link")
                .arg(
                    Arg::with_name("email")
                        .value_name("EMAIL")
                        .help("Email to send the link to")
                        .required(true),
                ),
        )
        .subcommand(SubCommand::with_name("resend").about("Sends the sign-in link again"))
        .subcommand(
            SubCommand::with_name("callback")
                .about("Completes the sign-in with the link received by email")
                .arg(
                    Arg::with_name("link")
                        .value_name("URL")
                        .help("Sign-in link")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("search")
                .about("Lists the transactions of an address")
                .arg(
                    Arg::with_name("address")
                        .value_name("ADDRESS")
                        .required(true)
                        .validator(address_validator),
                ),
        )
        .subcommand(
            SubCommand::with_name("page")
                .about("Jumps to a page, fetching more transactions if needed")
                .arg(
                    Arg::with_name("number")
                        .value_name("N")
                        .required(true)
                        .validator(page_validator),
                ),
        )
        .subcommand(SubCommand::with_name("next").about("Moves to the next page"))
        .subcommand(SubCommand::with_name("prev").about("Moves to the previous page"))
        .subcommand(
            SubCommand::with_name("sort")
                .about("Sorts by a column, twice on the same column flips the direction")
                .arg(
                    Arg::with_name("key")
                        .value_name("KEY")
                        .required(true)
                        .possible_values(&["time", "amount", "confirmed"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("fav")
                .about("Toggles a transaction in the favorites")
                .arg(
                    Arg::with_name("txid")
                        .value_name("TXID")
                        .required(true),
                ),
        )
        .subcommand(SubCommand::with_name("show").about("Shows the current page"))
        .subcommand(SubCommand::with_name("whoami").about("Shows the signed-in user"))
        .subcommand(SubCommand::with_name("signout").about("Signs out"))
        .subcommand(SubCommand::with_name("exit").about("Leaves the shell"))
}

/// Parse a line typed in the interactive shell
pub fn parse_line(line: &str) -> Result<ArgMatches<'static>, clap::Error> {
    make_repl_subcommands().get_matches_from_safe(line.split_whitespace())
}

/// Date of a confirmation timestamp in the local timezone
pub fn format_date(confirmed_at: Option<u64>) -> String {
    confirmed_at
        .and_then(|ts| Local.timestamp_opt(ts as i64, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Render the pagination bar
pub fn render_pagination(pagination: &Pagination) -> String {
    let mut parts = Vec::new();
    if pagination.prev_enabled {
        parts.push("< prev".to_string());
    }
    for item in &pagination.items {
        parts.push(match item {
            PageItem::Page {
                number,
                active: true,
            } => format!("[{}]", number),
            PageItem::Page { number, .. } => number.to_string(),
            PageItem::Ellipsis => "...".to_string(),
        });
    }
    if pagination.next_enabled {
        parts.push("next >".to_string());
    }

    parts.join(" ")
}

/// Render the transaction table of the current page
pub fn render_page(view: &PageView<'_>, pagination: &Pagination) -> String {
    if view.address.is_empty() {
        return "Search an address with `search <ADDRESS>`".to_string();
    }

    let mut res = String::new();
    let _ = writeln!(
        res,
        "Transactions of {} (sorted by {} {})",
        view.address, view.sort_key, view.sort_direction
    );
    if let Some(err) = view.error {
        let _ = writeln!(res, "Error: {}", err);
    }
    if view.is_loading {
        let _ = writeln!(res, "Loading...");
    }

    if view.rows.is_empty() {
        let _ = writeln!(res, "No transactions");
    }
    for row in &view.rows {
        let _ = writeln!(
            res,
            "{} {} {:<19} {:>18} {}",
            if row.is_favorite { "*" } else { " " },
            row.transaction.id,
            format_date(row.transaction.confirmed_at),
            row.display_amount,
            if row.transaction.confirmed {
                "Confirmed"
            } else {
                "Unconfirmed"
            }
        );
    }

    res += &render_pagination(pagination);
    res
}

/// State of the interactive shell
#[derive(Debug)]
pub struct Repl<S, P, D> {
    browser: AddressBrowser<S, D>,
    session: SessionStore<P>,
    sign_in: SignInFlow,
    auth_store: D,
    return_url: String,
}

impl<S, P, D> Repl<S, P, D>
where
    S: TransactionSource,
    P: IdentityProvider,
    D: Store,
{
    /// Create a new shell
    ///
    /// `auth_store` keeps the pending sign-in email and the signed-in identity, it can share its
    /// backend with the browser's store. Sign-in links point to `return_url`.
    pub fn new(
        browser: AddressBrowser<S, D>,
        session: SessionStore<P>,
        auth_store: D,
        return_url: String,
    ) -> Self {
        Repl {
            browser,
            session,
            sign_in: SignInFlow::new(),
            auth_store,
            return_url,
        }
    }

    /// Return a reference to the browser
    pub fn browser(&self) -> &AddressBrowser<S, D> {
        &self.browser
    }

    /// Return a reference to the session
    pub fn session(&self) -> &SessionStore<P> {
        &self.session
    }

    /// Execute a command parsed by [`parse_line`]
    pub async fn handle_matches(
        &mut self,
        matches: ArgMatches<'_>,
        now: Instant,
    ) -> Result<Option<String>, Error> {
        if let Some(sub_matches) = matches.subcommand_matches("signin") {
            let email = sub_matches.value_of("email").unwrap_or_default();
            self.sign_in.set_email(email);
            self.send_link(now).await
        } else if matches.subcommand_matches("resend").is_some() {
            if self.sign_in.email().is_empty() {
                return Err(Error::Generic(
                    "No email to resend to, use `signin <EMAIL>`".to_string(),
                ));
            }
            self.send_link(now).await
        } else if let Some(sub_matches) = matches.subcommand_matches("callback") {
            let link = sub_matches.value_of("link").unwrap_or_default();
            let outcome =
                complete_sign_in(self.session.provider(), &mut self.auth_store, link).await?;
            let route = outcome.route();

            Ok(Some(match outcome {
                RedirectOutcome::Completed(identity) => format!(
                    "Signed in as {}",
                    identity.email.as_deref().unwrap_or(identity.uid.as_str())
                ),
                RedirectOutcome::MissingEmail => {
                    "No sign-in in progress, use `signin <EMAIL>`".to_string()
                }
                RedirectOutcome::NotASignInLink => "Not a sign-in link".to_string(),
            })
            .map(|msg| match route {
                Some(route) => format!("{}\n-> {}", msg, route),
                None => msg,
            }))
        } else if matches.subcommand_matches("whoami").is_some() {
            Ok(Some(match self.session.current_identity() {
                Some(identity) => format!(
                    "{} ({})",
                    identity.email.as_deref().unwrap_or("-"),
                    identity.uid
                ),
                None => "Not signed in".to_string(),
            }))
        } else if matches.subcommand_matches("signout").is_some() {
            self.session.sign_out().await?;
            self.auth_store.del_identity()?;
            Ok(Some(format!("Signed out\n-> {}", Route::Root)))
        } else {
            self.handle_dashboard(matches).await
        }
    }

    async fn handle_dashboard(&mut self, matches: ArgMatches<'_>) -> Result<Option<String>, Error> {
        match routes::guard(Route::Dashboard, &self.session) {
            Guard::Render(_) => {}
            Guard::Loading => return Ok(Some("Loading...".to_string())),
            Guard::Redirect(route) => {
                return Err(Error::Auth(format!(
                    "not signed in, use `signin <EMAIL>` ({})",
                    route
                )))
            }
        }

        if let Some(sub_matches) = matches.subcommand_matches("search") {
            let address = sub_matches.value_of("address").unwrap_or_default();
            self.browser.submit_query(address).await?;
        } else if let Some(sub_matches) = matches.subcommand_matches("page") {
            let page = sub_matches
                .value_of("number")
                .map(usize::from_str)
                .transpose()
                .map_err(|e| Error::Generic(e.to_string()))?
                .unwrap_or(1);
            self.browser.set_page(page).await?;
        } else if matches.subcommand_matches("next").is_some() {
            self.browser.next_page().await?;
        } else if matches.subcommand_matches("prev").is_some() {
            self.browser.prev_page();
        } else if let Some(sub_matches) = matches.subcommand_matches("sort") {
            let key = SortKey::from_str(sub_matches.value_of("key").unwrap_or_default())?;
            self.browser.set_sort_key(key, true);
        } else if let Some(sub_matches) = matches.subcommand_matches("fav") {
            let txid = sub_matches.value_of("txid").unwrap_or_default();
            let added = self.browser.toggle_favorite(txid)?;
            return Ok(Some(format!(
                "{} {} favorites",
                txid,
                if added { "added to" } else { "removed from" }
            )));
        } else if matches.subcommand_matches("show").is_none() {
            return Ok(None);
        }

        Ok(Some(render_page(
            &self.browser.view(),
            &self.browser.pagination(),
        )))
    }

    async fn send_link(&mut self, now: Instant) -> Result<Option<String>, Error> {
        self.sign_in
            .send_link(
                self.session.provider(),
                &mut self.auth_store,
                &self.return_url,
                now,
            )
            .await?;

        Ok(self.sign_in.message().map(str::to_string))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::auth::test::{identity, FakeProvider, VALID_LINK};
    use crate::database::MemoryStore;
    use crate::types::{Transaction, TxInput, TxOutput};

    const ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

    #[derive(Debug, Default)]
    struct FixedSource;

    #[async_trait(?Send)]
    impl TransactionSource for FixedSource {
        async fn address_txs(
            &self,
            address: &str,
            after: Option<&str>,
        ) -> Result<Vec<Transaction>, Error> {
            if after.is_some() {
                return Ok(vec![]);
            }

            Ok((0..12)
                .map(|i| Transaction {
                    id: format!("tx{:02}", i),
                    confirmed_at: Some(1_700_000_000 + i),
                    confirmed: true,
                    inputs: if i % 2 == 0 {
                        vec![TxInput {
                            source_address: Some(address.to_string()),
                        }]
                    } else {
                        vec![]
                    },
                    outputs: vec![TxOutput {
                        destination_address: None,
                        amount: 150_000_000,
                    }],
                })
                .collect())
        }
    }

    fn repl() -> Repl<FixedSource, FakeProvider, MemoryStore> {
        repl_with(FakeProvider::default())
    }

    fn repl_with(provider: FakeProvider) -> Repl<FixedSource, FakeProvider, MemoryStore> {
        let browser = AddressBrowser::new(FixedSource, MemoryStore::new()).unwrap();
        let session = SessionStore::new(provider);
        Repl::new(
            browser,
            session,
            MemoryStore::new(),
            "http://localhost:3000/callback".to_string(),
        )
    }

    async fn run(repl: &mut Repl<FixedSource, FakeProvider, MemoryStore>, line: &str) -> String {
        let now = Instant::now();
        repl.handle_matches(parse_line(line).unwrap(), now)
            .await
            .unwrap()
            .unwrap_or_default()
    }

    #[test]
    fn test_parse_line() {
        let matches = parse_line(&format!("search {}", ADDRESS)).unwrap();
        assert_eq!(
            matches
                .subcommand_matches("search")
                .and_then(|m| m.value_of("address")),
            Some(ADDRESS)
        );

        assert!(parse_line("search not-an-address").is_err());
        assert!(parse_line("page 0").is_err());
        assert!(parse_line("page two").is_err());
        assert!(parse_line("sort height").is_err());
        assert!(parse_line("sort amount").is_ok());
        assert!(parse_line("launch").is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let matches = make_cli().get_matches_from(vec![
            "anchorwatch",
            "-n",
            "testnet",
            "--esplora",
            "https://blockstream.info/testnet/api",
            "-vv",
        ]);
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &matches);

        assert_eq!(config.network.as_deref(), Some("testnet"));
        assert_eq!(
            config.esplora().unwrap().base_url,
            "https://blockstream.info/testnet/api"
        );
        assert_eq!(log_level(&matches), LevelFilter::Debug);
        assert_eq!(matches.value_of("config"), Some(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn test_render_pagination() {
        assert_eq!(
            render_pagination(&Pagination::new(1, 7, false)),
            "[1] 2 3 4 5 ... 7 next >"
        );
        assert_eq!(
            render_pagination(&Pagination::new(7, 7, false)),
            "< prev 1 ... 5 6 [7]"
        );
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(None), "-");
        assert_eq!(format_date(Some(1_700_000_000)).len(), 19);
    }

    #[tokio::test]
    async fn test_dashboard_requires_sign_in() {
        let mut repl = repl();
        let err = repl
            .handle_matches(parse_line("show").unwrap(), Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_full_session() {
        let mut repl = repl();

        let out = run(&mut repl, "signin alice@example.com").await;
        assert!(out.starts_with("Check your inbox"));

        let out = run(&mut repl, &format!("callback {}", VALID_LINK)).await;
        assert_eq!(out, "Signed in as alice@example.com\n-> /dashboard");
        assert_eq!(run(&mut repl, "whoami").await, "alice@example.com (uid-alice@example.com)");

        let out = run(&mut repl, &format!("search {}", ADDRESS)).await;
        assert!(out.contains("tx11"));
        assert!(out.contains("-1.50000000"));
        assert!(out.ends_with("[1] 2 next >"));
        assert_eq!(repl.browser().state().buffer().len(), 12);

        let out = run(&mut repl, "next").await;
        assert!(out.contains("tx00"));
        assert!(out.ends_with("< prev 1 [2]"));

        assert_eq!(run(&mut repl, "fav tx00").await, "tx00 added to favorites");
        assert!(run(&mut repl, "show").await.contains("* tx00"));

        assert!(repl.auth_store.get_identity().unwrap().is_some());
        let out = run(&mut repl, "signout").await;
        assert_eq!(out, "Signed out\n-> /");
        assert!(repl.session().current_identity().is_none());
        assert_eq!(repl.auth_store.get_identity().unwrap(), None);
    }

    #[tokio::test]
    async fn test_dashboard_waits_for_session() {
        let mut repl = repl_with(FakeProvider::deferred());
        assert!(repl.session().is_loading());
        assert_eq!(run(&mut repl, "show").await, "Loading...");
        assert_eq!(run(&mut repl, &format!("search {}", ADDRESS)).await, "Loading...");
        assert!(repl.browser().state().queried_address().is_empty());

        repl.session()
            .provider()
            .notifier
            .set(Some(identity("alice@example.com")));
        assert!(!repl.session().is_loading());
        assert_eq!(
            run(&mut repl, "show").await,
            "Search an address with `search <ADDRESS>`"
        );
    }

    #[tokio::test]
    async fn test_dashboard_redirects_once_resolved() {
        let mut repl = repl_with(FakeProvider::deferred());
        assert_eq!(run(&mut repl, "show").await, "Loading...");

        repl.session().provider().notifier.set(None);
        let err = repl
            .handle_matches(parse_line("show").unwrap(), Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_page_far_past_the_end() {
        let mut repl = repl();
        run(&mut repl, "signin alice@example.com").await;
        run(&mut repl, &format!("callback {}", VALID_LINK)).await;
        run(&mut repl, &format!("search {}", ADDRESS)).await;

        let out = run(&mut repl, &format!("page {}", usize::MAX)).await;
        assert!(out.contains("No transactions"));
        assert!(out.ends_with("< prev 1 ..."));

        let out = run(&mut repl, "next").await;
        assert!(out.ends_with("< prev 1 ..."));
        assert_eq!(repl.browser().state().page(), usize::MAX);
    }

    #[tokio::test]
    async fn test_resend_cooldown() {
        let mut repl = repl();
        let start = Instant::now();

        let err = repl
            .handle_matches(parse_line("resend").unwrap(), start)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generic(_)));

        repl.handle_matches(parse_line("signin bob@example.com").unwrap(), start)
            .await
            .unwrap();
        let err = repl
            .handle_matches(
                parse_line("resend").unwrap(),
                start + Duration::from_secs(10),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Resend available in 20 seconds");

        repl.handle_matches(
            parse_line("resend").unwrap(),
            start + Duration::from_secs(31),
        )
        .await
        .unwrap();
        assert_eq!(repl.session().provider().sent.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_callback_without_pending_email() {
        let mut repl = repl();
        let out = run(&mut repl, &format!("callback {}", VALID_LINK)).await;
        assert_eq!(out, "No sign-in in progress, use `signin <EMAIL>`\n-> /signin");
    }
}
