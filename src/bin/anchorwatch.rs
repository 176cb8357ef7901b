// AnchorWatch
//
// Copyright (c) 2024 AnchorWatch Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::fs;
use std::io::{self, BufRead, Write};
use std::time::Instant;

use clap::ArgMatches;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use anchorwatch::auth::{restore_session, FirebaseAuth, SessionStore};
use anchorwatch::blockchain::EsploraClient;
use anchorwatch::cli::{self, Repl};
use anchorwatch::sled;
use anchorwatch::{AddressBrowser, AppConfig, Error};

const TREE_NAME: &str = "anchorwatch";

fn main() {
    let matches = cli::make_cli().get_matches();

    let level = cli::log_level(&matches).to_string();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches<'_>) -> Result<(), Error> {
    let config_file = matches
        .value_of("config")
        .unwrap_or(cli::DEFAULT_CONFIG_FILE);
    let mut config = AppConfig::load(config_file)?;
    cli::apply_overrides(&mut config, matches);
    debug!("network: {:?}", config.network()?);

    let esplora = config.esplora()?;
    info!("Using Esplora server {}", esplora.base_url);
    let client = EsploraClient::from_config(&esplora)?;

    let data_dir = config.data_dir();
    if !data_dir.exists() {
        info!("Creating data directory {}", data_dir.display());
        fs::create_dir_all(&data_dir)?;
    }
    let database = sled::open(&data_dir)?;
    let tree = database.open_tree(TREE_NAME)?;
    debug!("database opened successfully");

    let browser = AddressBrowser::new(client, tree.clone())?;
    let auth = FirebaseAuth::new(config.auth.clone());
    restore_session(&auth, &tree)?;
    let session = SessionStore::new(auth);
    let mut repl = Repl::new(browser, session, tree, config.auth.continue_url.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(repl_loop(&mut repl))
}

async fn repl_loop<S, P, D>(repl: &mut Repl<S, P, D>) -> Result<(), Error>
where
    S: anchorwatch::blockchain::TransactionSource,
    P: anchorwatch::auth::IdentityProvider,
    D: anchorwatch::database::Store,
{
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!(">> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let matches = match cli::parse_line(&line) {
            Ok(matches) => matches,
            Err(err) => {
                println!("{}", err.message);
                continue;
            }
        };
        if matches.subcommand_matches("exit").is_some() {
            break;
        }

        match repl.handle_matches(matches, Instant::now()).await {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(e) => println!("{}", e),
        }
    }

    Ok(())
}
