// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use tally::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    tally::init_tracing(&config);

    match tally::run(config).await {
        Ok(output) => {
            println!("{output}");
        }
        Err(e) => {
            error!("fatal: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
