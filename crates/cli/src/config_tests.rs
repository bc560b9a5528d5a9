// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::*;

#[test]
fn subcommand_and_session_flags_parse() -> anyhow::Result<()> {
    let config = Config::try_parse_from([
        "tally",
        "--api-url",
        "http://api.test",
        "--ephemeral",
        "get",
        "/accounts",
    ])?;
    config.validate()?;
    assert_eq!(config.session.api_url, "http://api.test");
    assert!(config.session.ephemeral);
    assert!(matches!(config.command, Command::Get(ref args) if args.path == "/accounts"));
    Ok(())
}

#[test]
fn global_log_flags_work_after_subcommand() -> anyhow::Result<()> {
    let config = Config::try_parse_from(["tally", "status", "--log-format", "json"])?;
    assert_eq!(config.log_format, "json");
    assert_eq!(config.log_level, "warn");
    Ok(())
}

#[test]
fn login_takes_username_and_optional_password() -> anyhow::Result<()> {
    let config = Config::try_parse_from(["tally", "login", "ada", "--password", "pw"])?;
    let Command::Login(args) = config.command else {
        anyhow::bail!("expected login");
    };
    assert_eq!(args.username, "ada");
    assert_eq!(args.password.as_deref(), Some("pw"));
    Ok(())
}

#[test]
fn missing_subcommand_is_an_error() {
    assert!(Config::try_parse_from(["tally"]).is_err());
}

#[yare::parameterized(
    bad_format  = { &["tally", "--log-format", "xml", "status"] },
    zero_timeout = { &["tally", "--request-timeout-ms", "0", "status"] },
    not_http    = { &["tally", "--api-url", "ftp://api.test", "status"] },
)]
fn validate_rejects(args: &[&str]) {
    let config = Config::try_parse_from(args.iter().copied());
    assert!(config.is_ok_and(|c| c.validate().is_err()));
}
