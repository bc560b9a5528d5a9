// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: `login`, `logout`, `whoami`, `status`, `get`.

pub mod get;
pub mod login;
pub mod status;

/// A `tally` subcommand.
#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Exchange username/password for a session.
    Login(login::LoginArgs),
    /// Forget the current session.
    Logout,
    /// Print the cached profile of the logged-in user.
    Whoami,
    /// Print whether a session exists and when its access token expires.
    Status,
    /// Send an authenticated GET and print the response body.
    Get(get::GetArgs),
}
