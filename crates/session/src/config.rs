// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::api::Endpoints;

/// Configuration for a client session against the remote API.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Base URL of the remote API.
    #[arg(long, default_value = "http://127.0.0.1:8000", env = "TALLY_API_URL")]
    pub api_url: String,

    /// Directory for persisted session state.
    #[arg(long, env = "TALLY_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Keep session state in memory only.
    #[arg(long, env = "TALLY_EPHEMERAL")]
    pub ephemeral: bool,

    /// Per-request timeout in milliseconds (applies to renewal too).
    #[arg(long, default_value_t = 30000, env = "TALLY_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Renew access tokens this many seconds before they expire.
    #[arg(long, default_value_t = 0, env = "TALLY_EXPIRY_LEEWAY_SECS")]
    pub expiry_leeway_secs: u64,

    /// Path of the credential issue endpoint.
    #[arg(long, default_value = "/token", env = "TALLY_TOKEN_PATH")]
    pub token_path: String,

    /// Path of the credential renewal endpoint.
    #[arg(long, default_value = "/token/refresh", env = "TALLY_REFRESH_PATH")]
    pub refresh_path: String,

    /// Path of the identity endpoint.
    #[arg(long, default_value = "/user", env = "TALLY_USER_PATH")]
    pub user_path: String,
}

impl SessionConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        let endpoints = Endpoints::default();
        Self {
            api_url: api_url.into(),
            state_dir: None,
            ephemeral: false,
            request_timeout_ms: 30000,
            expiry_leeway_secs: 0,
            token_path: endpoints.token,
            refresh_path: endpoints.refresh,
            user_path: endpoints.user,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn expiry_leeway(&self) -> Duration {
        Duration::from_secs(self.expiry_leeway_secs)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            token: self.token_path.clone(),
            refresh: self.refresh_path.clone(),
            user: self.user_path.clone(),
        }
    }

    /// Explicit `--state-dir`, else the default location.
    pub fn resolved_state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }
}

/// Resolve the default state directory.
///
/// Checks `$XDG_STATE_HOME/tally`, then `$HOME/.local/state/tally`.
pub fn default_state_dir() -> PathBuf {
    default_state_dir_with(|name| std::env::var(name).ok())
}

pub fn default_state_dir_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(xdg) = env("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("tally");
    }
    if let Some(home) = env("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home).join(".local/state/tally");
    }
    PathBuf::from(".tally")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use clap::Parser;

    use super::*;

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        session: SessionConfig,
    }

    #[test]
    fn state_dir_prefers_xdg() {
        let dir = default_state_dir_with(env_from(&[
            ("XDG_STATE_HOME", "/xdg/state"),
            ("HOME", "/home/ada"),
        ]));
        assert_eq!(dir, PathBuf::from("/xdg/state/tally"));
    }

    #[test]
    fn state_dir_falls_back_to_home() {
        let dir = default_state_dir_with(env_from(&[("HOME", "/home/ada")]));
        assert_eq!(dir, PathBuf::from("/home/ada/.local/state/tally"));
    }

    #[test]
    fn state_dir_last_resort_is_relative() {
        assert_eq!(default_state_dir_with(env_from(&[])), PathBuf::from(".tally"));
    }

    #[test]
    fn flags_parse_into_config() -> anyhow::Result<()> {
        let parsed = Harness::try_parse_from([
            "tally",
            "--api-url",
            "http://api.test",
            "--expiry-leeway-secs",
            "15",
            "--refresh-path",
            "/auth/refresh",
            "--ephemeral",
        ])?;
        let cfg = parsed.session;
        assert_eq!(cfg.api_url, "http://api.test");
        assert_eq!(cfg.expiry_leeway(), Duration::from_secs(15));
        assert_eq!(cfg.endpoints().refresh, "/auth/refresh");
        assert_eq!(cfg.endpoints().token, "/token");
        assert!(cfg.ephemeral);
        Ok(())
    }

    #[test]
    fn new_matches_flag_defaults() {
        let cfg = SessionConfig::new("http://api.test");
        assert_eq!(cfg.endpoints(), Endpoints::default());
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.expiry_leeway(), Duration::ZERO);
    }
}
