// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary tests.
//!
//! Runs a mock API in-process and invokes the real `tally` binary against
//! it, one subprocess per command, with state kept in a temp directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tally_session::test_support::MockApi;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub use tally_session::api::ensure_crypto;

const TIMEOUT: Duration = Duration::from_secs(20);

/// Resolve the path to the compiled `tally` binary.
pub fn tally_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    let target = std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| workspace.join("target"));
    target.join("debug").join("tally")
}

/// Captured result of one `tally` invocation.
#[derive(Debug)]
pub struct Outcome {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Outcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Parse stdout as one JSON document.
    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(self.stdout.trim())?)
    }
}

/// A mock API plus an isolated state directory for the CLI.
pub struct Workspace {
    pub api: MockApi,
    state_dir: tempfile::TempDir,
}

impl Workspace {
    pub async fn start() -> anyhow::Result<Self> {
        ensure_crypto();
        let binary = tally_binary();
        anyhow::ensure!(binary.exists(), "tally binary not found at {}", binary.display());
        Ok(Self { api: MockApi::start().await?, state_dir: tempfile::tempdir()? })
    }

    pub fn state_dir(&self) -> &Path {
        self.state_dir.path()
    }

    /// Run `tally <args>` against the mock API.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<Outcome> {
        self.run_with_stdin(args, None).await
    }

    pub async fn run_with_stdin(
        &self,
        args: &[&str],
        stdin: Option<&str>,
    ) -> anyhow::Result<Outcome> {
        let mut child = Command::new(tally_binary())
            .args(args)
            .env("TALLY_API_URL", self.api.url())
            .env("TALLY_STATE_DIR", self.state_dir.path())
            .env("TALLY_LOG_FORMAT", "text")
            .env("TALLY_LOG_LEVEL", "warn")
            .env_remove("TALLY_PASSWORD")
            .env_remove("TALLY_EPHEMERAL")
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            drop(pipe);
        }

        let output = tokio::time::timeout(TIMEOUT, child.wait_with_output()).await??;
        Ok(Outcome {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// `tally login` with the mock API's valid credentials.
    pub async fn login(&self) -> anyhow::Result<Outcome> {
        use tally_session::test_support::{MOCK_PASSWORD, MOCK_USERNAME};
        self.run(&["login", MOCK_USERNAME, "--password", MOCK_PASSWORD]).await
    }
}
