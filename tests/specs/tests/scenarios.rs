// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios: the real `tally` binary against a mock API.

use tally_session::test_support::{expired_token, jwt_label, MOCK_PASSWORD, MOCK_USERNAME};
use tally_specs::Workspace;

fn persisted_access(ws: &Workspace) -> anyhow::Result<Option<String>> {
    let path = ws.state_dir().join("credentials.json");
    if !path.exists() {
        return Ok(None);
    }
    let creds: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    Ok(creds["access"].as_str().map(str::to_owned))
}

#[tokio::test]
async fn login_then_authenticated_get() -> anyhow::Result<()> {
    let ws = Workspace::start().await?;

    let login = ws.login().await?;
    assert!(login.success(), "{login:?}");
    assert_eq!(login.json()?["user"]["username"], MOCK_USERNAME);

    let get = ws.run(&["get", "/accounts"]).await?;
    assert!(get.success(), "{get:?}");
    assert_eq!(get.json()?["accounts"][0]["id"], "acc-1");
    assert_eq!(ws.api.refresh_calls(), 0);

    let whoami = ws.run(&["whoami"]).await?;
    assert_eq!(whoami.json()?["username"], MOCK_USERNAME);
    Ok(())
}

#[tokio::test]
async fn password_can_come_from_stdin() -> anyhow::Result<()> {
    let ws = Workspace::start().await?;
    let input = format!("{MOCK_PASSWORD}\n");
    let login = ws.run_with_stdin(&["login", MOCK_USERNAME], Some(&input)).await?;
    assert!(login.success(), "{login:?}");
    assert_eq!(ws.api.token_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn wrong_password_stays_logged_out() -> anyhow::Result<()> {
    let ws = Workspace::start().await?;
    let login = ws.run(&["login", MOCK_USERNAME, "--password", "nope"]).await?;
    assert_eq!(login.code, Some(1));
    assert!(login.stderr.contains("invalid username or password"), "{login:?}");

    let status = ws.run(&["status"]).await?;
    assert_eq!(status.json()?["logged_in"], false);
    Ok(())
}

#[tokio::test]
async fn expired_token_is_renewed_once_and_persisted() -> anyhow::Result<()> {
    let ws = Workspace::start().await?;
    ws.api.set_login_access(expired_token("A1"));
    assert!(ws.login().await?.success());

    let status = ws.run(&["status"]).await?;
    assert_eq!(status.json()?["access_expired"], true);

    assert!(ws.run(&["get", "/accounts"]).await?.success());
    assert_eq!(ws.api.refresh_calls(), 1);
    assert_eq!(ws.api.refreshes_seen(), vec!["R1".to_owned()]);

    // The renewed token was written back, so the next process reuses it.
    let access = persisted_access(&ws)?.unwrap_or_default();
    assert_eq!(jwt_label(&access).as_deref(), Some("A2"));
    assert!(ws.run(&["get", "/accounts"]).await?.success());
    assert_eq!(ws.api.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn revoked_token_is_replayed_after_renewal() -> anyhow::Result<()> {
    let ws = Workspace::start().await?;
    assert!(ws.login().await?.success());
    let access = persisted_access(&ws)?.unwrap_or_default();
    ws.api.revoke(&access);

    let get = ws.run(&["get", "/accounts"]).await?;
    assert!(get.success(), "{get:?}");
    assert_eq!(ws.api.refresh_calls(), 1);
    assert_eq!(ws.api.business_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn denied_renewal_logs_out() -> anyhow::Result<()> {
    let ws = Workspace::start().await?;
    ws.api.set_login_access(expired_token("A1"));
    assert!(ws.login().await?.success());
    ws.api.set_refresh_status(401);

    let get = ws.run(&["get", "/accounts"]).await?;
    assert_eq!(get.code, Some(1));
    assert!(get.stderr.contains("logged out"), "{get:?}");
    assert_eq!(ws.api.business_calls(), 0);

    assert_eq!(persisted_access(&ws)?, None);
    let status = ws.run(&["status"]).await?;
    assert_eq!(status.json()?["logged_in"], false);
    Ok(())
}

#[tokio::test]
async fn logout_removes_persisted_state() -> anyhow::Result<()> {
    let ws = Workspace::start().await?;
    assert!(ws.login().await?.success());
    assert!(ws.state_dir().join("user.json").exists());

    let logout = ws.run(&["logout"]).await?;
    assert!(logout.success(), "{logout:?}");
    assert!(!ws.state_dir().join("credentials.json").exists());
    assert!(!ws.state_dir().join("user.json").exists());

    let whoami = ws.run(&["whoami"]).await?;
    assert_eq!(whoami.code, Some(1));

    // Logging out twice is fine.
    assert!(ws.run(&["logout"]).await?.success());
    Ok(())
}

#[tokio::test]
async fn invalid_flags_exit_with_usage_code() -> anyhow::Result<()> {
    let ws = Workspace::start().await?;
    let out = ws.run(&["--log-format", "xml", "status"]).await?;
    assert_eq!(out.code, Some(2));
    Ok(())
}
