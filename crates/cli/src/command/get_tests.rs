// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tally_session::api::build_http_client;
use tally_session::test_support::{expired_token, MockApi, MOCK_PASSWORD, MOCK_USERNAME};

use super::*;

async fn logged_in(api: &MockApi) -> anyhow::Result<Session> {
    let session = Session::builder(build_http_client(Duration::from_secs(5))?, &api.url()).build();
    session.login(MOCK_USERNAME, MOCK_PASSWORD).await?;
    Ok(session)
}

fn args(path: &str) -> GetArgs {
    GetArgs { path: path.to_owned() }
}

#[tokio::test]
async fn prints_body_on_success() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let session = logged_in(&api).await?;

    let body = run(&session, &args("/accounts")).await?;
    let json: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(json["accounts"][0]["balance"], "120.00");
    Ok(())
}

#[tokio::test]
async fn denied_renewal_logs_out() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    api.set_login_access(expired_token("A1"));
    let session = logged_in(&api).await?;
    api.set_refresh_status(401);

    let err = run(&session, &args("/accounts")).await.err();
    let message = err.map(|e| format!("{e:#}")).unwrap_or_default();
    assert!(message.starts_with("session expired; logged out"), "{message}");
    assert!(!session.is_logged_in());
    assert_eq!(api.business_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn renewal_server_error_logs_out() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    api.set_login_access(expired_token("A1"));
    let session = logged_in(&api).await?;
    api.set_refresh_status(503);

    assert!(run(&session, &args("/accounts")).await.is_err());
    assert!(!session.is_logged_in());
    Ok(())
}

#[tokio::test]
async fn unreachable_renewal_keeps_session() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    api.set_login_access(expired_token("A1"));
    let http = build_http_client(Duration::from_millis(300))?;
    let session = Session::builder(http, &api.url()).build();
    session.login(MOCK_USERNAME, MOCK_PASSWORD).await?;
    api.set_refresh_delay(Duration::from_secs(3));

    let err = run(&session, &args("/accounts")).await.err();
    let message = err.map(|e| format!("{e:#}")).unwrap_or_default();
    assert!(!message.contains("logged out"), "{message}");
    assert!(session.is_logged_in());
    Ok(())
}

#[tokio::test]
async fn non_success_status_is_an_error() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let session = logged_in(&api).await?;

    let err = run(&session, &args("/nowhere")).await.err();
    let message = err.map(|e| e.to_string()).unwrap_or_default();
    assert!(message.contains("404"), "{message}");
    assert!(session.is_logged_in());
    Ok(())
}
