//! Integration tests for the remote login handshake and profile fetch.
//!
//! A `wiremock` server plays the remote wiki API:
//! 1. Scripted `NeedToken` / `Success` replies exercise the token loop.
//! 2. `Set-Cookie` headers verify that cookies are carried by hand.
//! 3. Failing replies verify that every transport problem ends in `Unknown`.

#![allow(clippy::unwrap_used)]

use anyhow::Result;
use secrecy::SecretString;
use serde_json::json;
use std::{
    net::TcpListener,
    sync::Arc,
    time::{Duration, Instant},
};
use stubauth::remote::{
    LoginOutcome, MAX_LOGIN_ATTEMPTS, PreferenceImport, ProviderConfig, RemoteAuthClient,
    RemoteCredentials,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/w/api.php";
const PREFS_PATH: &str = "/wiki/Special:Preferences";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn credentials() -> RemoteCredentials {
    RemoteCredentials::new("Alice", SecretString::from("secret".to_string()))
}

fn client(server: &MockServer) -> Result<RemoteAuthClient> {
    let config = ProviderConfig::new(&format!("{}{API_PATH}", server.uri()))?
        .with_preferences_page_url(&format!("{}{PREFS_PATH}", server.uri()))?
        .with_timeout_seconds(5)
        .with_preference_import(PreferenceImport::All);
    Ok(RemoteAuthClient::new(Arc::new(config))?)
}

fn need_token(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "login": {"result": "NeedToken", "token": token}
    }))
}

#[tokio::test]
async fn need_token_then_success_resends_token_and_cookie() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_string_contains("lgtoken=tok1"))
        .and(header("cookie", "wiki_session=abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"login": {"result": "Success", "lguserid": 7}}))
                .insert_header("set-cookie", "wikiUserID=7; Path=/"),
        )
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_string_contains("action=login"))
        .and(body_string_contains("lgname=Alice"))
        .respond_with(need_token("tok1").insert_header("set-cookie", "wiki_session=abc; Path=/w"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server)?;
    let outcome = client.login(&credentials()).await;

    assert_eq!(outcome, LoginOutcome::Success);
    assert_eq!(client.authenticated_user(), Some("Alice"));
    // The success reply replaced the session cookie rather than adding to it.
    assert_eq!(client.cookies().len(), 1);
    assert_eq!(
        client
            .cookies()
            .header_value(&url::Url::parse(&format!("{}{API_PATH}", server.uri()))?)
            .as_deref(),
        Some("wikiUserID=7")
    );
    Ok(())
}

#[tokio::test]
async fn repeated_need_token_stops_after_cap() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(need_token("again"))
        .expect(u64::from(MAX_LOGIN_ATTEMPTS))
        .mount(&server)
        .await;

    let mut client = client(&server)?;
    assert_eq!(client.login(&credentials()).await, LoginOutcome::Unknown);
    assert_eq!(client.authenticated_user(), None);
    Ok(())
}

#[tokio::test]
async fn non_200_status_is_unknown() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server)?;
    assert_eq!(client.login(&credentials()).await, LoginOutcome::Unknown);
    Ok(())
}

#[tokio::test]
async fn slow_reply_times_out_as_unknown() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(need_token("late").set_delay(Duration::from_secs(4)))
        .expect(1)
        .mount(&server)
        .await;

    let config =
        ProviderConfig::new(&format!("{}{API_PATH}", server.uri()))?.with_timeout_seconds(1);
    let mut client = RemoteAuthClient::new(Arc::new(config))?;

    let started = Instant::now();
    assert_eq!(client.login(&credentials()).await, LoginOutcome::Unknown);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(client.authenticated_user(), None);
    Ok(())
}

#[tokio::test]
async fn missing_login_object_is_unknown() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"batchcomplete": ""})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server)?;
    assert_eq!(client.login(&credentials()).await, LoginOutcome::Unknown);
    Ok(())
}

#[tokio::test]
async fn html_reply_is_unknown() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Main Page</html>"))
        .mount(&server)
        .await;

    let mut client = client(&server)?;
    assert_eq!(client.login(&credentials()).await, LoginOutcome::Unknown);
    Ok(())
}

#[tokio::test]
async fn wrong_plugin_pass_maps_to_wrong_password() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"login": {"result": "WrongPluginPass"}})),
        )
        .mount(&server)
        .await;

    let mut client = client(&server)?;
    assert_eq!(client.login(&credentials()).await, LoginOutcome::WrongPassword);
    Ok(())
}

#[tokio::test]
async fn profile_falls_back_to_preferences_page() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("action=login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"login": {"result": "Success"}}))
                .insert_header("set-cookie", "wiki_session=xyz; Path=/"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("action=query"))
        .and(body_string_contains("options"))
        .and(header("cookie", "wiki_session=xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"userinfo": {"id": 7, "name": "Alice", "options": {"skin": "vector"}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PREFS_PATH))
        .and(query_param("uselang", "qqx"))
        .and(header("cookie", "wiki_session=xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<form><input id="wpRealName" name="wpRealName" value="Alice &amp; Co">
               <input name="wpemailaddress" type="email" value="alice@example.com"></form>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server)?;
    assert_eq!(client.login(&credentials()).await, LoginOutcome::Success);

    let profile = client.fetch_profile(true).await;
    assert_eq!(profile.real_name.as_deref(), Some("Alice & Co"));
    assert_eq!(profile.email.as_deref(), Some("alice@example.com"));
    assert!(profile.email_authenticated_at.is_none());
    assert_eq!(
        profile
            .preferences
            .as_ref()
            .and_then(|prefs| prefs.get("skin"))
            .map(String::as_str),
        Some("vector")
    );
    Ok(())
}

#[tokio::test]
async fn failed_preferences_scrape_leaves_profile_empty() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("action=login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"login": {"result": "Success"}})),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("action=query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"userinfo": {"id": 7, "name": "Alice"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PREFS_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server)?;
    assert_eq!(client.login(&credentials()).await, LoginOutcome::Success);

    let profile = client.fetch_profile(false).await;
    assert!(profile.is_empty());
    assert!(profile.real_name.is_none());
    assert!(profile.email.is_none());
    assert!(profile.preferences.is_none());
    Ok(())
}

#[tokio::test]
async fn logout_clears_session() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("action=login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"login": {"result": "Success"}}))
                .insert_header("set-cookie", "wiki_session=xyz; Path=/"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("action=logout"))
        .and(header("cookie", "wiki_session=xyz"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server)?;
    assert_eq!(client.login(&credentials()).await, LoginOutcome::Success);

    client.logout().await;
    assert!(client.cookies().is_empty());
    assert_eq!(client.authenticated_user(), None);
    Ok(())
}
