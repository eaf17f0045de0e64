use crate::remote::{ProviderConfig, RemoteAuthClient, RemoteCredentials, RemoteProfile};
use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug)]
pub struct Args {
    pub config: ProviderConfig,
    pub username: String,
    pub password: SecretString,
    pub want_preferences: bool,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    username: &'a str,
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<RemoteProfile>,
}

/// Log in to the remote wiki without touching any local state.
/// # Errors
/// Returns an error if the remote rejects the login.
pub async fn execute(args: Args) -> Result<()> {
    let mut client = RemoteAuthClient::new(Arc::new(args.config))?;
    let credentials = RemoteCredentials::new(args.username, args.password);

    let outcome = client.login(&credentials).await;
    let failure = outcome.failure(&credentials.username);

    let profile = if outcome.is_success() {
        let profile = client.fetch_profile(args.want_preferences).await;
        client.logout().await;
        Some(profile)
    } else {
        None
    };

    let report = Report {
        username: &credentials.username,
        result: outcome.as_str(),
        message: failure.as_ref().map(ToString::to_string),
        profile,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize login report")?
    );

    if let Some(failure) = failure {
        bail!("remote login failed: {failure}");
    }
    Ok(())
}
