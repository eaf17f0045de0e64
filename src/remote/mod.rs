//! Client side of the remote wiki: login handshake, cookies and profile data.
//!
//! Everything here talks to the remote API over plain `reqwest` requests. The
//! session cookie is carried manually through [`CookieStore`], which is
//! replaced wholesale by every response that sets cookies.

mod client;
mod config;
mod cookies;
mod outcome;
mod profile;
pub mod scrape;

pub use client::{HandshakeState, MAX_LOGIN_ATTEMPTS, RemoteAuthClient, RemoteCredentials};
pub use config::{
    ConfigError, DEFAULT_THROTTLE_SECONDS, DEFAULT_TIMEOUT_SECONDS, PreferenceImport,
    ProviderConfig,
};
pub use cookies::{Cookie, CookieStore};
pub use outcome::{LoginFailure, LoginOutcome, format_duration};
pub use profile::{ProfileFetcher, RemoteProfile};

use reqwest::{
    Client, StatusCode,
    header::{COOKIE, SET_COOKIE},
};
use serde_json::Value;
use thiserror::Error;
use tracing::{Instrument, info_span};
use url::Url;

/// Transport level failure talking to the remote wiki.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("{url} did not return valid JSON: {source}, body: {body}")]
    InvalidJson {
        url: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Longest slice of a response body kept for log diagnostics.
pub const BODY_SNIPPET_CHARS: usize = 200;

/// Truncate a response body for logging.
#[must_use]
pub fn body_snippet(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}

/// Raw reply from the remote wiki: decoded body plus the `Set-Cookie` headers.
pub(crate) struct ApiReply<T> {
    pub body: T,
    pub set_cookies: Vec<String>,
}

/// Build the HTTP client used for every remote call.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(config: &ProviderConfig) -> Result<Client, ConfigError> {
    Ok(Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .timeout(config.timeout())
        .build()?)
}

/// POST a form to the API endpoint with the cookies scoped to it.
pub(crate) async fn post_form(
    http: &Client,
    url: &Url,
    cookies: &CookieStore,
    form: &[(&str, &str)],
) -> Result<ApiReply<Value>, RemoteError> {
    let mut request = http.post(url.clone()).form(form);
    if let Some(cookie) = cookies.header_value(url) {
        request = request.header(COOKIE, cookie);
    }

    let span = info_span!("remote.request", http.method = "POST", url = %url);
    let reply = send(request).instrument(span).await;
    let reply = reply.map_err(|err| err.with_url(url))?;

    let body = serde_json::from_str(&reply.body).map_err(|source| RemoteError::InvalidJson {
        url: url.to_string(),
        body: body_snippet(&reply.body),
        source,
    })?;

    Ok(ApiReply {
        body,
        set_cookies: reply.set_cookies,
    })
}

/// GET a page with the cookies scoped to it and return its text.
pub(crate) async fn get_page(
    http: &Client,
    url: &Url,
    cookies: &CookieStore,
) -> Result<ApiReply<String>, RemoteError> {
    let mut request = http.get(url.clone());
    if let Some(cookie) = cookies.header_value(url) {
        request = request.header(COOKIE, cookie);
    }

    let span = info_span!("remote.request", http.method = "GET", url = %url);
    send(request)
        .instrument(span)
        .await
        .map_err(|err| err.with_url(url))
}

enum SendError {
    Transport(reqwest::Error),
    Status(StatusCode, String),
}

impl SendError {
    fn with_url(self, url: &Url) -> RemoteError {
        let url = url.to_string();
        match self {
            Self::Transport(source) => RemoteError::Transport { url, source },
            Self::Status(status, body) => RemoteError::Status { url, status, body },
        }
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<ApiReply<String>, SendError> {
    let response = request.send().await.map_err(SendError::Transport)?;

    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(SendError::Status(status, body_snippet(&body)));
    }

    let set_cookies = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect();

    let body = response.text().await.map_err(SendError::Transport)?;

    Ok(ApiReply { body, set_cookies })
}
