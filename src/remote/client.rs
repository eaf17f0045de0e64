use super::{
    ConfigError, CookieStore, LoginOutcome, ProfileFetcher, ProviderConfig, RemoteError,
    RemoteProfile, body_snippet, http_client, post_form,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Upper bound on `action=login` round trips for a single handshake.
pub const MAX_LOGIN_ATTEMPTS: u8 = 4;

/// Username and password submitted for remote verification.
#[derive(Debug)]
pub struct RemoteCredentials {
    pub username: String,
    pub password: SecretString,
}

impl RemoteCredentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Progress of one login handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    /// Request number `attempt` is in flight, optionally carrying a token.
    AwaitingResponse { attempt: u8, token: Option<String> },
    /// The server asked for a retry with `token`.
    NeedToken { attempt: u8, token: String },
    Terminal(LoginOutcome),
}

impl HandshakeState {
    /// Move to the next request, or to `Terminal(Unknown)` once the attempt cap is reached.
    #[must_use]
    pub fn next_request(self) -> Self {
        match self {
            Self::Start => Self::AwaitingResponse {
                attempt: 1,
                token: None,
            },
            Self::NeedToken { attempt, token } if attempt < MAX_LOGIN_ATTEMPTS => {
                Self::AwaitingResponse {
                    attempt: attempt + 1,
                    token: Some(token),
                }
            }
            Self::NeedToken { .. } => Self::Terminal(LoginOutcome::Unknown),
            other => other,
        }
    }

    /// State after request number `attempt` returned `outcome`.
    #[must_use]
    pub fn after_response(attempt: u8, outcome: LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::NeedToken(token) => Self::NeedToken { attempt, token },
            other => Self::Terminal(other),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// Session with the remote wiki API for one user.
#[derive(Debug)]
pub struct RemoteAuthClient {
    http: Client,
    config: Arc<ProviderConfig>,
    cookies: CookieStore,
    username: Option<String>,
}

impl RemoteAuthClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Arc<ProviderConfig>) -> Result<Self, ConfigError> {
        let http = http_client(&config)?;
        Ok(Self::with_http_client(http, config))
    }

    #[must_use]
    pub fn with_http_client(http: Client, config: Arc<ProviderConfig>) -> Self {
        Self {
            http,
            config,
            cookies: CookieStore::new(),
            username: None,
        }
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieStore {
        &self.cookies
    }

    /// Username of the last successful login, if still logged in.
    #[must_use]
    pub fn authenticated_user(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Run the login handshake. Never returns `NeedToken`.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&mut self, credentials: &RemoteCredentials) -> LoginOutcome {
        let mut state = HandshakeState::Start.next_request();

        loop {
            state = match state {
                HandshakeState::AwaitingResponse { attempt, token } => {
                    let outcome = self.round_trip(credentials, token.as_deref(), attempt).await;
                    HandshakeState::after_response(attempt, outcome)
                }
                pending @ HandshakeState::NeedToken { attempt, .. } => {
                    if attempt >= MAX_LOGIN_ATTEMPTS {
                        warn!(
                            attempts = attempt,
                            "too many login requests, remote kept asking for a new token"
                        );
                    }
                    pending.next_request()
                }
                HandshakeState::Terminal(outcome) => {
                    if outcome.is_success() {
                        info!("remote login succeeded");
                        self.username = Some(credentials.username.clone());
                    } else {
                        info!(result = outcome.as_str(), "remote login rejected");
                    }
                    return outcome;
                }
                HandshakeState::Start => HandshakeState::Start.next_request(),
            };
        }
    }

    async fn round_trip(
        &mut self,
        credentials: &RemoteCredentials,
        token: Option<&str>,
        attempt: u8,
    ) -> LoginOutcome {
        let mut form = vec![
            ("action", "login"),
            ("lgname", credentials.username.as_str()),
            ("lgpassword", credentials.password.expose_secret()),
            ("format", "json"),
        ];
        if let Some(token) = token {
            form.push(("lgtoken", token));
        }

        let url = self.config.api_endpoint();
        debug!(attempt, with_token = token.is_some(), "sending login request");

        let reply = match post_form(&self.http, url, &self.cookies, &form).await {
            Ok(reply) => reply,
            Err(err @ RemoteError::InvalidJson { .. }) => {
                warn!(error = %err, "remote login response is not JSON, is the API URL correct?");
                return LoginOutcome::Unknown;
            }
            Err(err) => {
                warn!(error = %err, "remote login request failed");
                return LoginOutcome::Unknown;
            }
        };

        self.cookies
            .replace_from_response(url, reply.set_cookies.iter().map(String::as_str));

        match LoginOutcome::from_response(&reply.body, self.config.throttle_seconds()) {
            Some(outcome) => outcome,
            None => {
                warn!(
                    url = %url,
                    body = %body_snippet(&reply.body.to_string()),
                    "remote response has no login result, the API URL is probably wrong"
                );
                LoginOutcome::Unknown
            }
        }
    }

    /// Fetch the profile of the logged in user with the current cookies.
    pub async fn fetch_profile(&self, want_preferences: bool) -> RemoteProfile {
        ProfileFetcher::new(&self.http, &self.config)
            .fetch(&self.cookies, want_preferences)
            .await
    }

    /// End the remote session. Failures are logged and otherwise ignored.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) {
        if self.username.is_none() && self.cookies.is_empty() {
            return;
        }

        let url = self.config.api_endpoint();
        let form = [("action", "logout"), ("format", "json")];
        if let Err(err) = post_form(&self.http, url, &self.cookies, &form).await {
            debug!(error = %err, "remote logout failed");
        }

        self.cookies.clear();
        self.username = None;
    }
}
