//! First-login provisioning of stub accounts against the remote wiki.
//!
//! The provider only ever *abstains* or *fails*: after a successful remote
//! login it writes the password hash and profile into the local store and
//! leaves the actual authorization to the regular local password check.

pub mod password;
pub mod store;
pub mod username;


pub use store::{LocalAccount, MemorySessionFlags, ProfileUpdate, SessionFlags, UserStore};

use crate::remote::{
    ConfigError, LoginFailure, LoginOutcome, ProviderConfig, RemoteAuthClient, RemoteCredentials,
    RemoteProfile, http_client,
};
use anyhow::Result;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Session key asking the login flow to offer a password change.
pub const RESET_PASSWORD_FLAG: &str = "reset-pass";

/// Message key shown with the password change offer.
pub const RESET_PASSWORD_MESSAGE: &str = "stubauth-resetpass";

/// Username and password typed into the local login form.
#[derive(Debug)]
pub struct PasswordRequest {
    pub username: String,
    pub password: SecretString,
}

impl PasswordRequest {
    #[must_use]
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthResponse {
    /// Authenticated as the named account.
    Pass(String),
    /// Rejected, with the message to show.
    Fail(LoginFailure),
    /// No opinion; the next provider decides.
    Abstain,
}

pub struct StubUserProvider<S, F> {
    config: Arc<ProviderConfig>,
    http: Client,
    store: S,
    flags: F,
}

impl<S: UserStore, F: SessionFlags> StubUserProvider<S, F> {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig, store: S, flags: F) -> Result<Self, ConfigError> {
        let http = http_client(&config)?;
        Ok(Self {
            config: Arc::new(config),
            http,
            store,
            flags,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn flags(&self) -> &F {
        &self.flags
    }

    /// True for an existing account that still has no local password.
    ///
    /// # Errors
    /// Returns an error if the store lookup fails.
    pub async fn can_authenticate(&self, username: &str) -> Result<bool> {
        Ok(self
            .lookup(username)
            .await?
            .is_some_and(|account| !account.has_password))
    }

    /// # Errors
    /// Returns an error if the store lookup fails.
    pub async fn user_exists(&self, username: &str) -> Result<bool> {
        Ok(self.lookup(username).await?.is_some())
    }

    async fn lookup(&self, username: &str) -> Result<Option<LocalAccount>> {
        let Some(name) = self.store.canonical_name(username) else {
            return Ok(None);
        };
        self.store.find_by_name(&name).await
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn begin_authentication(&self, request: &PasswordRequest) -> AuthResponse {
        if request.username.is_empty() || request.password.expose_secret().is_empty() {
            return AuthResponse::Abstain;
        }

        let Some(name) = self.store.canonical_name(&request.username) else {
            debug!("username cannot be canonicalized");
            return AuthResponse::Abstain;
        };

        let account = match self.store.find_by_name(&name).await {
            Ok(Some(account)) if !account.has_password => account,
            Ok(Some(_)) => {
                debug!("account already has a local password");
                return AuthResponse::Abstain;
            }
            Ok(None) => {
                debug!("no local account");
                return AuthResponse::Abstain;
            }
            Err(err) => {
                error!(error = %err, "failed to look up local account");
                return AuthResponse::Abstain;
            }
        };

        let mut client =
            RemoteAuthClient::with_http_client(self.http.clone(), Arc::clone(&self.config));
        let credentials = RemoteCredentials::new(
            name.as_str(),
            SecretString::from(request.password.expose_secret().to_string()),
        );

        match client.login(&credentials).await {
            LoginOutcome::Success => {}
            LoginOutcome::NotExists => return AuthResponse::Abstain,
            outcome => {
                return outcome
                    .failure(&name)
                    .map_or(AuthResponse::Abstain, AuthResponse::Fail);
            }
        }

        if let Err(err) = self.commit_password(&account, &request.password).await {
            error!(error = %err, account_id = account.id, "failed to store local password");
            return AuthResponse::Fail(LoginFailure::InternalError);
        }
        info!(account_id = account.id, "stub account provisioned from remote login");

        let profile = client
            .fetch_profile(self.config.preference_import().enabled())
            .await;
        client.logout().await;

        self.import_profile(&account, profile).await;

        if self.config.prompt_password_change() {
            self.flags.set(
                RESET_PASSWORD_FLAG,
                json!({"msg": RESET_PASSWORD_MESSAGE, "hard": false}),
            );
        }

        AuthResponse::Abstain
    }

    async fn commit_password(&self, account: &LocalAccount, password: &SecretString) -> Result<()> {
        let hash = password::hash_password(password)?;
        let session_token = password::generate_session_token()?;
        self.store
            .set_password_hash(account.id, &hash, &session_token)
            .await
    }

    async fn import_profile(&self, account: &LocalAccount, profile: RemoteProfile) {
        let update = ProfileUpdate {
            real_name: profile.real_name,
            email: profile.email,
            email_authenticated_at: profile.email_authenticated_at,
        };

        if !update.is_empty() {
            if let Err(err) = self.store.save_profile(account.id, &update).await {
                warn!(error = %err, account_id = account.id, "failed to save imported profile");
            }
        }

        if let Some(email) = &update.email
            && update.email_authenticated_at.is_none()
        {
            if let Err(err) = self.store.request_email_confirmation(account.id, email).await {
                warn!(error = %err, account_id = account.id, "failed to queue email confirmation");
            }
        }

        let import = self.config.preference_import();
        let preferences: BTreeMap<String, String> = profile
            .preferences
            .unwrap_or_default()
            .into_iter()
            .filter(|(name, _)| import.allows(name))
            .collect();

        if !preferences.is_empty() {
            if let Err(err) = self.store.save_preferences(account.id, &preferences).await {
                warn!(error = %err, account_id = account.id, "failed to save imported preferences");
            }
        }
    }
}
