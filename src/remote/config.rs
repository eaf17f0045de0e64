//! Remote wiki provider configuration.

use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_THROTTLE_SECONDS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("api endpoint must be provided")]
    MissingApiEndpoint,
    #[error("invalid {field} URL: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported scheme for {field}: {scheme}")]
    UnsupportedScheme { field: &'static str, scheme: String },
    #[error("{field} URL has no host")]
    MissingHost { field: &'static str },
    #[error("failed to build remote HTTP client")]
    HttpClient(#[from] reqwest::Error),
}

/// Which remote preferences are copied into the local account.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PreferenceImport {
    #[default]
    Disabled,
    All,
    /// Import everything except the named preferences.
    Except(BTreeSet<String>),
}

impl PreferenceImport {
    /// Build from CLI style input: a flag plus an exclusion list that implies the flag.
    #[must_use]
    pub fn from_parts(fetch: bool, excluded: BTreeSet<String>) -> Self {
        if !excluded.is_empty() {
            Self::Except(excluded)
        } else if fetch {
            Self::All
        } else {
            Self::Disabled
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        match self {
            Self::Disabled => false,
            Self::All => true,
            Self::Except(excluded) => !excluded.contains(name),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProviderConfig {
    api_endpoint: Url,
    preferences_page_url: Option<Url>,
    timeout_seconds: u64,
    preference_import: PreferenceImport,
    prompt_password_change: bool,
    throttle_seconds: u64,
}

impl ProviderConfig {
    /// # Errors
    /// Returns an error if the endpoint is empty or not an absolute http(s) URL.
    pub fn new(api_endpoint: &str) -> Result<Self, ConfigError> {
        if api_endpoint.trim().is_empty() {
            return Err(ConfigError::MissingApiEndpoint);
        }

        Ok(Self {
            api_endpoint: parse_http_url("api endpoint", api_endpoint)?,
            preferences_page_url: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            preference_import: PreferenceImport::Disabled,
            prompt_password_change: true,
            throttle_seconds: DEFAULT_THROTTLE_SECONDS,
        })
    }

    /// # Errors
    /// Returns an error if the URL is not an absolute http(s) URL.
    pub fn with_preferences_page_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.preferences_page_url = Some(parse_http_url("preferences page", url)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_preference_import(mut self, import: PreferenceImport) -> Self {
        self.preference_import = import;
        self
    }

    #[must_use]
    pub fn with_prompt_password_change(mut self, prompt: bool) -> Self {
        self.prompt_password_change = prompt;
        self
    }

    #[must_use]
    pub fn with_throttle_seconds(mut self, seconds: u64) -> Self {
        self.throttle_seconds = seconds;
        self
    }

    #[must_use]
    pub fn api_endpoint(&self) -> &Url {
        &self.api_endpoint
    }

    #[must_use]
    pub fn preferences_page_url(&self) -> Option<&Url> {
        self.preferences_page_url.as_ref()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    #[must_use]
    pub fn preference_import(&self) -> &PreferenceImport {
        &self.preference_import
    }

    #[must_use]
    pub fn prompt_password_change(&self) -> bool {
        self.prompt_password_change
    }

    #[must_use]
    pub fn throttle_seconds(&self) -> u64 {
        self.throttle_seconds
    }
}

fn parse_http_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { field, source })?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ConfigError::UnsupportedScheme {
                field,
                scheme: scheme.to_string(),
            });
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::MissingHost { field });
    }

    Ok(url)
}
