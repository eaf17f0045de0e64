use crate::remote::{
    DEFAULT_THROTTLE_SECONDS, DEFAULT_TIMEOUT_SECONDS, PreferenceImport, ProviderConfig,
};
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;
use std::collections::BTreeSet;

pub const ARG_API_URL: &str = "api-url";
pub const ARG_PREFS_URL: &str = "prefs-url";
pub const ARG_TIMEOUT: &str = "timeout";
pub const ARG_FETCH_PREFERENCES: &str = "fetch-preferences";
pub const ARG_EXCLUDE_PREFERENCE: &str = "exclude-preference";
pub const ARG_NO_PASSWORD_CHANGE_PROMPT: &str = "no-password-change-prompt";
pub const ARG_THROTTLE_SECONDS: &str = "throttle-seconds";
pub const ARG_USERNAME: &str = "username";
pub const ARG_PASSWORD: &str = "password";

#[derive(Debug, Clone)]
pub struct Options {
    pub api_url: String,
    pub prefs_url: Option<String>,
    pub timeout_seconds: u64,
    pub fetch_preferences: bool,
    pub excluded_preferences: BTreeSet<String>,
    pub prompt_password_change: bool,
    pub throttle_seconds: u64,
}

impl Options {
    /// Parse remote wiki arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let api_url = matches
            .get_one::<String>(ARG_API_URL)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_API_URL}"))?;

        let prefs_url = matches
            .get_one::<String>(ARG_PREFS_URL)
            .cloned()
            .filter(|v| !v.trim().is_empty());

        let excluded_preferences = matches
            .get_many::<String>(ARG_EXCLUDE_PREFERENCE)
            .map(|values| {
                values
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            api_url,
            prefs_url,
            timeout_seconds: matches
                .get_one::<u64>(ARG_TIMEOUT)
                .copied()
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            fetch_preferences: matches.get_flag(ARG_FETCH_PREFERENCES),
            excluded_preferences,
            prompt_password_change: !matches.get_flag(ARG_NO_PASSWORD_CHANGE_PROMPT),
            throttle_seconds: matches
                .get_one::<u64>(ARG_THROTTLE_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_THROTTLE_SECONDS),
        })
    }

    /// # Errors
    /// Returns an error if a URL is invalid.
    pub fn provider_config(self) -> Result<ProviderConfig> {
        let mut config = ProviderConfig::new(&self.api_url)
            .with_context(|| format!("invalid --{ARG_API_URL}"))?
            .with_timeout_seconds(self.timeout_seconds)
            .with_preference_import(PreferenceImport::from_parts(
                self.fetch_preferences,
                self.excluded_preferences,
            ))
            .with_prompt_password_change(self.prompt_password_change)
            .with_throttle_seconds(self.throttle_seconds);

        if let Some(url) = &self.prefs_url {
            config = config
                .with_preferences_page_url(url)
                .with_context(|| format!("invalid --{ARG_PREFS_URL}"))?;
        }

        Ok(config)
    }
}

/// Username and password to try against the remote wiki.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    /// # Errors
    /// Returns an error if the username or password is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let username = matches
            .get_one::<String>(ARG_USERNAME)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_USERNAME}"))?;
        let password = matches
            .get_one::<String>(ARG_PASSWORD)
            .cloned()
            .map(SecretString::from)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_PASSWORD}"))?;

        Ok(Self { username, password })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_URL)
                .long(ARG_API_URL)
                .help("Remote wiki API endpoint, example: https://wiki.tld/w/api.php")
                .env("STUBAUTH_API_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PREFS_URL)
                .long(ARG_PREFS_URL)
                .help("Remote preferences page, scraped when the API does not return an email")
                .env("STUBAUTH_PREFS_URL"),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .long(ARG_TIMEOUT)
                .help("Timeout in seconds for each remote request")
                .env("STUBAUTH_TIMEOUT")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_FETCH_PREFERENCES)
                .long(ARG_FETCH_PREFERENCES)
                .help("Import the remote user preferences")
                .env("STUBAUTH_FETCH_PREFERENCES")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_EXCLUDE_PREFERENCE)
                .long(ARG_EXCLUDE_PREFERENCE)
                .help("Preference to skip when importing, implies --fetch-preferences")
                .env("STUBAUTH_EXCLUDE_PREFERENCES")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_NO_PASSWORD_CHANGE_PROMPT)
                .long(ARG_NO_PASSWORD_CHANGE_PROMPT)
                .help("Do not offer a password change after provisioning")
                .env("STUBAUTH_NO_PASSWORD_CHANGE_PROMPT")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_THROTTLE_SECONDS)
                .long(ARG_THROTTLE_SECONDS)
                .help("Wait reported to throttled users when the remote does not say")
                .env("STUBAUTH_THROTTLE_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[must_use]
pub fn with_credentials_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_USERNAME)
                .short('u')
                .long(ARG_USERNAME)
                .help("Username to log in with")
                .env("STUBAUTH_USERNAME")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Password to log in with, prefer the environment variable")
                .env("STUBAUTH_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
}
