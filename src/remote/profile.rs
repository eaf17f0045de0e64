use super::{
    CookieStore, ProviderConfig, RemoteError, get_page, post_form,
    scrape::{self, EMAIL_FIELDS, REAL_NAME_FIELDS},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// Profile data the remote wiki shared about the logged in user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RemoteProfile {
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub email_authenticated_at: Option<DateTime<Utc>>,
    pub preferences: Option<BTreeMap<String, String>>,
}

impl RemoteProfile {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.real_name.is_none()
            && self.email.is_none()
            && self.email_authenticated_at.is_none()
            && self.preferences.is_none()
    }
}

/// Collects [`RemoteProfile`] data, first from the API and then, for anything
/// still missing, from the preferences page.
pub struct ProfileFetcher<'a> {
    http: &'a Client,
    config: &'a ProviderConfig,
}

impl<'a> ProfileFetcher<'a> {
    #[must_use]
    pub fn new(http: &'a Client, config: &'a ProviderConfig) -> Self {
        Self { http, config }
    }

    /// Best effort: every failure is logged and leaves the affected fields empty.
    #[instrument(skip(self, cookies))]
    pub async fn fetch(&self, cookies: &CookieStore, want_preferences: bool) -> RemoteProfile {
        let mut profile = RemoteProfile::default();

        match self.query_userinfo(cookies, want_preferences).await {
            Ok(body) => {
                let preferences = apply_userinfo(&mut profile, &body);
                if want_preferences {
                    profile.preferences = preferences;
                }
            }
            Err(err) => warn!(error = %err, "failed to query remote user info"),
        }

        if profile.email.is_none() {
            self.scrape_preferences_page(cookies, &mut profile).await;
        }

        profile
    }

    async fn query_userinfo(
        &self,
        cookies: &CookieStore,
        want_preferences: bool,
    ) -> Result<Value, RemoteError> {
        let uiprop = if want_preferences {
            "email|realname|options"
        } else {
            "email|realname"
        };
        let form = [
            ("action", "query"),
            ("meta", "userinfo"),
            ("uiprop", uiprop),
            ("format", "json"),
        ];

        let reply = post_form(self.http, self.config.api_endpoint(), cookies, &form).await?;
        Ok(reply.body)
    }

    async fn scrape_preferences_page(&self, cookies: &CookieStore, profile: &mut RemoteProfile) {
        let Some(base) = self.config.preferences_page_url() else {
            debug!("no preferences page configured, skipping scrape");
            return;
        };

        let mut url = base.clone();
        url.query_pairs_mut().append_pair("uselang", "qqx");

        let html = match get_page(self.http, &url, cookies).await {
            Ok(reply) => reply.body,
            Err(err) => {
                warn!(error = %err, "failed to fetch remote preferences page");
                return;
            }
        };

        if profile.real_name.is_none() {
            profile.real_name = non_empty(scrape::input_value(&html, &REAL_NAME_FIELDS));
        }
        if let Some(email) = non_empty(scrape::input_value(&html, &EMAIL_FIELDS)) {
            profile.email = Some(email);
        }

        debug!(
            real_name = profile.real_name.is_some(),
            email = profile.email.is_some(),
            "scraped remote preferences page"
        );
    }
}

/// Copy `query.userinfo` fields into `profile`, returning the options map if any.
fn apply_userinfo(profile: &mut RemoteProfile, body: &Value) -> Option<BTreeMap<String, String>> {
    let Some(userinfo) = body.pointer("/query/userinfo") else {
        warn!("remote user info response has no query.userinfo object");
        return None;
    };

    profile.real_name = non_empty(
        userinfo
            .get("realname")
            .and_then(Value::as_str)
            .map(str::to_string),
    );

    profile.email = non_empty(
        userinfo
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string),
    );

    if profile.email.is_some() {
        profile.email_authenticated_at = userinfo
            .get("emailauthenticated")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);
    }

    userinfo
        .get("options")
        .and_then(Value::as_object)
        .map(|options| {
            options
                .iter()
                .filter_map(|(name, value)| option_value(value).map(|value| (name.clone(), value)))
                .collect::<BTreeMap<_, _>>()
        })
        .filter(|options| !options.is_empty())
}

/// Preference values are stored as strings; booleans follow the `1`/`0` form.
fn option_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some("0".to_string()),
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Accepts ISO 8601 (`2024-05-01T12:00:00Z`) and the compact `20240501120000` form.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
