//! Remote login outcomes and the user-facing failures they map to.

use serde_json::Value;
use thiserror::Error;

/// Result of one `action=login` round trip as reported by the remote API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    NotExists,
    /// The server wants the request repeated with this token.
    NeedToken(String),
    WrongToken,
    EmptyPassword,
    WrongPassword,
    /// Rate limited remotely; wait this many seconds.
    Throttled(u64),
    Unknown,
}

impl LoginOutcome {
    /// Interpret a decoded API response.
    ///
    /// Returns `None` when the body has no `login` object at all, which usually
    /// means the configured endpoint is not a wiki API.
    #[must_use]
    pub fn from_response(body: &Value, throttle_fallback_seconds: u64) -> Option<Self> {
        let login = body.get("login")?;
        let result = login.get("result").and_then(Value::as_str).unwrap_or("");

        let outcome = match result {
            "Success" => Self::Success,
            "NotExists" => Self::NotExists,
            "NeedToken" => login
                .get("token")
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map_or(Self::Unknown, |token| Self::NeedToken(token.to_string())),
            "WrongToken" => Self::WrongToken,
            "EmptyPass" => Self::EmptyPassword,
            "WrongPass" | "WrongPluginPass" => Self::WrongPassword,
            "Throttled" => Self::Throttled(
                login
                    .get("wait")
                    .and_then(|wait| {
                        wait.as_u64()
                            .or_else(|| wait.as_str().and_then(|s| s.parse().ok()))
                    })
                    .unwrap_or(throttle_fallback_seconds),
            ),
            _ => Self::Unknown,
        };

        Some(outcome)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Wire name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::NotExists => "NotExists",
            Self::NeedToken(_) => "NeedToken",
            Self::WrongToken => "WrongToken",
            Self::EmptyPassword => "EmptyPass",
            Self::WrongPassword => "WrongPass",
            Self::Throttled(_) => "Throttled",
            Self::Unknown => "Unknown",
        }
    }

    /// The failure shown to the end user, `None` for `Success`.
    #[must_use]
    pub fn failure(&self, username: &str) -> Option<LoginFailure> {
        match self {
            Self::Success => None,
            Self::NotExists => Some(LoginFailure::NoSuchUser(username.to_string())),
            Self::WrongToken => Some(LoginFailure::InternalError),
            Self::EmptyPassword => Some(LoginFailure::EmptyPassword),
            Self::WrongPassword => Some(LoginFailure::WrongPassword),
            Self::Throttled(seconds) => Some(LoginFailure::Throttled(*seconds)),
            Self::NeedToken(_) | Self::Unknown => Some(LoginFailure::Unknown),
        }
    }
}

/// Authentication rejected by the remote wiki, with a message for the end user.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoginFailure {
    #[error("There is no user by the name \"{0}\". Usernames are case sensitive.")]
    NoSuchUser(String),
    #[error("Internal error. The remote login token was rejected, please try again.")]
    InternalError,
    #[error("The supplied password was empty. Please try again.")]
    EmptyPassword,
    #[error("Incorrect username or password entered. Please try again.")]
    WrongPassword,
    #[error(
        "You have made too many recent login attempts. Please wait {} before trying again.",
        format_duration(*.0)
    )]
    Throttled(u64),
    #[error("Unknown error.")]
    Unknown,
}

impl LoginFailure {
    /// Stable message key for hosts that localize the text themselves.
    #[must_use]
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::NoSuchUser(_) => "nosuchuser",
            Self::InternalError => "internalerror",
            Self::EmptyPassword => "wrongpasswordempty",
            Self::WrongPassword => "wrongpassword",
            Self::Throttled(_) => "login-throttled",
            Self::Unknown => "unknown-error",
        }
    }
}

/// Render a wait time the way a person would say it: `1 hour and 30 minutes`.
#[must_use]
pub fn format_duration(total_seconds: u64) -> String {
    const UNITS: [(u64, &str); 4] = [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")];

    let mut remaining = total_seconds;
    let mut parts = Vec::new();
    for (size, name) in UNITS {
        let count = remaining / size;
        remaining %= size;
        if count > 0 {
            let plural = if count == 1 { "" } else { "s" };
            parts.push(format!("{count} {name}{plural}"));
        }
    }

    match parts.len() {
        0 => "0 seconds".to_string(),
        1 => parts.remove(0),
        _ => {
            let last = parts.pop().unwrap_or_default();
            format!("{} and {last}", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_results() {
        let cases = [
            (json!({"login": {"result": "Success"}}), LoginOutcome::Success),
            (json!({"login": {"result": "NotExists"}}), LoginOutcome::NotExists),
            (json!({"login": {"result": "WrongToken"}}), LoginOutcome::WrongToken),
            (json!({"login": {"result": "EmptyPass"}}), LoginOutcome::EmptyPassword),
            (json!({"login": {"result": "WrongPass"}}), LoginOutcome::WrongPassword),
            (json!({"login": {"result": "WrongPluginPass"}}), LoginOutcome::WrongPassword),
            (json!({"login": {"result": "Aborted"}}), LoginOutcome::Unknown),
            (
                json!({"login": {"result": "NeedToken", "token": "tok1"}}),
                LoginOutcome::NeedToken("tok1".to_string()),
            ),
        ];

        for (body, expected) in cases {
            assert_eq!(LoginOutcome::from_response(&body, 300), Some(expected));
        }
    }

    #[test]
    fn need_token_without_token_is_unknown() {
        let body = json!({"login": {"result": "NeedToken"}});
        assert_eq!(
            LoginOutcome::from_response(&body, 300),
            Some(LoginOutcome::Unknown)
        );
    }

    #[test]
    fn throttled_prefers_remote_wait() {
        let remote = json!({"login": {"result": "Throttled", "wait": 42}});
        assert_eq!(
            LoginOutcome::from_response(&remote, 300),
            Some(LoginOutcome::Throttled(42))
        );

        let configured = json!({"login": {"result": "Throttled"}});
        assert_eq!(
            LoginOutcome::from_response(&configured, 300),
            Some(LoginOutcome::Throttled(300))
        );
    }

    #[test]
    fn missing_login_object_is_none() {
        assert_eq!(LoginOutcome::from_response(&json!({"error": {}}), 300), None);
    }

    #[test]
    fn failure_messages() {
        assert_eq!(LoginOutcome::Success.failure("Alice"), None);
        assert_eq!(
            LoginOutcome::NotExists.failure("Alice"),
            Some(LoginFailure::NoSuchUser("Alice".to_string()))
        );
        assert_eq!(
            LoginOutcome::NeedToken("t".to_string()).failure("Alice"),
            Some(LoginFailure::Unknown)
        );

        let throttled = LoginFailure::Throttled(300);
        assert_eq!(throttled.message_key(), "login-throttled");
        assert!(throttled.to_string().contains("Please wait 5 minutes"));
    }

    #[test]
    fn format_duration_units() {
        assert_eq!(format_duration(0), "0 seconds");
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(300), "5 minutes");
        assert_eq!(format_duration(5_400), "1 hour and 30 minutes");
        assert_eq!(format_duration(90_061), "1 day, 1 hour, 1 minute and 1 second");
    }
}
