//! Collaborators the provider writes to: the local user directory and the
//! login session.

use super::username;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Mutex, PoisonError};

/// Local account as seen by the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalAccount {
    pub id: i64,
    pub name: String,
    /// False for stub accounts.
    pub has_password: bool,
}

/// Profile fields to write; `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub email_authenticated_at: Option<DateTime<Utc>>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.real_name.is_none() && self.email.is_none() && self.email_authenticated_at.is_none()
    }
}

pub trait UserStore: Send + Sync {
    /// Canonical account name for user input, `None` if it cannot be an account.
    fn canonical_name(&self, raw: &str) -> Option<String> {
        username::canonicalize(raw).ok()
    }

    fn find_by_name(&self, name: &str) -> impl Future<Output = Result<Option<LocalAccount>>> + Send;

    /// Store the password hash and replace the session token in one write.
    fn set_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        session_token: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn save_profile(&self, id: i64, update: &ProfileUpdate) -> impl Future<Output = Result<()>> + Send;

    fn save_preferences(
        &self,
        id: i64,
        preferences: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Queue a confirmation mail for an unconfirmed address.
    fn request_email_confirmation(
        &self,
        id: i64,
        email: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Per-session key/value data consumed after login completes.
pub trait SessionFlags: Send + Sync {
    fn set(&self, key: &str, value: Value);
    fn get(&self, key: &str) -> Option<Value>;
}

#[derive(Debug, Default)]
pub struct MemorySessionFlags {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySessionFlags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionFlags for MemorySessionFlags {
    fn set(&self, key: &str, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_session_flags() {
        let flags = MemorySessionFlags::new();
        assert_eq!(flags.get("reset-pass"), None);

        flags.set("reset-pass", json!({"hard": false}));
        assert_eq!(flags.get("reset-pass"), Some(json!({"hard": false})));

        flags.set("reset-pass", json!(null));
        assert_eq!(flags.get("reset-pass"), Some(Value::Null));
    }

    #[test]
    fn profile_update_emptiness() {
        assert!(ProfileUpdate::default().is_empty());
        let update = ProfileUpdate {
            email: Some("a@example.com".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
