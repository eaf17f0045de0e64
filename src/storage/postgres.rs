use crate::provider::{LocalAccount, ProfileUpdate, UserStore};
use anyhow::{Context, Result};
use serde_json::json;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use tracing::{Instrument, info_span};

/// Outbox template for the address confirmation mail.
pub const CONFIRM_EMAIL_TEMPLATE: &str = "confirm_email";

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl UserStore for PgUserStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<LocalAccount>> {
        let query = "SELECT id, name, password_hash <> '' AS has_password FROM users WHERE name = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up user by name")?;

        Ok(row.map(|row| LocalAccount {
            id: row.get("id"),
            name: row.get("name"),
            has_password: row.get("has_password"),
        }))
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str, session_token: &str) -> Result<()> {
        let query = r"
            UPDATE users
            SET password_hash = $2, session_token = $3, updated_at = NOW()
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .bind(session_token)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to store password hash")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("user {id} disappeared before its password could be stored");
        }
        Ok(())
    }

    async fn save_profile(&self, id: i64, update: &ProfileUpdate) -> Result<()> {
        let query = r"
            UPDATE users
            SET real_name = COALESCE($2, real_name),
                email = COALESCE($3, email),
                email_authenticated_at = COALESCE($4, email_authenticated_at),
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(update.real_name.as_deref())
            .bind(update.email.as_deref())
            .bind(update.email_authenticated_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to save user profile")?;
        Ok(())
    }

    async fn save_preferences(&self, id: i64, preferences: &BTreeMap<String, String>) -> Result<()> {
        let (names, values): (Vec<&str>, Vec<&str>) = preferences
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .unzip();

        let query = r"
            INSERT INTO user_preferences (user_id, name, value)
            SELECT $1, pref.name, pref.value
            FROM UNNEST($2::text[], $3::text[]) AS pref (name, value)
            ON CONFLICT (user_id, name) DO UPDATE SET value = EXCLUDED.value
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(names)
            .bind(values)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to save user preferences")?;
        Ok(())
    }

    async fn request_email_confirmation(&self, id: i64, email: &str) -> Result<()> {
        let payload = json!({ "user_id": id, "email": email });
        let payload_text = serde_json::to_string(&payload).context("serialize outbox payload")?;

        let query = r"
            INSERT INTO email_outbox (to_email, template, payload_json)
            VALUES ($1, $2, $3::jsonb)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(email)
            .bind(CONFIRM_EMAIL_TEMPLATE)
            .bind(payload_text)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to queue confirmation email")?;
        Ok(())
    }
}
